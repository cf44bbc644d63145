//! EventLoop metrics collection.

use std::cell::Cell;
use std::time::Instant;

use serde::Serialize;

/// EventLoop counters.
///
/// The loop is single-threaded, so plain `Cell`s are enough.
#[derive(Debug, Default)]
pub struct LoopMetrics {
    /// Total number of ticks.
    pub ticks: Cell<u64>,

    /// Total action invocations.
    pub invocations: Cell<u64>,

    /// Actions removed because a condition they depend on was retired.
    pub purged_actions: Cell<u64>,

    /// I/O waits cut short by a signal.
    pub interrupted_waits: Cell<u64>,

    /// Ticks that hit the invocation ceiling.
    pub capped_ticks: Cell<u64>,

    /// Timer deadlines that fired.
    pub timeouts_fired: Cell<u64>,

    /// Termination signals observed.
    pub signals_received: Cell<u64>,

    /// Start time.
    start_time: Cell<Option<Instant>>,
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

impl LoopMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of the loop.
    pub fn mark_start(&self) {
        self.start_time.set(Some(Instant::now()));
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .get()
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn record_tick(&self) {
        bump(&self.ticks);
    }

    pub fn record_invocation(&self) {
        bump(&self.invocations);
    }

    pub fn record_purged_action(&self) {
        bump(&self.purged_actions);
    }

    pub fn record_interrupted_wait(&self) {
        bump(&self.interrupted_waits);
    }

    pub fn record_capped_tick(&self) {
        bump(&self.capped_ticks);
    }

    pub fn record_timeout_fired(&self) {
        bump(&self.timeouts_fired);
    }

    pub fn record_signal(&self) {
        bump(&self.signals_received);
    }

    /// Get a snapshot of the metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            ticks: self.ticks.get(),
            invocations: self.invocations.get(),
            purged_actions: self.purged_actions.get(),
            interrupted_waits: self.interrupted_waits.get(),
            capped_ticks: self.capped_ticks.get(),
            timeouts_fired: self.timeouts_fired.get(),
            signals_received: self.signals_received.get(),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub ticks: u64,
    pub invocations: u64,
    pub purged_actions: u64,
    pub interrupted_waits: u64,
    pub capped_ticks: u64,
    pub timeouts_fired: u64,
    pub signals_received: u64,
}

impl MetricsSnapshot {
    /// Average number of invocations per tick.
    pub fn invocations_per_tick(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        self.invocations as f64 / self.ticks as f64
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
