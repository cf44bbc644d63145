//! Deadline conditions backed by one OS interval timer.
//!
//! Deadlines sit in a min-heap keyed by `Instant`. The process-wide
//! `ITIMER_REAL` timer is programmed for the earliest one; its `SIGALRM`
//! handler only raises a flag, which cuts the I/O wait short. Due deadlines
//! are fired during the timer manager's preparation, on the loop thread.
//! The clock is checked on every tick as well, so a timer clobbered by
//! someone else costs at most one wait bound.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::ptr;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{debug, trace};

use crate::condition::Condition;
use crate::error::{EventError, EventResult};
use crate::handle::{LoopCore, LoopHandle};
use crate::manager::{ConditionManager, PrepareContext};
use crate::registry::ConditionId;

/// Set by the SIGALRM handler, consumed by the timer manager.
static ALARM: AtomicBool = AtomicBool::new(false);
static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_alarm(_: libc::c_int) {
    ALARM.store(true, Ordering::SeqCst);
}

fn install_alarm_handler() -> EventResult<()> {
    if HANDLER_INSTALLED.load(Ordering::Acquire) {
        return Ok(());
    }

    let action = SigAction::new(
        SigHandler::Handler(on_alarm),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only stores into an atomic.
    unsafe { sigaction(Signal::SIGALRM, &action) }
        .map_err(|e| EventError::TimerSetup(e.to_string()))?;

    HANDLER_INSTALLED.store(true, Ordering::Release);
    debug!("SIGALRM handler installed");
    Ok(())
}

fn set_os_timer(timeout: Duration) -> EventResult<()> {
    let value = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        },
    };

    let rc = unsafe { libc::setitimer(libc::ITIMER_REAL, &value, ptr::null_mut()) };
    if rc < 0 {
        return Err(EventError::TimerSetup(format!(
            "setitimer failed: {}",
            Errno::last()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    at: Instant,
    ticket: u64,
    condition: ConditionId,
}

#[derive(Default)]
struct TimerState {
    queue: BinaryHeap<Reverse<Deadline>>,
    /// Current ticket per scheduled condition. Heap entries whose ticket is
    /// no longer current are tombstones and get skipped.
    active: HashMap<ConditionId, u64>,
    next_ticket: u64,
    /// When the OS timer is due, if it is believed to be pending.
    armed_until: Option<Instant>,
}

impl TimerState {
    fn is_current(&self, deadline: &Deadline) -> bool {
        self.active.get(&deadline.condition) == Some(&deadline.ticket)
    }

    fn drop_tombstones(&mut self) {
        while let Some(Reverse(head)) = self.queue.peek() {
            if self.is_current(head) {
                break;
            }
            self.queue.pop();
        }
    }

    fn take_due(&mut self, now: Instant) -> Vec<ConditionId> {
        let mut due = Vec::new();
        while let Some(Reverse(head)) = self.queue.peek() {
            if head.at > now {
                break;
            }
            let head = *head;
            self.queue.pop();
            if self.is_current(&head) {
                self.active.remove(&head.condition);
                due.push(head.condition);
            }
        }
        due
    }

    /// Point the OS timer at the earliest live deadline, unless it is
    /// already due no later than that.
    fn program(&mut self, now: Instant) -> EventResult<()> {
        self.drop_tombstones();
        let Some(Reverse(head)) = self.queue.peek() else {
            return Ok(());
        };

        if let Some(until) = self.armed_until {
            if until > now && until <= head.at {
                return Ok(());
            }
        }

        let timeout = head
            .at
            .saturating_duration_since(now)
            .max(Duration::from_millis(1));
        set_os_timer(timeout)?;
        self.armed_until = Some(now + timeout);
        trace!(timeout_us = timeout.as_micros() as u64, "OS timer programmed");
        Ok(())
    }
}

/// Manager of deadlines.
///
/// Any condition can be scheduled. When its deadline passes the condition is
/// set to true: a `Base` condition stays true until its owner arms it, a
/// managed one holds for the rest of the tick.
pub struct TimerManager {
    core: Weak<LoopCore>,
    state: RefCell<TimerState>,
}

impl TimerManager {
    pub(crate) fn new(core: Weak<LoopCore>) -> Self {
        Self {
            core,
            state: RefCell::new(TimerState::default()),
        }
    }

    /// Fire `condition` once `at` has passed.
    ///
    /// Scheduling a condition again replaces its previous deadline.
    pub fn set_timeout(&self, at: Instant, condition: ConditionId) -> EventResult<()> {
        install_alarm_handler()?;

        let mut state = self.state.borrow_mut();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.active.insert(condition, ticket);
        state.queue.push(Reverse(Deadline {
            at,
            ticket,
            condition,
        }));
        debug!(condition = %condition, ticket, "Timeout scheduled");

        state.program(Instant::now())
    }

    /// Cancel the pending deadline of `condition`, if any.
    pub fn remove_timeout(&self, condition: ConditionId) -> bool {
        let removed = self.state.borrow_mut().active.remove(&condition).is_some();
        if removed {
            debug!(condition = %condition, "Timeout removed");
        }
        removed
    }

    /// Number of scheduled, not yet fired deadlines.
    pub fn pending(&self) -> usize {
        self.state.borrow().active.len()
    }

    /// The earliest scheduled deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        let state = self.state.borrow();
        state
            .queue
            .iter()
            .filter(|Reverse(deadline)| state.is_current(deadline))
            .map(|Reverse(deadline)| deadline.at)
            .min()
    }
}

impl ConditionManager for TimerManager {
    fn prepare_conditions(&self, _cx: &PrepareContext<'_>) -> EventResult<()> {
        let alarmed = ALARM.swap(false, Ordering::SeqCst);
        let now = Instant::now();

        let due = {
            let mut state = self.state.borrow_mut();
            if alarmed {
                state.armed_until = None;
            }
            state.take_due(now)
        };

        if let Some(core) = self.core.upgrade() {
            for condition in due {
                trace!(condition = %condition, "Timeout fired");
                core.set_value(condition, true);
                core.metrics.record_timeout_fired();
            }
        }

        self.state.borrow_mut().program(now)
    }
}

/// A resettable one-shot timer.
///
/// `did_fire` is a `Base` condition that turns true when the deadline passes
/// and stays true until the timer is cleared, reset or extended.
pub struct Timer {
    did_fire: Condition,
    manager: Rc<TimerManager>,
    target: Cell<Option<Instant>>,
}

impl Timer {
    /// A timer with no deadline.
    pub fn new(handle: &LoopHandle) -> Self {
        Self {
            did_fire: Condition::new(handle),
            manager: handle.timers(),
            target: Cell::new(None),
        }
    }

    /// A timer due `timeout` from now.
    pub fn with_timeout(handle: &LoopHandle, timeout: Duration) -> EventResult<Self> {
        let timer = Self::new(handle);
        timer.reset(timeout)?;
        Ok(timer)
    }

    pub fn did_fire(&self) -> ConditionId {
        self.did_fire.id()
    }

    pub fn fired(&self) -> bool {
        self.did_fire.eval()
    }

    /// The current deadline.
    pub fn target(&self) -> Option<Instant> {
        self.target.get()
    }

    /// Arm `did_fire` without touching the deadline.
    pub fn clear(&self) {
        self.did_fire.arm();
    }

    /// Arm and schedule `timeout` from now.
    pub fn reset(&self, timeout: Duration) -> EventResult<()> {
        self.schedule(Instant::now() + timeout)
    }

    /// Arm and schedule `timeout` after the previous deadline.
    ///
    /// Keeps periodic timers from drifting. Without a previous deadline this
    /// is the same as [`reset`](Self::reset).
    pub fn extend(&self, timeout: Duration) -> EventResult<()> {
        let base = self.target.get().unwrap_or_else(Instant::now);
        self.schedule(base + timeout)
    }

    /// Cancel the pending deadline. `did_fire` keeps its value.
    pub fn cancel(&self) -> bool {
        self.target.set(None);
        self.manager.remove_timeout(self.did_fire.id())
    }

    fn schedule(&self, at: Instant) -> EventResult<()> {
        self.clear();
        self.target.set(Some(at));
        self.manager.set_timeout(at, self.did_fire.id())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.manager.remove_timeout(self.did_fire.id());
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("did_fire", &self.did_fire.id())
            .field("target", &self.target.get())
            .finish()
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
