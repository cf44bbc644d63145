//! The EventLoop: owner of every condition, action and manager.
//!
//! There is at most one EventLoop per thread. Components never reach it
//! through a global; they are handed a [`LoopHandle`] (the loop derefs to
//! one) when they are constructed.

use std::cell::Cell;
use std::ops::Deref;

use tracing::{debug, info};

use crate::condition::ConditionKind;
use crate::config::EventLoopConfig;
use crate::error::{EventError, EventResult};
use crate::handle::{LoopCore, LoopHandle};
use crate::signal;

thread_local! {
    static LOOP_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// The reactive scheduler.
///
/// Each tick prepares every managed condition kind in registration order,
/// then invokes ready actions until nothing more can run. See
/// [`run_once`](Self::run_once).
pub struct EventLoop {
    handle: LoopHandle,
}

impl EventLoop {
    /// Create the loop with the built-in timer, signal and I/O managers.
    pub fn new(config: EventLoopConfig) -> EventResult<Self> {
        let install_signals = config.handle_termination_signals;
        let event_loop = Self::bare(config)?;
        let handle = event_loop.handle();

        handle.add_condition_manager(ConditionKind::Timer, handle.timers())?;
        handle.add_condition_manager(ConditionKind::Signal, handle.signals())?;
        handle.add_condition_manager(ConditionKind::Io, handle.io())?;

        if install_signals {
            signal::install_handlers()?;
        }

        info!(
            poll_timeout_ms = handle.config().poll_timeout_ms,
            max_invocations_per_tick = handle.config().max_invocations_per_tick,
            "EventLoop created"
        );
        Ok(event_loop)
    }

    /// Create the loop without any condition manager.
    ///
    /// Managed conditions of a kind nobody manages never change value.
    pub fn bare(config: EventLoopConfig) -> EventResult<Self> {
        config.validate().map_err(EventError::InvalidConfig)?;

        let claimed = LOOP_ACTIVE.with(|active| !active.replace(true));
        if !claimed {
            return Err(EventError::LoopAlreadyExists);
        }

        let handle = LoopHandle::from_core(LoopCore::new(config));
        handle.add_preparer(handle.triggers());
        Ok(Self { handle })
    }

    /// A handle for components that register conditions and actions.
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Run until a callback returns [`EventError::NormalTermination`].
    ///
    /// Normal termination yields `Ok(())`; any other error is returned as is.
    pub fn run(&self) -> EventResult<()> {
        let core = &self.handle.core;
        core.metrics.mark_start();
        info!("EventLoop: Entry");

        loop {
            match core.tick() {
                Ok(()) => {}
                Err(e) if e.is_normal_termination() => {
                    info!(
                        ticks = core.metrics.ticks.get(),
                        invocations = core.metrics.invocations.get(),
                        "EventLoop: normal termination"
                    );
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute exactly one tick.
    ///
    /// Unlike [`run`](Self::run), normal termination is returned as an error.
    pub fn run_once(&self) -> EventResult<()> {
        self.handle.core.tick()
    }
}

impl Deref for EventLoop {
    type Target = LoopHandle;

    fn deref(&self) -> &LoopHandle {
        &self.handle
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        let core = &self.handle.core;

        // Callbacks may own conditions, actions or handles; drop them with
        // no registry borrow held.
        let actions = core.registry.borrow_mut().actions.drain();
        drop(actions);
        let conditions = core.registry.borrow_mut().conditions.drain();
        drop(conditions);
        let preparers = std::mem::take(&mut *core.preparers.borrow_mut());
        drop(preparers);
        let managers = std::mem::take(&mut *core.managers.borrow_mut());
        drop(managers);
        core.triggers.clear();
        core.signals.clear();

        let _ = LOOP_ACTIVE.try_with(|active| active.set(false));
        debug!("EventLoop dropped");
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
#[path = "event_loop_tests.rs"]
mod tests;
