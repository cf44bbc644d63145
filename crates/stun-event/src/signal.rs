//! Termination signal conditions.
//!
//! The OS handlers only store into per-signal atomic flags. The flags are
//! consumed while the signal manager is prepared, on the loop thread: every
//! subscription of a raised kind pulses, and a terminator action is built
//! over the subscribers' pending conditions. Once they all hold, the
//! terminator ends [`EventLoop::run`](crate::EventLoop::run) with
//! [`EventError::NormalTermination`].
//!
//! The terminator never runs while a `fired` pulse it was built for is
//! still up. Cleanup actions gated on `fired` therefore run first even when
//! their pending condition already holds at delivery, whatever their slot
//! order relative to the terminator.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{debug, info};

use crate::action::Action;
use crate::condition::{Condition, ConditionKind};
use crate::error::{EventError, EventResult};
use crate::handle::{LoopCore, LoopHandle};
use crate::manager::{ConditionManager, PrepareContext};
use crate::registry::ConditionId;

static INTERRUPT_PENDING: AtomicBool = AtomicBool::new(false);
static TERMINATE_PENDING: AtomicBool = AtomicBool::new(false);

/// Process termination requests the manager reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// SIGINT.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl SignalKind {
    pub const ALL: [SignalKind; 2] = [SignalKind::Interrupt, SignalKind::Terminate];

    pub fn signal(self) -> Signal {
        match self {
            SignalKind::Interrupt => Signal::SIGINT,
            SignalKind::Terminate => Signal::SIGTERM,
        }
    }

    fn flag(self) -> &'static AtomicBool {
        match self {
            SignalKind::Interrupt => &INTERRUPT_PENDING,
            SignalKind::Terminate => &TERMINATE_PENDING,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Terminate => write!(f, "SIGTERM"),
        }
    }
}

extern "C" fn on_termination(signum: libc::c_int) {
    if signum == libc::SIGINT {
        INTERRUPT_PENDING.store(true, Ordering::SeqCst);
    } else if signum == libc::SIGTERM {
        TERMINATE_PENDING.store(true, Ordering::SeqCst);
    }
}

/// Install the SIGINT and SIGTERM handlers.
pub(crate) fn install_handlers() -> EventResult<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_termination),
        SaFlags::empty(),
        SigSet::empty(),
    );

    for kind in SignalKind::ALL {
        // SAFETY: the handler only stores into atomics.
        unsafe { sigaction(kind.signal(), &action) }
            .map_err(|e| EventError::SignalSetup(format!("{}: {}", kind, e)))?;
    }

    info!("OS signal handlers installed (SIGINT, SIGTERM)");
    Ok(())
}

struct Subscription {
    kind: SignalKind,
    fired: Condition,
    pending: ConditionId,
}

#[derive(Default)]
struct SignalState {
    subscriptions: BTreeMap<u64, Subscription>,
    next_key: u64,
    terminator: Option<Action>,
}

/// Manager of `Signal` conditions.
pub struct SignalConditionManager {
    core: Weak<LoopCore>,
    state: RefCell<SignalState>,
}

impl SignalConditionManager {
    pub(crate) fn new(core: Weak<LoopCore>) -> Self {
        Self {
            core,
            state: RefCell::new(SignalState::default()),
        }
    }

    /// Subscribe to `kind`.
    ///
    /// The subscription's [`fired`](SignalSubscription::fired) condition
    /// pulses for one tick when the signal arrives. The loop then terminates
    /// as soon as `pending` (and the pending condition of every other
    /// subscriber of that signal) holds and the pulse is over, so cleanup
    /// actions gated on `fired` get to run first. `pending` should start
    /// false and be fired by the cleanup.
    pub fn subscribe(
        self: &Rc<Self>,
        kind: SignalKind,
        pending: ConditionId,
    ) -> EventResult<SignalSubscription> {
        let core = self.core.upgrade().ok_or(EventError::LoopGone)?;
        let fired = Condition::managed(&LoopHandle::from_core(core), ConditionKind::Signal);
        let fired_id = fired.id();

        let mut state = self.state.borrow_mut();
        let key = state.next_key;
        state.next_key += 1;
        state.subscriptions.insert(
            key,
            Subscription {
                kind,
                fired,
                pending,
            },
        );
        debug!(signal = %kind, pending = %pending, "Signal subscription added");

        Ok(SignalSubscription {
            key,
            kind,
            fired: fired_id,
            manager: Rc::downgrade(self),
        })
    }

    /// Subscribe to SIGINT.
    pub fn on_interrupt(self: &Rc<Self>, pending: ConditionId) -> EventResult<SignalSubscription> {
        self.subscribe(SignalKind::Interrupt, pending)
    }

    /// Act as if `kind` had just been delivered.
    pub fn raise_pending(&self, kind: SignalKind) {
        kind.flag().store(true, Ordering::SeqCst);
    }

    /// Number of live subscriptions.
    pub fn subscriptions(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    /// Whether a terminator action has been built.
    pub fn terminating(&self) -> bool {
        self.state.borrow().terminator.is_some()
    }

    fn unsubscribe(&self, key: u64) {
        let removed = self.state.borrow_mut().subscriptions.remove(&key);
        drop(removed);
    }

    /// Drop every subscription and the terminator.
    pub(crate) fn clear(&self) {
        let (subscriptions, terminator) = {
            let mut state = self.state.borrow_mut();
            (
                std::mem::take(&mut state.subscriptions),
                state.terminator.take(),
            )
        };
        drop(subscriptions);
        drop(terminator);
    }
}

impl ConditionManager for SignalConditionManager {
    fn prepare_conditions(&self, _cx: &PrepareContext<'_>) -> EventResult<()> {
        {
            let state = self.state.borrow();
            for subscription in state.subscriptions.values() {
                subscription.fired.arm();
            }
        }

        let raised: Vec<SignalKind> = SignalKind::ALL
            .into_iter()
            .filter(|kind| kind.flag().swap(false, Ordering::SeqCst))
            .collect();
        if raised.is_empty() {
            return Ok(());
        }

        let Some(core) = self.core.upgrade() else {
            return Ok(());
        };
        for kind in &raised {
            info!(signal = %kind, "Termination signal received");
            core.metrics.record_signal();
        }

        let (mut pending, pulses): (Vec<ConditionId>, Vec<ConditionId>) = {
            let state = self.state.borrow();
            state
                .subscriptions
                .values()
                .filter(|subscription| raised.contains(&subscription.kind))
                .map(|subscription| {
                    subscription.fired.fire();
                    (subscription.pending, subscription.fired.id())
                })
                .unzip()
        };
        pending.sort();
        pending.dedup();

        let weak = Rc::downgrade(&core);
        let terminator = Action::with_callback(
            &LoopHandle::from_core(core),
            "signal-terminator",
            &pending,
            move || {
                let pulsing = weak
                    .upgrade()
                    .is_some_and(|core| pulses.iter().any(|&id| core.eval(id)));
                if pulsing {
                    return Ok(());
                }
                Err(EventError::NormalTermination)
            },
        );
        let previous = self.state.borrow_mut().terminator.replace(terminator);
        drop(previous);

        Ok(())
    }
}

/// A subscription to one termination signal. Dropping it unsubscribes.
pub struct SignalSubscription {
    key: u64,
    kind: SignalKind,
    fired: ConditionId,
    manager: Weak<SignalConditionManager>,
}

impl SignalSubscription {
    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Pulses for one tick when the signal arrives.
    pub fn fired(&self) -> ConditionId {
        self.fired
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.unsubscribe(self.key);
        }
    }
}

impl fmt::Debug for SignalSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSubscription")
            .field("kind", &self.kind)
            .field("fired", &self.fired)
            .finish()
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
