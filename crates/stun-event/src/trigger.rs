//! Fire-and-forget one-shot actions.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::action::Action;
use crate::error::EventResult;
use crate::handle::LoopHandle;
use crate::manager::Preparer;
use crate::registry::{ActionId, ConditionId};
use crate::timer::Timer;

struct TriggerEntry {
    action: Action,
    // Keeps the deadline of `perform_in` alive.
    _timer: Option<Timer>,
}

/// The loop's live triggers.
pub(crate) struct TriggerRegistry {
    entries: RefCell<BTreeMap<ActionId, TriggerEntry>>,
}

impl TriggerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
        }
    }

    fn insert(&self, id: ActionId, entry: TriggerEntry) {
        self.entries.borrow_mut().insert(id, entry);
    }

    fn remove(&self, id: ActionId) {
        let entry = self.entries.borrow_mut().remove(&id);
        drop(entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub(crate) fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        drop(entries);
    }
}

impl Preparer for TriggerRegistry {
    /// Forget triggers whose conditions were retired; they can never fire.
    fn prepare(&self) {
        let dead: Vec<ActionId> = self
            .entries
            .borrow()
            .iter()
            .filter(|(_, entry)| entry.action.is_dead())
            .map(|(id, _)| *id)
            .collect();

        for id in dead {
            debug!(id = %id, "Dropping dead trigger");
            self.remove(id);
        }
    }
}

/// One-shot actions owned by the loop.
///
/// A trigger runs its callback once, the first time its conditions all hold,
/// and then retires itself. The caller keeps nothing.
pub struct Trigger;

impl Trigger {
    /// Run `callback` once every condition in `conditions` holds.
    pub fn arm<F>(handle: &LoopHandle, label: &'static str, conditions: &[ConditionId], callback: F)
    where
        F: FnOnce() -> EventResult<()> + 'static,
    {
        Self::register(handle, label, conditions, None, callback);
    }

    /// Run `callback` the next time the loop scans its actions.
    pub fn perform<F>(handle: &LoopHandle, label: &'static str, callback: F)
    where
        F: FnOnce() -> EventResult<()> + 'static,
    {
        Self::register(handle, label, &[], None, callback);
    }

    /// Run `callback` once `delay` has passed.
    pub fn perform_in<F>(
        handle: &LoopHandle,
        label: &'static str,
        delay: Duration,
        callback: F,
    ) -> EventResult<()>
    where
        F: FnOnce() -> EventResult<()> + 'static,
    {
        let timer = Timer::with_timeout(handle, delay)?;
        let conditions = [timer.did_fire()];
        Self::register(handle, label, &conditions, Some(timer), callback);
        Ok(())
    }

    /// Number of triggers that have not fired yet.
    pub fn pending(handle: &LoopHandle) -> usize {
        handle.triggers().len()
    }

    fn register<F>(
        handle: &LoopHandle,
        label: &'static str,
        conditions: &[ConditionId],
        timer: Option<Timer>,
        callback: F,
    ) where
        F: FnOnce() -> EventResult<()> + 'static,
    {
        let registry = handle.triggers();
        let action = Action::new(handle, label, conditions);
        let id = action.id();

        let weak = Rc::downgrade(&registry);
        let mut callback = Some(callback);
        action.set_callback(move || {
            // Retire before running, so the callback may arm new triggers.
            if let Some(registry) = weak.upgrade() {
                registry.remove(id);
            }
            match callback.take() {
                Some(callback) => callback(),
                None => Ok(()),
            }
        });

        registry.insert(
            id,
            TriggerEntry {
                action,
                _timer: timer,
            },
        );
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
