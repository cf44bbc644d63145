//! Actions: callbacks gated on a set of conditions.

use std::fmt;
use std::rc::Weak;

use crate::error::{EventError, EventResult};
use crate::handle::{LoopCore, LoopHandle};
use crate::registry::{ActionId, ConditionId};

/// An owned action record.
///
/// The action is invokable when every condition in its set holds; an empty
/// set is always invokable. The loop keeps invoking it while that is true,
/// so a callback arms one of its own conditions once its work is done.
/// Dropping the guard retires the action, including from inside its own
/// callback.
pub struct Action {
    id: ActionId,
    label: &'static str,
    core: Weak<LoopCore>,
}

impl Action {
    /// Register an action over `conditions`. It has no callback until
    /// [`set_callback`](Self::set_callback) is called.
    pub fn new(handle: &LoopHandle, label: &'static str, conditions: &[ConditionId]) -> Self {
        let id = handle.core.new_action(label, conditions);
        Self {
            id,
            label,
            core: handle.downgrade(),
        }
    }

    /// Register an action and set its callback in one go.
    pub fn with_callback<F>(
        handle: &LoopHandle,
        label: &'static str,
        conditions: &[ConditionId],
        callback: F,
    ) -> Self
    where
        F: FnMut() -> EventResult<()> + 'static,
    {
        let action = Self::new(handle, label, conditions);
        action.set_callback(callback);
        action
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Replace the callback.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: FnMut() -> EventResult<()> + 'static,
    {
        if let Some(core) = self.core.upgrade() {
            core.set_callback(self.id, Box::new(callback));
        }
    }

    /// Whether every condition currently holds.
    pub fn can_invoke(&self) -> bool {
        self.core
            .upgrade()
            .is_some_and(|core| core.can_invoke(self.id))
    }

    /// Whether any condition this action depends on has been retired.
    pub fn is_dead(&self) -> bool {
        self.core
            .upgrade()
            .is_none_or(|core| core.is_action_dead(self.id))
    }

    /// Run the callback now, regardless of the conditions.
    pub fn invoke(&self) -> EventResult<()> {
        let core = self.core.upgrade().ok_or(EventError::LoopGone)?;
        core.invoke_action(self.id)
    }
}

impl Drop for Action {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.retire_action(self.id);
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
