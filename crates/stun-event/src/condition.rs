//! Boolean conditions that gate actions.

use std::fmt;
use std::rc::Weak;

use serde::{Deserialize, Serialize};

use crate::handle::{LoopCore, LoopHandle};
use crate::registry::ConditionId;

/// Category of a condition.
///
/// `Base` conditions are set directly by whoever owns them. Every other kind
/// is owned and recomputed by the condition manager registered for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Base,
    Io,
    Timer,
    Signal,
}

impl ConditionKind {
    /// Whether conditions of this kind belong to a condition manager.
    pub fn is_managed(&self) -> bool {
        !matches!(self, ConditionKind::Base)
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConditionKind::Base => "base",
            ConditionKind::Io => "io",
            ConditionKind::Timer => "timer",
            ConditionKind::Signal => "signal",
        };
        f.write_str(name)
    }
}

/// An owned condition record.
///
/// Only the owner can change the value; everybody else reads it through
/// [`LoopHandle::eval`] with the [`ConditionId`]. Dropping the guard retires
/// the record, after which every action depending on it is dead.
pub struct Condition {
    id: ConditionId,
    kind: ConditionKind,
    core: Weak<LoopCore>,
}

impl Condition {
    /// Create a `Base` condition, initially false.
    pub fn new(handle: &LoopHandle) -> Self {
        Self::managed(handle, ConditionKind::Base)
    }

    /// Create a condition of any kind, initially false.
    ///
    /// Meant for condition managers, which keep the guards of their own kind.
    pub fn managed(handle: &LoopHandle, kind: ConditionKind) -> Self {
        let id = handle.core.new_condition(kind);
        Self {
            id,
            kind,
            core: handle.downgrade(),
        }
    }

    pub fn id(&self) -> ConditionId {
        self.id
    }

    pub fn kind(&self) -> ConditionKind {
        self.kind
    }

    /// Set to true.
    pub fn fire(&self) {
        self.set(true);
    }

    /// Set to false.
    pub fn arm(&self) {
        self.set(false);
    }

    pub fn set(&self, value: bool) {
        if let Some(core) = self.core.upgrade() {
            core.set_value(self.id, value);
        }
    }

    pub fn eval(&self) -> bool {
        self.core
            .upgrade()
            .is_some_and(|core| core.eval(self.id))
    }
}

impl Drop for Condition {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.retire_condition(self.id);
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("value", &self.eval())
            .finish()
    }
}

/// A condition whose value is computed by a closure on every read.
///
/// It takes part in scheduling like a `Base` condition. The expression runs
/// while the loop reads its registry: it may read other conditions but must
/// not change any.
pub struct ComputedCondition {
    id: ConditionId,
    core: Weak<LoopCore>,
}

impl ComputedCondition {
    pub fn new<F>(handle: &LoopHandle, expression: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        Self {
            id: handle.core.new_computed(Box::new(expression)),
            core: handle.downgrade(),
        }
    }

    pub fn id(&self) -> ConditionId {
        self.id
    }

    pub fn eval(&self) -> bool {
        self.core
            .upgrade()
            .is_some_and(|core| core.eval(self.id))
    }
}

impl Drop for ComputedCondition {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.retire_condition(self.id);
        }
    }
}

impl fmt::Debug for ComputedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedCondition")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
