//! Extension points run by the loop at the start of every tick.

use std::time::Duration;

use crate::condition::ConditionKind;
use crate::error::EventResult;
use crate::registry::ConditionId;

/// What the loop hands a manager when preparing its kind.
#[derive(Debug, Clone)]
pub struct PrepareContext<'a> {
    /// Kind being prepared.
    pub kind: ConditionKind,
    /// Every live condition of this kind, in id order.
    pub conditions: &'a [ConditionId],
    /// Subset that could unblock an otherwise eligible action.
    pub interesting: &'a [ConditionId],
    /// How long the manager may block this tick. Zero when runnable work
    /// was left over from the previous tick.
    pub wait: Duration,
}

/// Recomputes the values of every condition of one managed kind.
///
/// A manager owns the [`Condition`](crate::Condition) guards of its kind, so
/// it is the only party that can change their values. The loop arms every
/// managed condition at the end of each tick; a manager that fires a
/// condition produces a pulse seen by every action of that tick.
///
/// Managers must not block longer than `cx.wait`.
pub trait ConditionManager {
    /// Bring the conditions of `cx.kind` up to date.
    fn prepare_conditions(&self, cx: &PrepareContext<'_>) -> EventResult<()>;
}

/// Hook run at the start of every tick, before any manager.
pub trait Preparer {
    fn prepare(&self);
}
