//! One tick of the EventLoop.
//!
//! 1. Purge actions that depend on retired conditions.
//! 2. Run the preparers.
//! 3. Prepare every managed kind, in manager registration order, passing
//!    the conditions that could unblock an eligible action.
//! 4. Stabilize in rounds. A round collects the ready actions in id order
//!    and invokes each one that is still ready when its turn comes, then
//!    arms every managed condition. Rounds repeat until none is ready or
//!    the invocation ceiling is reached.
//! 5. Arm managed conditions once more, so a pulse never outlives the tick
//!    even when stabilization failed.

use std::time::Duration;

use tracing::{trace, warn};

use crate::error::EventResult;
use crate::handle::LoopCore;
use crate::manager::PrepareContext;
use crate::registry::ActionId;

impl LoopCore {
    pub(crate) fn tick(&self) -> EventResult<()> {
        self.metrics.record_tick();

        self.purge_dead_actions();
        self.run_preparers();

        let result = self.prepare_managed().and_then(|()| self.stabilize());
        self.registry.borrow_mut().arm_managed();

        let capped = result?;
        self.backlog.set(capped);
        Ok(())
    }

    fn purge_dead_actions(&self) {
        let dead: Vec<(ActionId, &'static str)> = {
            let registry = self.registry.borrow();
            registry
                .actions
                .iter()
                .filter(|(_, action)| !action.invoking && registry.is_dead(action))
                .map(|(id, action)| (ActionId(id), action.label))
                .collect()
        };

        for (id, label) in dead {
            warn!(action = label, id = %id, "Purging action that depends on a retired condition");
            let record = self.registry.borrow_mut().actions.remove(id.0);
            drop(record);
            self.metrics.record_purged_action();
        }
    }

    fn run_preparers(&self) {
        let preparers = self.preparers.borrow().clone();
        for preparer in preparers {
            preparer.prepare();
        }
    }

    fn prepare_managed(&self) -> EventResult<()> {
        let wait = if self.backlog.get() {
            Duration::ZERO
        } else {
            self.config.poll_timeout()
        };

        let managers = self.managers.borrow().clone();
        for (kind, manager) in managers {
            let (conditions, interesting) = {
                let registry = self.registry.borrow();
                (registry.conditions_of(kind), registry.interesting(kind))
            };
            trace!(
                %kind,
                conditions = conditions.len(),
                interesting = interesting.len(),
                "Preparing conditions"
            );

            manager.prepare_conditions(&PrepareContext {
                kind,
                conditions: &conditions,
                interesting: &interesting,
                wait,
            })?;
        }
        Ok(())
    }

    /// Returns whether the ceiling cut the tick short.
    fn stabilize(&self) -> EventResult<bool> {
        let limit = self.config.max_invocations_per_tick;
        let mut invocations = 0usize;

        loop {
            let ready: Vec<ActionId> = {
                let registry = self.registry.borrow();
                registry
                    .actions
                    .iter()
                    .filter(|(_, action)| !action.invoking && registry.can_invoke(action))
                    .map(|(id, _)| ActionId(id))
                    .collect()
            };
            if ready.is_empty() {
                return Ok(false);
            }

            for id in ready {
                if !self.still_ready(id) {
                    continue;
                }
                if invocations >= limit {
                    warn!(limit, "Invocation ceiling reached, deferring to next tick");
                    self.metrics.record_capped_tick();
                    return Ok(true);
                }
                invocations += 1;
                self.invoke_action(id)?;
            }

            self.registry.borrow_mut().arm_managed();
        }
    }

    fn still_ready(&self, id: ActionId) -> bool {
        let registry = self.registry.borrow();
        registry
            .actions
            .get(id.0)
            .is_some_and(|action| !action.invoking && registry.can_invoke(action))
    }
}
