//! Shared loop state and the handle threaded through every component.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::condition::ConditionKind;
use crate::config::EventLoopConfig;
use crate::error::{EventError, EventResult};
use crate::io::IoConditionManager;
use crate::manager::{ConditionManager, Preparer};
use crate::metrics::{LoopMetrics, MetricsSnapshot};
use crate::registry::{
    ActionId, ActionRecord, Callback, ConditionId, ConditionRecord, Expression, Registry,
};
use crate::signal::SignalConditionManager;
use crate::timer::TimerManager;
use crate::trigger::TriggerRegistry;

/// State owned by the one EventLoop.
pub(crate) struct LoopCore {
    pub(crate) registry: RefCell<Registry>,
    pub(crate) managers: RefCell<Vec<(ConditionKind, Rc<dyn ConditionManager>)>>,
    pub(crate) preparers: RefCell<Vec<Rc<dyn Preparer>>>,
    pub(crate) config: EventLoopConfig,
    pub(crate) metrics: LoopMetrics,
    /// Set when the last stabilization left runnable work behind.
    pub(crate) backlog: Cell<bool>,
    pub(crate) io: Rc<IoConditionManager>,
    pub(crate) timers: Rc<TimerManager>,
    pub(crate) signals: Rc<SignalConditionManager>,
    pub(crate) triggers: Rc<TriggerRegistry>,
}

impl LoopCore {
    pub(crate) fn new(config: EventLoopConfig) -> Rc<Self> {
        Rc::new_cyclic(|core: &Weak<LoopCore>| Self {
            registry: RefCell::new(Registry::new()),
            managers: RefCell::new(Vec::new()),
            preparers: RefCell::new(Vec::new()),
            config,
            metrics: LoopMetrics::new(),
            backlog: Cell::new(false),
            io: Rc::new(IoConditionManager::new(core.clone())),
            timers: Rc::new(TimerManager::new(core.clone())),
            signals: Rc::new(SignalConditionManager::new(core.clone())),
            triggers: Rc::new(TriggerRegistry::new()),
        })
    }

    pub(crate) fn new_condition(&self, kind: ConditionKind) -> ConditionId {
        let id = ConditionId(
            self.registry
                .borrow_mut()
                .conditions
                .insert(ConditionRecord::new(kind)),
        );
        trace!(condition = %id, %kind, "Condition added");
        id
    }

    pub(crate) fn new_computed(&self, expression: Expression) -> ConditionId {
        let id = ConditionId(
            self.registry
                .borrow_mut()
                .conditions
                .insert(ConditionRecord::computed(expression)),
        );
        trace!(condition = %id, "Computed condition added");
        id
    }

    pub(crate) fn retire_condition(&self, id: ConditionId) {
        let removed = self.registry.borrow_mut().conditions.remove(id.0);
        if removed.is_some() {
            trace!(condition = %id, "Condition removed");
        }
    }

    pub(crate) fn set_value(&self, id: ConditionId, value: bool) {
        self.registry.borrow_mut().set(id, value);
    }

    pub(crate) fn eval(&self, id: ConditionId) -> bool {
        self.registry.borrow().eval(id)
    }

    pub(crate) fn new_action(&self, label: &'static str, conditions: &[ConditionId]) -> ActionId {
        let id = ActionId(self.registry.borrow_mut().actions.insert(ActionRecord {
            label,
            conditions: conditions.to_vec(),
            callback: None,
            invoking: false,
        }));
        debug!(action = label, id = %id, "Action added");
        id
    }

    pub(crate) fn set_callback(&self, id: ActionId, callback: Callback) {
        let previous = {
            let mut registry = self.registry.borrow_mut();
            match registry.actions.get_mut(id.0) {
                Some(record) => record.callback.replace(callback),
                None => Some(callback),
            }
        };
        // Dropped outside the borrow: closures may own conditions.
        drop(previous);
    }

    pub(crate) fn retire_action(&self, id: ActionId) {
        let removed = self.registry.borrow_mut().actions.remove(id.0);
        if let Some(record) = removed {
            debug!(action = record.label, id = %id, "Action removed");
        }
    }

    pub(crate) fn can_invoke(&self, id: ActionId) -> bool {
        let registry = self.registry.borrow();
        registry
            .actions
            .get(id.0)
            .is_some_and(|record| registry.can_invoke(record))
    }

    pub(crate) fn is_action_dead(&self, id: ActionId) -> bool {
        let registry = self.registry.borrow();
        match registry.actions.get(id.0) {
            Some(record) => registry.is_dead(record),
            None => true,
        }
    }

    /// Run an action's callback.
    ///
    /// The callback is taken out of the record for the duration of the call,
    /// so the callback may freely retire its own action, create new ones, or
    /// replace its callback.
    pub(crate) fn invoke_action(&self, id: ActionId) -> EventResult<()> {
        let (label, callback) = {
            let mut registry = self.registry.borrow_mut();
            let Some(record) = registry.actions.get_mut(id.0) else {
                return Ok(());
            };
            if record.invoking {
                return Err(EventError::ReentrantInvoke {
                    action: record.label.to_string(),
                });
            }
            record.invoking = true;
            (record.label, record.callback.take())
        };

        let Some(mut callback) = callback else {
            if let Some(record) = self.registry.borrow_mut().actions.get_mut(id.0) {
                record.invoking = false;
            }
            return Err(EventError::MissingCallback {
                action: label.to_string(),
            });
        };

        trace!(action = label, "Invoking");
        let result = callback();
        self.metrics.record_invocation();

        let leftover = {
            let mut registry = self.registry.borrow_mut();
            match registry.actions.get_mut(id.0) {
                Some(record) => {
                    record.invoking = false;
                    if record.callback.is_none() {
                        record.callback = Some(callback);
                        None
                    } else {
                        Some(callback)
                    }
                }
                None => Some(callback),
            }
        };
        drop(leftover);

        result
    }
}

/// Handle to the running EventLoop.
///
/// Cheap to clone. Components receive a handle explicitly at construction
/// and use it to register their conditions and actions.
#[derive(Clone)]
pub struct LoopHandle {
    pub(crate) core: Rc<LoopCore>,
}

impl LoopHandle {
    pub(crate) fn from_core(core: Rc<LoopCore>) -> Self {
        Self { core }
    }

    pub(crate) fn downgrade(&self) -> Weak<LoopCore> {
        Rc::downgrade(&self.core)
    }

    /// Current value of any condition. Retired conditions read as false.
    pub fn eval(&self, id: ConditionId) -> bool {
        self.core.eval(id)
    }

    /// Kind of a live condition.
    pub fn kind_of(&self, id: ConditionId) -> Option<ConditionKind> {
        self.core.registry.borrow().kind_of(id)
    }

    /// Whether the condition has not been retired.
    pub fn is_live(&self, id: ConditionId) -> bool {
        self.core.registry.borrow().conditions.contains(id.0)
    }

    /// Whether every condition of the action currently holds.
    pub fn can_invoke(&self, id: ActionId) -> bool {
        self.core.can_invoke(id)
    }

    /// Number of live conditions.
    pub fn condition_count(&self) -> usize {
        self.core.registry.borrow().conditions.len()
    }

    /// Number of live actions.
    pub fn action_count(&self) -> usize {
        self.core.registry.borrow().actions.len()
    }

    /// Register the manager responsible for one managed kind.
    ///
    /// Managers are prepared in registration order at the start of every tick.
    pub fn add_condition_manager(
        &self,
        kind: ConditionKind,
        manager: Rc<dyn ConditionManager>,
    ) -> EventResult<()> {
        if !kind.is_managed() {
            return Err(EventError::UnmanagedKind(kind));
        }

        let mut managers = self.core.managers.borrow_mut();
        if managers.iter().any(|(existing, _)| *existing == kind) {
            return Err(EventError::DuplicateManager(kind));
        }
        managers.push((kind, manager));
        debug!(%kind, "Condition manager registered");
        Ok(())
    }

    /// Register a hook that runs at the start of every tick.
    pub fn add_preparer(&self, preparer: Rc<dyn Preparer>) {
        self.core.preparers.borrow_mut().push(preparer);
    }

    /// The descriptor readiness manager.
    pub fn io(&self) -> Rc<IoConditionManager> {
        self.core.io.clone()
    }

    /// The deadline manager.
    pub fn timers(&self) -> Rc<TimerManager> {
        self.core.timers.clone()
    }

    /// The termination signal manager.
    pub fn signals(&self) -> Rc<SignalConditionManager> {
        self.core.signals.clone()
    }

    pub(crate) fn triggers(&self) -> Rc<TriggerRegistry> {
        self.core.triggers.clone()
    }

    /// Loop configuration.
    pub fn config(&self) -> &EventLoopConfig {
        &self.core.config
    }

    /// Snapshot of the loop counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("conditions", &self.condition_count())
            .field("actions", &self.action_count())
            .finish()
    }
}
