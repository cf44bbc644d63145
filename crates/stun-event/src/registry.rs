//! Generation-checked arenas holding every live condition and action.
//!
//! The loop owns the records; the rest of the program refers to them by
//! [`ConditionId`] / [`ActionId`]. A slot that is retired and reused gets a
//! new generation, so a stale id can never alias a newer record.

use std::collections::BTreeSet;
use std::fmt;

use slab::Slab;

use crate::condition::ConditionKind;
use crate::error::EventResult;

/// Index + generation pair into an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RawId {
    index: u32,
    generation: u32,
}

/// Reference to a condition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConditionId(pub(crate) RawId);

/// Reference to an action record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub(crate) RawId);

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}.{}", self.0.index, self.0.generation)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}.{}", self.0.index, self.0.generation)
    }
}

pub(crate) struct Arena<T> {
    entries: Slab<T>,
    generations: Vec<u32>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Slab::new(),
            generations: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> RawId {
        let index = self.entries.vacant_key();
        if index >= self.generations.len() {
            self.generations.resize(index + 1, 0);
        }
        self.entries.insert(value);

        RawId {
            index: index as u32,
            generation: self.generations[index],
        }
    }

    pub(crate) fn contains(&self, id: RawId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn get(&self, id: RawId) -> Option<&T> {
        let index = id.index as usize;
        if self.generations.get(index) != Some(&id.generation) {
            return None;
        }
        self.entries.get(index)
    }

    pub(crate) fn get_mut(&mut self, id: RawId) -> Option<&mut T> {
        let index = id.index as usize;
        if self.generations.get(index) != Some(&id.generation) {
            return None;
        }
        self.entries.get_mut(index)
    }

    pub(crate) fn remove(&mut self, id: RawId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        let index = id.index as usize;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.entries.try_remove(index)
    }

    /// Live entries in ascending slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (RawId, &T)> {
        self.entries.iter().map(|(index, value)| {
            (
                RawId {
                    index: index as u32,
                    generation: self.generations[index],
                },
                value,
            )
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Remove everything, retiring every id handed out so far.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        for (index, _) in self.entries.iter() {
            self.generations[index] = self.generations[index].wrapping_add(1);
        }
        self.entries.drain().collect()
    }
}

/// Value source of a computed condition.
pub(crate) type Expression = Box<dyn Fn() -> bool>;

pub(crate) struct ConditionRecord {
    pub(crate) kind: ConditionKind,
    pub(crate) value: bool,
    /// Set for computed conditions, which ignore `value`.
    pub(crate) expression: Option<Expression>,
}

impl ConditionRecord {
    pub(crate) fn new(kind: ConditionKind) -> Self {
        Self {
            kind,
            value: false,
            expression: None,
        }
    }

    pub(crate) fn computed(expression: Expression) -> Self {
        Self {
            kind: ConditionKind::Base,
            value: false,
            expression: Some(expression),
        }
    }

    pub(crate) fn value(&self) -> bool {
        match &self.expression {
            Some(expression) => expression(),
            None => self.value,
        }
    }
}

pub(crate) type Callback = Box<dyn FnMut() -> EventResult<()>>;

pub(crate) struct ActionRecord {
    pub(crate) label: &'static str,
    pub(crate) conditions: Vec<ConditionId>,
    pub(crate) callback: Option<Callback>,
    pub(crate) invoking: bool,
}

/// The live sets of conditions and actions.
pub(crate) struct Registry {
    pub(crate) conditions: Arena<ConditionRecord>,
    pub(crate) actions: Arena<ActionRecord>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            conditions: Arena::new(),
            actions: Arena::new(),
        }
    }

    /// Current value of a condition; retired conditions read as false.
    pub(crate) fn eval(&self, id: ConditionId) -> bool {
        self.conditions.get(id.0).is_some_and(ConditionRecord::value)
    }

    pub(crate) fn kind_of(&self, id: ConditionId) -> Option<ConditionKind> {
        self.conditions.get(id.0).map(|c| c.kind)
    }

    /// Store a value. Computed conditions keep deriving theirs.
    pub(crate) fn set(&mut self, id: ConditionId, value: bool) -> bool {
        match self.conditions.get_mut(id.0) {
            Some(record) if record.expression.is_none() => {
                record.value = value;
                true
            }
            _ => false,
        }
    }

    /// An action can run when every one of its conditions is live and true.
    pub(crate) fn can_invoke(&self, action: &ActionRecord) -> bool {
        action.conditions.iter().all(|id| self.eval(*id))
    }

    /// An action is dead once any condition it depends on has been retired.
    pub(crate) fn is_dead(&self, action: &ActionRecord) -> bool {
        action
            .conditions
            .iter()
            .any(|id| !self.conditions.contains(id.0))
    }

    pub(crate) fn conditions_of(&self, kind: ConditionKind) -> Vec<ConditionId> {
        self.conditions
            .iter()
            .filter(|(_, c)| c.kind == kind)
            .map(|(id, _)| ConditionId(id))
            .collect()
    }

    /// Conditions of `kind` that could unblock an otherwise eligible action.
    ///
    /// An action is eligible when all of its live `Base` conditions hold,
    /// computed ones included. Conditions of other managed kinds are
    /// ignored: they may still turn true during their own preparation in
    /// this tick.
    pub(crate) fn interesting(&self, kind: ConditionKind) -> Vec<ConditionId> {
        let mut interesting = BTreeSet::new();

        for (_, action) in self.actions.iter() {
            let eligible = action.conditions.iter().all(|id| {
                match self.conditions.get(id.0) {
                    Some(record) if record.kind == ConditionKind::Base => record.value(),
                    _ => true,
                }
            });
            if !eligible {
                continue;
            }

            for id in &action.conditions {
                if self.kind_of(*id) == Some(kind) {
                    interesting.insert(*id);
                }
            }
        }

        interesting.into_iter().collect()
    }

    /// Reset every managed condition so a manager pulse is consumed by one
    /// round of invocations.
    pub(crate) fn arm_managed(&mut self) {
        for (_, record) in self.conditions.entries.iter_mut() {
            if record.kind.is_managed() {
                record.value = false;
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
