//! Bounded queue with push/pop readiness conditions.

use std::collections::VecDeque;

use crate::condition::Condition;
use crate::error::{EventError, EventResult};
use crate::handle::LoopHandle;
use crate::registry::ConditionId;

/// A bounded FIFO queue.
///
/// Producers gate their actions on [`can_push`](Self::can_push) and
/// consumers on [`can_pop`](Self::can_pop); the queue itself never blocks.
/// Pushing into a full queue or popping an empty one is a protocol error.
pub struct Fifo<T> {
    capacity: usize,
    queue: VecDeque<T>,
    can_push: Condition,
    can_pop: Condition,
}

impl<T> Fifo<T> {
    pub fn new(handle: &LoopHandle, capacity: usize) -> Self {
        let fifo = Self {
            capacity,
            queue: VecDeque::with_capacity(capacity),
            can_push: Condition::new(handle),
            can_pop: Condition::new(handle),
        };
        fifo.update_conditions();
        fifo
    }

    /// Holds while the queue has room.
    pub fn can_push(&self) -> ConditionId {
        self.can_push.id()
    }

    /// Holds while the queue is not empty.
    pub fn can_pop(&self) -> ConditionId {
        self.can_pop.id()
    }

    pub fn push(&mut self, element: T) -> EventResult<()> {
        if self.is_full() {
            return Err(EventError::FifoFull {
                capacity: self.capacity,
            });
        }
        self.queue.push_back(element);
        self.update_conditions();
        Ok(())
    }

    pub fn pop(&mut self) -> EventResult<T> {
        let element = self.queue.pop_front().ok_or(EventError::FifoEmpty)?;
        self.update_conditions();
        Ok(element)
    }

    /// The oldest element, left in place.
    pub fn front(&self) -> EventResult<&T> {
        self.queue.front().ok_or(EventError::FifoEmpty)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn update_conditions(&self) {
        self.can_push.set(!self.is_full());
        self.can_pop.set(!self.is_empty());
    }
}

impl<T> std::fmt::Debug for Fifo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fifo")
            .field("len", &self.queue.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
