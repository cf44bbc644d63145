//! Single-slot future values.

use crate::condition::Condition;
use crate::error::{EventError, EventResult};
use crate::handle::LoopHandle;
use crate::registry::ConditionId;

/// A value that becomes available later.
///
/// Gate the consumer on [`is_ready`](Self::is_ready). A promise can be
/// fulfilled again once its value has been consumed.
pub struct Promise<T> {
    is_ready: Condition,
    value: Option<T>,
}

impl<T> Promise<T> {
    pub fn new(handle: &LoopHandle) -> Self {
        Self {
            is_ready: Condition::new(handle),
            value: None,
        }
    }

    /// Holds between `fulfill` and `consume`.
    pub fn is_ready(&self) -> ConditionId {
        self.is_ready.id()
    }

    pub fn ready(&self) -> bool {
        self.is_ready.eval()
    }

    pub fn fulfill(&mut self, value: T) -> EventResult<()> {
        if self.value.is_some() {
            return Err(EventError::PromiseAlreadyFulfilled);
        }
        self.value = Some(value);
        self.is_ready.fire();
        Ok(())
    }

    pub fn consume(&mut self) -> EventResult<T> {
        let value = self.value.take().ok_or(EventError::PromiseNotReady)?;
        self.is_ready.arm();
        Ok(value)
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("ready", &self.value.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventLoop, EventLoopConfig};

    #[test]
    fn test_fulfill_then_consume() {
        let event_loop = EventLoop::bare(EventLoopConfig::default()).unwrap();
        let mut promise = Promise::new(&event_loop);
        assert!(!promise.ready());

        promise.fulfill(42).unwrap();
        assert!(promise.ready());
        assert!(event_loop.eval(promise.is_ready()));

        assert_eq!(promise.consume().unwrap(), 42);
        assert!(!promise.ready());
        assert!(matches!(promise.consume(), Err(EventError::PromiseNotReady)));
    }

    #[test]
    fn test_double_fulfill() {
        let event_loop = EventLoop::bare(EventLoopConfig::default()).unwrap();
        let mut promise = Promise::new(&event_loop);

        promise.fulfill("first").unwrap();
        assert!(matches!(
            promise.fulfill("second"),
            Err(EventError::PromiseAlreadyFulfilled)
        ));
        assert_eq!(promise.consume().unwrap(), "first");
    }

    #[test]
    fn test_reuse_after_consume() {
        let event_loop = EventLoop::bare(EventLoopConfig::default()).unwrap();
        let mut promise = Promise::new(&event_loop);

        promise.fulfill(1).unwrap();
        promise.consume().unwrap();
        promise.fulfill(2).unwrap();
        assert_eq!(promise.consume().unwrap(), 2);
    }

    #[test]
    fn test_consume_unfulfilled() {
        let event_loop = EventLoop::bare(EventLoopConfig::default()).unwrap();
        let mut promise: Promise<u8> = Promise::new(&event_loop);
        assert!(matches!(promise.consume(), Err(EventError::PromiseNotReady)));
    }
}
