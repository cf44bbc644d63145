//! Error types for the event loop.

use thiserror::Error;

use crate::condition::ConditionKind;

/// Errors that can occur in the event loop.
///
/// Most variants are contract violations: they mean a collaborator broke
/// the protocol it agreed to (pushing into a full FIFO, closing a descriptor
/// that still has I/O conditions, ...). They are propagated with `?` all the
/// way out of [`EventLoop::run`](crate::EventLoop::run) and are not meant to
/// be recovered from.
#[derive(Debug, Error)]
pub enum EventError {
    /// Another EventLoop is alive on this thread.
    #[error("Only one EventLoop may exist per thread")]
    LoopAlreadyExists,

    /// The loop configuration failed validation.
    #[error("Invalid event loop configuration: {0}")]
    InvalidConfig(String),

    /// The EventLoop backing a handle has been torn down.
    #[error("EventLoop is gone")]
    LoopGone,

    /// An action was invoked without a callback.
    #[error("Invoking action '{action}' without a callback")]
    MissingCallback { action: String },

    /// An action was invoked from inside its own callback.
    #[error("Action '{action}' invoked re-entrantly")]
    ReentrantInvoke { action: String },

    /// Promise fulfilled twice without an intervening consume.
    #[error("Double-fulfilled Promise")]
    PromiseAlreadyFulfilled,

    /// Promise consumed while not ready.
    #[error("Attempt to consume an unfulfilled or already consumed Promise")]
    PromiseNotReady,

    /// Push into a full FIFO.
    #[error("Trying to push into a full FIFO (capacity {capacity})")]
    FifoFull { capacity: usize },

    /// Pop or peek on an empty FIFO.
    #[error("Trying to take from an empty FIFO")]
    FifoEmpty,

    /// A descriptor was closed while I/O conditions were still registered.
    #[error(
        "Invalid file descriptor {fd}: release its I/O conditions before closing it"
    )]
    InvalidDescriptor { fd: i32 },

    /// A second manager registered for the same condition kind.
    #[error("A condition manager is already registered for {0} conditions")]
    DuplicateManager(ConditionKind),

    /// Base conditions are never managed.
    #[error("{0} conditions cannot have a condition manager")]
    UnmanagedKind(ConditionKind),

    /// poll() failed for a reason other than interruption.
    #[error("Error encountered while polling: {0}")]
    Poll(nix::errno::Errno),

    /// The OS timer could not be programmed.
    #[error("Failed to set up timer: {0}")]
    TimerSetup(String),

    /// Signal handlers could not be installed.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Normal termination requested (e.g. by SIGINT). Not a failure:
    /// [`EventLoop::run`](crate::EventLoop::run) turns it into `Ok(())`.
    #[error("Normal termination")]
    NormalTermination,
}

impl EventError {
    /// Whether this is the sanctioned shutdown signal rather than a failure.
    pub fn is_normal_termination(&self) -> bool {
        matches!(self, EventError::NormalTermination)
    }
}

/// Result type for event loop operations.
pub type EventResult<T> = Result<T, EventError>;
