//! # stun-event
//!
//! Reactive scheduling core of the stun tunnel.
//!
//! Work is expressed as [`Action`]s gated on boolean [`Condition`]s. The
//! [`EventLoop`] never blocks on anything but one bounded I/O wait: each tick
//! it asks every [`ConditionManager`] to bring its kind of condition up to
//! date, then runs whatever has become runnable until nothing else can run.
//!
//! ## Tick
//!
//! ```text
//! ┌──────────────────────────── tick ────────────────────────────┐
//! │ purge dead actions ─► preparers (triggers)                    │
//! │   ─► TimerManager ─► SignalConditionManager ─► IoConditionMgr │
//! │        (due deadlines)   (pending flags)      (poll ≤ wait)   │
//! │   ─► stabilize: rounds of ready actions in id order,          │
//! │        arming io/timer/signal conditions after each round     │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`EventLoop`] / [`LoopHandle`]: the scheduler and the handle threaded
//!   into every component
//! - [`Condition`] / [`ComputedCondition`] / [`Action`]: owned guards over
//!   loop records
//! - [`IoConditionManager`], [`TimerManager`], [`SignalConditionManager`]:
//!   built-in managers
//! - [`Fifo`], [`Promise`], [`Timer`], [`Trigger`]: building blocks made of
//!   conditions and actions
//!
//! ## Example
//!
//! ```rust,no_run
//! use stun_event::{Action, Condition, EventLoop, EventLoopConfig};
//!
//! let event_loop = EventLoop::new(EventLoopConfig::default()).unwrap();
//! let done = Condition::new(&event_loop);
//! let shutdown = event_loop.signals().on_interrupt(done.id()).unwrap();
//!
//! let cleanup = Action::new(&event_loop, "cleanup", &[shutdown.fired()]);
//! cleanup.set_callback(move || {
//!     done.fire();
//!     Ok(())
//! });
//!
//! // Returns once SIGINT arrived and the cleanup ran.
//! event_loop.run().unwrap();
//! ```

pub mod action;
pub mod condition;
pub mod config;
pub mod error;
pub mod event_loop;
mod event_loop_tick;
pub mod fifo;
mod handle;
pub mod io;
pub mod manager;
pub mod metrics;
pub mod promise;
mod registry;
pub mod signal;
pub mod timer;
pub mod trigger;

// Re-exports
pub use action::Action;
pub use condition::{ComputedCondition, Condition, ConditionKind};
pub use config::EventLoopConfig;
pub use error::{EventError, EventResult};
pub use event_loop::EventLoop;
pub use fifo::Fifo;
pub use handle::LoopHandle;
pub use io::{Interest, IoConditionManager};
pub use manager::{ConditionManager, PrepareContext, Preparer};
pub use metrics::{LoopMetrics, MetricsSnapshot};
pub use promise::Promise;
pub use registry::{ActionId, ConditionId};
pub use signal::{SignalConditionManager, SignalKind, SignalSubscription};
pub use timer::{Timer, TimerManager};
pub use trigger::Trigger;
