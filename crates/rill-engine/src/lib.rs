//! Rill Engine
//!
//! Turns callback-based platform APIs into composable push-streams and
//! abstracts where code runs behind one scheduler interface:
//! - **Streams**: the subscribe / values / terminal protocol (`stream` module)
//! - **Shared activations**: publish + ref-count and replay-last channels (`shared` module)
//! - **Bridges**: async operations and event sources to streams (`bridge` module)
//! - **Schedulers**: serialized-queue and thread-pool backends (`scheduler` module)
//! - **Hosts**: an in-process event loop and worker pool (`runtime` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use rill_engine::{start_async_with_progress, EventLoop, Notification};
//! use rill_sdk::CompletionSource;
//!
//! let ui = EventLoop::start()?;
//! let download = start_async_with_progress(|| fetch_feed(FEED_URL));
//!
//! download.subscribe_fn(move |n| {
//!     if let Notification::Next(streams) = n {
//!         streams.progress.observe_on(ui.scheduler()).subscribe_fn(show_progress);
//!         streams.result.observe_on(ui.scheduler()).subscribe_fn(show_feed);
//!     }
//! });
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Stream protocol: observers, subscribers, lifetimes
pub mod stream;

/// Shared activations owning one upstream registration
pub mod shared;

/// Async-operation and event-source bridges
pub mod bridge;

/// Worker/scheduler abstraction and its two backends
pub mod scheduler;

/// In-process event loop and worker pool
pub mod runtime;

// ============================================================================
// Ambient
// ============================================================================

/// Host configuration
pub mod config;

/// Error types
pub mod error;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::{
    from_async, from_async_with_progress, from_event, start_async, start_async_with_progress,
    ProgressStreams,
};
pub use config::{EventLoopConfig, PoolConfig, RillConfig};
pub use error::{ConfigError, ConfigResult, StreamError};
pub use runtime::{EventLoop, WorkerPool};
pub use scheduler::{
    PoolScheduler, Recurse, ScheduleState, Schedulable, Scheduler, UiScheduler, Worker,
    WorkerBackend, MIN_TIMER_DELAY,
};
pub use shared::{RefCount, ReplayLast};
pub use stream::{FnObserver, Notification, Observable, Observer, Subscriber, Subscription};
