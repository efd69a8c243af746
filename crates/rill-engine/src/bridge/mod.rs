//! Bridges from callback-based platform APIs to streams
//!
//! - [`from_async`]: single-shot operation to a shared single-result stream
//! - [`from_async_with_progress`]: operation with progress to a result
//!   stream and a replay-last progress stream sharing one registration
//! - [`start_async`] / [`start_async_with_progress`]: a fresh operation per
//!   subscription
//! - [`from_event`]: register/unregister pair to a reference-counted stream
//!
//! Bridges never create threads: notifications arrive on whatever thread
//! the operation or event source calls back on.

mod async_op;
mod event;
mod progress;
mod restart;

pub use async_op::from_async;
pub use event::from_event;
pub use progress::{from_async_with_progress, ProgressStreams};
pub use restart::{start_async, start_async_with_progress};
