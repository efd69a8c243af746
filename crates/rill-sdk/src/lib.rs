//! Rill SDK - contracts consumed by the rill engine
//!
//! Hosts implement these traits to plug their own I/O layer, event system
//! and threading primitives into rill without depending on the engine:
//!
//! - [`AsyncOperation`] / [`AsyncOperationWithProgress`]: single-shot work
//!   with a one-time completion notification
//! - [`EventSource`]: a `{register, unregister}` capability pair
//! - [`DispatchQueue`] / [`ThreadPool`]: where scheduled work runs
//!
//! [`CompletionSource`] and [`EventHub`] are ready-made implementations for
//! adapting callback APIs and in-process events.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod completion;
mod dispatch;
mod error;
mod event;
mod operation;

pub use completion::CompletionSource;
pub use dispatch::{
    DispatchPriority, DispatchQueue, ThreadPool, Timer, TimerHandle, Work, WorkPriority,
};
pub use error::{DispatchError, DisposalError, OperationError};
pub use event::{EventHandler, EventHub, EventSource, EventToken};
pub use operation::{
    AsyncOperation, AsyncOperationWithProgress, AsyncStatus, CompletedHandler, ProgressHandler,
};
