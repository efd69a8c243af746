//! In-process hosts
//!
//! Ready-made implementations of the host primitives: [`EventLoop`] is a
//! serialized [`DispatchQueue`](rill_sdk::DispatchQueue) and [`WorkerPool`]
//! is a [`ThreadPool`](rill_sdk::ThreadPool). Applications embedding rill in
//! a platform with its own UI thread or pool implement those traits instead.

mod event_loop;
mod timer;
mod worker_pool;

pub use event_loop::EventLoop;
pub use worker_pool::WorkerPool;
