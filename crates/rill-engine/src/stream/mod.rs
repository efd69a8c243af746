//! Push-stream protocol
//!
//! A stream delivers zero or more values followed by exactly one terminal
//! notification (completion or error). [`Subscriber`] enforces that grammar
//! for every observer, and [`Subscription`] is the cancellable lifetime that
//! ties subscribers, shared activations and scheduled work together.

mod observable;
mod observe_on;
mod observer;
mod serial;
mod subscription;

pub use observable::Observable;
pub use observer::{FnObserver, Notification, Observer, Subscriber};
pub use subscription::{Subscription, Teardown, TeardownId};

pub(crate) use serial::SerialQueue;
pub(crate) use subscription::panic_message;
