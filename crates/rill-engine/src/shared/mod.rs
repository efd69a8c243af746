//! Shared activations
//!
//! Both wrappers own at most one real upstream registration and multicast
//! it to any number of subscribers.

mod ref_count;
mod replay;

pub use ref_count::RefCount;
pub use replay::ReplayLast;
