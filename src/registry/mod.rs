//! State owned by the broker's control loop.
//!
//! - [`SubscriberRegistry`]: sensor id to the ordered, duplicate-free list of
//!   objects subscribed to it
//! - [`ObjectTable`]: every registered object, polled for commands once per
//!   control loop pass
//!
//! Neither type locks internally. Both are only ever touched from the
//! control loop thread; other threads reach them by queueing messages.

mod objects;
mod subscribers;

pub use objects::{ObjectTable, PendingCommand};
pub use subscribers::{SubscriberList, SubscriberRegistry};
