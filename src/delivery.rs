//! Best-effort delivery into consumer inbound queues.
//!
//! [`send`] makes [`DELIVERY_ATTEMPTS`] non-blocking attempts and then gives
//! up, so a stalled consumer loses messages instead of stalling the control
//! loop. [`fan_out`] applies it to each subscriber independently.

use crate::envelope::Envelope;
use crate::object::ObjectHandle;
use crate::registry::SubscriberList;
use crossbeam_channel::TrySendError;

/// Non-blocking attempts made per envelope and consumer.
pub const DELIVERY_ATTEMPTS: usize = 2;

/// Why a delivery was abandoned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Inbound queue stayed full for every attempt (slow consumer).
    QueueFull,
    /// Consumer dropped its endpoint.
    Disconnected,
}

/// Outcome of a single [`send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped(DropReason),
}

impl Delivery {
    pub fn is_delivered(self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Tally of a [`fan_out`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
}

/// Place `envelope` into the consumer's inbound queue without blocking.
pub fn send(handle: &ObjectHandle, envelope: Envelope) -> Delivery {
    let mut envelope = envelope;
    for attempt in 1..=DELIVERY_ATTEMPTS {
        match handle.events().try_send(envelope) {
            Ok(()) => return Delivery::Delivered,
            Err(TrySendError::Disconnected(_)) => {
                return Delivery::Dropped(DropReason::Disconnected);
            }
            Err(TrySendError::Full(returned)) => {
                if attempt == DELIVERY_ATTEMPTS {
                    break;
                }
                envelope = returned;
                std::thread::yield_now();
            }
        }
    }
    Delivery::Dropped(DropReason::QueueFull)
}

/// Deliver a copy of `envelope` to every subscriber, in list order.
pub fn fan_out(subscribers: &SubscriberList, envelope: &Envelope) -> FanOut {
    let mut tally = FanOut::default();
    for handle in subscribers.iter() {
        match send(handle, envelope.clone()) {
            Delivery::Delivered => tally.delivered += 1,
            Delivery::Dropped(reason) => {
                tracing::debug!(object = %handle.id(), ?reason, "delivery dropped");
                tally.dropped += 1;
            }
        }
    }
    tally
}
