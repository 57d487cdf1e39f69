//! Sensor subscriptions.

use crate::object::ObjectHandle;
use crate::types::{ObjectId, SensorId};
use std::collections::HashMap;
use std::fmt;

/// Objects subscribed to one sensor, in subscription order.
#[derive(Clone, Debug, Default)]
pub struct SubscriberList {
    subscribers: Vec<ObjectHandle>,
}

impl SubscriberList {
    /// Append `handle` unless an object with the same id is already present.
    ///
    /// Returns true if the list grew.
    pub fn add(&mut self, handle: ObjectHandle) -> bool {
        if self.contains(handle.id()) {
            return false;
        }
        self.subscribers.push(handle);
        true
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.subscribers.iter().any(|h| h.id() == id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectHandle> {
        self.subscribers.iter()
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.subscribers.iter().map(|h| h.id()).collect()
    }
}

impl fmt::Display for SubscriberList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for handle in &self.subscribers {
            write!(f, " {}", handle.id())?;
        }
        write!(f, " ]")
    }
}

/// Sensor id to subscriber list.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    lists: HashMap<SensorId, SubscriberList>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handle` to `sensor`. Subscribing twice is a no-op.
    ///
    /// Returns true if this was a new subscription.
    pub fn subscribe(&mut self, sensor: SensorId, handle: ObjectHandle) -> bool {
        self.lists.entry(sensor).or_default().add(handle)
    }

    /// Number of sensors with at least one subscriber.
    pub fn sensor_count(&self) -> usize {
        self.lists.len()
    }

    /// Number of subscribers of `sensor`, 0 if unknown.
    pub fn subscriber_count(&self, sensor: SensorId) -> usize {
        self.lists.get(&sensor).map_or(0, SubscriberList::len)
    }

    pub fn lookup(&self, sensor: SensorId) -> Option<&SubscriberList> {
        self.lists.get(&sensor)
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.lists.clear();
    }
}
