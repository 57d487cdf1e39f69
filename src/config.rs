//! Broker and consumer configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Broker configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Object name of the broker itself, resolved through the backend.
    pub name: String,

    /// Opaque arguments handed to `Backend::initialize`.
    pub backend_args: Vec<String>,

    /// Capacity of the queue between the reader loop and the control loop.
    /// Default: 1024
    pub event_queue_capacity: usize,

    /// Upper bound of the control loop's idle wait.
    /// Default: 100ms
    pub idle_interval_ms: u64,

    /// Timeout of a single blocking wait on the backend.
    /// Default: 5000ms
    pub wait_event_timeout_ms: u64,

    /// How long introspection calls wait for the control loop.
    /// Default: 1000ms
    pub query_timeout_ms: u64,
}

impl BrokerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn wait_event_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_event_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: "SensorBroker".to_string(),
            backend_args: Vec::new(),
            event_queue_capacity: 1024,
            idle_interval_ms: 100,
            wait_event_timeout_ms: 5000,
            query_timeout_ms: 1000,
        }
    }
}

/// Queue sizes for one consumer object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    /// Inbound events buffered before deliveries start dropping.
    /// Default: 100
    pub event_buffer: usize,

    /// Outbound commands buffered before `ask_sensor`/`set_value` fail.
    /// Default: 100
    pub command_buffer: usize,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            event_buffer: 100,
            command_buffer: 100,
        }
    }
}
