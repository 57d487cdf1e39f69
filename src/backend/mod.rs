//! Boundary to the external sensor system.
//!
//! The broker only talks to the sensor system through [`Backend`]. One
//! instance is shared by the control loop (value reads, writes and
//! subscriptions) and the reader loop (blocking event waits), so
//! implementations must tolerate exactly these two concurrent callers.

mod simulated;

pub use simulated::SimulatedBackend;

use crate::envelope::SensorEvent;
use crate::error::BackendError;
use crate::types::{ObjectId, SensorId, Timestamp};
use std::time::Duration;

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A change notification as reported by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendEvent {
    pub sensor: SensorId,
    pub value: i64,
    pub timestamp: Timestamp,
}

impl From<BackendEvent> for SensorEvent {
    fn from(event: BackendEvent) -> Self {
        SensorEvent {
            sensor: event.sensor,
            value: event.value,
            timestamp: event.timestamp,
        }
    }
}

/// Request/response facade over a sensor system session.
pub trait Backend: Send + Sync {
    /// Bring the session up. Called once, before any other method.
    fn initialize(&self, args: &[String]) -> BackendResult<()>;

    /// Map a configured object name to its id, `ObjectId::UNASSIGNED` if unknown.
    fn resolve_object_id(&self, name: &str) -> ObjectId;

    /// Ask the backend to report changes of `sensor`.
    fn ask_sensor(&self, sensor: SensorId) -> BackendResult<()>;

    fn current_value(&self, sensor: SensorId) -> BackendResult<i64>;

    fn set_value(&self, sensor: SensorId, value: i64) -> BackendResult<()>;

    /// Block up to `timeout` for the next change; `Ok(None)` on timeout.
    fn wait_event(&self, timeout: Duration) -> BackendResult<Option<BackendEvent>>;
}
