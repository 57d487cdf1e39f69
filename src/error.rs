//! Error types for the sensor broker.

use crate::types::{ObjectId, SensorId};
use thiserror::Error;

/// Failures reported by a sensor backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Backend not initialized")]
    NotInitialized,

    #[error("Backend initialization failed: {0}")]
    Initialize(String),

    #[error("Unknown sensor: {0}")]
    UnknownSensor(SensorId),

    #[error("Sensor {sensor} rejected the request: {reason}")]
    Rejected { sensor: SensorId, reason: String },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Main error type for broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Unknown object name: {0}")]
    UnknownObject(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Control loop did not answer in time")]
    QueryTimeout,

    #[error("Command queue of object {0} is full")]
    CommandQueueFull(ObjectId),

    #[error("Object {0} is disconnected from the broker")]
    Disconnected(ObjectId),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
