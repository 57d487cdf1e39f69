//! Core types for the sensor broker.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Raw value of the "unassigned" sentinel shared by sensor and object ids.
pub const UNASSIGNED_ID: i64 = -1;

/// Identifier of an external observable value managed by the backend.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SensorId(pub i64);

impl SensorId {
    /// Sentinel meaning "no sensor".
    pub const UNASSIGNED: SensorId = SensorId(UNASSIGNED_ID);

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }
}

impl fmt::Debug for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensorId({})", self.0)
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a consumer object.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub i64);

impl ObjectId {
    /// Sentinel meaning "no object".
    pub const UNASSIGNED: ObjectId = ObjectId(UNASSIGNED_ID);

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Timestamp(duration.as_micros() as i64)
    }

    /// Build from the seconds/nanoseconds pair most sensor backends report.
    ///
    /// Out-of-range inputs saturate at the `i64` bounds.
    pub fn from_parts(secs: i64, nanos: i64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000).saturating_add(nanos / 1_000))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Lifecycle state of a broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BrokerState {
    #[default]
    Idle = 0,
    Active = 1,
    Terminating = 2,
}

impl BrokerState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => BrokerState::Active,
            2 => BrokerState::Terminating,
            _ => BrokerState::Idle,
        }
    }
}

impl fmt::Display for BrokerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrokerState::Idle => "idle",
            BrokerState::Active => "active",
            BrokerState::Terminating => "terminating",
        };
        f.write_str(name)
    }
}
