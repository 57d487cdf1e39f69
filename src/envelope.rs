//! Message envelope carried by every broker queue.
//!
//! An [`Envelope`] holds exactly one payload. Consumers and the control loop
//! route on [`Envelope::kind`] or extract a concrete payload with
//! [`Envelope::try_as`], which returns `None` (never wrong data) when the
//! stored payload is of another kind.
//!
//! # Example
//!
//! ```ignore
//! let mut envelope = Envelope::from(SensorEvent::new(SensorId(10), 42));
//! assert!(envelope.try_as::<AskCommand>().is_none());
//! assert_eq!(envelope.try_as::<SensorEvent>().unwrap().value, 42);
//!
//! envelope.push(FinishNotification::default());
//! assert_eq!(envelope.kind(), EnvelopeKind::Finish);
//! ```

use crate::types::{ObjectId, SensorId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sensor value change (or the snapshot that acknowledges a subscription).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub sensor: SensorId,
    pub value: i64,
    pub timestamp: Timestamp,
}

impl SensorEvent {
    /// Event stamped with the current time.
    pub fn new(sensor: SensorId, value: i64) -> Self {
        Self {
            sensor,
            value,
            timestamp: Timestamp::now(),
        }
    }
}

impl fmt::Display for SensorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id: {} value: {}", self.sensor, self.value)
    }
}

/// Subscription request; echoed back with `result` on failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskCommand {
    pub sensor: SensorId,
    pub result: bool,
}

impl AskCommand {
    pub fn new(sensor: SensorId) -> Self {
        Self {
            sensor,
            result: false,
        }
    }
}

/// Backend write request; always echoed back with `result`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetValueCommand {
    pub sensor: SensorId,
    pub value: i64,
    pub result: bool,
}

impl SetValueCommand {
    pub fn new(sensor: SensorId, value: i64) -> Self {
        Self {
            sensor,
            value,
            result: false,
        }
    }
}

/// Sent once the broker has accepted a registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateNotification {
    pub object: ObjectId,
}

/// Sent to every registered object when the broker stops.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishNotification {}

/// Discriminant of an [`Envelope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    SensorEvent,
    AskCommand,
    SetValueCommand,
    Activate,
    Finish,
}

/// Tagged union over every payload that crosses a broker queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    SensorEvent(SensorEvent),
    AskCommand(AskCommand),
    SetValueCommand(SetValueCommand),
    Activate(ActivateNotification),
    Finish(FinishNotification),
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::SensorEvent(_) => EnvelopeKind::SensorEvent,
            Envelope::AskCommand(_) => EnvelopeKind::AskCommand,
            Envelope::SetValueCommand(_) => EnvelopeKind::SetValueCommand,
            Envelope::Activate(_) => EnvelopeKind::Activate,
            Envelope::Finish(_) => EnvelopeKind::Finish,
        }
    }

    /// Replace the stored payload.
    pub fn push<P: Payload>(&mut self, payload: P) {
        *self = payload.into();
    }

    /// Whether the stored payload is a `P`.
    pub fn is<P: Payload>(&self) -> bool {
        self.kind() == P::KIND
    }

    /// View the payload as `P`, or `None` if another kind is stored.
    pub fn try_as<P: Payload>(&self) -> Option<&P> {
        if !self.is::<P>() {
            return None;
        }
        P::view(self)
    }

    /// Take the payload out as `P`, handing the envelope back on mismatch.
    pub fn into_payload<P: Payload>(self) -> std::result::Result<P, Envelope> {
        if !self.is::<P>() {
            return Err(self);
        }
        P::take(self)
    }
}

/// A payload kind that can travel inside an [`Envelope`].
pub trait Payload: Into<Envelope> + Sized {
    const KIND: EnvelopeKind;

    fn view(envelope: &Envelope) -> Option<&Self>;

    fn take(envelope: Envelope) -> std::result::Result<Self, Envelope>;
}

macro_rules! payload_kind {
    ($payload:ident, $variant:ident) => {
        impl From<$payload> for Envelope {
            fn from(payload: $payload) -> Self {
                Envelope::$variant(payload)
            }
        }

        impl Payload for $payload {
            const KIND: EnvelopeKind = EnvelopeKind::$variant;

            fn view(envelope: &Envelope) -> Option<&Self> {
                match envelope {
                    Envelope::$variant(payload) => Some(payload),
                    _ => None,
                }
            }

            fn take(envelope: Envelope) -> std::result::Result<Self, Envelope> {
                match envelope {
                    Envelope::$variant(payload) => Ok(payload),
                    other => Err(other),
                }
            }
        }
    };
}

payload_kind!(SensorEvent, SensorEvent);
payload_kind!(AskCommand, AskCommand);
payload_kind!(SetValueCommand, SetValueCommand);
payload_kind!(ActivateNotification, Activate);
payload_kind!(FinishNotification, Finish);

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kinds() -> Vec<Envelope> {
        vec![
            SensorEvent {
                sensor: SensorId(30),
                value: 10500,
                timestamp: Timestamp(1_700_000_000_000_000),
            }
            .into(),
            AskCommand {
                sensor: SensorId(7),
                result: true,
            }
            .into(),
            SetValueCommand {
                sensor: SensorId(8),
                value: -3,
                result: true,
            }
            .into(),
            ActivateNotification {
                object: ObjectId(100),
            }
            .into(),
            FinishNotification::default().into(),
        ]
    }

    fn matches_kind(envelope: &Envelope) -> [bool; 5] {
        [
            envelope.try_as::<SensorEvent>().is_some(),
            envelope.try_as::<AskCommand>().is_some(),
            envelope.try_as::<SetValueCommand>().is_some(),
            envelope.try_as::<ActivateNotification>().is_some(),
            envelope.try_as::<FinishNotification>().is_some(),
        ]
    }

    #[test]
    fn test_sensor_event_round_trip() {
        let event = SensorEvent {
            sensor: SensorId(30),
            value: 10500,
            timestamp: Timestamp::now(),
        };
        let envelope = Envelope::from(event.clone());

        assert!(envelope.try_as::<AskCommand>().is_none());
        assert_eq!(envelope.try_as::<SensorEvent>(), Some(&event));
        assert_eq!(envelope.into_payload::<SensorEvent>(), Ok(event));
    }

    #[test]
    fn test_exactly_one_kind_matches() {
        for (i, envelope) in all_kinds().iter().enumerate() {
            let hits = matches_kind(envelope);
            assert_eq!(hits.iter().filter(|hit| **hit).count(), 1);
            assert!(hits[i], "kind {:?} not extractable", envelope.kind());
        }
    }

    #[test]
    fn test_into_payload_mismatch_returns_envelope() {
        let envelope = Envelope::from(AskCommand::new(SensorId(3)));
        let back = envelope.clone().into_payload::<SetValueCommand>().unwrap_err();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_push_replaces_payload() {
        let mut envelope = Envelope::from(SensorEvent::new(SensorId(1), 1));
        envelope.push(SetValueCommand::new(SensorId(2), 5));

        assert_eq!(envelope.kind(), EnvelopeKind::SetValueCommand);
        assert!(envelope.try_as::<SensorEvent>().is_none());
        assert_eq!(envelope.try_as::<SetValueCommand>().unwrap().value, 5);
    }

    #[test]
    fn test_kind_constants() {
        for envelope in all_kinds() {
            let kind = envelope.kind();
            let expected = match kind {
                EnvelopeKind::SensorEvent => SensorEvent::KIND,
                EnvelopeKind::AskCommand => AskCommand::KIND,
                EnvelopeKind::SetValueCommand => SetValueCommand::KIND,
                EnvelopeKind::Activate => ActivateNotification::KIND,
                EnvelopeKind::Finish => FinishNotification::KIND,
            };
            assert_eq!(kind, expected);
        }
    }

    #[test]
    fn test_is_follows_stored_kind() {
        let mut envelope = Envelope::from(ActivateNotification {
            object: ObjectId(100),
        });
        assert!(envelope.is::<ActivateNotification>());
        assert!(!envelope.is::<FinishNotification>());

        envelope.push(FinishNotification::default());
        assert!(envelope.is::<FinishNotification>());
        assert!(!envelope.is::<ActivateNotification>());
        assert!(envelope.try_as::<ActivateNotification>().is_none());
    }

    #[test]
    fn test_sensor_event_display() {
        let event = SensorEvent::new(SensorId(10), 10500);
        assert_eq!(event.to_string(), "id: 10 value: 10500");
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_value(Envelope::from(AskCommand::new(SensorId(4)))).unwrap();
        assert_eq!(json["type"], "ask_command");
        assert_eq!(json["sensor"], 4);
    }
}
