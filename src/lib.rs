//! # Sensor Broker
//!
//! An in-process broker between one sensor backend and any number of
//! consumer objects. Consumers subscribe to sensor changes and issue
//! request/response commands without blocking each other or the broker.
//!
//! ## Core Concepts
//!
//! - **Envelopes**: one tagged union for everything crossing a queue
//! - **Objects**: consumers, each with a private inbound/outbound queue pair
//! - **Control loop**: the single owner of the subscriber registry and
//!   object table; all mutation happens there
//! - **Reader loop**: blocks on the backend and forwards change events
//! - **Best-effort delivery**: two non-blocking attempts, then drop
//!
//! ## Example
//!
//! ```ignore
//! use sensor_broker::{object_channel, Broker, BrokerConfig, ObjectConfig, ObjectId, SensorEvent, SensorId};
//!
//! let broker = Broker::new(BrokerConfig::new("UProxy1"), backend);
//! broker.start()?;
//!
//! let (handle, endpoint) = object_channel(ObjectId(100), ObjectConfig::default());
//! broker.register(handle)?;
//!
//! endpoint.ask_sensor(SensorId(10))?;
//! while let Ok(envelope) = endpoint.recv() {
//!     if let Some(event) = envelope.try_as::<SensorEvent>() {
//!         println!("{}", event);
//!     }
//! }
//! ```

pub mod backend;
pub mod bindings;
pub mod broker;
pub mod config;
pub mod delivery;
pub mod envelope;
pub mod error;
pub mod object;
pub mod registry;
pub mod types;

// Re-exports
pub use backend::{Backend, BackendEvent, BackendResult, SimulatedBackend};
pub use bindings::{SensorBindings, SensorValue};
pub use broker::Broker;
pub use config::{BrokerConfig, ObjectConfig};
pub use delivery::{fan_out, send, Delivery, DropReason, FanOut, DELIVERY_ATTEMPTS};
pub use envelope::{
    ActivateNotification, AskCommand, Envelope, EnvelopeKind, FinishNotification, Payload,
    SensorEvent, SetValueCommand,
};
pub use error::{BackendError, BrokerError, Result};
pub use object::{object_channel, ObjectEndpoint, ObjectHandle};
pub use registry::{ObjectTable, PendingCommand, SubscriberList, SubscriberRegistry};
pub use types::*;
