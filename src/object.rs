//! Consumer objects and the queue pair linking each one to the broker.
//!
//! Every consumer owns two bounded queues: an inbound queue the broker
//! delivers envelopes into, and an outbound queue the consumer issues
//! commands on. [`object_channel`] builds both and splits them into the
//! broker side ([`ObjectHandle`], passed to `Broker::register`) and the
//! consumer side ([`ObjectEndpoint`]).
//!
//! # Example
//!
//! ```ignore
//! let (handle, endpoint) = object_channel(ObjectId(100), ObjectConfig::default());
//! broker.register(handle)?;
//!
//! endpoint.ask_sensor(SensorId(10))?;
//! loop {
//!     match endpoint.recv() {
//!         Ok(Envelope::SensorEvent(event)) => println!("{}", event),
//!         Ok(Envelope::Finish(_)) | Err(_) => break,
//!         Ok(_) => {}
//!     }
//! }
//! ```

use crate::config::ObjectConfig;
use crate::envelope::{AskCommand, Envelope, SetValueCommand};
use crate::error::{BrokerError, Result};
use crate::types::{ObjectId, SensorId};
use crossbeam_channel::{
    bounded, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};
use std::time::Duration;

/// Broker-side view of a consumer: where to deliver, where to read commands.
#[derive(Clone, Debug)]
pub struct ObjectHandle {
    id: ObjectId,
    events: Sender<Envelope>,
    commands: Receiver<Envelope>,
}

impl ObjectHandle {
    /// Wrap queues the consumer created itself.
    pub fn new(id: ObjectId, events: Sender<Envelope>, commands: Receiver<Envelope>) -> Self {
        Self {
            id,
            events,
            commands,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub(crate) fn events(&self) -> &Sender<Envelope> {
        &self.events
    }

    pub(crate) fn commands(&self) -> &Receiver<Envelope> {
        &self.commands
    }

    /// Whether both handles deliver into the same inbound queue.
    pub fn same_object(&self, other: &ObjectHandle) -> bool {
        self.id == other.id && self.events.same_channel(&other.events)
    }
}

/// Consumer-side end of the queue pair.
pub struct ObjectEndpoint {
    id: ObjectId,
    events: Receiver<Envelope>,
    commands: Sender<Envelope>,
}

impl ObjectEndpoint {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Ask the broker to subscribe this object to `sensor`.
    ///
    /// The acknowledgment arrives on the inbound queue: a `SensorEvent`
    /// with the current value, or an `AskCommand` echo on failure.
    pub fn ask_sensor(&self, sensor: SensorId) -> Result<()> {
        self.command(AskCommand::new(sensor).into())
    }

    /// Ask the broker to write `value`; a `SetValueCommand` echo follows.
    pub fn set_value(&self, sensor: SensorId, value: i64) -> Result<()> {
        self.command(SetValueCommand::new(sensor, value).into())
    }

    /// Queue a raw command envelope without blocking.
    pub fn command(&self, envelope: Envelope) -> Result<()> {
        match self.commands.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(BrokerError::CommandQueueFull(self.id)),
            Err(TrySendError::Disconnected(_)) => Err(BrokerError::Disconnected(self.id)),
        }
    }

    /// Receive the next envelope (blocking).
    pub fn recv(&self) -> std::result::Result<Envelope, RecvError> {
        self.events.recv()
    }

    /// Try to receive an envelope (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<Envelope, TryRecvError> {
        self.events.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Envelope, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Number of envelopes waiting in the inbound queue.
    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

/// Create the queue pair for a new consumer object.
pub fn object_channel(id: ObjectId, config: ObjectConfig) -> (ObjectHandle, ObjectEndpoint) {
    let (event_tx, event_rx) = bounded(config.event_buffer.max(1));
    let (command_tx, command_rx) = bounded(config.command_buffer.max(1));

    let handle = ObjectHandle::new(id, event_tx, command_rx);
    let endpoint = ObjectEndpoint {
        id,
        events: event_rx,
        commands: command_tx,
    };

    (handle, endpoint)
}
