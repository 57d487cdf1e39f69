//! The broker: lifecycle, registration and introspection.
//!
//! While Active the broker runs two threads:
//! - the control loop, sole owner of the subscriber registry and the object
//!   table, which drains registrations, backend events and per-object
//!   commands each pass
//! - the reader loop, which blocks on the backend and forwards change
//!   notifications into the control loop's event queue
//!
//! Everything else (registration, introspection) reaches the control loop
//! through queues; no lock guards the registry.
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(SimulatedBackend::new());
//! backend.add_object("UProxy1", ObjectId(6000));
//!
//! let broker = Broker::new(BrokerConfig::new("UProxy1"), backend);
//! broker.start()?;
//!
//! let (handle, endpoint) = object_channel(ObjectId(100), ObjectConfig::default());
//! broker.register(handle)?;
//! endpoint.ask_sensor(SensorId(10))?;
//!
//! broker.stop();
//! ```

mod control;
mod reader;

use crate::backend::Backend;
use crate::config::BrokerConfig;
use crate::envelope::SensorEvent;
use crate::error::{BrokerError, Result};
use crate::object::ObjectHandle;
use crate::registry::{ObjectTable, SubscriberRegistry};
use crate::types::{BrokerState, ObjectId, SensorId};
use control::ControlLoop;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use reader::ReaderLoop;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Broker state shared with both loops.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        StateCell(AtomicU8::new(BrokerState::Idle as u8))
    }

    pub fn load(&self) -> BrokerState {
        BrokerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, state: BrokerState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Introspection request answered by the control loop.
pub(crate) enum Query {
    SensorCount(Sender<usize>),
    SubscriberCount(SensorId, Sender<usize>),
    ObjectCount(Sender<usize>),
}

impl Query {
    fn answer(&self, registry: &SubscriberRegistry, objects: &ObjectTable) {
        // The caller may have timed out and gone away.
        let _ = match self {
            Query::SensorCount(reply) => reply.try_send(registry.sensor_count()),
            Query::SubscriberCount(sensor, reply) => {
                reply.try_send(registry.subscriber_count(*sensor))
            }
            Query::ObjectCount(reply) => reply.try_send(objects.len()),
        };
    }
}

/// Threads and backend session, guarded by one lock so Start/Stop serialize.
struct Lifecycle {
    initialized: bool,
    object_id: ObjectId,
    control: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

/// Broker between one sensor backend and any number of consumer objects.
pub struct Broker {
    config: BrokerConfig,
    backend: Arc<dyn Backend>,
    state: Arc<StateCell>,
    lifecycle: Mutex<Lifecycle>,

    registrations_tx: Sender<ObjectHandle>,
    registrations_rx: Receiver<ObjectHandle>,
    events_tx: Sender<SensorEvent>,
    events_rx: Receiver<SensorEvent>,
    queries_tx: Sender<Query>,
    queries_rx: Receiver<Query>,
}

impl Broker {
    /// Create an Idle broker. Nothing touches the backend before `start`.
    pub fn new(config: BrokerConfig, backend: Arc<dyn Backend>) -> Self {
        let (registrations_tx, registrations_rx) = unbounded();
        let (events_tx, events_rx) = bounded(config.event_queue_capacity.max(1));
        let (queries_tx, queries_rx) = unbounded();

        Self {
            config,
            backend,
            state: Arc::new(StateCell::new()),
            lifecycle: Mutex::new(Lifecycle {
                initialized: false,
                object_id: ObjectId::UNASSIGNED,
                control: None,
                reader: None,
            }),
            registrations_tx,
            registrations_rx,
            events_tx,
            events_rx,
            queries_tx,
            queries_rx,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn state(&self) -> BrokerState {
        self.state.load()
    }

    pub fn is_active(&self) -> bool {
        self.state() == BrokerState::Active
    }

    /// The broker's own id, `ObjectId::UNASSIGNED` until the first start.
    pub fn object_id(&self) -> ObjectId {
        self.lifecycle.lock().object_id
    }

    /// Initialize the backend (first call only) and start both loops.
    ///
    /// A no-op if already Active. On error the broker stays Idle.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if self.state.load() == BrokerState::Active {
            return Ok(());
        }

        if !lifecycle.initialized {
            self.backend.initialize(&self.config.backend_args)?;
            let id = self.backend.resolve_object_id(&self.config.name);
            if !id.is_assigned() {
                return Err(BrokerError::UnknownObject(self.config.name.clone()));
            }
            lifecycle.object_id = id;
            lifecycle.initialized = true;
            info!(name = %self.config.name, object = %id, "backend initialized");
        }

        self.state.store(BrokerState::Active);

        let control = ControlLoop::new(
            Arc::clone(&self.state),
            Arc::clone(&self.backend),
            self.registrations_rx.clone(),
            self.events_rx.clone(),
            self.queries_rx.clone(),
            self.config.idle_interval(),
            self.config.event_queue_capacity,
        );
        let control = match thread::Builder::new()
            .name("broker-control".to_string())
            .spawn(move || control.run())
        {
            Ok(handle) => handle,
            Err(err) => {
                self.state.store(BrokerState::Idle);
                return Err(err.into());
            }
        };

        let reader = ReaderLoop::new(
            Arc::clone(&self.state),
            Arc::clone(&self.backend),
            self.events_tx.clone(),
            self.config.wait_event_timeout(),
            self.config.idle_interval(),
        );
        let reader = match thread::Builder::new()
            .name("broker-reader".to_string())
            .spawn(move || reader.run())
        {
            Ok(handle) => handle,
            Err(err) => {
                self.state.store(BrokerState::Terminating);
                join_loop("control", control);
                self.state.store(BrokerState::Idle);
                return Err(err.into());
            }
        };

        lifecycle.control = Some(control);
        lifecycle.reader = Some(reader);
        info!(name = %self.config.name, "broker started");
        Ok(())
    }

    /// Stop both loops and wait for them to exit.
    ///
    /// Every registered object gets a best-effort `FinishNotification` and
    /// is released. A no-op if not Active.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if self.state.load() != BrokerState::Active {
            return;
        }

        self.state.store(BrokerState::Terminating);
        if let Some(control) = lifecycle.control.take() {
            join_loop("control", control);
        }
        if let Some(reader) = lifecycle.reader.take() {
            join_loop("reader", reader);
        }
        self.state.store(BrokerState::Idle);
        info!(name = %self.config.name, "broker stopped");
    }

    /// Queue `handle` for registration.
    ///
    /// An `ActivateNotification` arrives on the object's inbound queue once
    /// the control loop has taken it in. Registrations made while Idle are
    /// processed at the next start.
    pub fn register(&self, handle: ObjectHandle) -> Result<()> {
        let id = handle.id();
        self.registrations_tx
            .send(handle)
            .map_err(|_| BrokerError::Disconnected(id))
    }

    /// Number of sensors with at least one subscriber.
    pub fn sensor_count(&self) -> Result<usize> {
        self.query(Query::SensorCount)
    }

    /// Number of objects subscribed to `sensor`.
    pub fn subscriber_count(&self, sensor: SensorId) -> Result<usize> {
        self.query(|reply| Query::SubscriberCount(sensor, reply))
    }

    /// Number of objects in the object table.
    pub fn object_count(&self) -> Result<usize> {
        self.query(Query::ObjectCount)
    }

    /// Ask the control loop; its state is released while not Active.
    fn query(&self, make: impl FnOnce(Sender<usize>) -> Query) -> Result<usize> {
        if !self.is_active() {
            return Ok(0);
        }
        let (reply_tx, reply_rx) = bounded(1);
        self.queries_tx
            .send(make(reply_tx))
            .map_err(|_| BrokerError::QueryTimeout)?;

        // Wait in slices so a stop racing the query ends the wait early.
        let deadline = Instant::now() + self.config.query_timeout();
        let slice = self.config.idle_interval().max(Duration::from_millis(1));
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BrokerError::QueryTimeout);
            }
            match reply_rx.recv_timeout(remaining.min(slice)) {
                Ok(count) => return Ok(count),
                Err(_) if !self.is_active() => return Ok(0),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(BrokerError::QueryTimeout),
            }
        }
    }

    #[cfg(test)]
    fn running_loops(&self) -> usize {
        let lifecycle = self.lifecycle.lock();
        let running = |slot: &Option<JoinHandle<()>>| {
            usize::from(slot.as_ref().is_some_and(|h| !h.is_finished()))
        };
        running(&lifecycle.control) + running(&lifecycle.reader)
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_loop(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!(thread = name, "broker loop panicked");
    }
}
