//! In-memory sensor system.

use super::{Backend, BackendEvent, BackendResult};
use crate::error::BackendError;
use crate::types::{ObjectId, SensorId, Timestamp};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Mutable sensor state.
#[derive(Default)]
struct Sensors {
    values: HashMap<SensorId, i64>,
    asked: HashSet<SensorId>,
    /// `None` accepts every sensor id.
    known: Option<HashSet<SensorId>>,
}

impl Sensors {
    fn check(&self, sensor: SensorId) -> BackendResult<()> {
        match &self.known {
            Some(known) if !known.contains(&sensor) => Err(BackendError::UnknownSensor(sensor)),
            _ if !sensor.is_assigned() => Err(BackendError::UnknownSensor(sensor)),
            _ => Ok(()),
        }
    }
}

/// A [`Backend`] keeping sensor values in memory.
///
/// Writing a sensor that has been asked for queues a change event, so the
/// broker sees its own writes the way it would with a real sensor system.
/// Tests can also [`inject`](SimulatedBackend::inject) changes directly.
pub struct SimulatedBackend {
    sensors: Mutex<Sensors>,
    objects: Mutex<HashMap<String, ObjectId>>,
    initialized: AtomicBool,
    fail_initialize: AtomicBool,
    initialize_calls: AtomicUsize,
    events_tx: Sender<BackendEvent>,
    events_rx: Receiver<BackendEvent>,
}

impl SimulatedBackend {
    /// Backend accepting every sensor id.
    pub fn new() -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            sensors: Mutex::new(Sensors::default()),
            objects: Mutex::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            fail_initialize: AtomicBool::new(false),
            initialize_calls: AtomicUsize::new(0),
            events_tx,
            events_rx,
        }
    }

    /// Backend that rejects sensors outside `sensors`.
    pub fn with_sensors(sensors: impl IntoIterator<Item = SensorId>) -> Self {
        let backend = Self::new();
        backend.sensors.lock().known = Some(sensors.into_iter().collect());
        backend
    }

    /// Make `name` resolvable to `id`.
    pub fn add_object(&self, name: impl Into<String>, id: ObjectId) {
        self.objects.lock().insert(name.into(), id);
    }

    /// Make the next `initialize` calls fail.
    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Set a value without emitting an event.
    pub fn preset(&self, sensor: SensorId, value: i64) {
        self.sensors.lock().values.insert(sensor, value);
    }

    /// Store `value` and emit a change event regardless of subscriptions.
    pub fn inject(&self, sensor: SensorId, value: i64) {
        self.sensors.lock().values.insert(sensor, value);
        self.emit(sensor, value);
    }

    /// Whether `ask_sensor` succeeded for `sensor`.
    pub fn is_asked(&self, sensor: SensorId) -> bool {
        self.sensors.lock().asked.contains(&sensor)
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    /// Events emitted but not yet taken by `wait_event`.
    pub fn pending_events(&self) -> usize {
        self.events_rx.len()
    }

    fn emit(&self, sensor: SensorId, value: i64) {
        let event = BackendEvent {
            sensor,
            value,
            timestamp: Timestamp::now(),
        };
        // Both channel ends live in `self`, so the send cannot fail.
        let _ = self.events_tx.send(event);
    }

    fn ensure_initialized(&self) -> BackendResult<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::NotInitialized)
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for SimulatedBackend {
    fn initialize(&self, args: &[String]) -> BackendResult<()> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(BackendError::Initialize(format!(
                "simulated failure (args: {:?})",
                args
            )));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resolve_object_id(&self, name: &str) -> ObjectId {
        self.objects
            .lock()
            .get(name)
            .copied()
            .unwrap_or(ObjectId::UNASSIGNED)
    }

    fn ask_sensor(&self, sensor: SensorId) -> BackendResult<()> {
        self.ensure_initialized()?;
        let mut sensors = self.sensors.lock();
        sensors.check(sensor)?;
        sensors.asked.insert(sensor);
        Ok(())
    }

    fn current_value(&self, sensor: SensorId) -> BackendResult<i64> {
        self.ensure_initialized()?;
        let sensors = self.sensors.lock();
        sensors.check(sensor)?;
        Ok(sensors.values.get(&sensor).copied().unwrap_or(0))
    }

    fn set_value(&self, sensor: SensorId, value: i64) -> BackendResult<()> {
        self.ensure_initialized()?;
        let notify = {
            let mut sensors = self.sensors.lock();
            sensors.check(sensor)?;
            let previous = sensors.values.insert(sensor, value);
            sensors.asked.contains(&sensor) && previous != Some(value)
        };
        if notify {
            self.emit(sensor, value);
        }
        Ok(())
    }

    fn wait_event(&self, timeout: Duration) -> BackendResult<Option<BackendEvent>> {
        self.ensure_initialized()?;
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(BackendError::Unavailable("event source closed".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> SimulatedBackend {
        let backend = SimulatedBackend::new();
        backend.initialize(&[]).unwrap();
        backend
    }

    #[test]
    fn test_calls_before_initialize_fail() {
        let backend = SimulatedBackend::new();
        assert_eq!(
            backend.current_value(SensorId(1)),
            Err(BackendError::NotInitialized)
        );
        assert_eq!(
            backend.wait_event(Duration::from_millis(1)),
            Err(BackendError::NotInitialized)
        );
    }

    #[test]
    fn test_initialize_failure() {
        let backend = SimulatedBackend::new();
        backend.fail_initialize(true);

        let args = vec!["--confile".to_string(), "test.xml".to_string()];
        assert!(matches!(
            backend.initialize(&args),
            Err(BackendError::Initialize(_))
        ));
        assert_eq!(backend.initialize_calls(), 1);
        assert_eq!(backend.ask_sensor(SensorId(1)), Err(BackendError::NotInitialized));
    }

    #[test]
    fn test_set_value_notifies_only_asked_sensors() {
        let backend = ready();

        backend.set_value(SensorId(1), 5).unwrap();
        assert_eq!(backend.pending_events(), 0);

        backend.ask_sensor(SensorId(1)).unwrap();
        backend.set_value(SensorId(1), 6).unwrap();
        // Same value again: no change, no event.
        backend.set_value(SensorId(1), 6).unwrap();

        let event = backend.wait_event(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!((event.sensor, event.value), (SensorId(1), 6));
        assert_eq!(backend.wait_event(Duration::from_millis(10)), Ok(None));
        assert_eq!(backend.current_value(SensorId(1)), Ok(6));
    }

    #[test]
    fn test_known_sensors() {
        let backend = SimulatedBackend::with_sensors([SensorId(10)]);
        backend.initialize(&[]).unwrap();

        assert!(backend.ask_sensor(SensorId(10)).is_ok());
        assert_eq!(
            backend.ask_sensor(SensorId(11)),
            Err(BackendError::UnknownSensor(SensorId(11)))
        );
        assert!(backend.is_asked(SensorId(10)));
        assert!(!backend.is_asked(SensorId(11)));
    }

    #[test]
    fn test_resolve_object_id() {
        let backend = ready();
        backend.add_object("UProxy1", ObjectId(6000));

        assert_eq!(backend.resolve_object_id("UProxy1"), ObjectId(6000));
        assert_eq!(backend.resolve_object_id("missing"), ObjectId::UNASSIGNED);
    }

    #[test]
    fn test_inject_preserves_order() {
        let backend = ready();
        for value in [11, 12, 13] {
            backend.inject(SensorId(10), value);
        }

        let values: Vec<i64> = (0..3)
            .map(|_| {
                backend
                    .wait_event(Duration::from_millis(10))
                    .unwrap()
                    .unwrap()
                    .value
            })
            .collect();
        assert_eq!(values, vec![11, 12, 13]);
    }
}
