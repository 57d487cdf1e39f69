//! The reader loop: forwards backend change notifications to the control loop.

use super::StateCell;
use crate::backend::Backend;
use crate::envelope::SensorEvent;
use crate::types::BrokerState;
use crossbeam_channel::{SendTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub(crate) struct ReaderLoop {
    state: Arc<StateCell>,
    backend: Arc<dyn Backend>,
    events: Sender<SensorEvent>,
    wait_timeout: Duration,
    /// Push timeout into a full event queue and backoff after backend errors.
    retry_interval: Duration,
}

impl ReaderLoop {
    pub fn new(
        state: Arc<StateCell>,
        backend: Arc<dyn Backend>,
        events: Sender<SensorEvent>,
        wait_timeout: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            state,
            backend,
            events,
            wait_timeout,
            retry_interval,
        }
    }

    fn is_active(&self) -> bool {
        self.state.load() == BrokerState::Active
    }

    pub fn run(self) {
        info!(timeout_ms = self.wait_timeout.as_millis() as u64, "reader loop started");
        while self.is_active() {
            let event = match self.backend.wait_event(self.wait_timeout) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, "waiting for backend event failed");
                    std::thread::sleep(self.retry_interval);
                    continue;
                }
            };

            if !self.is_active() {
                break;
            }
            if !event.sensor.is_assigned() {
                debug!(?event, "skipping event without sensor id");
                continue;
            }

            trace!(sensor = %event.sensor, value = event.value, "backend event");
            if !self.forward(event.into()) {
                break;
            }
        }
        info!("reader loop exited");
    }

    /// Push into the event queue, waiting while it is full and the broker
    /// is still active. Returns false if the loop should exit.
    fn forward(&self, event: SensorEvent) -> bool {
        let mut event = event;
        loop {
            match self.events.send_timeout(event, self.retry_interval) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !self.is_active() {
                        return false;
                    }
                    debug!(sensor = %returned.sensor, "event queue full, retrying");
                    event = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::types::SensorId;
    use crossbeam_channel::bounded;

    fn active_state() -> Arc<StateCell> {
        let state = Arc::new(StateCell::new());
        state.store(BrokerState::Active);
        state
    }

    #[test]
    fn test_forwards_events_until_stopped() {
        let backend = Arc::new(SimulatedBackend::new());
        backend.initialize(&[]).unwrap();
        let state = active_state();
        let (tx, rx) = bounded(8);

        let reader = ReaderLoop::new(
            Arc::clone(&state),
            backend.clone(),
            tx,
            Duration::from_millis(20),
            Duration::from_millis(5),
        );
        let thread = std::thread::spawn(move || reader.run());

        backend.inject(SensorId(10), 11);
        backend.inject(SensorId(10), 12);

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!((first.value, second.value), (11, 12));

        state.store(BrokerState::Terminating);
        thread.join().unwrap();
    }

    #[test]
    fn test_skips_events_without_sensor_id() {
        let backend = Arc::new(SimulatedBackend::new());
        backend.initialize(&[]).unwrap();
        let state = active_state();
        let (tx, rx) = bounded(8);

        let reader = ReaderLoop::new(
            Arc::clone(&state),
            backend.clone(),
            tx,
            Duration::from_millis(20),
            Duration::from_millis(5),
        );
        let thread = std::thread::spawn(move || reader.run());

        backend.inject(SensorId::UNASSIGNED, 5);
        backend.inject(SensorId(3), 6);

        let forwarded = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!((forwarded.sensor, forwarded.value), (SensorId(3), 6));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(backend.pending_events(), 0);

        state.store(BrokerState::Terminating);
        thread.join().unwrap();
    }

    #[test]
    fn test_full_queue_does_not_block_shutdown() {
        let backend = Arc::new(SimulatedBackend::new());
        backend.initialize(&[]).unwrap();
        let state = active_state();
        let (tx, rx) = bounded(1);

        let reader = ReaderLoop::new(
            Arc::clone(&state),
            backend.clone(),
            tx,
            Duration::from_millis(20),
            Duration::from_millis(5),
        );
        let thread = std::thread::spawn(move || reader.run());

        for value in 0..3 {
            backend.inject(SensorId(1), value);
        }
        // Nobody drains `rx`: the reader is stuck on a full queue.
        std::thread::sleep(Duration::from_millis(50));
        state.store(BrokerState::Terminating);
        thread.join().unwrap();

        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_backend_errors_are_retried() {
        // Never initialized: every wait fails.
        let backend = Arc::new(SimulatedBackend::new());
        let state = active_state();
        let (tx, _rx) = bounded(1);

        let reader = ReaderLoop::new(
            Arc::clone(&state),
            backend,
            tx,
            Duration::from_millis(20),
            Duration::from_millis(5),
        );
        let thread = std::thread::spawn(move || reader.run());

        std::thread::sleep(Duration::from_millis(30));
        assert!(!thread.is_finished());
        state.store(BrokerState::Terminating);
        thread.join().unwrap();
    }
}
