//! The control loop: single owner of the registry and object table.

use super::{Query, StateCell};
use crate::backend::Backend;
use crate::delivery::{self, Delivery};
use crate::envelope::{
    ActivateNotification, AskCommand, Envelope, FinishNotification, SensorEvent, SetValueCommand,
};
use crate::object::ObjectHandle;
use crate::registry::{ObjectTable, PendingCommand, SubscriberRegistry};
use crate::types::{BrokerState, SensorId};
use crossbeam_channel::{Receiver, Select};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Work found by one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PassReport {
    pub registrations: usize,
    pub events: usize,
    pub commands: usize,
    pub queries: usize,
}

impl PassReport {
    pub fn is_idle(&self) -> bool {
        self.registrations + self.events + self.commands + self.queries == 0
    }
}

pub(crate) struct ControlLoop {
    state: Arc<StateCell>,
    backend: Arc<dyn Backend>,
    registrations: Receiver<ObjectHandle>,
    events: Receiver<SensorEvent>,
    queries: Receiver<Query>,
    idle_interval: Duration,
    /// Cap on events fanned out per pass, so commands are never starved.
    max_events_per_pass: usize,
    objects: ObjectTable,
    registry: SubscriberRegistry,
}

impl ControlLoop {
    pub fn new(
        state: Arc<StateCell>,
        backend: Arc<dyn Backend>,
        registrations: Receiver<ObjectHandle>,
        events: Receiver<SensorEvent>,
        queries: Receiver<Query>,
        idle_interval: Duration,
        max_events_per_pass: usize,
    ) -> Self {
        Self {
            state,
            backend,
            registrations,
            events,
            queries,
            idle_interval,
            max_events_per_pass: max_events_per_pass.max(1),
            objects: ObjectTable::new(),
            registry: SubscriberRegistry::new(),
        }
    }

    /// Run passes until the broker leaves the Active state, then notify
    /// and release every registered object.
    pub fn run(mut self) {
        info!("control loop started");
        while self.state.load() == BrokerState::Active {
            if self.run_pass().is_idle() {
                self.wait_idle();
            }
        }
        self.finish();
        info!("control loop exited");
    }

    pub fn run_pass(&mut self) -> PassReport {
        PassReport {
            registrations: self.drain_registrations(),
            events: self.drain_events(),
            commands: self.poll_commands(),
            queries: self.answer_queries(),
        }
    }

    fn drain_registrations(&mut self) -> usize {
        let pending: Vec<ObjectHandle> = self.registrations.try_iter().collect();
        for handle in &pending {
            let id = handle.id();
            if self.objects.insert(handle.clone()) {
                debug!(object = %id, "object registered");
            } else if !self.objects.get(id).is_some_and(|h| h.same_object(handle)) {
                warn!(object = %id, "object id already registered; keeping the first handle");
            }

            let activate = ActivateNotification { object: id };
            if let Delivery::Dropped(reason) = delivery::send(handle, activate.into()) {
                warn!(object = %id, ?reason, "activation notification dropped");
            }
        }
        pending.len()
    }

    fn drain_events(&mut self) -> usize {
        let pending: Vec<SensorEvent> = self
            .events
            .try_iter()
            .take(self.max_events_per_pass)
            .collect();
        for event in &pending {
            let Some(subscribers) = self.registry.lookup(event.sensor) else {
                trace!(sensor = %event.sensor, "no subscribers");
                continue;
            };
            let tally = delivery::fan_out(subscribers, &Envelope::SensorEvent(event.clone()));
            trace!(
                sensor = %event.sensor,
                value = event.value,
                delivered = tally.delivered,
                dropped = tally.dropped,
                "event fanned out"
            );
        }
        pending.len()
    }

    fn poll_commands(&mut self) -> usize {
        let pending = self.objects.poll_commands();
        let count = pending.len();
        for PendingCommand { from, command } in pending {
            let reply = match command {
                Envelope::AskCommand(ask) => self.ask_sensor(&from, ask.sensor),
                Envelope::SetValueCommand(set) => self.set_value(&from, set),
                other => {
                    debug!(object = %from.id(), kind = ?other.kind(), "ignoring non-command envelope");
                    continue;
                }
            };
            if let Delivery::Dropped(reason) = delivery::send(&from, reply) {
                debug!(object = %from.id(), ?reason, "command reply dropped");
            }
        }
        count
    }

    /// Subscribe with the backend first, then record the subscriber, then
    /// acknowledge with the current value.
    fn ask_sensor(&mut self, from: &ObjectHandle, sensor: SensorId) -> Envelope {
        if let Err(err) = self.backend.ask_sensor(sensor) {
            warn!(object = %from.id(), sensor = %sensor, error = %err, "ask sensor failed");
            return AskCommand {
                sensor,
                result: false,
            }
            .into();
        }

        if self.registry.subscribe(sensor, from.clone()) {
            debug!(object = %from.id(), sensor = %sensor, "subscribed");
        }

        match self.backend.current_value(sensor) {
            Ok(value) => SensorEvent::new(sensor, value).into(),
            Err(err) => {
                warn!(sensor = %sensor, error = %err, "subscribed but current value unavailable");
                AskCommand {
                    sensor,
                    result: true,
                }
                .into()
            }
        }
    }

    fn set_value(&mut self, from: &ObjectHandle, command: SetValueCommand) -> Envelope {
        let result = match self.backend.set_value(command.sensor, command.value) {
            Ok(()) => true,
            Err(err) => {
                warn!(object = %from.id(), sensor = %command.sensor, error = %err, "set value failed");
                false
            }
        };
        SetValueCommand { result, ..command }.into()
    }

    fn answer_queries(&mut self) -> usize {
        let pending: Vec<Query> = self.queries.try_iter().collect();
        for query in &pending {
            query.answer(&self.registry, &self.objects);
        }
        pending.len()
    }

    /// Sleep at most `idle_interval`, waking as soon as any queue is ready.
    fn wait_idle(&self) {
        let mut select = Select::new();
        select.recv(&self.registrations);
        select.recv(&self.events);
        select.recv(&self.queries);
        for handle in self.objects.live() {
            select.recv(handle.commands());
        }
        let _ = select.ready_timeout(self.idle_interval);
    }

    /// Best-effort FinishNotification to every object, then release them.
    fn finish(&mut self) {
        let handles = self.objects.drain();
        let mut notified = 0;
        for handle in &handles {
            if delivery::send(handle, FinishNotification::default().into()).is_delivered() {
                notified += 1;
            }
        }
        self.registry.clear();
        drop(handles);

        // Queries arriving during shutdown see the released state.
        self.answer_queries();

        info!(objects = notified, "objects notified of shutdown");
    }
}
