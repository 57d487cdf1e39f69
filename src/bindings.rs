//! Consumer-side bindings between sensor ids and last known values.
//!
//! A consumer typically binds each of its inputs to a sensor, asks for all of
//! them once activated, and then feeds every incoming [`SensorEvent`] to
//! [`SensorBindings::apply`].

use crate::envelope::SensorEvent;
use crate::types::SensorId;
use std::collections::HashMap;

/// Last known value of one sensor, plus the value at the last `commit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorValue {
    sensor: SensorId,
    value: i64,
    prev: i64,
}

impl SensorValue {
    pub fn new(sensor: SensorId, initial: i64) -> Self {
        Self {
            sensor,
            value: initial,
            prev: initial,
        }
    }

    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn as_bool(&self) -> bool {
        self.value != 0
    }

    /// Take the value from `event` if it concerns this sensor.
    pub fn apply(&mut self, event: &SensorEvent) -> bool {
        if event.sensor != self.sensor {
            return false;
        }
        self.value = event.value;
        true
    }

    /// Whether the value moved since the last `commit`.
    pub fn changed(&self) -> bool {
        self.value != self.prev
    }

    pub fn commit(&mut self) {
        self.prev = self.value;
    }
}

/// Sensor values a consumer tracks, keyed by sensor id.
#[derive(Clone, Debug, Default)]
pub struct SensorBindings {
    values: HashMap<SensorId, SensorValue>,
}

impl SensorBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `sensor`; rebinding keeps the current value.
    pub fn bind(&mut self, sensor: SensorId, initial: i64) -> &mut SensorValue {
        self.values
            .entry(sensor)
            .or_insert_with(|| SensorValue::new(sensor, initial))
    }

    pub fn get(&self, sensor: SensorId) -> Option<&SensorValue> {
        self.values.get(&sensor)
    }

    /// Sorted ids of every bound sensor.
    pub fn sensors(&self) -> Vec<SensorId> {
        let mut ids: Vec<SensorId> = self.values.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Route `event` to its binding; `None` if the sensor is not bound.
    pub fn apply(&mut self, event: &SensorEvent) -> Option<&SensorValue> {
        let binding = self.values.get_mut(&event.sensor)?;
        binding.apply(event);
        Some(&*binding)
    }

    /// Bindings whose value moved since their last commit.
    pub fn changed(&self) -> impl Iterator<Item = &SensorValue> {
        self.values.values().filter(|v| v.changed())
    }

    pub fn commit_all(&mut self) {
        self.values.values_mut().for_each(SensorValue::commit);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
