//! In-process reading store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{QueryError, Result};
use crate::models::{SensorId, SensorReading};

use super::{check_append_order, ReadingStore, TimeRange};

/// Reading log held in memory, one ordered vector per sensor.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<HashMap<SensorId, Vec<SensorReading>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from readings, appending them in the given order.
    pub fn with_readings<I>(readings: I) -> Result<Self>
    where
        I: IntoIterator<Item = SensorReading>,
    {
        let store = Self::new();
        for reading in readings {
            store.push(reading)?;
        }
        Ok(store)
    }

    fn push(&self, reading: SensorReading) -> Result<()> {
        let mut map = self.readings.write().map_err(|_| poisoned())?;
        let log = map.entry(reading.sensor).or_default();

        if let Some(last) = log.last() {
            if last.timestamp > reading.timestamp {
                return Err(QueryError::OutOfOrder {
                    sensor: reading.sensor,
                    timestamp: reading.timestamp,
                });
            }
        }

        log.push(reading);
        Ok(())
    }
}

fn poisoned() -> QueryError {
    QueryError::StoreUnavailable("memory store lock poisoned".into())
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn readings_in(&self, sensor: SensorId, range: TimeRange) -> Result<Vec<SensorReading>> {
        let map = self.readings.read().map_err(|_| poisoned())?;
        let Some(log) = map.get(&sensor) else {
            return Ok(Vec::new());
        };

        let first = log.partition_point(|r| r.timestamp < range.start);
        Ok(log[first..]
            .iter()
            .take_while(|r| range.contains(r.timestamp))
            .cloned()
            .collect())
    }

    async fn latest(&self, sensor: SensorId) -> Result<Option<SensorReading>> {
        let map = self.readings.read().map_err(|_| poisoned())?;
        Ok(map.get(&sensor).and_then(|log| log.last().cloned()))
    }

    async fn append(&self, reading: &SensorReading) -> Result<()> {
        self.push(reading.clone())
    }

    async fn append_batch(&self, readings: &[SensorReading]) -> Result<()> {
        let mut map = self.readings.write().map_err(|_| poisoned())?;
        check_append_order(readings, |sensor| {
            map.get(&sensor).and_then(|log| log.last()).map(|r| r.timestamp)
        })?;

        for reading in readings {
            map.entry(reading.sensor).or_default().push(reading.clone());
        }
        Ok(())
    }
}
