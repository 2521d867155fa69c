//! Snapshot of the latest value per sensor.
//!
//! The snapshot is assembled from independent per-sensor lookups. Values of
//! different sensors may come from different acquisition cycles; use
//! [`Snapshot::skew`] to see how far apart they are before trusting a status
//! derived from several flags.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::models::{SensorId, SensorReading, SensorValue};
use crate::store::ReadingStore;

// ---

/// Latest known value of one sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CurrentValue {
    Known {
        value: SensorValue,
        timestamp: DateTime<Utc>,
    },
    /// The sensor has never been recorded.
    Unknown,
}

/// What the burner is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnerState {
    Off,
    Heating,
    HotWater,
}

/// Status flags combined from several raw sensors.
///
/// A field is `None` when its known inputs do not determine it, e.g. the
/// burner is on but the hot-water flag was never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedStatus {
    pub heating_pump: Option<bool>,
    pub burner: Option<BurnerState>,
    pub hot_water_pump: Option<bool>,
    pub circulation_pump: Option<bool>,
    pub hot_water_priority: Option<bool>,
    pub summer_mode: Option<bool>,
    pub automatic_mode: Option<bool>,
    pub day_mode: Option<bool>,
}

static UNKNOWN: CurrentValue = CurrentValue::Unknown;

/// Read-only view of the latest value of every sensor.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub values: BTreeMap<SensorId, CurrentValue>,
}

impl Snapshot {
    /// Build a snapshot from latest readings; sensors missing from
    /// `readings` are marked unknown.
    pub fn from_readings<I>(taken_at: DateTime<Utc>, readings: I) -> Self
    where
        I: IntoIterator<Item = SensorReading>,
    {
        // ---
        let mut values: BTreeMap<SensorId, CurrentValue> = SensorId::ALL
            .iter()
            .map(|sensor| (*sensor, CurrentValue::Unknown))
            .collect();

        for reading in readings {
            values.insert(
                reading.sensor,
                CurrentValue::Known {
                    value: reading.value,
                    timestamp: reading.timestamp,
                },
            );
        }

        Self { taken_at, values }
    }

    pub fn get(&self, sensor: SensorId) -> &CurrentValue {
        self.values.get(&sensor).unwrap_or(&UNKNOWN)
    }

    pub fn numeric(&self, sensor: SensorId) -> Option<f64> {
        match self.get(sensor) {
            CurrentValue::Known { value, .. } => value.as_f64(),
            CurrentValue::Unknown => None,
        }
    }

    pub fn flag(&self, sensor: SensorId) -> Option<bool> {
        match self.get(sensor) {
            CurrentValue::Known { value, .. } => value.as_bool(),
            CurrentValue::Unknown => None,
        }
    }

    /// Spread between the oldest and newest known reading.
    pub fn skew(&self) -> Option<Duration> {
        // ---
        let mut timestamps = self.values.values().filter_map(|v| match v {
            CurrentValue::Known { timestamp, .. } => Some(*timestamp),
            CurrentValue::Unknown => None,
        });

        let first = timestamps.next()?;
        let (oldest, newest) = timestamps.fold((first, first), |(lo, hi), ts| {
            (lo.min(ts), hi.max(ts))
        });
        Some(newest - oldest)
    }

    /// Status as shown on the live status page.
    pub fn status(&self) -> DerivedStatus {
        // ---
        let pump = self.flag(SensorId::BoilerPump);
        let valve_on_hot_water = self.flag(SensorId::ThreeWayValveHotWater);

        let burner = match (
            self.flag(SensorId::Burner),
            self.flag(SensorId::HotWaterPreparation),
        ) {
            (Some(false), _) => Some(BurnerState::Off),
            (Some(true), Some(true)) => Some(BurnerState::HotWater),
            (Some(true), Some(false)) => Some(BurnerState::Heating),
            _ => None,
        };

        DerivedStatus {
            heating_pump: both(pump, valve_on_hot_water.map(|v| !v)),
            burner,
            hot_water_pump: both(pump, valve_on_hot_water),
            circulation_pump: self.flag(SensorId::Circulation),
            hot_water_priority: self.flag(SensorId::HotWaterPriority),
            summer_mode: self.flag(SensorId::SummerMode),
            automatic_mode: self.flag(SensorId::Hk1Automatic),
            day_mode: self.flag(SensorId::Hk1DayMode),
        }
    }
}

/// Three-valued AND: a known `false` on either side decides the result.
fn both(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// Latest value of every sensor as of now.
pub async fn get_current_values<S>(store: &S) -> Result<Snapshot>
where
    S: ReadingStore + ?Sized,
{
    // ---
    let readings = store.latest_all().await?;
    debug!("Snapshot built from {} sensors", readings.len());
    Ok(Snapshot::from_readings(Utc::now(), readings))
}
