//! Daily change accumulation for counters and state flags.
//!
//! Counters (burner runtime, burner starts, ...) only ever grow, except when
//! the boiler controller resets them. A day's usage is the sum of the
//! positive steps between consecutive readings, so a reset contributes
//! nothing instead of a large negative delta.
//!
//! Flags have no counter of their own. Their active time is the sum of the
//! gaps between consecutive readings that start with the flag set.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

use crate::aggregate::local_midnight;
use crate::error::{QueryError, Result};
use crate::models::{SensorId, SensorReading};
use crate::store::{ReadingStore, TimeRange};

// ---

/// Flags whose active time is accumulated per day.
pub const ACTIVE_TIME_SENSORS: [SensorId; 3] = [
    SensorId::HotWaterPreparation,
    SensorId::Burner,
    SensorId::Circulation,
];

/// Counter sensors, in catalogue order.
pub fn counter_sensors() -> impl Iterator<Item = SensorId> {
    SensorId::ALL
        .iter()
        .copied()
        .filter(|sensor| sensor.info().is_counter())
}

/// Usage accumulated over one local day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyChanges {
    pub day: NaiveDate,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Clamped counter deltas, in the counter's own unit.
    pub counters: BTreeMap<SensorId, f64>,
    /// Seconds each flag was active.
    pub active_seconds: BTreeMap<SensorId, i64>,
}

/// Sum of non-negative steps between consecutive counter readings.
pub fn counter_delta(readings: &[SensorReading]) -> f64 {
    readings
        .windows(2)
        .filter_map(|pair| {
            let prev = pair[0].value.as_f64()?;
            let next = pair[1].value.as_f64()?;
            Some((next - prev).max(0.0))
        })
        .filter(|step| step.is_finite())
        .sum()
}

/// Seconds covered by reading pairs whose first reading has the flag set.
pub fn active_seconds(readings: &[SensorReading]) -> i64 {
    readings
        .windows(2)
        .filter(|pair| pair[0].value.as_bool() == Some(true))
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_seconds().max(0))
        .sum()
}

/// Counter deltas and flag active times for the day `day_offset` days
/// before today (0 = today, still in progress).
pub async fn get_changes_for_day<S, Tz>(
    store: &S,
    day_offset: u32,
    now: &DateTime<Tz>,
) -> Result<DailyChanges>
where
    S: ReadingStore + ?Sized,
    Tz: TimeZone,
{
    // ---
    let day = now
        .date_naive()
        .checked_sub_days(Days::new(u64::from(day_offset)))
        .ok_or(QueryError::InvalidDayOffset(day_offset))?;
    let next_day = day
        .checked_add_days(Days::new(1))
        .ok_or(QueryError::InvalidDayOffset(day_offset))?;

    let tz = now.timezone();
    let range = TimeRange::half_open(local_midnight(&tz, day), local_midnight(&tz, next_day));

    let mut counters = BTreeMap::new();
    for sensor in counter_sensors() {
        let readings = store.readings_in(sensor, range).await?;
        counters.insert(sensor, counter_delta(&readings));
    }

    let mut active = BTreeMap::new();
    for sensor in ACTIVE_TIME_SENSORS {
        let readings = store.readings_in(sensor, range).await?;
        active.insert(sensor, active_seconds(&readings));
    }

    debug!("Changes for {} (offset {}): {:?}", day, day_offset, counters);

    Ok(DailyChanges {
        day,
        window_start: range.start,
        window_end: range.end,
        counters,
        active_seconds: active,
    })
}
