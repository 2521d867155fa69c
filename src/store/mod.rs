//! Time-series store abstraction.
//!
//! The aggregation layer only ever reads through [`ReadingStore`]. Two
//! implementations live here: [`PgStore`] over the collector's Postgres
//! tables and [`MemoryStore`] for tests and embedding.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{QueryError, Result};
use crate::models::{SensorId, SensorReading};

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

// ---

/// Time range for store queries. The start is always inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub include_end: bool,
}

impl TimeRange {
    /// `[start, end]`
    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            include_end: true,
        }
    }

    /// `[start, end)`
    pub fn half_open(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            include_end: false,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && (ts < self.end || (self.include_end && ts == self.end))
    }
}

/// Append-only per-sensor reading log.
///
/// Readings are returned in ascending timestamp order; readings sharing a
/// timestamp keep their insertion order.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// All readings of `sensor` inside `range`, oldest first.
    async fn readings_in(&self, sensor: SensorId, range: TimeRange) -> Result<Vec<SensorReading>>;

    /// The most recent reading of `sensor`, if it was ever recorded.
    async fn latest(&self, sensor: SensorId) -> Result<Option<SensorReading>>;

    /// The most recent reading of every sensor that has one.
    ///
    /// Each entry is looked up independently; the result is not an atomic
    /// cross-sensor snapshot.
    async fn latest_all(&self) -> Result<Vec<SensorReading>> {
        // ---
        let mut readings = Vec::new();
        for sensor in SensorId::ALL {
            if let Some(reading) = self.latest(*sensor).await? {
                readings.push(reading);
            }
        }
        Ok(readings)
    }

    /// Append a reading. Fails with `OutOfOrder` if the sensor already has a
    /// later reading.
    async fn append(&self, reading: &SensorReading) -> Result<()>;

    /// Append a batch, or nothing if any reading would be out of order.
    ///
    /// The default checks the batch against [`latest`](Self::latest) before
    /// writing. It is only atomic when no other writer touches the same
    /// sensors; stores that can lock override it.
    async fn append_batch(&self, readings: &[SensorReading]) -> Result<()> {
        // ---
        let mut latest = HashMap::new();
        for reading in readings {
            if !latest.contains_key(&reading.sensor) {
                let ts = self.latest(reading.sensor).await?.map(|r| r.timestamp);
                latest.insert(reading.sensor, ts);
            }
        }

        check_append_order(readings, |sensor| latest.get(&sensor).copied().flatten())?;

        for reading in readings {
            self.append(reading).await?;
        }
        Ok(())
    }
}

/// Check that `batch` keeps every sensor's log in order: per sensor the
/// timestamps never decrease, starting from `latest(sensor)`.
pub(crate) fn check_append_order<F>(batch: &[SensorReading], mut latest: F) -> Result<()>
where
    F: FnMut(SensorId) -> Option<DateTime<Utc>>,
{
    // ---
    let mut last_seen: HashMap<SensorId, Option<DateTime<Utc>>> = HashMap::new();

    for reading in batch {
        let last = last_seen
            .entry(reading.sensor)
            .or_insert_with(|| latest(reading.sensor));

        if last.is_some_and(|ts| ts > reading.timestamp) {
            return Err(QueryError::OutOfOrder {
                sensor: reading.sensor,
                timestamp: reading.timestamp,
            });
        }
        *last = Some(reading.timestamp);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_range_bounds() {
        // ---
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 2, 0, 0, 0).unwrap();

        let closed = TimeRange::closed(start, end);
        assert!(closed.contains(start));
        assert!(closed.contains(end));

        let half_open = TimeRange::half_open(start, end);
        assert!(half_open.contains(start));
        assert!(!half_open.contains(end));
        assert!(!half_open.contains(start - chrono::Duration::seconds(1)));
    }

    fn starts(ts: DateTime<Utc>, v: f64) -> SensorReading {
        SensorReading {
            sensor: SensorId::BurnerStarts,
            timestamp: ts,
            value: crate::models::SensorValue::Numeric(v),
        }
    }

    #[test]
    fn test_append_order_within_batch() {
        // ---
        let t0 = Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::minutes(5);

        let batch = [starts(t0, 1.0), starts(t0, 1.0), starts(t1, 2.0)];
        assert!(check_append_order(&batch, |_| None).is_ok());

        let err = check_append_order(&[starts(t1, 2.0), starts(t0, 1.0)], |_| None).unwrap_err();
        assert!(matches!(err, QueryError::OutOfOrder { timestamp, .. } if timestamp == t0));

        // Against the stored log
        assert!(check_append_order(&[starts(t0, 1.0)], |_| Some(t1)).is_err());
        assert!(check_append_order(&[starts(t1, 1.0)], |_| Some(t1)).is_ok());
    }
}
