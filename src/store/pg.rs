//! Postgres-backed reading store.
//!
//! Readings are split by value kind into `numeric_data`, `boolean_data` and
//! `state_data` (see `schema.rs`). The `sensor` column carries the
//! collector's numeric sensor id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, warn};

use crate::error::{QueryError, Result};
use crate::models::{SensorId, SensorKind, SensorReading, SensorValue};

use super::{ReadingStore, TimeRange};

// ---

/// First key of the advisory locks taken while appending ("EMS").
const APPEND_LOCK_CLASS: i32 = 0x0045_4d53;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn table_for(kind: SensorKind) -> &'static str {
    match kind {
        SensorKind::Numeric => "numeric_data",
        SensorKind::Boolean => "boolean_data",
        SensorKind::State => "state_data",
    }
}

fn decode_value(kind: SensorKind, row: &PgRow) -> std::result::Result<SensorValue, sqlx::Error> {
    // ---
    Ok(match kind {
        SensorKind::Numeric => SensorValue::Numeric(row.try_get("value")?),
        SensorKind::Boolean => SensorValue::Boolean(row.try_get("value")?),
        SensorKind::State => SensorValue::State(row.try_get("value")?),
    })
}

fn decode_reading(sensor: SensorId, row: &PgRow) -> std::result::Result<SensorReading, sqlx::Error> {
    // ---
    Ok(SensorReading {
        sensor,
        timestamp: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
        value: decode_value(sensor.kind(), row)?,
    })
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn readings_in(&self, sensor: SensorId, range: TimeRange) -> Result<Vec<SensorReading>> {
        // ---
        let end_op = if range.include_end { "<=" } else { "<" };
        let sql = format!(
            "SELECT recorded_at, value FROM {} \
             WHERE sensor = $1 AND recorded_at >= $2 AND recorded_at {} $3 \
             ORDER BY recorded_at ASC, id ASC",
            table_for(sensor.kind()),
            end_op
        );

        debug!("Range query for {}: {} .. {}", sensor, range.start, range.end);

        let rows = sqlx::query(&sql)
            .bind(sensor.info().db_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;

        let readings = rows
            .iter()
            .map(|row| decode_reading(sensor, row))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    async fn latest(&self, sensor: SensorId) -> Result<Option<SensorReading>> {
        // ---
        let sql = format!(
            "SELECT recorded_at, value FROM {} WHERE sensor = $1 \
             ORDER BY recorded_at DESC, id DESC LIMIT 1",
            table_for(sensor.kind())
        );

        let row = sqlx::query(&sql)
            .bind(sensor.info().db_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| decode_reading(sensor, &row)).transpose()?)
    }

    async fn latest_all(&self) -> Result<Vec<SensorReading>> {
        // ---
        let mut readings = Vec::new();

        for kind in [SensorKind::Numeric, SensorKind::Boolean, SensorKind::State] {
            let sql = format!(
                "SELECT DISTINCT ON (sensor) sensor, recorded_at, value FROM {} \
                 ORDER BY sensor, recorded_at DESC, id DESC",
                table_for(kind)
            );
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

            for row in &rows {
                let db_id: i16 = row.try_get("sensor")?;
                match SensorId::from_db_id(db_id) {
                    Some(sensor) if sensor.kind() == kind => {
                        readings.push(decode_reading(sensor, row)?);
                    }
                    _ => warn!("Ignoring unknown sensor id {} in {}", db_id, table_for(kind)),
                }
            }
        }

        Ok(readings)
    }

    async fn append(&self, reading: &SensorReading) -> Result<()> {
        self.append_batch(std::slice::from_ref(reading)).await
    }

    /// Appends the batch in one transaction.
    ///
    /// Each touched sensor is locked with a transaction-scoped advisory lock
    /// before its order check, so concurrent writers to the same sensor are
    /// serialized. Sensors are locked in id order to avoid deadlocks.
    async fn append_batch(&self, readings: &[SensorReading]) -> Result<()> {
        // ---
        let mut sensors: Vec<i16> = readings.iter().map(|r| r.sensor.info().db_id).collect();
        sensors.sort_unstable();
        sensors.dedup();

        let mut tx = self.pool.begin().await?;

        for db_id in &sensors {
            sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
                .bind(APPEND_LOCK_CLASS)
                .bind(i32::from(*db_id))
                .execute(&mut *tx)
                .await?;
        }

        for reading in readings {
            let sql = format!(
                "INSERT INTO {table} (sensor, value, recorded_at) \
                 SELECT $1, $2, $3 \
                 WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE sensor = $1 AND recorded_at > $3)",
                table = table_for(reading.sensor.kind())
            );

            let query = sqlx::query(&sql).bind(reading.sensor.info().db_id);
            let query = match &reading.value {
                SensorValue::Numeric(v) => query.bind(*v),
                SensorValue::Boolean(v) => query.bind(*v),
                SensorValue::State(v) => query.bind(v.clone()),
            };

            let result = query.bind(reading.timestamp).execute(&mut *tx).await?;

            // Dropping the transaction rolls back the readings already inserted
            if result.rows_affected() == 0 {
                return Err(QueryError::OutOfOrder {
                    sensor: reading.sensor,
                    timestamp: reading.timestamp,
                });
            }
        }

        tx.commit().await?;
        debug!("Appended {} readings for {} sensors", readings.len(), sensors.len());
        Ok(())
    }
}
