//! Database schema management for `ems-status`.
//!
//! Ensures the sensor catalogue and the three reading tables exist before
//! serving requests. Applied once on startup from `main.rs` (EMBP: single
//! gateway call).

use anyhow::Result;
use sqlx::PgPool;

use crate::models::SensorId;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `sensors` catalogue (seeded from [`SensorId::ALL`]) and one
/// reading table per value kind. Safe to call on every startup; existing
/// objects and catalogue rows are left untouched.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            id            SMALLINT PRIMARY KEY,
            key           TEXT     NOT NULL UNIQUE,
            value_type    TEXT     NOT NULL,
            name          TEXT     NOT NULL,
            reading_type  TEXT     NOT NULL,
            unit          TEXT     NOT NULL,
            precision     SMALLINT NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    for (table, value_type) in [
        ("numeric_data", "DOUBLE PRECISION"),
        ("boolean_data", "BOOLEAN"),
        ("state_data", "TEXT"),
    ] {
        // Append-only reading log; (sensor, recorded_at) serves both range
        // scans and latest-value lookups.
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id           BIGSERIAL   PRIMARY KEY,
                sensor       SMALLINT    NOT NULL,
                value        {value_type} NOT NULL,
                recorded_at  TIMESTAMPTZ NOT NULL
            );
            "#
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE INDEX IF NOT EXISTS idx_{table}_sensor_recorded_at
                ON {table} (sensor, recorded_at);
            "#
        ))
        .execute(&mut *tx)
        .await?;
    }

    for sensor in SensorId::ALL {
        let info = sensor.info();
        sqlx::query(
            r#"
            INSERT INTO sensors (id, key, value_type, name, reading_type, unit, precision)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(info.db_id)
        .bind(sensor.key())
        .bind(info.kind.to_string())
        .bind(info.name)
        .bind(format!("{:?}", info.reading_type))
        .bind(info.unit)
        .bind(i16::from(info.precision))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
