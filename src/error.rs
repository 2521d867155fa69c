//! Error taxonomy for sensor queries.
//!
//! Empty windows and never-recorded sensors are not errors here: they are
//! represented in the result types themselves (`MinMaxResult` with no
//! extremes, `CurrentValue::Unknown`). What remains are validation failures
//! on the request side and an unreachable store.

use chrono::{DateTime, Utc};

use crate::models::{SensorId, SensorKind};

/// Result type for query and store operations.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors surfaced by the aggregation layer.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A request named a sensor outside the known set.
    #[error("unknown sensor: {0}")]
    UnknownSensorKey(String),

    /// A window specifier could not be parsed.
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// A history page outside the known set.
    #[error("unknown history page: {0}")]
    UnknownPage(String),

    /// A day offset reaches before the representable calendar.
    #[error("invalid day offset: {0}")]
    InvalidDayOffset(u32),

    /// Min/max was requested for a boolean or state sensor.
    #[error("sensor {0} is not numeric")]
    NotNumeric(SensorId),

    /// An ingested value does not match the sensor's kind.
    #[error("value for sensor {sensor} must be {expected}")]
    ValueKindMismatch { sensor: SensorId, expected: SensorKind },

    /// An ingested reading would break the per-sensor append order.
    #[error("reading for sensor {sensor} at {timestamp} is older than the latest stored reading")]
    OutOfOrder {
        sensor: SensorId,
        timestamp: DateTime<Utc>,
    },

    /// The backing store could not be reached or failed mid-query.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<sqlx::Error> for QueryError {
    fn from(e: sqlx::Error) -> Self {
        QueryError::StoreUnavailable(Box::new(e))
    }
}

impl QueryError {
    /// Whether the error was caused by the request rather than the store.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::StoreUnavailable(_))
    }
}
