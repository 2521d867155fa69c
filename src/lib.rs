//! Read-side aggregation for heating system sensor readings.
//!
//! The collector appends readings for a closed set of boiler, hot-water and
//! room sensors. This crate answers the questions the status pages ask of
//! that log:
//! - [`snapshot`]: latest value per sensor and the status derived from it
//! - [`aggregate`]: min/max of a sensor over a calendar or trailing window
//! - [`changes`]: per-day counter deltas and flag active times
//!
//! All of them read through the [`ReadingStore`] trait; [`routes`] exposes
//! them over HTTP.

pub mod aggregate;
pub mod changes;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;
pub mod snapshot;
pub mod store;

pub use config::Config;
pub use error::{QueryError, Result};
pub use models::{RawSensorReading, SensorId, SensorKind, SensorReading, SensorValue};
pub use store::{MemoryStore, PgStore, ReadingStore, TimeRange};
