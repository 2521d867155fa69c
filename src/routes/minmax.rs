//! `GET /minmax`: min/max of one sensor over a window.
//!
//! Exactly one of `period` (calendar aligned) or `interval` (trailing) must
//! be given, e.g. `/minmax?sensor=outdoor_temp&period=day` or
//! `/minmax?sensor=room_actual_temp&interval=3%20day`.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::aggregate::{get_min_max, MinMaxResult, Window};
use crate::{QueryError, SensorId};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/minmax", get(handler))
}

/// Query parameters for `/minmax`.
#[derive(Debug, Deserialize)]
pub struct MinMaxQuery {
    sensor: String,
    period: Option<String>,
    interval: Option<String>,
}

impl MinMaxQuery {
    fn window(&self) -> Result<Window, QueryError> {
        match (&self.period, &self.interval) {
            (Some(period), None) => Window::parse_period(period),
            (None, Some(interval)) => Window::parse_interval(interval),
            _ => Err(QueryError::InvalidWindow(
                "exactly one of `period` or `interval` is required".to_string(),
            )),
        }
    }
}

async fn handler(
    Query(params): Query<MinMaxQuery>,
    State((store, _config)): State<AppState>,
) -> Result<Json<MinMaxResult>, QueryError> {
    // ---
    info!("GET /minmax - {:?}", params);

    let sensor: SensorId = params.sensor.parse()?;
    let window = params.window()?;
    let now = Local::now();

    let result = get_min_max(store.as_ref(), sensor, &window, &now).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::aggregate::Period;

    fn query(period: Option<&str>, interval: Option<&str>) -> MinMaxQuery {
        MinMaxQuery {
            sensor: "outdoor_temp".to_string(),
            period: period.map(String::from),
            interval: interval.map(String::from),
        }
    }

    #[test]
    fn test_window_selection() {
        // ---
        assert_eq!(
            query(Some("month"), None).window().unwrap(),
            Window::Period(Period::Month)
        );
        assert_eq!(
            query(None, Some("3 day")).window().unwrap(),
            Window::Trailing { count: 3, unit: Period::Day }
        );
        assert!(query(None, None).window().is_err());
        assert!(query(Some("day"), Some("3 day")).window().is_err());
    }
}
