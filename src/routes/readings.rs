//! `POST /readings`: append readings from the collector.
//!
//! The body is a JSON array of readings. The batch is stored all or nothing:
//! a value of the wrong kind or a reading that would go back in time rejects
//! the whole batch and nothing is written.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::AppState;
use crate::{QueryError, RawSensorReading, SensorReading};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/readings", post(handler))
}

#[derive(Serialize)]
struct IngestResponse {
    stored: usize,
}

async fn handler(
    State((store, _config)): State<AppState>,
    Json(raw): Json<Vec<RawSensorReading>>,
) -> Result<(StatusCode, Json<IngestResponse>), QueryError> {
    // ---
    info!("POST /readings - {} readings", raw.len());

    let now = Utc::now();
    let readings = raw
        .iter()
        .map(|r| r.to_reading(now))
        .collect::<Result<Vec<SensorReading>, _>>()?;

    store.append_batch(&readings).await?;
    debug!("Stored {} readings", readings.len());

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            stored: readings.len(),
        }),
    ))
}
