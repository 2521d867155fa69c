//! `GET /status`: live snapshot of every sensor plus derived flags.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::info;

use super::AppState;
use crate::snapshot::{get_current_values, DerivedStatus, Snapshot};
use crate::QueryError;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/status", get(handler))
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    snapshot: Snapshot,
    status: DerivedStatus,
    /// Spread between the oldest and newest reading in the snapshot.
    skew_seconds: Option<i64>,
}

async fn handler(State((store, _config)): State<AppState>) -> Result<Json<StatusResponse>, QueryError> {
    // ---
    info!("GET /status");

    let snapshot = get_current_values(store.as_ref()).await?;
    let status = snapshot.status();
    let skew_seconds = snapshot.skew().map(|d| d.num_seconds());

    Ok(Json(StatusResponse {
        snapshot,
        status,
        skew_seconds,
    }))
}
