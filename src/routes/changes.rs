//! `GET /changes?day_offset=N`: counter deltas and flag active times for a day.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::changes::{get_changes_for_day, DailyChanges};
use crate::QueryError;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/changes", get(handler))
}

/// Query parameters for `/changes`; `day_offset` defaults to today.
#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    #[serde(default)]
    day_offset: u32,
}

async fn handler(
    Query(params): Query<ChangesQuery>,
    State((store, _config)): State<AppState>,
) -> Result<Json<DailyChanges>, QueryError> {
    // ---
    info!("GET /changes - {:?}", params);

    let now = Local::now();
    let changes = get_changes_for_day(store.as_ref(), params.day_offset, &now).await?;
    Ok(Json(changes))
}
