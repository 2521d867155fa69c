//! `GET /sensors`: the sensor catalogue.

use axum::{routing::get, Json, Router};

use crate::models::{SensorId, SensorInfo};

/// Subrouter for `/sensors`, generic over the gateway state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/sensors", get(handler))
}

async fn handler() -> Json<Vec<SensorInfo>> {
    Json(SensorId::ALL.iter().map(|s| s.info()).collect())
}
