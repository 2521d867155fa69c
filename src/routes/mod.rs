//! HTTP routes gateway.
//!
//! Each sibling module exports a subrouter; this gateway merges them and
//! attaches the shared state, so `main.rs` only needs [`router`].

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::{Config, QueryError, ReadingStore};

mod changes;
mod health;
mod history;
mod minmax;
mod readings;
mod sensors;
mod status;

// ---

/// Shared handler state: the reading store and the loaded configuration.
pub type AppState = (Arc<dyn ReadingStore>, Config);

pub fn router(store: Arc<dyn ReadingStore>, config: Config) -> Router {
    // ---
    Router::new()
        .merge(status::router())
        .merge(minmax::router())
        .merge(changes::router())
        .merge(history::router())
        .merge(sensors::router())
        .merge(readings::router())
        .merge(health::router())
        .with_state((store, config))
}

/// JSON error body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        // ---
        if self.is_client_error() {
            warn!("Rejected request: {}", self);
            let status = match self {
                QueryError::UnknownPage(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            let body = ErrorResponse {
                error: self.to_string(),
            };
            return (status, Json(body)).into_response();
        }

        // Store failures get a generic body; details stay in the log
        error!("Query failed: {}", self);
        let body = ErrorResponse {
            error: "sensor store unavailable".to_string(),
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}
