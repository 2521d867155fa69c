//! `GET /history/{page}`: data behind the history pages.
//!
//! Each page shows outdoor and room temperature extremes over its window
//! and links the four graphs the external renderer produces for it, named
//! `<metric>-<page>.png`.

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::Serialize;
use tracing::info;

use super::AppState;
use crate::aggregate::{get_min_max, MinMaxResult, Period, Window};
use crate::{QueryError, SensorId};

// ---

/// Graph metrics rendered for every history page.
const GRAPH_METRICS: [&str; 4] = ["aussentemp", "raumtemp", "kessel", "ww"];

/// History page and its aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPage {
    /// Since local midnight.
    Day,
    /// Trailing three days.
    Halfweek,
    /// Trailing seven days.
    Week,
    /// Since the 1st of the month.
    Month,
}

impl HistoryPage {
    pub fn window(self) -> Window {
        match self {
            HistoryPage::Day => Window::Period(Period::Day),
            HistoryPage::Halfweek => Window::Trailing { count: 3, unit: Period::Day },
            HistoryPage::Week => Window::Trailing { count: 1, unit: Period::Week },
            HistoryPage::Month => Window::Period(Period::Month),
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            HistoryPage::Day => "day",
            HistoryPage::Halfweek => "halfweek",
            HistoryPage::Week => "week",
            HistoryPage::Month => "month",
        }
    }

    /// Graph image paths for this page under `base`.
    pub fn graphs(self, base: &str) -> Vec<GraphImage> {
        let base = base.trim_end_matches('/');
        GRAPH_METRICS
            .into_iter()
            .map(|metric| GraphImage {
                metric,
                path: format!("{}/{}-{}.png", base, metric, self.slug()),
            })
            .collect()
    }
}

impl FromStr for HistoryPage {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(HistoryPage::Day),
            "halfweek" => Ok(HistoryPage::Halfweek),
            "week" => Ok(HistoryPage::Week),
            "month" => Ok(HistoryPage::Month),
            _ => Err(QueryError::UnknownPage(s.to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GraphImage {
    metric: &'static str,
    path: String,
}

#[derive(Serialize)]
struct HistoryResponse {
    page: HistoryPage,
    window: String,
    outdoor: MinMaxResult,
    room: MinMaxResult,
    graphs: Vec<GraphImage>,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/history/{page}", get(handler))
}

async fn handler(
    Path(page): Path<String>,
    State((store, config)): State<AppState>,
) -> Result<Json<HistoryResponse>, QueryError> {
    // ---
    info!("GET /history/{}", page);

    let page: HistoryPage = page.parse()?;
    let window = page.window();
    let now = Local::now();

    let (outdoor, room) = tokio::try_join!(
        get_min_max(store.as_ref(), SensorId::OutdoorTemp, &window, &now),
        get_min_max(store.as_ref(), SensorId::RoomActualTemp, &window, &now),
    )?;

    Ok(Json(HistoryResponse {
        page,
        window: window.to_string(),
        outdoor,
        room,
        graphs: page.graphs(&config.graph_base_path),
    }))
}
