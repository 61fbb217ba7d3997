//! Traffic counters endpoint.
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use httpq_broker::StatsSnapshot;

/// `GET /stats`: current byte and failure counters.
pub(crate) async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.broker.stats())
}
