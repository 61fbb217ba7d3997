//! httpq HTTP application wiring.
//!
//! Builds the Axum router and defines the shared state injected into
//! handlers. Keeping route composition here keeps `main` small and testable.
use crate::api;
use axum::Router;
use httpq_broker::Broker;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    // Applied to every publish and consume.
    pub wait_timeout: Duration,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    // `/stats` is matched before the topic capture, so no topic can be named
    // "stats".
    Router::new()
        .route("/stats", axum::routing::get(api::stats::stats))
        .route(
            "/:topic",
            axum::routing::get(api::topics::consume).post(api::topics::publish),
        )
        .layer(trace_layer)
        .with_state(state)
}
