//! Tracing and metrics setup for the httpq service.
//! Installs a tracing subscriber (env filter + fmt layer) and a Prometheus
//! metrics recorder, and serves `/metrics`, `/live`, and `/ready` on a
//! dedicated listener.
//! In tests, recorder installation is cached so repeated calls don't conflict.

use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initializes logging and metrics for the service.
///
/// Log filtering follows `RUST_LOG`, defaulting to `info`.
///
/// Returns a `PrometheusHandle` for serving metrics, or an error if a
/// different recorder was already installed.
pub fn init_observability(service_name: &str) -> anyhow::Result<PrometheusHandle> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer();
    // A subscriber may already be set (tests, embedding); keep the existing one.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
    tracing::debug!(service = service_name, "observability initialized");

    install_metrics_recorder()
}

/// Build the router for the metrics and probe endpoints.
pub fn metrics_router(handle: PrometheusHandle) -> axum::Router {
    axum::Router::new()
        .route(
            "/metrics",
            axum::routing::get(move || async move { handle.render() }),
        )
        .route("/live", axum::routing::get(|| async { "ok" }))
        .route("/ready", axum::routing::get(|| async { "ok" }))
}

/// Serves Prometheus metrics and health endpoints on the given socket address.
///
/// Returns an I/O error if binding or serving fails.
pub async fn serve_metrics(handle: PrometheusHandle, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics listening");
    axum::serve(listener, metrics_router(handle).into_make_service()).await
}

/// Installs the Prometheus recorder once per process and hands out clones of
/// its handle afterwards.
fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| anyhow::anyhow!("install metrics recorder: {err}"))?;
    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}
