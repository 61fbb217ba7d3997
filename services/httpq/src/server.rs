//! Service lifecycle: build state, start background tasks, serve until shutdown.
use crate::app::{AppState, build_router};
use crate::config::HttpqConfig;
use crate::observability;
use crate::sweeper;
use anyhow::{Context, Result};
use httpq_broker::{Broker, TopicRegistry};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

pub fn build_state(config: &HttpqConfig) -> AppState {
    let broker = Broker::new(TopicRegistry::new()).with_max_queue_depth(config.max_queue_depth);
    AppState {
        broker: Arc::new(broker),
        wait_timeout: config.wait_timeout(),
    }
}

/// Bind the configured listeners and serve until `shutdown` resolves.
pub async fn run_with_shutdown<F>(config: HttpqConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    serve(listener, config, shutdown).await
}

/// Serve the public API on an already-bound listener until `shutdown`
/// resolves. The metrics listener and topic sweeper run alongside and are
/// stopped on return.
pub async fn serve<F>(listener: TcpListener, config: HttpqConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("httpq")?;
    let state = build_state(&config);

    let metrics_bind = config.metrics_bind;
    let metrics_task = tokio::spawn(async move {
        if let Err(err) = observability::serve_metrics(metrics_handle, metrics_bind).await {
            tracing::warn!(error = %err, %metrics_bind, "metrics listener failed");
        }
    });

    let sweeper_task = config.topic_idle_ttl().map(|ttl| {
        let interval = config.topic_sweep_interval();
        tracing::info!(?ttl, ?interval, "idle topic eviction enabled");
        tokio::spawn(sweeper::run_topic_sweeper(
            Arc::clone(&state.broker),
            ttl,
            interval,
        ))
    });

    let app = build_router(state);
    let addr = listener.local_addr().context("listener address")?;
    tracing::info!(
        %addr,
        wait_timeout_ms = config.wait_timeout_ms,
        max_queue_depth = config.max_queue_depth,
        "httpq listening"
    );
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result.context("serve http")?;
        }
        _ = &mut shutdown => {
            tracing::info!("shutdown requested");
        }
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    if let Some(task) = sweeper_task {
        task.abort();
        let _ = task.await;
    }
    Ok(())
}
