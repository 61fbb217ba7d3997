//! Topic publish/consume handlers.
//!
//! Both handlers hold the request open until the broker finds a counterpart
//! or the configured wait elapses.
use crate::api::error::{ApiError, api_bad_request};
use crate::app::AppState;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use tokio::time::Instant;

/// `POST /:topic`: publish the raw request body and wait for a consumer.
///
/// # Errors
/// - 400 if the body cannot be read.
/// - 504 `timeout waiting for consumer` if nobody took it in time.
/// - 503 if the topic's queue is full.
pub(crate) async fn publish(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Body,
) -> Result<(), ApiError> {
    let payload = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|err| {
            metrics::counter!("httpq_bad_requests_total").increment(1);
            tracing::debug!(%topic, error = %err, "failed to read publish body");
            api_bad_request("failed to read request body")
        })?;
    let deadline = Instant::now() + state.wait_timeout;
    state.broker.publish(&topic, payload, deadline).await?;
    Ok(())
}

/// `GET /:topic`: wait for the next payload published to the topic.
///
/// # Errors
/// - 504 `timeout waiting for producer` if nothing arrived in time.
/// - 503 if the topic's queue is full.
pub(crate) async fn consume(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Bytes, ApiError> {
    let deadline = Instant::now() + state.wait_timeout;
    let payload = state.broker.consume(&topic, deadline).await?;
    Ok(payload)
}
