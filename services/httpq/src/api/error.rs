//! API error type and helpers.
//!
//! Error bodies are plain text so clients see the same message the broker
//! reports (for example `timeout waiting for consumer`).
use axum::http::StatusCode;
use axum::response::IntoResponse;
use httpq_broker::BrokerError;

/// Error returned by handlers: an HTTP status plus a plain-text body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.body).into_response()
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::ConsumerTimeout | BrokerError::ProducerTimeout => {
                api_timeout(&err.to_string())
            }
            BrokerError::QueueFull { .. } => api_unavailable(&err.to_string()),
        }
    }
}

/// Build a 400 Bad Request error.
pub fn api_bad_request(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: message.to_string(),
    }
}

/// Build a 504 Gateway Timeout error for a rendezvous that found no
/// counterpart in time.
pub fn api_timeout(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::GATEWAY_TIMEOUT,
        body: message.to_string(),
    }
}

/// Build a 503 Service Unavailable error.
pub fn api_unavailable(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: message.to_string(),
    }
}
