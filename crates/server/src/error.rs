//! Structured errors for the ogshot HTTP surface.
//!
//! Capture failures become 5xx responses with a short public message; the
//! underlying cause is logged by the handler, not sent to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ogshot_client::{CaptureError, TargetError};

/// Structured errors for the ogshot server.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// No usable origin to build the `/og` URL from.
    #[error("BAD_ORIGIN: {0}")]
    BadOrigin(String),

    /// The capture path failed.
    #[error("CAPTURE_FAILED: {0}")]
    Capture(#[from] CaptureError),
}

impl From<TargetError> for WebError {
    fn from(err: TargetError) -> Self {
        WebError::BadOrigin(err.to_string())
    }
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::BadOrigin(_) => StatusCode::BAD_REQUEST,
            WebError::Capture(CaptureError::NavigationTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            WebError::Capture(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            WebError::BadOrigin(_) => "Could not determine site origin",
            WebError::Capture(CaptureError::NavigationTimeout(_)) => "Timed out rendering image",
            WebError::Capture(_) => "Failed to render image",
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}
