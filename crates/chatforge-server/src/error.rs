//! Error types for the HTTP surface and startup configuration.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// A failure reported to the caller before the token stream opens.
///
/// Rendered as `{"error": "<message>"}` with the variant's status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed body, unsupported provider, missing field, bad action.
    #[error("{0}")]
    Validation(String),

    /// Missing or wrong bearer token on a gated route.
    #[error("{0}")]
    Unauthorized(String),

    /// The request was valid but could not be dispatched.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed before streaming");
        } else {
            tracing::debug!(%status, error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Invalid startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A flag holds a value that cannot be used.
    #[error("invalid value for --{flag}: {message}")]
    InvalidValue {
        /// The flag name without the leading dashes.
        flag: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// A flag is required because another one was given.
    #[error("--{flag} is required when --{because} is set")]
    Missing {
        /// The missing flag.
        flag: &'static str,
        /// The flag that requires it.
        because: &'static str,
    },

    /// An HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
