//! Unified error type for all model and tool-loop operations.
//!
//! Every provider maps its native failures into [`LlmError`], so the
//! orchestrator matches on one type regardless of backend. Variants
//! carry enough context to decide whether a failure is transient and
//! to produce a short human-readable message for the caller.
//!
//! ```rust
//! use chatforge::LlmError;
//!
//! fn should_retry(err: &LlmError) -> bool {
//!     match err {
//!         LlmError::Http { retryable, .. } => *retryable,
//!         LlmError::Provider { retryable, .. } => *retryable,
//!         LlmError::Timeout { .. } => true,
//!         _ => false,
//!     }
//! }
//! ```

/// The unified error type returned by provider and tool-loop operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// An HTTP-level failure (transport error, unexpected status code).
    ///
    /// `status` is `None` when no response was received at all.
    #[error("HTTP error (status={status:?}): {message}")]
    Http {
        /// The HTTP status code, if one was received.
        status: Option<http::StatusCode>,
        /// A human-readable description of the failure.
        message: String,
        /// Whether the caller should retry this request.
        retryable: bool,
    },

    /// The API key was rejected.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The request was malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A provider-specific error that doesn't map to another variant.
    #[error("Provider error ({code}): {message}")]
    Provider {
        /// Provider-defined error code (e.g. `"RESOURCE_EXHAUSTED"`).
        code: String,
        /// Human-readable error description.
        message: String,
        /// Whether the caller should retry this request.
        retryable: bool,
    },

    /// The response body could not be parsed.
    #[error("Response format error: {message}")]
    ResponseFormat {
        /// What went wrong during parsing.
        message: String,
        /// The raw response body, for diagnostics.
        raw: String,
    },

    /// A tool invocation or the tool loop itself failed.
    #[error("Tool execution error ({tool_name}): {source}")]
    ToolExecution {
        /// The name of the tool that failed, empty for loop-level failures.
        tool_name: String,
        /// The underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The operation exceeded its deadline.
    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds elapsed before the timeout fired.
        elapsed_ms: u64,
    },
}

impl LlmError {
    /// Returns `true` if the error is transient and the request may succeed on retry.
    ///
    /// ```rust
    /// use chatforge::LlmError;
    ///
    /// assert!(LlmError::Timeout { elapsed_ms: 5000 }.is_retryable());
    /// assert!(!LlmError::Auth("bad key".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { retryable, .. } | Self::Provider { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResponseFormat {
            message: err.to_string(),
            raw: String::new(),
        }
    }
}
