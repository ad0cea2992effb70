//! Tool error type.

/// Error returned by a tool handler.
///
/// The registry never propagates it: the message becomes a
/// [`ToolResult`](crate::ToolResult) with `is_error` set.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    /// Human-readable error description.
    pub message: String,
}

impl ToolError {
    /// Creates a new tool error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
