//! Tool loop configuration and event types.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use serde_json::Value;

use crate::chat::{ChatResponse, ToolCall, ToolResult};
use crate::error::LlmError;
use crate::usage::Usage;

/// A pinned, boxed, `Send` stream of [`LoopEvent`] results.
///
/// Returned by [`tool_loop_stream`](super::tool_loop_stream). Terminates
/// with [`LoopEvent::Done`] on success, or with a single `Err` when the
/// provider fails.
pub type LoopStream = Pin<Box<dyn Stream<Item = Result<LoopEvent, LlmError>> + Send>>;

/// Unified event emitted during tool loop execution.
///
/// Merges provider stream events (text deltas, tool call fragments)
/// with loop lifecycle events into one ordered stream.
///
/// ```rust,no_run
/// use chatforge::tool::{LoopEvent, ToolLoopConfig, tool_loop_stream};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # async fn example(
/// #     provider: Arc<dyn chatforge::DynProvider>,
/// #     registry: Arc<chatforge::ToolRegistry<()>>,
/// #     params: chatforge::ChatParams,
/// # ) {
/// let mut stream = tool_loop_stream(provider, registry, params, ToolLoopConfig::default(), Arc::new(()));
/// while let Some(event) = stream.next().await {
///     match event {
///         Ok(LoopEvent::TextDelta(text)) => print!("{text}"),
///         Ok(LoopEvent::ToolExecutionEnd { tool_name, duration, .. }) => {
///             eprintln!("[{tool_name} took {duration:?}]");
///         }
///         Ok(LoopEvent::Done(result)) => eprintln!("{:?}", result.termination_reason),
///         Err(e) => eprintln!("error: {e}"),
///         _ => {}
///     }
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum LoopEvent {
    // ── Provider stream ─────────────────────────────────────────
    /// A fragment of the model's text output.
    TextDelta(String),
    /// A fragment of the model's reasoning output.
    ReasoningDelta(String),
    /// A new tool call has started.
    ToolCallStart {
        /// Index of the call within the current response.
        index: u32,
        /// Provider-assigned identifier.
        id: String,
        /// The name of the tool being called.
        name: String,
    },
    /// A JSON fragment of a tool call's arguments.
    ToolCallDelta {
        /// The tool-call index this delta belongs to.
        index: u32,
        /// A chunk of the JSON arguments string.
        json_chunk: String,
    },
    /// The fully assembled tool call.
    ToolCallComplete {
        /// The tool-call index this completion corresponds to.
        index: u32,
        /// The parsed call.
        call: ToolCall,
    },
    /// Token usage for the current model call.
    Usage(Usage),

    // ── Loop lifecycle ──────────────────────────────────────────
    /// A new iteration is starting.
    IterationStart {
        /// The iteration number (1-indexed).
        iteration: u32,
        /// Number of messages in the conversation so far.
        message_count: usize,
    },
    /// About to execute a tool.
    ToolExecutionStart {
        /// The tool call ID from the model.
        call_id: String,
        /// Name of the tool being called.
        tool_name: String,
        /// Arguments passed to the tool.
        arguments: Value,
    },
    /// A tool finished executing.
    ToolExecutionEnd {
        /// The tool call ID from the model.
        call_id: String,
        /// Name of the tool that was called.
        tool_name: String,
        /// The observation handed back to the model.
        result: ToolResult,
        /// How long the tool took.
        duration: Duration,
    },

    // ── Terminal ────────────────────────────────────────────────
    /// The loop has finished.
    Done(ToolLoopResult),
}

/// Configuration for [`tool_loop_stream`](super::tool_loop_stream).
#[derive(Debug, Clone)]
pub struct ToolLoopConfig {
    /// Maximum number of generate-execute iterations. Default: 10.
    pub max_iterations: u32,
    /// Whether to execute multiple tool calls of one response
    /// concurrently. Default: true.
    pub parallel_tool_execution: bool,
    /// Maximum wall-clock time for the whole loop, checked at the start
    /// of each iteration. Default: none.
    pub timeout: Option<Duration>,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            parallel_tool_execution: true,
            timeout: None,
        }
    }
}

/// The result of a completed tool loop.
#[derive(Debug, Clone)]
pub struct ToolLoopResult {
    /// The final model response.
    pub response: ChatResponse,
    /// How many generate-execute iterations ran.
    pub iterations: u32,
    /// Usage summed over all iterations.
    pub total_usage: Usage,
    /// Why the loop terminated.
    pub termination_reason: TerminationReason,
}

/// Why a tool loop terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The model answered without requesting tools.
    Complete,
    /// Hit the `max_iterations` limit.
    MaxIterations {
        /// The configured limit.
        limit: u32,
    },
    /// Wall-clock timeout exceeded.
    Timeout {
        /// The configured timeout.
        limit: Duration,
    },
}
