//! Iteration engine behind the streaming tool loop.
//!
//! `LoopCore` holds the mutable state of one loop (conversation,
//! iteration count, usage) and performs each iteration in two phases:
//!
//! 1. [`start_iteration`](LoopCore::start_iteration) runs the guards
//!    (timeout, max iterations) and opens the provider stream.
//! 2. [`finish_iteration`](LoopCore::finish_iteration) takes the
//!    accumulated response, decides whether the loop is done, and
//!    otherwise executes the requested tools and appends their results.
//!
//! The streaming loop drives the provider stream itself between the two
//! phases so it can forward deltas. Lifecycle events are buffered and
//! drained with [`drain_events`](LoopCore::drain_events).

use std::time::Instant;

use crate::chat::{ChatMessage, ChatResponse, ChatRole, ContentBlock, StopReason};
use crate::error::LlmError;
use crate::provider::{ChatParams, DynProvider};
use crate::stream::ChatStream;
use crate::usage::Usage;

use super::ToolRegistry;
use super::config::{LoopEvent, TerminationReason, ToolLoopConfig, ToolLoopResult};
use super::execution::execute_with_events;

/// What one iteration produced.
pub(crate) enum IterationOutcome {
    /// Tools ran; the loop should call the model again.
    ToolsExecuted,
    /// The loop is finished.
    Completed(ToolLoopResult),
    /// The provider failed.
    Error(LlmError),
}

/// Result of [`LoopCore::start_iteration`].
pub(crate) enum StartOutcome {
    /// The provider stream is open. Drive it, then call `finish_iteration`.
    Stream(ChatStream),
    /// The iteration ended before the model was called.
    Terminal(IterationOutcome),
}

pub(crate) struct LoopCore {
    params: ChatParams,
    config: ToolLoopConfig,
    total_usage: Usage,
    iterations: u32,
    start_time: Instant,
    finished: bool,
    events: Vec<LoopEvent>,
}

impl LoopCore {
    pub(crate) fn new(params: ChatParams, config: ToolLoopConfig) -> Self {
        Self {
            params,
            config,
            total_usage: Usage::default(),
            iterations: 0,
            start_time: Instant::now(),
            finished: false,
            events: Vec::new(),
        }
    }

    /// Phase 1: guards, then `provider.stream_boxed()`.
    pub(crate) async fn start_iteration(&mut self, provider: &dyn DynProvider) -> StartOutcome {
        if let Some(limit) = self.config.timeout {
            if self.start_time.elapsed() >= limit {
                return StartOutcome::Terminal(
                    self.finish(ChatResponse::empty(), TerminationReason::Timeout { limit }),
                );
            }
        }

        self.iterations += 1;
        if self.iterations > self.config.max_iterations {
            tracing::warn!(
                limit = self.config.max_iterations,
                "tool loop hit its iteration limit"
            );
            return StartOutcome::Terminal(self.finish(
                ChatResponse::empty(),
                TerminationReason::MaxIterations {
                    limit: self.config.max_iterations,
                },
            ));
        }

        self.events.push(LoopEvent::IterationStart {
            iteration: self.iterations,
            message_count: self.params.messages.len(),
        });

        match provider.stream_boxed(&self.params).await {
            Ok(stream) => StartOutcome::Stream(stream),
            Err(e) => StartOutcome::Terminal(self.finish_error(e)),
        }
    }

    /// Phase 2: completion check, then tool execution.
    pub(crate) async fn finish_iteration<Ctx: Send + Sync + 'static>(
        &mut self,
        response: ChatResponse,
        registry: &ToolRegistry<Ctx>,
        ctx: &Ctx,
    ) -> IterationOutcome {
        self.total_usage += &response.usage;

        if response.stop_reason != StopReason::ToolUse || response.tool_calls().is_empty() {
            return self.finish(response, TerminationReason::Complete);
        }

        let (calls, mut assistant_content) = response.partition_content();
        assistant_content.extend(calls.iter().cloned().map(ContentBlock::ToolCall));
        self.params.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: assistant_content,
        });

        let exec = execute_with_events(registry, calls, self.config.parallel_tool_execution, ctx)
            .await;
        self.events.extend(exec.events);
        self.params
            .messages
            .extend(exec.results.into_iter().map(ChatMessage::tool_result_full));

        IterationOutcome::ToolsExecuted
    }

    pub(crate) fn drain_events(&mut self) -> Vec<LoopEvent> {
        std::mem::take(&mut self.events)
    }

    fn finish(
        &mut self,
        response: ChatResponse,
        termination_reason: TerminationReason,
    ) -> IterationOutcome {
        self.finished = true;
        let result = ToolLoopResult {
            response,
            iterations: self.iterations.min(self.config.max_iterations),
            total_usage: self.total_usage.clone(),
            termination_reason,
        };
        self.events.push(LoopEvent::Done(result.clone()));
        IterationOutcome::Completed(result)
    }

    pub(crate) fn finish_error(&mut self, error: LlmError) -> IterationOutcome {
        self.finished = true;
        IterationOutcome::Error(error)
    }
}

impl std::fmt::Debug for LoopCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopCore")
            .field("iterations", &self.iterations)
            .field("finished", &self.finished)
            .field("buffered_events", &self.events.len())
            .finish_non_exhaustive()
    }
}
