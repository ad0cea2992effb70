//! Streaming tool loop.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;

use crate::chat::ChatResponse;
use crate::error::LlmError;
use crate::provider::{ChatParams, DynProvider};
use crate::stream::{ChatStream, ResponseAccumulator, StreamEvent};

use super::ToolRegistry;
use super::config::{LoopEvent, LoopStream, ToolLoopConfig};
use super::loop_core::{IterationOutcome, LoopCore, StartOutcome};

/// Runs the model in a tool-calling loop until completion.
///
/// Each iteration streams a response from `provider`, executes any
/// requested tools through `registry`, and appends the assistant turn and
/// tool results before calling the model again. The loop ends when the
/// model answers without tool calls, the iteration limit is reached, or
/// the timeout elapses.
///
/// Yields provider deltas the moment they arrive, interleaved with loop
/// lifecycle events, and ends with [`LoopEvent::Done`]. A provider
/// failure yields one `Err` and ends the stream.
///
/// Provider, registry, and context are `Arc`s because they must outlive
/// the returned stream.
pub fn tool_loop_stream<Ctx: Send + Sync + 'static>(
    provider: Arc<dyn DynProvider>,
    registry: Arc<ToolRegistry<Ctx>>,
    params: ChatParams,
    config: ToolLoopConfig,
    ctx: Arc<Ctx>,
) -> LoopStream {
    let state = StreamState {
        provider,
        registry,
        ctx,
        core: LoopCore::new(params, config),
        pending: VecDeque::new(),
        phase: Phase::StartIteration,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }

            match std::mem::replace(&mut state.phase, Phase::Done) {
                Phase::Done => return None,
                Phase::Failed(err) => return Some((Err(err), state)),
                Phase::StartIteration => {
                    let started = state.core.start_iteration(&*state.provider).await;
                    state.pending.extend(state.core.drain_events());
                    match started {
                        StartOutcome::Stream(s) => {
                            state.phase = Phase::Streaming(s, ResponseAccumulator::default());
                        }
                        StartOutcome::Terminal(outcome) => state.settle(outcome),
                    }
                }
                Phase::Streaming(mut s, mut acc) => match s.next().await {
                    Some(Ok(event)) => {
                        acc.apply(&event);
                        state.phase = Phase::Streaming(s, acc);
                        if let Some(ev) = translate(event) {
                            return Some((Ok(ev), state));
                        }
                    }
                    Some(Err(e)) => {
                        let outcome = state.core.finish_error(e);
                        state.settle(outcome);
                    }
                    None => state.phase = Phase::ExecutingTools(acc.into_response()),
                },
                Phase::ExecutingTools(response) => {
                    let outcome = state
                        .core
                        .finish_iteration(response, &state.registry, &*state.ctx)
                        .await;
                    state.pending.extend(state.core.drain_events());
                    state.settle(outcome);
                }
            }
        }
    });
    Box::pin(stream)
}

/// Maps provider events onto loop events. The provider's own `Done` is
/// swallowed; the loop emits its own once it is finished.
fn translate(event: StreamEvent) -> Option<LoopEvent> {
    match event {
        StreamEvent::TextDelta(t) => Some(LoopEvent::TextDelta(t)),
        StreamEvent::ReasoningDelta(t) => Some(LoopEvent::ReasoningDelta(t)),
        StreamEvent::ToolCallStart { index, id, name } => {
            Some(LoopEvent::ToolCallStart { index, id, name })
        }
        StreamEvent::ToolCallDelta { index, json_chunk } => {
            Some(LoopEvent::ToolCallDelta { index, json_chunk })
        }
        StreamEvent::ToolCallComplete { index, call } => {
            Some(LoopEvent::ToolCallComplete { index, call })
        }
        StreamEvent::Usage(u) => Some(LoopEvent::Usage(u)),
        StreamEvent::Done { .. } => None,
    }
}

struct StreamState<Ctx: Send + Sync + 'static> {
    provider: Arc<dyn DynProvider>,
    registry: Arc<ToolRegistry<Ctx>>,
    ctx: Arc<Ctx>,
    core: LoopCore,
    pending: VecDeque<LoopEvent>,
    phase: Phase,
}

impl<Ctx: Send + Sync + 'static> StreamState<Ctx> {
    /// Picks the next phase from an iteration outcome. Buffered events
    /// are always drained before a failure is yielded.
    fn settle(&mut self, outcome: IterationOutcome) {
        self.phase = match outcome {
            IterationOutcome::ToolsExecuted => Phase::StartIteration,
            IterationOutcome::Completed(_) => Phase::Done,
            IterationOutcome::Error(e) => Phase::Failed(e),
        };
    }
}

enum Phase {
    StartIteration,
    Streaming(ChatStream, ResponseAccumulator),
    ExecutingTools(ChatResponse),
    Failed(LlmError),
    Done,
}
