//! Tool execution with event collection.

use std::time::Instant;

use futures::{StreamExt, stream};

use crate::chat::{ToolCall, ToolResult};

use super::ToolRegistry;
use super::config::LoopEvent;

/// Tool results plus the start/end events generated while producing them.
pub(crate) struct ExecutionResult {
    pub results: Vec<ToolResult>,
    pub events: Vec<LoopEvent>,
}

/// Executes tool calls, collecting start/end events.
///
/// Sequential execution (`then`) keeps call order. Parallel execution
/// (`buffer_unordered`) yields results in completion order; callers
/// correlate through `tool_call_id`.
pub(crate) async fn execute_with_events<Ctx: Send + Sync + 'static>(
    registry: &ToolRegistry<Ctx>,
    calls: Vec<ToolCall>,
    parallel: bool,
    ctx: &Ctx,
) -> ExecutionResult {
    if calls.is_empty() {
        return ExecutionResult {
            results: Vec::new(),
            events: Vec::new(),
        };
    }

    let call_count = calls.len();

    let execute_one = |call: ToolCall| {
        let ToolCall {
            id: call_id,
            name: tool_name,
            arguments,
        } = call;
        async move {
            let start_event = LoopEvent::ToolExecutionStart {
                call_id: call_id.clone(),
                tool_name: tool_name.clone(),
                arguments: arguments.clone(),
            };

            let start = Instant::now();
            let result = registry
                .execute_by_name(&tool_name, &call_id, arguments, ctx)
                .await;
            let duration = start.elapsed();

            tracing::debug!(
                tool = %tool_name,
                is_error = result.is_error,
                elapsed_ms = duration.as_millis(),
                "tool executed"
            );

            let end_event = LoopEvent::ToolExecutionEnd {
                call_id,
                tool_name,
                result: result.clone(),
                duration,
            };
            (result, start_event, end_event)
        }
    };

    let outcomes: Vec<(ToolResult, LoopEvent, LoopEvent)> = if parallel && call_count > 1 {
        stream::iter(calls)
            .map(execute_one)
            .buffer_unordered(call_count)
            .collect()
            .await
    } else {
        stream::iter(calls).then(execute_one).collect().await
    };

    let mut results = Vec::with_capacity(call_count);
    let mut events = Vec::with_capacity(call_count * 2);
    for (result, start_event, end_event) in outcomes {
        events.push(start_event);
        events.push(end_event);
        results.push(result);
    }

    ExecutionResult { results, events }
}
