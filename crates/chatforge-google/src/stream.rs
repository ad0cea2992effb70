//! SSE parser for `streamGenerateContent?alt=sse`.
//!
//! Every SSE payload is a complete `GenerateContentResponse` holding the
//! next slice of the candidate. Function calls arrive whole, so each one
//! is emitted as start, delta and complete events back to back.

use bytes::Bytes;
use chatforge::chat::StopReason;
use chatforge::error::LlmError;
use chatforge::sse::SseDecoder;
use chatforge::stream::{ChatStream, StreamEvent};
use futures::stream::StreamExt;

use crate::convert::{blocked_error, blocked_reason, convert_call, convert_finish_reason, convert_usage};
use crate::types::Response;

#[derive(Debug, Default)]
struct ParserState {
    decoder: SseDecoder,
    next_call_index: u32,
}

/// Converts a streaming response into a `ChatStream`.
pub(crate) fn into_stream(response: reqwest::Response) -> ChatStream {
    let stream = response
        .bytes_stream()
        .scan(ParserState::default(), |state, chunk| {
            let items = process_chunk(state, chunk);
            async move { Some(items) }
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

fn process_chunk(
    state: &mut ParserState,
    chunk: Result<Bytes, reqwest::Error>,
) -> Vec<Result<StreamEvent, LlmError>> {
    let bytes = match chunk {
        Ok(bytes) => bytes,
        Err(e) => {
            return vec![Err(LlmError::Http {
                status: None,
                message: format!("Stream read error: {e}"),
                retryable: true,
            })];
        }
    };

    let payloads = match state.decoder.push(&bytes) {
        Ok(p) => p,
        Err(e) => return vec![Err(e)],
    };

    let mut results = Vec::new();
    for data in payloads {
        match parse_payload(&data, state) {
            Ok(events) => results.extend(events.into_iter().map(Ok)),
            Err(e) => {
                results.push(Err(e));
                break;
            }
        }
    }
    results
}

fn parse_payload(data: &str, state: &mut ParserState) -> Result<Vec<StreamEvent>, LlmError> {
    let Ok(chunk) = serde_json::from_str::<Response>(data) else {
        tracing::debug!(payload_len = data.len(), "skipping unparseable SSE payload");
        return Ok(vec![]);
    };

    if let Some(error) = chunk.error {
        return Err(LlmError::Provider {
            code: error.status.unwrap_or_else(|| "stream_error".into()),
            message: error.message,
            retryable: false,
        });
    }
    if let Some(reason) = blocked_reason(&chunk) {
        return Err(blocked_error(&reason));
    }

    let mut events = Vec::new();
    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Ok(events);
    };

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(call) = part.function_call {
            let index = state.next_call_index;
            state.next_call_index += 1;
            let call = convert_call(call, index as usize);
            events.push(StreamEvent::ToolCallStart {
                index,
                id: call.id.clone(),
                name: call.name.clone(),
            });
            events.push(StreamEvent::ToolCallDelta {
                index,
                json_chunk: call.arguments.to_string(),
            });
            events.push(StreamEvent::ToolCallComplete { index, call });
        } else if let Some(text) = part.text.filter(|t| !t.is_empty()) {
            if part.thought == Some(true) {
                events.push(StreamEvent::ReasoningDelta(text));
            } else {
                events.push(StreamEvent::TextDelta(text));
            }
        }
    }

    if let Some(reason) = candidate.finish_reason {
        if let Some(usage) = &chunk.usage_metadata {
            events.push(StreamEvent::Usage(convert_usage(usage)));
        }
        let stop_reason = if state.next_call_index > 0 {
            StopReason::ToolUse
        } else {
            convert_finish_reason(&reason)
        };
        events.push(StreamEvent::Done { stop_reason });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &str, state: &mut ParserState) -> Vec<StreamEvent> {
        parse_payload(data, state).unwrap()
    }

    #[test]
    fn test_text_chunks() {
        let mut state = ParserState::default();
        let events = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"}]}}]}"#,
            &mut state,
        );
        assert_eq!(events, vec![StreamEvent::TextDelta("Hel".into())]);
    }

    #[test]
    fn test_final_chunk_emits_usage_then_done() {
        let mut state = ParserState::default();
        let events = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"lo"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":2}}"#,
            &mut state,
        );
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[1], StreamEvent::Usage(u) if u.input_tokens == 3));
        assert_eq!(
            events[2],
            StreamEvent::Done {
                stop_reason: StopReason::EndTurn
            }
        );
    }

    #[test]
    fn test_function_call_events() {
        let mut state = ParserState::default();
        let events = parse(
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"lookup","args":{"input":"x"}}}]},"finishReason":"STOP"}]}"#,
            &mut state,
        );
        assert!(matches!(
            &events[0],
            StreamEvent::ToolCallStart { index: 0, name, .. } if name == "lookup"
        ));
        assert!(matches!(
            &events[2],
            StreamEvent::ToolCallComplete { call, .. } if call.arguments["input"] == "x"
        ));
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Done {
                stop_reason: StopReason::ToolUse
            })
        );
    }

    #[test]
    fn test_call_indices_increase_across_chunks() {
        let mut state = ParserState::default();
        parse(
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"a","args":{}}}]}}]}"#,
            &mut state,
        );
        let events = parse(
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"b","args":{}}}]}}]}"#,
            &mut state,
        );
        assert!(matches!(
            &events[0],
            StreamEvent::ToolCallStart { index: 1, id, .. } if id == "call_1_b"
        ));
    }

    #[test]
    fn test_thought_part_is_reasoning() {
        let mut state = ParserState::default();
        let events = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"hmm","thought":true}]}}]}"#,
            &mut state,
        );
        assert_eq!(events, vec![StreamEvent::ReasoningDelta("hmm".into())]);
    }

    #[test]
    fn test_in_band_error() {
        let mut state = ParserState::default();
        let err = parse_payload(
            r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#,
            &mut state,
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::Provider { ref code, .. } if code == "UNAVAILABLE"));
    }

    #[test]
    fn test_blocked_prompt_in_stream() {
        let mut state = ParserState::default();
        let err = parse_payload(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#, &mut state)
            .unwrap_err();
        assert!(matches!(err, LlmError::Provider { .. }));
    }

    #[test]
    fn test_process_chunk_crlf_frames() {
        let mut state = ParserState::default();
        let items = process_chunk(
            &mut state,
            Ok(Bytes::from_static(
                b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"hi\"}]}}]}\r\n\r\n",
            )),
        );
        assert!(matches!(&items[0], Ok(StreamEvent::TextDelta(t)) if t == "hi"));
    }
}
