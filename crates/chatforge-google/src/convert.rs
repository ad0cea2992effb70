//! Conversion between `chatforge` types and Gemini wire types.

use std::collections::HashMap;
use chatforge::chat::{ChatMessage, ChatRole, ContentBlock, StopReason, ToolCall};
use chatforge::error::LlmError;
use chatforge::provider::{ChatParams, ToolChoice};
use chatforge::usage::Usage;
use serde_json::{Value, json};

use crate::config::GoogleConfig;
use crate::types::{
    Content, ErrorResponse, FunctionCall, FunctionCallingConfig, FunctionDeclaration,
    FunctionResponse, GenerationConfig, Part, Request, Response, Tool, ToolConfig, UsageMetadata,
};

// ── Request ──────────────────────────────────────────────────────────

/// Builds a `streamGenerateContent` request body.
///
/// System messages and `params.system` are merged into
/// `systemInstruction`. Tool results become `functionResponse` parts on a
/// `user` turn; Gemini correlates them by function name, which is looked
/// up from the assistant turn that issued the call.
pub(crate) fn build_request<'a>(params: &'a ChatParams, config: &GoogleConfig) -> Request<'a> {
    let mut system_parts: Vec<Part> = params
        .system
        .iter()
        .map(|s| text_part(s.clone()))
        .collect();

    let mut call_names: HashMap<&str, &str> = HashMap::new();
    let mut contents: Vec<Content> = Vec::with_capacity(params.messages.len());

    for msg in &params.messages {
        match msg.role {
            ChatRole::System => system_parts.push(text_part(msg.text())),
            ChatRole::Assistant => {
                let mut parts = Vec::new();
                for block in &msg.content {
                    match block {
                        ContentBlock::Text(t) if !t.is_empty() => parts.push(text_part(t.clone())),
                        ContentBlock::ToolCall(call) => {
                            call_names.insert(&call.id, &call.name);
                            parts.push(Part {
                                function_call: Some(FunctionCall {
                                    id: None,
                                    name: call.name.clone(),
                                    args: call.arguments.clone(),
                                }),
                                ..Default::default()
                            });
                        }
                        _ => {}
                    }
                }
                push_turn(&mut contents, "model", parts);
            }
            ChatRole::Tool => {
                let parts = msg
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolResult(r) => Some(Part {
                            function_response: Some(FunctionResponse {
                                id: None,
                                name: call_names
                                    .get(r.tool_call_id.as_str())
                                    .map_or_else(|| r.tool_call_id.clone(), |n| (*n).to_string()),
                                response: json!({ "content": r.content }),
                            }),
                            ..Default::default()
                        }),
                        _ => None,
                    })
                    .collect();
                push_turn(&mut contents, "user", parts);
            }
            _ => push_turn(&mut contents, "user", vec![text_part(msg.text())]),
        }
    }

    let tools = params
        .tools
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|tools| {
            vec![Tool {
                function_declarations: tools
                    .iter()
                    .map(|t| FunctionDeclaration {
                        name: &t.name,
                        description: &t.description,
                        parameters: t.parameters.as_value(),
                    })
                    .collect(),
            }]
        });
    let tool_config = if tools.is_some() {
        params.tool_choice.as_ref().map(convert_tool_choice)
    } else {
        None
    };

    let temperature = params.temperature.or(config.temperature);
    let generation_config = (temperature.is_some() || params.max_tokens.is_some()).then_some(
        GenerationConfig {
            temperature,
            max_output_tokens: params.max_tokens,
        },
    );

    Request {
        contents,
        system_instruction: (!system_parts.is_empty()).then_some(Content {
            role: None,
            parts: system_parts,
        }),
        tools,
        tool_config,
        generation_config,
    }
}

fn text_part(text: String) -> Part {
    Part {
        text: Some(text),
        ..Default::default()
    }
}

/// Appends parts, merging into the previous turn when the role repeats.
/// Gemini rejects consecutive turns with the same role.
fn push_turn(contents: &mut Vec<Content>, role: &str, parts: Vec<Part>) {
    if parts.is_empty() {
        return;
    }
    match contents.last_mut() {
        Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
        _ => contents.push(Content {
            role: Some(role.to_string()),
            parts,
        }),
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> ToolConfig {
    let (mode, allowed_function_names) = match choice {
        ToolChoice::None => ("NONE", None),
        ToolChoice::Required => ("ANY", None),
        ToolChoice::Specific(name) => ("ANY", Some(vec![name.clone()])),
        _ => ("AUTO", None),
    };
    ToolConfig {
        function_calling_config: FunctionCallingConfig {
            mode,
            allowed_function_names,
        },
    }
}

// ── Stream chunks ────────────────────────────────────────────────────

/// Gemini does not always assign call ids, so one is derived from the
/// part position when missing.
pub(crate) fn convert_call(call: FunctionCall, index: usize) -> ToolCall {
    ToolCall {
        id: call.id.unwrap_or_else(|| format!("call_{index}_{}", call.name)),
        name: call.name,
        arguments: if call.args.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            call.args
        },
    }
}

pub(crate) fn convert_usage(usage: &UsageMetadata) -> Usage {
    Usage {
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
        reasoning_tokens: usage.thoughts_token_count,
        cache_read_tokens: usage.cached_content_token_count,
    }
}

pub(crate) fn convert_finish_reason(reason: &str) -> StopReason {
    match reason {
        "STOP" => StopReason::EndTurn,
        "MAX_TOKENS" => StopReason::MaxTokens,
        other => {
            tracing::warn!(finish_reason = other, "unexpected Gemini finishReason");
            StopReason::EndTurn
        }
    }
}

/// The prompt was rejected outright by safety filters.
pub(crate) fn blocked_reason(resp: &Response) -> Option<String> {
    if !resp.candidates.is_empty() {
        return None;
    }
    resp.prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.clone())
}

pub(crate) fn blocked_error(reason: &str) -> LlmError {
    LlmError::Provider {
        code: "blocked".into(),
        message: format!("Gemini blocked the prompt: {reason}"),
        retryable: false,
    }
}

// ── Errors ───────────────────────────────────────────────────────────

/// Converts an HTTP status plus error body into an [`LlmError`].
///
/// Gemini answers an invalid key with `400 INVALID_ARGUMENT`; the
/// `API_KEY_INVALID` reason in the details marks it as an auth failure.
pub(crate) fn convert_error(status: http::StatusCode, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .map_or_else(|| body.to_string(), |e| e.error.message.clone());
    let key_invalid = parsed.as_ref().is_some_and(|e| {
        e.error
            .details
            .iter()
            .any(|d| d.get("reason").and_then(Value::as_str) == Some("API_KEY_INVALID"))
    });

    if status == http::StatusCode::UNAUTHORIZED
        || status == http::StatusCode::FORBIDDEN
        || key_invalid
    {
        return LlmError::Auth(message);
    }
    if status == http::StatusCode::BAD_REQUEST {
        return LlmError::InvalidRequest(message);
    }

    LlmError::Http {
        status: Some(status),
        message,
        retryable: matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatforge::chat::ToolResult;
    use chatforge::provider::{JsonSchema, ToolDefinition};

    fn lookup_tool() -> ToolDefinition {
        ToolDefinition {
            name: "lookup".into(),
            description: "Look up".into(),
            parameters: JsonSchema::new(json!({
                "type": "object",
                "properties": { "input": { "type": "string" } }
            })),
        }
    }

    fn to_json(req: &Request<'_>) -> Value {
        serde_json::to_value(req).unwrap()
    }

    #[test]
    fn test_minimal_request() {
        let params = ChatParams {
            messages: vec![ChatMessage::user("Hello")],
            ..Default::default()
        };
        let json = to_json(&build_request(&params, &GoogleConfig::default()));
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert!(json.get("systemInstruction").is_none());
        assert!(json.get("generationConfig").is_none());
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_system_sources_merged() {
        let params = ChatParams {
            messages: vec![ChatMessage::system("second"), ChatMessage::user("q")],
            system: Some("first".into()),
            ..Default::default()
        };
        let json = to_json(&build_request(&params, &GoogleConfig::default()));
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "first");
        assert_eq!(json["systemInstruction"]["parts"][1]["text"], "second");
        assert_eq!(json["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_temperature_from_config() {
        let config = GoogleConfig {
            temperature: Some(0.7),
            ..Default::default()
        };
        let params = ChatParams::default();
        let req = build_request(&params, &config);
        assert_eq!(req.generation_config.unwrap().temperature, Some(0.7));
    }

    #[test]
    fn test_tools_and_auto_mode() {
        let params = ChatParams {
            tools: Some(vec![lookup_tool()]),
            tool_choice: Some(ToolChoice::Auto),
            ..Default::default()
        };
        let json = to_json(&build_request(&params, &GoogleConfig::default()));
        assert_eq!(json["tools"][0]["functionDeclarations"][0]["name"], "lookup");
        assert_eq!(json["toolConfig"]["functionCallingConfig"]["mode"], "AUTO");
    }

    #[test]
    fn test_specific_tool_choice() {
        let config = convert_tool_choice(&ToolChoice::Specific("lookup".into()));
        assert_eq!(config.function_calling_config.mode, "ANY");
        assert_eq!(
            config.function_calling_config.allowed_function_names,
            Some(vec!["lookup".to_string()])
        );
    }

    #[test]
    fn test_tool_round_trip_uses_function_name() {
        let params = ChatParams {
            messages: vec![
                ChatMessage::user("find x"),
                ChatMessage {
                    role: ChatRole::Assistant,
                    content: vec![ContentBlock::ToolCall(ToolCall {
                        id: "call_0_lookup".into(),
                        name: "lookup".into(),
                        arguments: json!({"input": "x"}),
                    })],
                },
                ChatMessage::tool_result_full(ToolResult {
                    tool_call_id: "call_0_lookup".into(),
                    content: "found".into(),
                    is_error: false,
                }),
            ],
            ..Default::default()
        };
        let json = to_json(&build_request(&params, &GoogleConfig::default()));
        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "lookup");
        assert_eq!(contents[2]["role"], "user");
        let response = &contents[2]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], "lookup");
        assert_eq!(response["response"]["content"], "found");
    }

    #[test]
    fn test_consecutive_tool_results_share_a_turn() {
        let params = ChatParams {
            messages: vec![
                ChatMessage::tool_result("a", "1"),
                ChatMessage::tool_result("b", "2"),
            ],
            ..Default::default()
        };
        let req = build_request(&params, &GoogleConfig::default());
        assert_eq!(req.contents.len(), 1);
        assert_eq!(req.contents[0].parts.len(), 2);
    }

    #[test]
    fn test_call_id_derived_from_position() {
        let call = FunctionCall {
            id: None,
            name: "lookup".into(),
            args: json!({"input": "q"}),
        };
        let converted = convert_call(call, 2);
        assert_eq!(converted.id, "call_2_lookup");
        assert_eq!(converted.arguments["input"], "q");
    }

    #[test]
    fn test_blocked_prompt_is_error() {
        let resp: Response = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        let reason = blocked_reason(&resp).unwrap();
        let err = blocked_error(&reason);
        assert!(matches!(err, LlmError::Provider { ref message, .. } if message.contains("SAFETY")));
    }

    #[test]
    fn test_candidates_are_never_blocked() {
        let resp: Response = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }],
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert!(blocked_reason(&resp).is_none());
    }

    #[test]
    fn test_usage_and_finish_reason() {
        let usage: UsageMetadata = serde_json::from_value(json!({
            "promptTokenCount": 4, "candidatesTokenCount": 2, "thoughtsTokenCount": 1
        }))
        .unwrap();
        let converted = convert_usage(&usage);
        assert_eq!(converted.input_tokens, 4);
        assert_eq!(converted.reasoning_tokens, Some(1));
        assert_eq!(convert_finish_reason("MAX_TOKENS"), StopReason::MaxTokens);
        assert_eq!(convert_finish_reason("SAFETY"), StopReason::EndTurn);
    }

    #[test]
    fn test_missing_args_become_empty_object() {
        let call = FunctionCall {
            id: Some("x".into()),
            name: "noop".into(),
            args: Value::Null,
        };
        let converted = convert_call(call, 0);
        assert_eq!(converted.id, "x");
        assert_eq!(converted.arguments, json!({}));
    }

    #[test]
    fn test_convert_error_invalid_key() {
        let body = json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{ "@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID" }]
            }
        })
        .to_string();
        let err = convert_error(http::StatusCode::BAD_REQUEST, &body);
        assert!(matches!(err, LlmError::Auth(ref m) if m.starts_with("API key not valid")));
    }

    #[test]
    fn test_convert_error_bad_request() {
        let body = json!({"error": {"code": 400, "message": "bad schema", "status": "INVALID_ARGUMENT"}})
            .to_string();
        let err = convert_error(http::StatusCode::BAD_REQUEST, &body);
        assert!(matches!(err, LlmError::InvalidRequest(ref m) if m == "bad schema"));
    }

    #[test]
    fn test_convert_error_rate_limit() {
        let err = convert_error(http::StatusCode::TOO_MANY_REQUESTS, "quota");
        assert!(err.is_retryable());
    }
}
