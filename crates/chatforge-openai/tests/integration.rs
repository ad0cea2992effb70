//! End-to-end tests against an in-process stub of the Chat Completions API.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use chatforge::chat::{ChatMessage, StopReason};
use chatforge::provider::{ChatParams, JsonSchema, Provider, ToolChoice, ToolDefinition};
use chatforge::stream::StreamEvent;
use chatforge::{LlmError, collect_stream};
use chatforge_openai::{OpenAiConfig, OpenAiProvider};
use futures::StreamExt;
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Captured {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone)]
struct StubState {
    captured: Captured,
    status: StatusCode,
    body: String,
    content_type: &'static str,
}

async fn completions(
    State(state): State<StubState>,
    headers: HeaderMap,
    body: axum::Json<Value>,
) -> impl IntoResponse {
    state.captured.bodies.lock().unwrap().push(body.0);
    if let Some(auth) = headers.get("authorization") {
        state
            .captured
            .auth
            .lock()
            .unwrap()
            .push(auth.to_str().unwrap().to_string());
    }
    (
        state.status,
        [("content-type", state.content_type)],
        state.body.clone(),
    )
}

async fn spawn_stub(status: StatusCode, body: String, content_type: &'static str) -> (String, Captured) {
    let captured = Captured::default();
    let state = StubState {
        captured: captured.clone(),
        status,
        body,
        content_type,
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), captured)
}

fn sse(payloads: &[Value]) -> String {
    let mut out = String::new();
    for p in payloads {
        out.push_str("data: ");
        out.push_str(&p.to_string());
        out.push_str("\n\n");
    }
    out.push_str("data: [DONE]\n\n");
    out
}

fn provider(base_url: String) -> OpenAiProvider {
    OpenAiProvider::new(OpenAiConfig {
        api_key: "sk-test".into(),
        model: "gpt-4o-mini".into(),
        base_url,
        temperature: Some(0.7),
        ..Default::default()
    })
    .unwrap()
}

fn user(q: &str) -> ChatParams {
    ChatParams {
        messages: vec![ChatMessage::user(q)],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_stream_text_in_order() {
    let body = sse(&[
        json!({"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}),
        json!({"choices":[{"delta":{"content":"lo"},"finish_reason":null}]}),
        json!({"choices":[{"delta":{},"finish_reason":"stop"}]}),
        json!({"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":2}}),
    ]);
    let (url, captured) = spawn_stub(StatusCode::OK, body, "text/event-stream").await;
    let p = provider(url);

    let stream = p.stream(&user("hi")).await.unwrap();
    let texts: Vec<String> = stream
        .filter_map(|e| async move {
            match e {
                Ok(StreamEvent::TextDelta(t)) => Some(t),
                _ => None,
            }
        })
        .collect()
        .await;
    assert_eq!(texts, vec!["Hel", "lo"]);

    let bodies = captured.bodies.lock().unwrap();
    assert_eq!(bodies[0]["model"], "gpt-4o-mini");
    assert_eq!(bodies[0]["stream"], true);
    let temperature = bodies[0]["temperature"].as_f64().unwrap();
    assert!((temperature - 0.7).abs() < 1e-6);
    assert_eq!(bodies[0]["messages"][0]["role"], "user");
    assert_eq!(captured.auth.lock().unwrap()[0], "Bearer sk-test");
}

#[tokio::test]
async fn test_stream_tool_call_assembled() {
    let body = sse(&[
        json!({"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"lookup","arguments":""}}]},"finish_reason":null}]}),
        json!({"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"input\":\"x\"}"}}]},"finish_reason":null}]}),
        json!({"choices":[{"delta":{},"finish_reason":"tool_calls"}]}),
    ]);
    let (url, captured) = spawn_stub(StatusCode::OK, body, "text/event-stream").await;
    let p = provider(url);

    let params = ChatParams {
        tools: Some(vec![ToolDefinition {
            name: "lookup".into(),
            description: "Look things up".into(),
            parameters: JsonSchema::new(json!({
                "type": "object",
                "properties": { "input": { "type": "string" } }
            })),
        }]),
        tool_choice: Some(ToolChoice::Auto),
        ..user("find x")
    };
    let response = collect_stream(p.stream(&params).await.unwrap()).await.unwrap();

    assert_eq!(response.stop_reason, StopReason::ToolUse);
    let calls = response.tool_calls();
    assert_eq!(calls[0].id, "call_1");
    assert_eq!(calls[0].arguments["input"], "x");

    let bodies = captured.bodies.lock().unwrap();
    assert_eq!(bodies[0]["tool_choice"], "auto");
    assert_eq!(bodies[0]["tools"][0]["function"]["name"], "lookup");
}

#[tokio::test]
async fn test_stream_collects_text_and_usage() {
    let body = sse(&[
        json!({"choices":[{"delta":{"content":"4"},"finish_reason":null}]}),
        json!({"choices":[{"delta":{},"finish_reason":"stop"}]}),
        json!({"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":1}}),
    ]);
    let (url, captured) = spawn_stub(StatusCode::OK, body, "text/event-stream").await;
    let p = provider(url);

    let response = collect_stream(p.stream(&user("2+2?")).await.unwrap())
        .await
        .unwrap();
    assert_eq!(response.text(), Some("4"));
    assert_eq!(response.usage.input_tokens, 3);
    assert_eq!(response.stop_reason, StopReason::EndTurn);
    assert_eq!(
        captured.bodies.lock().unwrap()[0]["stream_options"]["include_usage"],
        true
    );
}

#[tokio::test]
async fn test_auth_error_maps_to_auth() {
    let body = json!({"error": {"message": "Incorrect API key provided"}}).to_string();
    let (url, _) = spawn_stub(StatusCode::UNAUTHORIZED, body, "application/json").await;
    let p = provider(url);

    let err = p.stream(&user("hi")).await.err().unwrap();
    assert!(matches!(err, LlmError::Auth(ref m) if m == "Incorrect API key provided"));
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let (url, _) = spawn_stub(
        StatusCode::SERVICE_UNAVAILABLE,
        "overloaded".into(),
        "text/plain",
    )
    .await;
    let p = provider(url);

    let err = p.stream(&user("hi")).await.err().unwrap();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_connection_refused_is_http_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let p = provider(format!("http://{addr}/v1"));
    let err = p.stream(&user("hi")).await.err().unwrap();
    assert!(matches!(err, LlmError::Http { .. }));
}
