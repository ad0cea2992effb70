//! HTTP actions exposed to the model as tools.
//!
//! An [`ActionSpec`] describes a third-party endpoint. [`HttpActionTool`]
//! turns it into a [`ToolHandler`] with a one-string-in, one-string-out
//! contract: whatever happens on the wire, [`HttpActionTool::invoke`]
//! returns text the model can read.

use std::future::Future;
use std::pin::Pin;

use chatforge::tool::{ToolError, ToolHandler, ToolOutput, ToolRegistry};
use chatforge::{JsonSchema, ToolDefinition};
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

/// Observation returned when the target answers with an empty body.
pub const EMPTY_RESPONSE: &str = "Action executed successfully but returned no content.";

const DEFAULT_KEY_HEADER: &str = "Authorization";

/// A caller-declared HTTP action.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    /// Tool name shown to the model.
    pub name: String,
    /// What the action does, shown to the model.
    #[serde(default)]
    pub description: String,
    /// Target URL.
    pub api: String,
    /// HTTP method, case insensitive. `POST` when absent.
    #[serde(default)]
    pub method: Option<String>,
    /// Secret sent with every call.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Name of the header carrying `api_key`. `Authorization` when absent.
    #[serde(default)]
    pub headers: Option<String>,
}

impl std::fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSpec")
            .field("name", &self.name)
            .field("api", &self.api)
            .field("method", &self.method)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl ActionSpec {
    /// Rejects names neither provider accepts as a function name.
    pub fn validate(&self) -> Result<(), String> {
        if is_valid_tool_name(&self.name) {
            Ok(())
        } else {
            Err(format!(
                "Invalid action name '{}': use 1-64 letters, digits, '_' or '-'",
                self.name
            ))
        }
    }

    fn method(&self) -> Result<Method, ActionError> {
        let raw = self
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("POST");
        Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
            .map_err(|_| ActionError::InvalidMethod(raw.to_string()))
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    fn key_header(&self) -> &str {
        self.headers
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_KEY_HEADER)
    }
}

/// `^[A-Za-z0-9_-]{1,64}$`
pub fn is_valid_tool_name(name: &str) -> bool {
    (1..=64).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[derive(Debug, thiserror::Error)]
enum ActionError {
    #[error("unsupported HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("invalid action URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("{0}")]
    Request(#[from] reqwest::Error),
}

/// An [`ActionSpec`] bound to an HTTP client.
#[derive(Clone)]
pub struct HttpActionTool {
    spec: ActionSpec,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpActionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpActionTool")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl HttpActionTool {
    /// Binds `spec` to `client`. The client's timeout bounds every call.
    pub fn new(spec: ActionSpec, client: reqwest::Client) -> Self {
        Self { spec, client }
    }

    /// The action this tool calls.
    pub fn spec(&self) -> &ActionSpec {
        &self.spec
    }

    /// Calls the action and returns the observation. Never fails: a
    /// transport or encoding error becomes an error marker string.
    #[instrument(skip_all, fields(action = %self.spec.name))]
    pub async fn invoke(&self, input: &str) -> String {
        match self.try_invoke(input).await {
            Ok(observation) => observation,
            Err(e) => {
                tracing::warn!(error = %e, "action call failed");
                format!("❌ Action '{}' failed: {e}", self.spec.name)
            }
        }
    }

    async fn try_invoke(&self, input: &str) -> Result<String, ActionError> {
        let request = self.build_request(input)?;
        tracing::debug!(method = %request.method(), url = %request.url(), "calling action");
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(%status, body_len = body.len(), "action responded");
        Ok(select_observation(&body))
    }

    fn build_request(&self, input: &str) -> Result<reqwest::Request, ActionError> {
        let payload: Value =
            serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()));
        let method = self.spec.method()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = self.spec.api_key() {
            let name = self.spec.key_header();
            let value = if name.eq_ignore_ascii_case("authorization") {
                format!("Bearer {key}")
            } else {
                key.to_string()
            };
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ActionError::InvalidHeader(format!("'{name}' is not a header name")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| ActionError::InvalidHeader(format!("value for '{name}'")))?;
            headers.insert(name, value);
        }

        let mut url = Url::parse(&self.spec.api)?;
        let builder = if method == Method::GET {
            if let Value::Object(map) = &payload {
                append_query(&mut url, map);
            }
            self.client.get(url)
        } else {
            let body = match payload {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.client.request(method, url).body(body)
        };

        Ok(builder.headers(headers).build()?)
    }
}

/// Appends `params` to the query of `url`, after any pairs already there.
fn append_query(url: &mut Url, params: &serde_json::Map<String, Value>) {
    if params.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (key, value) in params {
        match value {
            Value::String(s) => pairs.append_pair(key, s),
            other => pairs.append_pair(key, &other.to_string()),
        };
    }
}

/// Picks the observation text out of a response body.
fn select_observation(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            let picked = match map.get("response") {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(v) if !v.is_null() && !v.is_string() => Some(v.to_string()),
                _ => None,
            };
            picked.unwrap_or_else(|| Value::Object(map).to_string())
        }
        Ok(json) => json.to_string(),
        Err(_) if body.trim().is_empty() => EMPTY_RESPONSE.to_string(),
        Err(_) => body.to_string(),
    }
}

/// Reduces the model's JSON arguments to the action's single string input.
fn reduce_input(arguments: Value) -> String {
    match arguments {
        Value::String(s) => s,
        Value::Object(mut map) if matches!(map.get("input"), Some(Value::String(_))) => {
            match map.remove("input") {
                Some(Value::String(s)) => s,
                _ => String::new(),
            }
        }
        other => other.to_string(),
    }
}

impl ToolHandler for HttpActionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.spec.name.clone(),
            description: self.spec.description.clone(),
            parameters: JsonSchema::new(json!({
                "type": "object",
                "properties": { "input": { "type": "string" } }
            })),
        }
    }

    fn execute<'a>(
        &'a self,
        input: Value,
        _ctx: &'a (),
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + 'a>> {
        Box::pin(async move { Ok(ToolOutput::new(self.invoke(&reduce_input(input)).await)) })
    }
}

/// Registers one tool per spec. A repeated name replaces the earlier
/// action.
pub fn build_registry(specs: Vec<ActionSpec>, client: &reqwest::Client) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for spec in specs {
        if registry.contains(&spec.name) {
            tracing::warn!(action = %spec.name, "duplicate action name, keeping the last one");
        }
        registry.register(HttpActionTool::new(spec, client.clone()));
    }
    registry
}
