//! `OpenAI` `Provider` implementation.

use std::collections::HashSet;

use chatforge::error::LlmError;
use chatforge::provider::{Capability, ChatParams, Provider, ProviderMetadata};
use chatforge::stream::ChatStream;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::instrument;

use crate::config::OpenAiConfig;
use crate::convert;

/// `OpenAI` provider implementing [`Provider`].
///
/// Talks to the Chat Completions API with function calling and SSE
/// streaming. Works against any server speaking the same protocol via
/// [`OpenAiConfig::base_url`].
///
/// # Example
///
/// ```rust,no_run
/// use chatforge::{ChatMessage, ChatParams, Provider};
/// use chatforge_openai::{OpenAiConfig, OpenAiProvider};
///
/// # async fn example() -> Result<(), chatforge::LlmError> {
/// let provider = OpenAiProvider::new(OpenAiConfig {
///     api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
///     ..Default::default()
/// })?;
///
/// let stream = provider.stream(&ChatParams {
///     messages: vec![ChatMessage::user("Hello!")],
///     ..Default::default()
/// }).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a provider from configuration.
    ///
    /// If `config.client` is `Some`, that client is reused for connection
    /// pooling. Otherwise a new client is built with the configured timeout.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = match config.client.clone() {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = config.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(|e| LlmError::Http {
                    status: None,
                    message: format!("failed to build HTTP client: {e}"),
                    retryable: false,
                })?
            }
        };
        Ok(Self { config, client })
    }

    /// Returns the configuration this provider was built from.
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn default_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            "authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|_| LlmError::Auth("API key contains invalid header characters".into()))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    async fn send_request(&self, params: &ChatParams) -> Result<reqwest::Response, LlmError> {
        let request_body = convert::build_request(params, &self.config);

        let mut headers = self.default_headers()?;
        if let Some(extra) = &params.extra_headers {
            headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut req = self
            .client
            .post(self.completions_url())
            .headers(headers)
            .json(&request_body);
        if let Some(timeout) = params.timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    elapsed_ms: params
                        .timeout
                        .or(self.config.timeout)
                        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                }
            } else {
                LlmError::Http {
                    status: e.status(),
                    message: e.to_string(),
                    retryable: e.is_connect(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, "OpenAI returned an error status");
            return Err(convert::convert_error(status, &body));
        }

        Ok(response)
    }
}

impl Provider for OpenAiProvider {
    #[instrument(skip_all, fields(provider = "openai", model = %self.config.model))]
    async fn stream(&self, params: &ChatParams) -> Result<ChatStream, LlmError> {
        let response = self.send_request(params).await?;
        Ok(crate::stream::into_stream(response))
    }

    fn metadata(&self) -> ProviderMetadata {
        let mut capabilities = HashSet::from([Capability::Tools]);
        if is_reasoning_model(&self.config.model) {
            capabilities.insert(Capability::Reasoning);
        }

        ProviderMetadata {
            name: "openai".into(),
            model: self.config.model.clone(),
            context_window: context_window_for_model(&self.config.model),
            capabilities,
        }
    }
}

fn is_reasoning_model(model: &str) -> bool {
    ["o1", "o3", "o4"].iter().any(|p| model.starts_with(p))
}

fn context_window_for_model(model: &str) -> u64 {
    if is_reasoning_model(model) {
        200_000
    } else if model.starts_with("gpt-4.1") {
        1_047_576
    } else if model.starts_with("gpt-3.5") {
        16_385
    } else {
        128_000
    }
}
