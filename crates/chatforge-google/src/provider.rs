//! Gemini `Provider` implementation.

use std::collections::HashSet;

use chatforge::error::LlmError;
use chatforge::provider::{Capability, ChatParams, Provider, ProviderMetadata};
use chatforge::stream::ChatStream;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::instrument;

use crate::config::GoogleConfig;
use crate::convert;

/// Google Gemini provider implementing [`Provider`].
///
/// ```rust,no_run
/// use chatforge::{ChatMessage, ChatParams, Provider};
/// use chatforge_google::{GoogleConfig, GoogleProvider};
///
/// # async fn example() -> Result<(), chatforge::LlmError> {
/// let provider = GoogleProvider::new(GoogleConfig {
///     api_key: std::env::var("GOOGLE_API_KEY").unwrap_or_default(),
///     ..Default::default()
/// })?;
/// let stream = provider.stream(&ChatParams {
///     messages: vec![ChatMessage::user("Hello!")],
///     ..Default::default()
/// }).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    config: GoogleConfig,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// Creates a provider from configuration, reusing `config.client`
    /// when one is supplied.
    pub fn new(config: GoogleConfig) -> Result<Self, LlmError> {
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
    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    fn default_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|_| LlmError::Auth("API key contains invalid header characters".into()))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn model_path(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let model = self
            .config
            .model
            .strip_prefix("models/")
            .unwrap_or(&self.config.model);
        format!("{base}/models/{model}")
    }

    fn stream_url(&self) -> String {
        format!("{}:streamGenerateContent?alt=sse", self.model_path())
    }

    async fn send_request(&self, params: &ChatParams) -> Result<reqwest::Response, LlmError> {
        let request_body = convert::build_request(params, &self.config);

        let mut headers = self.default_headers()?;
        if let Some(extra) = &params.extra_headers {
            headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut req = self
            .client
            .post(self.stream_url())
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
            tracing::debug!(%status, "Gemini returned an error status");
            return Err(convert::convert_error(status, &body));
        }

        Ok(response)
    }
}

impl Provider for GoogleProvider {
    #[instrument(skip_all, fields(provider = "google", model = %self.config.model))]
    async fn stream(&self, params: &ChatParams) -> Result<ChatStream, LlmError> {
        let response = self.send_request(params).await?;
        Ok(crate::stream::into_stream(response))
    }

    fn metadata(&self) -> ProviderMetadata {
        let mut capabilities = HashSet::from([Capability::Tools]);
        if self.config.model.starts_with("gemini-2.5") {
            capabilities.insert(Capability::Reasoning);
        }
        ProviderMetadata {
            name: "google".into(),
            model: self.config.model.clone(),
            context_window: 1_048_576,
            capabilities,
        }
    }
}
