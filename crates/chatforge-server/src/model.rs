//! Per-request model client over the supported providers.
//!
//! [`ModelClient`] is the only place the server names a concrete
//! provider. Everything downstream works against [`Provider`] or
//! [`DynProvider`](chatforge::DynProvider).

use std::str::FromStr;

use chatforge::error::LlmError;
use chatforge::provider::{ChatParams, Provider, ProviderMetadata};
use chatforge::stream::ChatStream;
use chatforge_google::{GoogleConfig, GoogleProvider};
use chatforge_openai::{OpenAiConfig, OpenAiProvider};
use reqwest::header::HeaderValue;

/// Sampling temperature for every chat request.
pub const TEMPERATURE: f32 = 0.7;

/// Model used for google when the caller's choice is overridden but no
/// model is configured.
pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-2.0-flash";

/// The providers a request may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// `OpenAI` Chat Completions.
    OpenAi,
    /// Google Gemini.
    Google,
}

impl ProviderKind {
    /// The wire name of the provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "google" => Ok(Self::Google),
            other => Err(format!(
                "Unsupported provider '{other}': expected 'openai' or 'google'"
            )),
        }
    }
}

/// How the tool loop asks a provider to call tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningStrategy {
    /// Native function calling with JSON arguments.
    FunctionCalling,
    /// Chat with function declarations, one string argument per call.
    StructuredChat,
}

impl ReasoningStrategy {
    /// The strategy used for `kind`.
    pub fn for_provider(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAi => Self::FunctionCalling,
            ProviderKind::Google => Self::StructuredChat,
        }
    }

    /// Appended to the system preamble when tools are present.
    pub fn preamble_suffix(self) -> &'static str {
        match self {
            Self::FunctionCalling => {
                "Call a tool with a JSON object whose \"input\" field holds the text to send to it."
            }
            Self::StructuredChat => {
                "To use a tool, call it with a single \"input\" argument containing a plain string. \
                 Read the tool's answer before replying."
            }
        }
    }
}

/// Process-wide provider settings shared by every request.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Base URL of the `OpenAI` API.
    pub openai_base_url: String,
    /// Base URL of the Gemini API.
    pub google_base_url: String,
    /// When set, google requests use this model instead of the caller's.
    pub google_model: Option<String>,
    /// Shared client carrying the provider timeout.
    pub client: reqwest::Client,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai_base_url: OpenAiConfig::default().base_url,
            google_base_url: GoogleConfig::default().base_url,
            google_model: None,
            client: reqwest::Client::new(),
        }
    }
}

/// A provider bound to one caller's key and model.
#[derive(Debug, Clone)]
pub enum ModelClient {
    /// `OpenAI` backend.
    OpenAi(OpenAiProvider),
    /// Gemini backend.
    Google(GoogleProvider),
}

impl ModelClient {
    /// Builds the client for one request.
    ///
    /// Fails when the key cannot be sent as a header value.
    pub fn new(
        kind: ProviderKind,
        api_key: &str,
        model: &str,
        settings: &ProviderSettings,
    ) -> Result<Self, LlmError> {
        if HeaderValue::from_str(api_key).is_err() {
            return Err(LlmError::InvalidRequest(
                "API key contains characters that cannot be sent in a header".into(),
            ));
        }

        let client = match kind {
            ProviderKind::OpenAi => Self::OpenAi(OpenAiProvider::new(OpenAiConfig {
                api_key: api_key.to_string(),
                model: model.to_string(),
                base_url: settings.openai_base_url.clone(),
                temperature: Some(TEMPERATURE),
                timeout: None,
                client: Some(settings.client.clone()),
            })?),
            ProviderKind::Google => {
                let model = settings.google_model.as_deref().unwrap_or(model);
                Self::Google(GoogleProvider::new(GoogleConfig {
                    api_key: api_key.to_string(),
                    model: if model.is_empty() {
                        DEFAULT_GOOGLE_MODEL.to_string()
                    } else {
                        model.to_string()
                    },
                    base_url: settings.google_base_url.clone(),
                    temperature: Some(TEMPERATURE),
                    timeout: None,
                    client: Some(settings.client.clone()),
                })?)
            }
        };
        Ok(client)
    }

    /// Which provider this client talks to.
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Google(_) => ProviderKind::Google,
        }
    }
}

impl Provider for ModelClient {
    async fn stream(&self, params: &ChatParams) -> Result<ChatStream, LlmError> {
        match self {
            Self::OpenAi(p) => p.stream(params).await,
            Self::Google(p) => p.stream(params).await,
        }
    }

    fn metadata(&self) -> ProviderMetadata {
        match self {
            Self::OpenAi(p) => p.metadata(),
            Self::Google(p) => p.metadata(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        let err = "anthropic".parse::<ProviderKind>().unwrap_err();
        assert!(err.contains("anthropic"));
        assert!("OpenAI".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_strategy_per_provider() {
        assert_eq!(
            ReasoningStrategy::for_provider(ProviderKind::OpenAi),
            ReasoningStrategy::FunctionCalling
        );
        assert_eq!(
            ReasoningStrategy::for_provider(ProviderKind::Google),
            ReasoningStrategy::StructuredChat
        );
        assert!(ReasoningStrategy::StructuredChat
            .preamble_suffix()
            .contains("\"input\""));
    }

    #[test]
    fn test_openai_client_honours_model() {
        let client =
            ModelClient::new(ProviderKind::OpenAi, "sk-test", "gpt-4o-mini", &ProviderSettings::default())
                .unwrap();
        assert_eq!(client.kind(), ProviderKind::OpenAi);
        let meta = client.metadata();
        assert_eq!(meta.name, "openai");
        assert_eq!(meta.model, "gpt-4o-mini");
    }

    #[test]
    fn test_google_client_honours_model() {
        let client = ModelClient::new(
            ProviderKind::Google,
            "AIza-test",
            "gemini-1.5-pro",
            &ProviderSettings::default(),
        )
        .unwrap();
        assert_eq!(client.metadata().model, "gemini-1.5-pro");
    }

    #[test]
    fn test_google_model_can_be_pinned() {
        let settings = ProviderSettings {
            google_model: Some(DEFAULT_GOOGLE_MODEL.into()),
            ..Default::default()
        };
        let client =
            ModelClient::new(ProviderKind::Google, "AIza-test", "gemini-1.5-pro", &settings).unwrap();
        assert_eq!(client.metadata().model, DEFAULT_GOOGLE_MODEL);
    }

    #[test]
    fn test_temperature_is_fixed() {
        let ModelClient::OpenAi(p) =
            ModelClient::new(ProviderKind::OpenAi, "sk", "gpt-4o", &ProviderSettings::default())
                .unwrap()
        else {
            panic!("expected openai client");
        };
        assert_eq!(p.config().temperature, Some(TEMPERATURE));
    }

    #[test]
    fn test_unsendable_key_rejected() {
        let err = ModelClient::new(
            ProviderKind::OpenAi,
            "bad\nkey",
            "gpt-4o",
            &ProviderSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }
}
