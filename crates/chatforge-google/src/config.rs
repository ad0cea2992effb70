//! Google Gemini provider configuration.

use std::time::Duration;

/// Configuration for the Gemini provider.
///
/// ```rust
/// use chatforge_google::GoogleConfig;
///
/// let config = GoogleConfig {
///     api_key: "AIza...".into(),
///     ..Default::default()
/// };
/// assert_eq!(config.model, "gemini-2.0-flash");
/// ```
#[derive(Clone)]
pub struct GoogleConfig {
    /// Gemini API key, sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Model identifier without the `models/` prefix.
    pub model: String,
    /// API root, up to and including the version segment.
    pub base_url: String,
    /// Sampling temperature used when a request does not set its own.
    pub temperature: Option<f32>,
    /// Request timeout. `None` uses reqwest's default.
    pub timeout: Option<Duration>,
    /// Pre-configured HTTP client to share a connection pool.
    pub client: Option<reqwest::Client>,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("client", &self.client.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            temperature: None,
            timeout: None,
            client: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GoogleConfig::default();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert!(config.base_url.ends_with("/v1beta"));
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = GoogleConfig {
            api_key: "AIza-secret".into(),
            ..Default::default()
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("AIza-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
