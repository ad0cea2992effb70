//! Command-line and environment configuration.
//!
//! Every flag can also be given through a `CHATFORGE_*` environment
//! variable. [`ServerConfig::validate`] catches combinations that clap
//! cannot express before anything is bound or built.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;

/// Runtime configuration for the `chatforge` binary.
#[derive(Parser, Clone)]
#[command(name = "chatforge", version)]
#[command(about = "Streaming chat endpoint with HTTP action tools")]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "CHATFORGE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "CHATFORGE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Maximum generate/execute rounds of the tool loop.
    #[arg(long, env = "CHATFORGE_MAX_ITERATIONS", default_value_t = 10)]
    pub max_iterations: u32,

    /// Longest silence allowed between reads of a provider response.
    #[arg(long, env = "CHATFORGE_PROVIDER_TIMEOUT_SECS", default_value_t = 120)]
    pub provider_timeout_secs: u64,

    /// Timeout for each action (tool) HTTP request.
    #[arg(long, env = "CHATFORGE_TOOL_TIMEOUT_SECS", default_value_t = 30)]
    pub tool_timeout_secs: u64,

    /// Wall-clock limit for a whole tool loop. Unlimited when unset.
    #[arg(long, env = "CHATFORGE_LOOP_TIMEOUT_SECS")]
    pub loop_timeout_secs: Option<u64>,

    /// Base URL of the `OpenAI` API.
    #[arg(long, env = "CHATFORGE_OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Base URL of the Gemini API.
    #[arg(
        long,
        env = "CHATFORGE_GOOGLE_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub google_base_url: String,

    /// Pin every google request to this model instead of the caller's.
    #[arg(long, env = "CHATFORGE_GOOGLE_MODEL")]
    pub google_model: Option<String>,

    /// Require `Authorization: Bearer <token>` on chat routes.
    #[arg(long, env = "CHATFORGE_API_TOKEN")]
    pub api_token: Option<String>,

    /// Allowed CORS origins. Any origin when empty.
    #[arg(long, env = "CHATFORGE_CORS_ALLOWED_ORIGINS", value_delimiter = ',', num_args = 0..)]
    pub cors_allowed_origins: Vec<String>,

    /// Data API base URL of the document store holding bot usage counters.
    #[arg(long, env = "CHATFORGE_USAGE_STORE_URL")]
    pub usage_store_url: Option<String>,

    /// API key for the document store.
    #[arg(long, env = "CHATFORGE_USAGE_STORE_API_KEY")]
    pub usage_store_api_key: Option<String>,

    /// Data source (cluster) name in the document store.
    #[arg(long, env = "CHATFORGE_USAGE_STORE_DATA_SOURCE", default_value = "Cluster0")]
    pub usage_store_data_source: String,

    /// Database holding the bots collection.
    #[arg(long, env = "CHATFORGE_USAGE_STORE_DATABASE", default_value = "chatforge")]
    pub usage_store_database: String,

    /// Collection holding one document per bot.
    #[arg(long, env = "CHATFORGE_USAGE_STORE_COLLECTION", default_value = "bots")]
    pub usage_store_collection: String,

    /// Default log level. `RUST_LOG` takes precedence.
    #[arg(long, env = "CHATFORGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "CHATFORGE_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_iterations", &self.max_iterations)
            .field("provider_timeout_secs", &self.provider_timeout_secs)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("loop_timeout_secs", &self.loop_timeout_secs)
            .field("openai_base_url", &self.openai_base_url)
            .field("google_base_url", &self.google_base_url)
            .field("google_model", &self.google_model)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("usage_store_url", &self.usage_store_url)
            .field(
                "usage_store_api_key",
                &self.usage_store_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("usage_store_data_source", &self.usage_store_data_source)
            .field("usage_store_database", &self.usage_store_database)
            .field("usage_store_collection", &self.usage_store_collection)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            max_iterations: 10,
            provider_timeout_secs: 120,
            tool_timeout_secs: 30,
            loop_timeout_secs: None,
            openai_base_url: "https://api.openai.com/v1".into(),
            google_base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            google_model: None,
            api_token: None,
            cors_allowed_origins: Vec::new(),
            usage_store_url: None,
            usage_store_api_key: None,
            usage_store_data_source: "Cluster0".into(),
            usage_store_database: "chatforge".into(),
            usage_store_collection: "bots".into(),
            log_level: "info".into(),
            log_json: false,
        }
    }
}

impl ServerConfig {
    /// Checks values clap accepts but the server cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                flag: "max-iterations",
                message: "must be at least 1".into(),
            });
        }
        for (flag, secs) in [
            ("provider-timeout-secs", self.provider_timeout_secs),
            ("tool-timeout-secs", self.tool_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    flag,
                    message: "must be at least 1".into(),
                });
            }
        }

        for (flag, raw) in [
            ("openai-base-url", self.openai_base_url.as_str()),
            ("google-base-url", self.google_base_url.as_str()),
        ] {
            parse_url(flag, raw)?;
        }

        for origin in &self.cors_allowed_origins {
            if http::HeaderValue::from_str(origin).is_err() {
                return Err(ConfigError::InvalidValue {
                    flag: "cors-allowed-origins",
                    message: format!("'{origin}' is not a valid origin"),
                });
            }
        }

        if let Some(raw) = &self.usage_store_url {
            parse_url("usage-store-url", raw)?;
            if self.usage_store_api_key.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Missing {
                    flag: "usage-store-api-key",
                    because: "usage-store-url",
                });
            }
        }

        if self.api_token.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::InvalidValue {
                flag: "api-token",
                message: "must not be empty".into(),
            });
        }

        Ok(())
    }

    /// The address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .or_else(|_| format!("[{}]:{}", self.host, self.port).parse())
            .map_err(|_| ConfigError::InvalidValue {
                flag: "host",
                message: format!("'{}' is not an IP address", self.host),
            })
    }

    /// Provider read timeout.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Per-call tool timeout.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Whole-loop timeout, if any.
    pub fn loop_timeout(&self) -> Option<Duration> {
        self.loop_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_url(flag: &'static str, raw: &str) -> Result<url::Url, ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        flag,
        message: format!("'{raw}': {e}"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            flag,
            message: format!("'{raw}' must use http or https"),
        });
    }
    Ok(parsed)
}
