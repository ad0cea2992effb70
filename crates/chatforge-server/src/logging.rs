//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crates whose events pass the default filter.
const LOG_TARGETS: &[&str] = &[
    "chatforge",
    "chatforge_openai",
    "chatforge_google",
    "chatforge_server",
    "tower_http",
];

/// Logging options taken from [`ServerConfig`](crate::ServerConfig).
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level applied to [`LOG_TARGETS`] when `RUST_LOG` is unset.
    pub level: String,
    /// One JSON object per line instead of the human format.
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json_format: false,
        }
    }
}

/// Builds the filter directive string for the configured level.
fn default_directives(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global subscriber. Later calls are ignored, so tests
/// and embedders may call it freely.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true);
    let fmt_layer = if config.json_format {
        fmt_layer.json().flatten_event(true).boxed()
    } else {
        fmt_layer.boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_cover_all_targets() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("chatforge=debug,"));
        assert!(directives.contains("chatforge_server=debug"));
        assert_eq!(directives.matches('=').count(), LOG_TARGETS.len());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(&LoggingConfig::default());
        init_logging(&LoggingConfig {
            level: "warn".into(),
            json_format: true,
        });
    }
}
