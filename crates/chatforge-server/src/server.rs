//! Router assembly, shared state and the serve loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chatforge::ToolLoopConfig;
use serde_json::json;
use subtle::ConstantTimeEq;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::chat_stream;
use crate::config::ServerConfig;
use crate::error::{ApiError, ConfigError};
use crate::model::ProviderSettings;
use crate::usage::{HttpUsageCounter, NoopUsageCounter, UsageCounter, UsageStoreConfig};

/// Time allowed to establish a provider connection.
const PROVIDER_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// State shared by every request. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Provider base URLs and the provider HTTP client.
    pub providers: ProviderSettings,
    /// Client for action calls, carrying the tool timeout.
    pub tool_client: reqwest::Client,
    /// Limits for tool-using requests.
    pub loop_config: ToolLoopConfig,
    /// Usage counter for requests carrying a `botId`.
    pub usage: Arc<dyn UsageCounter>,
    /// Bearer token required on chat routes, if any.
    pub api_token: Option<Arc<str>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("providers", &self.providers)
            .field("loop_config", &self.loop_config)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Builds clients and settings from validated configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        // Bounds the silence between reads, not the length of the stream.
        let provider_client = reqwest::Client::builder()
            .connect_timeout(PROVIDER_CONNECT_TIMEOUT)
            .read_timeout(config.provider_timeout())
            .build()?;
        let tool_client = reqwest::Client::builder()
            .timeout(config.tool_timeout())
            .build()?;

        let usage: Arc<dyn UsageCounter> = match &config.usage_store_url {
            Some(base_url) => Arc::new(HttpUsageCounter::new(
                UsageStoreConfig {
                    base_url: base_url.clone(),
                    api_key: config.usage_store_api_key.clone().unwrap_or_default(),
                    data_source: config.usage_store_data_source.clone(),
                    database: config.usage_store_database.clone(),
                    collection: config.usage_store_collection.clone(),
                },
                tool_client.clone(),
            )),
            None => Arc::new(NoopUsageCounter),
        };

        Ok(Self {
            providers: ProviderSettings {
                openai_base_url: config.openai_base_url.clone(),
                google_base_url: config.google_base_url.clone(),
                google_model: config.google_model.clone(),
                client: provider_client,
            },
            tool_client,
            loop_config: ToolLoopConfig {
                max_iterations: config.max_iterations,
                parallel_tool_execution: false,
                timeout: config.loop_timeout(),
            },
            usage,
            api_token: config.api_token.as_deref().map(Arc::from),
        })
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Rejects chat requests without the configured bearer token.
async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        });

    match provided {
        Some(token) if token_matches(token, expected) => {
            Ok(next.run(request).await)
        }
        Some(_) => Err(ApiError::Unauthorized("Invalid bearer token".into())),
        None => Err(ApiError::Unauthorized("Missing bearer token".into())),
    }
}

fn token_matches(provided: &str, expected: &str) -> bool {
    bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };
    cors.max_age(Duration::from_secs(3600))
}

/// Builds the application router.
pub fn build_router(state: AppState, cors_allowed_origins: &[String]) -> Router {
    let chat_routes = Router::new()
        .route("/chat-stream", post(chat_stream))
        .route("/api/ask", post(chat_stream))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_token,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(chat_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_allowed_origins))
        .with_state(state)
}

/// Binds, serves until SIGINT/SIGTERM, then drains in-flight requests.
pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.validate()?;
    let addr = config.socket_addr()?;
    let state = AppState::from_config(&config)?;
    tracing::debug!(?state, "application state ready");
    let app = build_router(state, &config.cors_allowed_origins);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "chatforge listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
