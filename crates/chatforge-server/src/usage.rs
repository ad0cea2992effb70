//! Best-effort bot usage counting.
//!
//! The chat route bumps a per-bot counter in an external document store.
//! The increment runs on a detached task; its outcome is only logged.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Value, json};

/// Boxed future returned by [`UsageCounter::increment`].
pub type IncrementFuture<'a> = Pin<Box<dyn Future<Output = Result<(), UsageError>> + Send + 'a>>;

/// Why an increment failed.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// The store could not be reached.
    #[error("usage store request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The store answered with a non-success status.
    #[error("usage store returned {status}: {body}")]
    Status {
        /// Response status.
        status: reqwest::StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },
}

/// Increments the usage counter of a bot.
pub trait UsageCounter: Send + Sync {
    /// Adds one to `bot_id`'s counter.
    fn increment<'a>(&'a self, bot_id: &'a str) -> IncrementFuture<'a>;
}

/// Counter used when no store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageCounter;

impl UsageCounter for NoopUsageCounter {
    fn increment<'a>(&'a self, bot_id: &'a str) -> IncrementFuture<'a> {
        tracing::trace!(bot_id, "usage store not configured, skipping increment");
        Box::pin(async { Ok(()) })
    }
}

/// Where [`HttpUsageCounter`] keeps its counters.
#[derive(Clone)]
pub struct UsageStoreConfig {
    /// Data API base URL, e.g. `https://data.example/app/v1`.
    pub base_url: String,
    /// Value of the `api-key` header.
    pub api_key: String,
    /// Cluster name.
    pub data_source: String,
    /// Database name.
    pub database: String,
    /// Collection with one document per bot.
    pub collection: String,
}

impl std::fmt::Debug for UsageStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageStoreConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("data_source", &self.data_source)
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}

/// Counter backed by a Data API style document store.
///
/// Sends one atomic `$inc` through `POST {base}/action/updateOne`.
#[derive(Debug, Clone)]
pub struct HttpUsageCounter {
    config: UsageStoreConfig,
    client: reqwest::Client,
}

impl HttpUsageCounter {
    /// Creates a counter using `client` for requests.
    pub fn new(config: UsageStoreConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/action/updateOne",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn update_body(&self, bot_id: &str) -> Value {
        json!({
            "dataSource": self.config.data_source,
            "database": self.config.database,
            "collection": self.config.collection,
            "filter": { "_id": { "$oid": bot_id } },
            "update": { "$inc": { "usageCount": 1 } }
        })
    }
}

impl UsageCounter for HttpUsageCounter {
    fn increment<'a>(&'a self, bot_id: &'a str) -> IncrementFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint())
                .header("api-key", &self.config.api_key)
                .json(&self.update_body(bot_id))
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UsageError::Status { status, body });
            }
            tracing::debug!(bot_id, "usage counter incremented");
            Ok(())
        })
    }
}

/// Runs the increment on a detached task. Failures are logged at `warn`.
pub fn spawn_increment(counter: Arc<dyn UsageCounter>, bot_id: String) {
    tokio::spawn(async move {
        if let Err(e) = counter.increment(&bot_id).await {
            tracing::warn!(bot_id = %bot_id, error = %e, "failed to increment usage counter");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    use super::*;

    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    async fn update_one(
        State(seen): State<Seen>,
        headers: HeaderMap,
        axum::Json(body): axum::Json<Value>,
    ) -> StatusCode {
        let key = headers
            .get("api-key")
            .map(|v| v.to_str().unwrap().to_string());
        seen.lock().unwrap().push((key, body));
        StatusCode::OK
    }

    async fn spawn_store() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/app/v1/action/updateOne", post(update_one))
            .with_state(Arc::clone(&seen));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/app/v1/"), seen)
    }

    fn counter(base_url: String) -> HttpUsageCounter {
        HttpUsageCounter::new(
            UsageStoreConfig {
                base_url,
                api_key: "store-key".into(),
                data_source: "Cluster0".into(),
                database: "chatforge".into(),
                collection: "bots".into(),
            },
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn test_increment_sends_inc() {
        let (url, seen) = spawn_store().await;
        counter(url)
            .increment("65f0c0ffee0000000000beef")
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let (key, body) = &seen[0];
        assert_eq!(key.as_deref(), Some("store-key"));
        assert_eq!(body["collection"], "bots");
        assert_eq!(body["filter"]["_id"]["$oid"], "65f0c0ffee0000000000beef");
        assert_eq!(body["update"]["$inc"]["usageCount"], 1);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (url, _) = spawn_store().await;
        let err = counter(format!("{url}missing"))
            .increment("b1")
            .await
            .unwrap_err();
        assert!(matches!(err, UsageError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_noop_counter() {
        NoopUsageCounter.increment("b1").await.unwrap();
    }

    #[tokio::test]
    async fn test_spawned_failure_is_swallowed() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        spawn_increment(Arc::new(counter(format!("http://{addr}"))), "b1".into());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[test]
    fn test_debug_redacts_key() {
        let c = counter("http://store".into());
        assert!(!format!("{c:?}").contains("store-key"));
    }
}
