//! Mock provider for testing.
//!
//! [`MockProvider`] is a queue-based fake that lets tests decide exactly
//! what a provider returns, without touching the network. It implements
//! [`Provider`], so it also works behind [`DynProvider`](crate::DynProvider).
//!
//! ```rust,no_run
//! use chatforge::mock::MockProvider;
//! use chatforge::test_helpers::mock_for;
//! use chatforge::{ChatParams, Provider, StreamEvent, StopReason};
//!
//! # async fn example() {
//! let mock = mock_for("test", "test-model");
//! mock.queue_stream(vec![
//!     StreamEvent::TextDelta("Hello!".into()),
//!     StreamEvent::Done { stop_reason: StopReason::EndTurn },
//! ]);
//!
//! let _stream = mock.stream(&ChatParams::default()).await.unwrap();
//! assert_eq!(mock.recorded_calls().len(), 1);
//! # }
//! ```
//!
//! [`LlmError`] holds a `Box<dyn Error>` and is not `Clone`, so queued
//! failures are expressed as [`MockError`] and converted on dequeue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatParams, Provider, ProviderMetadata};
use crate::stream::{ChatStream, StreamEvent};

type QueuedStream = Result<Vec<Result<StreamEvent, MockError>>, MockError>;

/// A queue-based mock provider for unit and integration tests.
///
/// Each call to `stream` pops from the front of the queue and records
/// its [`ChatParams`].
///
/// # Panics
///
/// [`stream`](Provider::stream) panics if the queue is empty.
pub struct MockProvider {
    stream_responses: Mutex<VecDeque<QueuedStream>>,
    meta: ProviderMetadata,
    calls: Arc<Mutex<Vec<ChatParams>>>,
}

/// Cloneable error subset for mock queuing.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Maps to [`LlmError::Http`].
    Http {
        /// HTTP status code, if any.
        status: Option<http::StatusCode>,
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Maps to [`LlmError::Auth`].
    Auth(String),
    /// Maps to [`LlmError::InvalidRequest`].
    InvalidRequest(String),
    /// Maps to [`LlmError::Provider`].
    Provider {
        /// Provider error code.
        code: String,
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Maps to [`LlmError::Timeout`].
    Timeout {
        /// Elapsed milliseconds.
        elapsed_ms: u64,
    },
}

impl MockError {
    fn into_llm_error(self) -> LlmError {
        match self {
            Self::Http {
                status,
                message,
                retryable,
            } => LlmError::Http {
                status,
                message,
                retryable,
            },
            Self::Auth(msg) => LlmError::Auth(msg),
            Self::InvalidRequest(msg) => LlmError::InvalidRequest(msg),
            Self::Provider {
                code,
                message,
                retryable,
            } => LlmError::Provider {
                code,
                message,
                retryable,
            },
            Self::Timeout { elapsed_ms } => LlmError::Timeout { elapsed_ms },
        }
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stream_len = self.stream_responses.lock().unwrap().len();
        let call_count = self.calls.lock().unwrap().len();
        f.debug_struct("MockProvider")
            .field("meta", &self.meta)
            .field("queued_streams", &stream_len)
            .field("recorded_calls", &call_count)
            .finish()
    }
}

impl MockProvider {
    /// Creates a new mock with the given metadata and empty queues.
    pub fn new(meta: ProviderMetadata) -> Self {
        Self {
            stream_responses: Mutex::new(VecDeque::new()),
            meta,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Enqueues stream events for the next `stream` call.
    pub fn queue_stream(&self, events: Vec<StreamEvent>) -> &Self {
        self.queue_stream_results(events.into_iter().map(Ok).collect())
    }

    /// Enqueues a stream whose items may fail part-way through, the way
    /// a dropped connection looks after the first tokens arrived.
    pub fn queue_stream_results(&self, items: Vec<Result<StreamEvent, MockError>>) -> &Self {
        self.stream_responses.lock().unwrap().push_back(Ok(items));
        self
    }

    /// Enqueues an error returned by `stream()` itself, before any event.
    pub fn queue_stream_error(&self, error: MockError) -> &Self {
        self.stream_responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Returns a clone of every `ChatParams` seen, in call order.
    pub fn recorded_calls(&self) -> Vec<ChatParams> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, params: &ChatParams) {
        self.calls.lock().unwrap().push(params.clone());
    }
}

impl Provider for MockProvider {
    async fn stream(&self, params: &ChatParams) -> Result<ChatStream, LlmError> {
        self.record_call(params);
        let result = self
            .stream_responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockProvider: no queued stream responses remaining");
        let items = result.map_err(MockError::into_llm_error)?;
        let stream = futures::stream::iter(
            items
                .into_iter()
                .map(|item| item.map_err(MockError::into_llm_error)),
        );
        Ok(Box::pin(stream))
    }

    fn metadata(&self) -> ProviderMetadata {
        self.meta.clone()
    }
}
