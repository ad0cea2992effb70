//! The outgoing token stream of one chat request.
//!
//! A [`StreamSession`] wraps a [`TokenSink`] and remembers whether any
//! token reached it. The sink is closed exactly once: by
//! [`StreamSession::close`], [`StreamSession::fail`], or on drop.

use std::convert::Infallible;
use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Chunks buffered between the generating task and the response body.
pub const CHANNEL_CAPACITY: usize = 64;

/// Text written when a tool-using request produced no tokens.
pub const NO_TOKENS_MARKER: &str = "[⚠️ No tokens were streamed]";

/// Destination of streamed text.
pub trait TokenSink: Send {
    /// Writes one chunk. Returns `false` once the reader is gone.
    fn write(&mut self, chunk: String) -> impl Future<Output = bool> + Send;

    /// Ends the stream.
    fn close(&mut self);
}

/// A [`TokenSink`] feeding an HTTP response body through a channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Result<Bytes, Infallible>>>,
}

impl ChannelSink {
    /// Creates the sink and the receiving half for the response body.
    pub fn channel() -> (Self, mpsc::Receiver<Result<Bytes, Infallible>>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { tx: Some(tx) }, rx)
    }
}

impl TokenSink for ChannelSink {
    async fn write(&mut self, chunk: String) -> bool {
        match &self.tx {
            Some(tx) => tx.send(Ok(Bytes::from(chunk))).await.is_ok(),
            None => false,
        }
    }

    fn close(&mut self) {
        // Dropping the last sender ends the body stream.
        self.tx = None;
    }
}

/// One request's output stream plus its "has emitted" flag.
#[derive(Debug)]
pub struct StreamSession<S: TokenSink> {
    sink: Option<S>,
    emitted: bool,
}

impl<S: TokenSink> StreamSession<S> {
    /// Opens a session over `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink: Some(sink),
            emitted: false,
        }
    }

    /// Whether at least one non-empty token was written.
    pub fn emitted(&self) -> bool {
        self.emitted
    }

    /// Whether the sink is still open.
    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Writes a token. Empty tokens are skipped.
    ///
    /// Returns `false` when the client has gone away; the sink is then
    /// closed and every later write is a no-op.
    pub async fn emit(&mut self, token: &str) -> bool {
        if token.is_empty() {
            return self.is_open();
        }
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        if sink.write(token.to_string()).await {
            self.emitted = true;
            true
        } else {
            tracing::debug!("client disconnected, aborting stream");
            self.finish();
            false
        }
    }

    /// Writes the empty-stream warning if nothing was emitted.
    pub async fn warn_if_silent(&mut self) {
        if !self.emitted {
            tracing::warn!("tool loop finished without streaming any tokens");
            if let Some(sink) = self.sink.as_mut() {
                if !sink.write(NO_TOKENS_MARKER.to_string()).await {
                    self.finish();
                }
            }
        }
    }

    /// Ends the stream normally.
    pub fn close(mut self) {
        self.finish();
    }

    /// Writes a single error marker and ends the stream.
    pub async fn fail(mut self, message: &str) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = sink.write(format!("❌ {message}")).await;
        }
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.close();
        }
    }
}

impl<S: TokenSink> Drop for StreamSession<S> {
    fn drop(&mut self) {
        self.finish();
    }
}
