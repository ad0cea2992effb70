//! Incremental Server-Sent Events decoding shared by the HTTP providers.
//!
//! Network chunks can split both SSE frames and multi-byte UTF-8
//! characters. [`SseDecoder`] buffers across chunk boundaries and hands
//! back the `data:` payload of every complete frame.

use crate::error::LlmError;

/// Maximum size for buffers before the stream is aborted.
pub const MAX_BUF: usize = 16 * 1024 * 1024; // 16 MiB

/// Stateful SSE frame decoder.
///
/// ```rust
/// use chatforge::sse::SseDecoder;
///
/// let mut decoder = SseDecoder::default();
/// assert!(decoder.push(b"data: {\"a\"").unwrap().is_empty());
/// let frames = decoder.push(b":1}\n\n").unwrap();
/// assert_eq!(frames, vec!["{\"a\":1}".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    text: String,
    pending_bytes: Vec<u8>,
}

impl SseDecoder {
    /// Feeds one network chunk and returns the data payloads of all
    /// frames it completed, in order.
    ///
    /// Frames without a `data:` line (comments, keep-alives) are skipped.
    /// Fails once either internal buffer grows past [`MAX_BUF`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, LlmError> {
        self.pending_bytes.extend_from_slice(chunk);
        if self.pending_bytes.len() > MAX_BUF || self.text.len() > MAX_BUF {
            self.pending_bytes.clear();
            self.text.clear();
            return Err(LlmError::ResponseFormat {
                message: "SSE stream buffer exceeded 16 MiB".into(),
                raw: String::new(),
            });
        }

        self.decode_utf8();

        let mut payloads = Vec::new();
        while let Some((end, sep_len)) = frame_end(&self.text) {
            let frame: String = self.text.drain(..end + sep_len).collect();
            if let Some(data) = extract_data(&frame[..end]) {
                payloads.push(data);
            }
        }
        Ok(payloads)
    }

    /// Moves every complete UTF-8 sequence from `pending_bytes` into
    /// `text`. An incomplete trailing sequence stays buffered; invalid
    /// bytes are dropped.
    fn decode_utf8(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    self.pending_bytes.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid_up_to]));
                    match e.error_len() {
                        Some(bad) => {
                            self.pending_bytes.drain(..valid_up_to + bad);
                        }
                        None => {
                            self.pending_bytes.drain(..valid_up_to);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Position of the first blank-line frame separator and its length.
fn frame_end(text: &str) -> Option<(usize, usize)> {
    let lf = text.find("\n\n").map(|p| (p, 2));
    let crlf = text.find("\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Joins the `data:` lines of one frame. Multiple data lines are joined
/// with `\n`.
fn extract_data(frame: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        let Some(rest) = line.strip_prefix("data:") else {
            continue;
        };
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        match &mut data {
            Some(d) => {
                d.push('\n');
                d.push_str(rest);
            }
            None => data = Some(rest.to_string()),
        }
    }
    data
}
