//! Line-oriented SSE relay.

use std::fmt::Display;

use bytes::{Bytes, BytesMut};
use futures_util::{stream, Stream, StreamExt};
use serde_json::json;

use crate::observability::metrics;

/// Prefix marking an event-stream data line.
pub const DATA_PREFIX: &str = "data: ";

/// Terminal line sent by OpenAI-compatible servers.
pub const DONE_FRAME: &str = "data: [DONE]";

/// Longest unterminated line the relay will buffer.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Re-emit the data frames of an upstream event stream.
///
/// Each yielded item is one complete frame (`data: ...\n\n`). The stream
/// ends after the terminal sentinel, after the upstream body ends, or
/// after a single synthetic error frame when reading fails.
pub fn relay<S, E>(upstream: S) -> impl Stream<Item = Bytes> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    stream::unfold(RelayState::new(upstream), |mut state| async move {
        let frame = state.next_frame().await?;
        Some((frame, state))
    })
}

struct RelayState<S> {
    upstream: Option<S>,
    buffer: BytesMut,
    frames: usize,
}

impl<S, E> RelayState<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    fn new(upstream: S) -> Self {
        Self {
            upstream: Some(upstream),
            buffer: BytesMut::new(),
            frames: 0,
        }
    }

    async fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            if let Some(line) = self.take_line() {
                match line {
                    Ok(line) => {
                        if let Some(frame) = self.accept_line(&line) {
                            return Some(frame);
                        }
                    }
                    Err(err) => return Some(self.fail(err)),
                }
                continue;
            }

            if self.buffer.len() > MAX_LINE_BYTES {
                let len = self.buffer.len();
                return Some(self.fail(format!(
                    "event line exceeds {MAX_LINE_BYTES} bytes ({len} buffered)"
                )));
            }

            let upstream = self.upstream.as_mut()?;
            match upstream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(err)) => return Some(self.fail(err.to_string())),
                None => {
                    // Flush an unterminated last line, then finish.
                    let rest = self.buffer.split();
                    self.close();
                    if rest.is_empty() {
                        return None;
                    }
                    return match String::from_utf8(rest.to_vec()) {
                        Ok(line) => self.accept_line(&line),
                        Err(err) => Some(self.fail(err.to_string())),
                    };
                }
            }
        }
    }

    /// Pop one complete line from the buffer, without its line terminator.
    fn take_line(&mut self) -> Option<Result<String, String>> {
        let newline = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line = self.buffer.split_to(newline + 1);
        line.truncate(newline);
        if line.last() == Some(&b'\r') {
            line.truncate(newline - 1);
        }
        Some(String::from_utf8(line.to_vec()).map_err(|e| e.to_string()))
    }

    fn accept_line(&mut self, line: &str) -> Option<Bytes> {
        if line.trim().is_empty() || !line.starts_with(DATA_PREFIX) {
            return None;
        }

        self.frames += 1;
        if line.trim() == DONE_FRAME {
            tracing::debug!(frames = self.frames, "Upstream stream complete");
            self.close();
        }
        Some(Bytes::from(format!("{line}\n\n")))
    }

    fn fail(&mut self, err: impl Display) -> Bytes {
        tracing::error!(frames = self.frames, error = %err, "Streaming error");
        metrics::record_stream_fault();
        self.close();
        error_frame(&err.to_string())
    }

    fn close(&mut self) {
        self.upstream = None;
        self.buffer.clear();
    }
}

/// Synthetic terminal frame describing a relay fault.
pub fn error_frame(message: &str) -> Bytes {
    let payload = json!({
        "error": message,
        "type": "stream_error",
    });
    Bytes::from(format!("{DATA_PREFIX}{payload}\n\n"))
}
