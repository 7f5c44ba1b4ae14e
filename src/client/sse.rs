//! Server-Sent Events (SSE) stream handling for A2A streaming responses.
//!
//! A reader task parses `event:` / `data:` / `id:` frames off the HTTP body and
//! deserializes each frame into a [`StreamResponse`] (status updates, artifact
//! updates, task snapshots, and direct messages). Events travel to the
//! consumer over a bounded channel, so a consumer that stops pulling stops the
//! HTTP read as well.

use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};

use crate::error::{A2AError, A2AResult};
use crate::types::{JsonRpcError, StreamResponse};

/// A stream of A2A server-sent events.
///
/// Supports both pull-based (`next()`) and `futures::Stream` consumption.
/// Dropping the stream aborts the reader task, which drops the HTTP response
/// and closes the connection; [`SseStream::closed_handle`] observes that.
///
/// # Example
///
/// ```no_run
/// # async fn example(mut stream: a2a_handler::client::SseStream) {
/// while let Some(event) = stream.next().await {
///     match event {
///         Ok(response) => println!("Got event: {:?}", response),
///         Err(e) => eprintln!("Stream error: {}", e),
///     }
/// }
/// # }
/// ```
pub struct SseStream {
    receiver: mpsc::Receiver<A2AResult<StreamResponse>>,
    task: tokio::task::JoinHandle<()>,
    closed: StreamClosed,
}

impl std::fmt::Debug for SseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseStream")
            .field("closed", &self.closed.is_closed())
            .finish_non_exhaustive()
    }
}

/// Observes whether the connection behind an [`SseStream`] has been released.
#[derive(Debug, Clone)]
pub struct StreamClosed(watch::Receiver<bool>);

impl StreamClosed {
    /// True once the reader task has finished or been aborted.
    pub fn is_closed(&self) -> bool {
        *self.0.borrow()
    }

    /// Wait until the reader task has finished or been aborted.
    pub async fn wait(&self) {
        let mut rx = self.0.clone();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// Flips the closed flag when the reader future is dropped, whether it ran
/// to completion or was aborted.
struct CloseGuard(watch::Sender<bool>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        let _ = self.0.send(true);
    }
}

impl SseStream {
    /// Create an `SseStream` from a raw `reqwest::Response`.
    pub(crate) fn from_response(
        response: reqwest::Response,
        idle_timeout: Duration,
        buffer: usize,
    ) -> Self {
        Self::from_byte_stream(response.bytes_stream(), idle_timeout, buffer)
    }

    /// Create an `SseStream` over any stream of body chunks.
    ///
    /// If no chunk arrives within `idle_timeout` the stream yields
    /// [`A2AError::IdleTimeout`] and ends. `buffer` bounds the number of
    /// parsed events waiting for the consumer.
    pub fn from_byte_stream<S, B, E>(body: S, idle_timeout: Duration, buffer: usize) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let _guard = CloseGuard(closed_tx);
            if let Err(e) = read_frames(Box::pin(body), &tx, idle_timeout).await {
                tracing::debug!(error = %e, "SSE stream ended with error");
                let _ = tx.send(Err(e)).await;
            }
        });

        Self {
            receiver: rx,
            task,
            closed: StreamClosed(closed_rx),
        }
    }

    /// Get the next event from the stream.
    ///
    /// Returns `None` once the server closed the connection or after an
    /// error has been delivered.
    pub async fn next(&mut self) -> Option<A2AResult<StreamResponse>> {
        self.receiver.recv().await
    }

    /// A handle that reports when the underlying connection is released.
    pub fn closed_handle(&self) -> StreamClosed {
        self.closed.clone()
    }
}

impl Stream for SseStream {
    type Item = A2AResult<StreamResponse>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for SseStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Frame parsing
// ---------------------------------------------------------------------------

/// One dispatched SSE frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Incremental line-oriented frame builder.
#[derive(Debug, Default)]
pub(crate) struct FrameParser {
    current: SseFrame,
    has_data: bool,
}

impl FrameParser {
    /// Feed one line (without its terminator). Returns a frame on the blank
    /// line that ends it.
    pub fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comments are keep-alives.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.current.event = Some(value.to_string()),
            "id" => self.current.id = Some(value.to_string()),
            // retry: and unknown fields
            _ => {}
        }
        None
    }

    /// Flush a frame left open when the body ended without a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let frame = std::mem::take(&mut self.current);
        let had_data = std::mem::replace(&mut self.has_data, false);
        had_data.then_some(frame)
    }
}

async fn read_frames<S, B, E>(
    mut body: Pin<Box<S>>,
    tx: &mpsc::Sender<A2AResult<StreamResponse>>,
    idle_timeout: Duration,
) -> A2AResult<()>
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut parser = FrameParser::default();
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let chunk = match tokio::time::timeout(idle_timeout, body.next()).await {
            Err(_) => return Err(A2AError::IdleTimeout(idle_timeout)),
            Ok(None) => break,
            Ok(Some(chunk)) => {
                chunk.map_err(|e| A2AError::Transport(format!("error reading SSE stream: {e}")))?
            }
        };
        buffer.extend_from_slice(chunk.as_ref());

        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = buffer.drain(..=pos).collect();
            let line = std::str::from_utf8(&raw[..raw.len() - 1])
                .map_err(|e| A2AError::Transport(format!("invalid UTF-8 in SSE stream: {e}")))?
                .trim_end_matches('\r');

            if let Some(frame) = parser.push_line(line) {
                if !deliver(&frame, tx).await? {
                    return Ok(());
                }
            }
        }
    }

    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer).trim_end_matches('\r').to_string();
        if let Some(frame) = parser.push_line(&line) {
            deliver(&frame, tx).await?;
        }
    }
    if let Some(frame) = parser.finish() {
        deliver(&frame, tx).await?;
    }
    Ok(())
}

/// Decode and forward one frame. `Ok(false)` means the consumer is gone.
async fn deliver(
    frame: &SseFrame,
    tx: &mpsc::Sender<A2AResult<StreamResponse>>,
) -> A2AResult<bool> {
    match decode_frame(frame)? {
        Some(event) => Ok(tx.send(Ok(event)).await.is_ok()),
        None => Ok(true),
    }
}

/// Decode a frame's data into a [`StreamResponse`].
///
/// Handles two payload shapes:
/// 1. **Raw events**: the data is a `StreamResponse` directly.
/// 2. **JSON-RPC wrapped**: the data is a full JSON-RPC response; `result` is
///    unwrapped, and an `error` member becomes an error.
///
/// Returns `None` for frames that carry no event (`[DONE]`, blank data).
pub(crate) fn decode_frame(frame: &SseFrame) -> A2AResult<Option<StreamResponse>> {
    let data = frame.data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(data).map_err(|e| {
        A2AError::InvalidJson(format!("failed to parse SSE event data: {e} (data: {data})"))
    })?;

    let event_value = if value.get("jsonrpc").is_some() {
        if let Some(error) = value.get("error") {
            let error: JsonRpcError = serde_json::from_value(error.clone()).map_err(|e| {
                A2AError::InvalidJson(format!("malformed JSON-RPC error in SSE event: {e}"))
            })?;
            return Err(A2AError::from_remote(error));
        }
        value.get("result").cloned().ok_or_else(|| {
            A2AError::InvalidJson(format!(
                "JSON-RPC SSE response has neither 'result' nor 'error': {data}"
            ))
        })?
    } else {
        value
    };

    let event: StreamResponse = serde_json::from_value(event_value).map_err(|e| {
        A2AError::InvalidJson(format!(
            "failed to parse SSE event as StreamResponse: {e} (data: {data})"
        ))
    })?;

    Ok(Some(event))
}
