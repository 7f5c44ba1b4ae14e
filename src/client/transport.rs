//! Transport layer for A2A client communication.
//!
//! Provides the `Transport` trait for abstracting over different communication
//! protocols, and `JsonRpcTransport` for the standard JSON-RPC over HTTP binding.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};

use crate::error::{A2AError, A2AResult};
use crate::types::{JsonRpcRequest, JsonRpcResponse};

use crate::auth::AuthCredentials;
use super::sse::SseStream;

/// Transport abstraction for A2A communication.
///
/// Implementations handle the low-level details of sending JSON-RPC requests
/// and receiving responses (or SSE streams) over a particular protocol binding.
/// Credentials are passed per call so one transport can serve several sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a JSON-RPC request and receive a JSON-RPC response.
    async fn send(
        &self,
        request: &JsonRpcRequest,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<JsonRpcResponse>;

    /// Send a JSON-RPC request and receive an SSE event stream.
    ///
    /// Used for streaming methods like `message/stream` and `tasks/resubscribe`.
    async fn send_stream(
        &self,
        request: &JsonRpcRequest,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<SseStream>;

    /// Close the transport and release any held resources.
    ///
    /// The default implementation is a no-op.
    async fn close(&self) -> A2AResult<()> {
        Ok(())
    }
}

/// Configuration for [`JsonRpcTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request deadline. For streams it covers receiving the response
    /// headers only. Defaults to 60 seconds.
    pub timeout: Duration,
    /// Longest silence tolerated on an open stream. Defaults to 300 seconds.
    pub idle_timeout: Duration,
    /// Parsed stream events buffered ahead of the consumer. Defaults to 32.
    pub stream_buffer: usize,
    /// Additional HTTP headers to include on every request.
    pub headers: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(300),
            stream_buffer: 32,
            headers: HashMap::new(),
        }
    }
}

/// JSON-RPC over HTTP transport using `reqwest`.
///
/// Sends POST requests with `Content-Type: application/json` and parses the
/// response as a JSON-RPC result or error. For streaming methods the response
/// is read as an SSE event stream.
///
/// # Example
///
/// ```no_run
/// use a2a_handler::client::JsonRpcTransport;
///
/// let transport = JsonRpcTransport::new("http://localhost:7420/a2a").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    client: reqwest::Client,
    url: String,
    config: TransportConfig,
}

impl JsonRpcTransport {
    /// Create a new transport targeting the given A2A endpoint URL with the
    /// default configuration.
    pub fn new(url: impl Into<String>) -> A2AResult<Self> {
        Self::with_config(url, TransportConfig::default())
    }

    /// Create a new transport with custom configuration.
    pub fn with_config(url: impl Into<String>, config: TransportConfig) -> A2AResult<Self> {
        header_map(&config.headers)?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| A2AError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            config,
        })
    }

    /// Create a new transport with an existing `reqwest::Client`.
    ///
    /// Useful when you want to share a connection pool or configure TLS
    /// settings externally. Headers in `config` are still applied per request.
    pub fn with_client(
        url: impl Into<String>,
        client: reqwest::Client,
        config: TransportConfig,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            config,
        }
    }

    /// Returns the URL this transport sends requests to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn post(
        &self,
        request: &JsonRpcRequest,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<reqwest::RequestBuilder> {
        let body = serde_json::to_vec(request).map_err(|e| {
            A2AError::Transport(format!("failed to serialize JSON-RPC request: {e}"))
        })?;

        let mut builder = self
            .client
            .post(&self.url)
            .headers(header_map(&self.config.headers)?)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(auth) = auth {
            let (name, value) = auth.to_header();
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| A2AError::Other(format!("invalid auth header name: {e}")))?;
            let mut value = HeaderValue::from_str(&value)
                .map_err(|e| A2AError::Other(format!("invalid auth header value: {e}")))?;
            value.set_sensitive(true);
            builder = builder.header(name, value);
        }
        Ok(builder)
    }
}

/// Convert user-supplied header pairs, rejecting names or values that are
/// not valid HTTP.
pub(crate) fn header_map(headers: &HashMap<String, String>) -> A2AResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| A2AError::Other(format!("invalid header name '{key}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| A2AError::Other(format!("invalid value for header '{key}': {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Map a `reqwest` send failure onto the crate's error kinds.
pub(crate) fn map_send_error(e: reqwest::Error, what: &str) -> A2AError {
    if e.is_timeout() {
        A2AError::Timeout(format!("{what} timed out: {e}"))
    } else if e.is_connect() {
        A2AError::Connection(format!("{what} connection failed: {e}"))
    } else {
        A2AError::Transport(format!("{what} failed: {e}"))
    }
}

#[async_trait]
impl Transport for JsonRpcTransport {
    async fn send(
        &self,
        request: &JsonRpcRequest,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<JsonRpcResponse> {
        tracing::debug!(method = %request.method, url = %self.url, "sending JSON-RPC request");

        let response = self
            .post(request, auth)?
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| map_send_error(e, "request"))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_send_error(e, "reading response body"))?;

        let rpc_response: JsonRpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
            A2AError::InvalidJson(format!("failed to parse JSON-RPC response: {e}"))
        })?;

        Ok(rpc_response)
    }

    async fn send_stream(
        &self,
        request: &JsonRpcRequest,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<SseStream> {
        tracing::debug!(method = %request.method, url = %self.url, "opening SSE stream");

        let pending = self
            .post(request, auth)?
            .header(ACCEPT, "text/event-stream")
            .send();

        // The body may legitimately stay open far longer than `timeout`, so
        // only the wait for response headers is bounded here.
        let response = tokio::time::timeout(self.config.timeout, pending)
            .await
            .map_err(|_| {
                A2AError::Timeout(format!(
                    "stream request timed out after {:?}",
                    self.config.timeout
                ))
            })?
            .map_err(|e| map_send_error(e, "stream request"))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        // Agents refuse a stream request (unknown task, terminal task) with
        // an ordinary JSON-RPC error body instead of an event stream.
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if is_json {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| map_send_error(e, "reading response body"))?;
            let rpc_response: JsonRpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
                A2AError::InvalidJson(format!("failed to parse JSON-RPC response: {e}"))
            })?;
            return Err(match rpc_response.error {
                Some(error) => A2AError::from_remote(error),
                None => A2AError::InvalidJson(
                    "expected an event stream, got a JSON-RPC result".to_string(),
                ),
            });
        }

        Ok(SseStream::from_response(
            response,
            self.config.idle_timeout,
            self.config.stream_buffer,
        ))
    }
}
