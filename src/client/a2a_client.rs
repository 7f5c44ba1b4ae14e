//! Typed JSON-RPC client for remote agents.
//!
//! One method per A2A v0.3 JSON-RPC method. No conversation state lives
//! here; [`SessionClient`](super::SessionClient) layers sessions on top.

use serde::Serialize;

use crate::auth::AuthCredentials;
use crate::error::{A2AError, A2AResult};
use crate::types::{
    GetTaskParams, GetTaskPushNotificationConfigParams, JsonRpcId, JsonRpcRequest,
    JsonRpcResponse, SendMessageParams, SendMessageResponse, Task, TaskIdParams,
    TaskPushNotificationConfig,
};

use super::sse::SseStream;
use super::transport::{JsonRpcTransport, Transport, TransportConfig};

/// Client for the A2A JSON-RPC methods:
/// - `message/send`: send a message and get a task or message back
/// - `message/stream`: send a message and stream status/artifact updates
/// - `tasks/get`: retrieve a task by ID
/// - `tasks/cancel`: cancel a running task
/// - `tasks/resubscribe`: resubscribe to task update events
/// - `tasks/pushNotificationConfig/set`: set push notification config
/// - `tasks/pushNotificationConfig/get`: get push notification config
///
/// Every method takes the credentials to send with that call.
///
/// ```no_run
/// use a2a_handler::client::{A2AClient, JsonRpcTransport};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = A2AClient::from_endpoint("http://localhost:7420/")?;
///
/// let transport = JsonRpcTransport::new("http://localhost:7420/a2a")?;
/// let client = A2AClient::with_transport(Box::new(transport));
/// # Ok(())
/// # }
/// ```
pub struct A2AClient {
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for A2AClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("A2AClient").finish_non_exhaustive()
    }
}

impl A2AClient {
    /// Create a client with a custom transport.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Create a client for a known JSON-RPC endpoint with default settings.
    pub fn from_endpoint(url: &str) -> A2AResult<Self> {
        Self::from_endpoint_with_config(url, TransportConfig::default())
    }

    /// Create a client for a known JSON-RPC endpoint.
    pub fn from_endpoint_with_config(url: &str, config: TransportConfig) -> A2AResult<Self> {
        let transport = JsonRpcTransport::with_config(url, config)?;
        Ok(Self::with_transport(Box::new(transport)))
    }

    /// Send a message to the agent (`message/send`).
    pub async fn send_message(
        &self,
        params: SendMessageParams,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<SendMessageResponse> {
        let request = build_request("message/send", &params)?;
        let response = self.transport.send(&request, auth).await?;
        parse_result(response)
    }

    /// Send a message with streaming (`message/stream`).
    pub async fn send_message_stream(
        &self,
        params: SendMessageParams,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<SseStream> {
        let request = build_request("message/stream", &params)?;
        self.transport.send_stream(&request, auth).await
    }

    /// Get the current state of a task (`tasks/get`).
    pub async fn get_task(
        &self,
        params: GetTaskParams,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<Task> {
        let request = build_request("tasks/get", &params)?;
        let response = self.transport.send(&request, auth).await?;
        parse_result(response)
    }

    /// Cancel a running task (`tasks/cancel`).
    pub async fn cancel_task(
        &self,
        params: TaskIdParams,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<Task> {
        let request = build_request("tasks/cancel", &params)?;
        let response = self.transport.send(&request, auth).await?;
        parse_result(response)
    }

    /// Reopen a task's event stream (`tasks/resubscribe`).
    pub async fn resubscribe(
        &self,
        params: TaskIdParams,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<SseStream> {
        let request = build_request("tasks/resubscribe", &params)?;
        self.transport.send_stream(&request, auth).await
    }

    /// Set push notification configuration for a task
    /// (`tasks/pushNotificationConfig/set`).
    pub async fn set_push_config(
        &self,
        params: TaskPushNotificationConfig,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let request = build_request("tasks/pushNotificationConfig/set", &params)?;
        let response = self.transport.send(&request, auth).await?;
        parse_result(response)
    }

    /// Get push notification configuration for a task
    /// (`tasks/pushNotificationConfig/get`).
    pub async fn get_push_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
        auth: Option<&AuthCredentials>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let request = build_request("tasks/pushNotificationConfig/get", &params)?;
        let response = self.transport.send(&request, auth).await?;
        parse_result(response)
    }

    /// Close the client and release any held resources.
    pub async fn close(self) -> A2AResult<()> {
        self.transport.close().await
    }
}

// ──────────────────────────────────────────────────
// Internal helpers
// ──────────────────────────────────────────────────

/// Build a JSON-RPC request with a random UUID ID.
pub(crate) fn build_request(method: &str, params: &impl Serialize) -> A2AResult<JsonRpcRequest> {
    let params_value = serde_json::to_value(params)
        .map_err(|e| A2AError::Transport(format!("failed to serialize request params: {e}")))?;

    Ok(JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(JsonRpcId::String(uuid::Uuid::new_v4().to_string())),
        method: method.to_string(),
        params: Some(params_value),
    })
}

/// Parse the `result` field from a JSON-RPC response into the expected type.
///
/// An `error` member is mapped through [`A2AError::from_remote`], so
/// task-not-found and task-not-cancelable replies come back typed.
pub(crate) fn parse_result<T: serde::de::DeserializeOwned>(
    response: JsonRpcResponse,
) -> A2AResult<T> {
    if let Some(error) = response.error {
        return Err(A2AError::from_remote(error));
    }

    let result = response.result.ok_or_else(|| {
        A2AError::InvalidJson("JSON-RPC response has neither 'result' nor 'error'".to_string())
    })?;

    serde_json::from_value(result)
        .map_err(|e| A2AError::InvalidJson(format!("failed to deserialize response result: {e}")))
}
