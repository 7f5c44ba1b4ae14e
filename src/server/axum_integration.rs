//! Axum integration: ready-made HTTP routes for A2A servers.
//!
//! Provides an [`a2a_router`] function that creates an axum `Router` with:
//! - `POST /` and `POST /a2a`: JSON-RPC 2.0 dispatch for all A2A methods
//! - `GET /.well-known/agent-card.json`: agent card discovery
//! - `GET /.well-known/agent.json`: agent card at the previous path
//!
//! # Supported JSON-RPC Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | `message/send` | Send a message and get a task or message |
//! | `message/stream` | Send a message with SSE streaming |
//! | `tasks/get` | Retrieve a task by ID |
//! | `tasks/cancel` | Cancel a running task |
//! | `tasks/resubscribe` | Re-subscribe to a running task's stream |
//! | `tasks/pushNotificationConfig/set` | Set push notification config |
//! | `tasks/pushNotificationConfig/get` | Get push notification config |
//!
//! # Example
//!
//! ```rust,ignore
//! use a2a_handler::server::{a2a_router, DefaultRequestHandler, EchoAgent, InMemoryTaskStore};
//! use std::sync::Arc;
//!
//! let handler = Arc::new(DefaultRequestHandler::new(
//!     Arc::new(EchoAgent::new()),
//!     Arc::new(InMemoryTaskStore::new()),
//! ));
//! let app = a2a_router(handler, agent_card);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::stream::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, JsonRpcId, JsonRpcRequest, JsonRpcResponse, StreamResponse, TaskState,
};

use super::event_queue::EventSubscriber;
use super::request_handler::RequestHandler;

/// Current well-known agent card path.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

/// Agent card path used before protocol 0.3.
pub const PREV_AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Shared state for the axum routes.
struct AppState {
    handler: Arc<dyn RequestHandler>,
    agent_card: AgentCard,
}

/// Create an axum Router with A2A protocol routes.
///
/// # Parameters
///
/// - `handler`: the request handler implementing A2A logic
/// - `agent_card`: the agent card to serve at the well-known endpoints
pub fn a2a_router(handler: Arc<dyn RequestHandler>, agent_card: AgentCard) -> Router {
    let state = Arc::new(AppState {
        handler,
        agent_card,
    });

    Router::new()
        .route(AGENT_CARD_PATH, get(handle_agent_card))
        .route(PREV_AGENT_CARD_PATH, get(handle_agent_card))
        .route("/", post(handle_jsonrpc))
        .route("/a2a", post(handle_jsonrpc))
        .with_state(state)
}

/// Serve the agent card.
async fn handle_agent_card(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.agent_card.clone())
}

/// Main JSON-RPC dispatch handler.
///
/// Parses the incoming JSON-RPC request, routes to the appropriate handler
/// method, and returns either a JSON response or an SSE stream.
async fn handle_jsonrpc(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice::<Value>(&body) {
        Ok(value) => match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return rpc_error(None, A2AError::invalid_request(e.to_string()));
            }
        },
        Err(e) => return rpc_error(None, A2AError::parse_error(e.to_string())),
    };

    if request.jsonrpc != "2.0" {
        return rpc_error(
            request.id,
            A2AError::invalid_request("Invalid JSON-RPC version, must be \"2.0\""),
        );
    }

    debug!(method = %request.method, "JSON-RPC request received");

    let JsonRpcRequest {
        id, method, params, ..
    } = request;
    let handler = &state.handler;

    match method.as_str() {
        "message/send" => match parse_params(params) {
            Ok(params) => rpc_result(id, handler.on_message_send(params).await),
            Err(e) => rpc_error(id, e),
        },
        "message/stream" => {
            if !state.agent_card.supports_streaming() {
                return rpc_error(
                    id,
                    A2AError::unsupported_operation("Streaming is not supported by the agent"),
                );
            }
            match parse_params(params) {
                Ok(params) => sse_result(id, handler.on_message_send_stream(params).await),
                Err(e) => rpc_error(id, e),
            }
        }
        "tasks/get" => match parse_params(params) {
            Ok(params) => rpc_result(id, handler.on_get_task(params).await),
            Err(e) => rpc_error(id, e),
        },
        "tasks/cancel" => match parse_params(params) {
            Ok(params) => rpc_result(id, handler.on_cancel_task(params).await),
            Err(e) => rpc_error(id, e),
        },
        "tasks/resubscribe" => match parse_params(params) {
            Ok(params) => sse_result(id, handler.on_resubscribe(params).await),
            Err(e) => rpc_error(id, e),
        },
        "tasks/pushNotificationConfig/set" => match parse_params(params) {
            Ok(params) => rpc_result(id, handler.on_set_push_config(params).await),
            Err(e) => rpc_error(id, e),
        },
        "tasks/pushNotificationConfig/get" => match parse_params(params) {
            Ok(params) => rpc_result(id, handler.on_get_push_config(params).await),
            Err(e) => rpc_error(id, e),
        },
        method => {
            warn!(method = %method, "Unknown JSON-RPC method");
            rpc_error(id, A2AError::method_not_found(method))
        }
    }
}

// ---- Response helpers ----

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> A2AResult<T> {
    let params = params.ok_or_else(|| A2AError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(|e| A2AError::invalid_params(e.to_string()))
}

fn rpc_error(id: Option<JsonRpcId>, err: A2AError) -> Response {
    debug!(code = err.code(), error = %err, "JSON-RPC error response");
    Json(JsonRpcResponse::from_a2a_error(id, err)).into_response()
}

fn rpc_result<T: Serialize>(id: Option<JsonRpcId>, result: A2AResult<T>) -> Response {
    match result.and_then(|value| {
        serde_json::to_value(value).map_err(|e| A2AError::internal_error(e.to_string()))
    }) {
        Ok(value) => Json(JsonRpcResponse::success(id, value)).into_response(),
        Err(e) => rpc_error(id, e),
    }
}

/// Errors raised before the stream starts are answered as plain JSON-RPC.
fn sse_result(id: Option<JsonRpcId>, result: A2AResult<EventSubscriber>) -> Response {
    match result {
        Ok(events) => Sse::new(make_sse_stream(id, events))
            .keep_alive(KeepAlive::default())
            .into_response(),
        Err(e) => rpc_error(id, e),
    }
}

// ---- SSE streaming ----

/// Whether an event ends the stream for this turn.
fn ends_stream(event: &StreamResponse) -> bool {
    match event {
        StreamResponse::StatusUpdate(update) => {
            update.r#final
                || update.status.state.is_terminal()
                || update.status.state == TaskState::InputRequired
        }
        StreamResponse::Task(task) => task.status.state.is_terminal(),
        StreamResponse::Message(_) => true,
        StreamResponse::ArtifactUpdate(_) => false,
    }
}

/// Create an SSE stream from a queue subscription.
///
/// Each `StreamResponse` event is wrapped in a JSON-RPC 2.0 success response
/// envelope and sent with the event's `kind` as the SSE event name.
///
/// The stream ends when the queue is closed or the turn is over.
fn make_sse_stream(
    request_id: Option<JsonRpcId>,
    mut events: EventSubscriber,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = events.recv().await {
            let done = ends_stream(&event);

            let event_type = match &event {
                StreamResponse::StatusUpdate(_) => "status-update",
                StreamResponse::ArtifactUpdate(_) => "artifact-update",
                StreamResponse::Task(_) => "task",
                StreamResponse::Message(_) => "message",
            };

            match serde_json::to_value(&event)
                .and_then(|result| {
                    serde_json::to_string(&JsonRpcResponse::success(request_id.clone(), result))
                })
            {
                Ok(json) => yield Ok(Event::default().event(event_type).data(json)),
                Err(e) => error!(error = %e, "Failed to serialize SSE event"),
            }

            if done {
                break;
            }
        }
    }
}
