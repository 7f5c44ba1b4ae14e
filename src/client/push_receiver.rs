//! Webhook endpoint for A2A push notifications.
//!
//! A [`PushReceiver`] serves a small axum application:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST {path}` | deliver a task event |
//! | `GET {path}` | validation ping used by agents before registering |
//! | `GET /notifications` | recent deliveries, newest last |
//! | `POST /notifications/clear` | empty that log |
//!
//! Deliveries are routed by task id into the queue of every
//! [`OutcomeStream`](super::OutcomeStream) that registered the task, so push
//! and SSE events for one session arrive through a single consumer.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::{StreamResponse, Task, TaskStatusUpdateEvent};

use super::outcome::{Inbound, InboundSender};

/// Header carrying the token an agent was given at registration.
pub const NOTIFICATION_TOKEN_HEADER: &str = "X-A2A-Notification-Token";

/// Settings for a [`PushReceiver`].
#[derive(Debug, Clone)]
pub struct PushReceiverConfig {
    /// Webhook route. Defaults to `/webhook`.
    pub path: String,

    /// Expected `X-A2A-Notification-Token`. When set, deliveries without a
    /// matching header are rejected.
    pub token: Option<String>,

    /// Externally reachable webhook URL, for receivers behind a proxy.
    /// Defaults to `http://{local_addr}{path}`.
    pub public_url: Option<String>,

    /// How many deliveries `GET /notifications` remembers.
    pub log_capacity: usize,
}

impl Default for PushReceiverConfig {
    fn default() -> Self {
        Self {
            path: "/webhook".to_string(),
            token: None,
            public_url: None,
            log_capacity: 100,
        }
    }
}

/// One delivery, as kept in the notification log.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// When the delivery arrived.
    pub timestamp: DateTime<Utc>,
    /// Task the delivery was about.
    pub task_id: String,
    /// The JSON body as received.
    pub payload: Value,
}

struct Route {
    registration: u64,
    sender: InboundSender,
}

struct Inner {
    config: PushReceiverConfig,
    local_addr: Option<SocketAddr>,
    routes: Mutex<HashMap<String, Vec<Route>>>,
    log: Mutex<VecDeque<Notification>>,
    next_registration: AtomicU64,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl Inner {
    fn routes(&self) -> MutexGuard<'_, HashMap<String, Vec<Route>>> {
        self.routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn log(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Webhook receiver shared by every session of a
/// [`SessionClient`](super::SessionClient). Cheap to clone.
#[derive(Clone)]
pub struct PushReceiver {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PushReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushReceiver")
            .field("path", &self.inner.config.path)
            .field("local_addr", &self.inner.local_addr)
            .finish_non_exhaustive()
    }
}

impl PushReceiver {
    /// A receiver that is not listening anywhere yet. Serve
    /// [`PushReceiver::router`] yourself, or use [`PushReceiver::bind`].
    pub fn new(config: PushReceiverConfig) -> Self {
        Self::with_addr(config, None)
    }

    fn with_addr(config: PushReceiverConfig, local_addr: Option<SocketAddr>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                local_addr,
                routes: Mutex::new(HashMap::new()),
                log: Mutex::new(VecDeque::new()),
                next_registration: AtomicU64::new(1),
                shutdown: Mutex::new(None),
            }),
        }
    }

    /// Bind `addr` and serve the webhook routes on a background task.
    ///
    /// # Errors
    ///
    /// [`A2AError::Push`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, config: PushReceiverConfig) -> A2AResult<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| A2AError::Push(format!("failed to bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| A2AError::Push(format!("failed to read bound address: {e}")))?;

        let receiver = Self::with_addr(config, Some(local_addr));
        let (tx, rx) = oneshot::channel::<()>();
        *receiver
            .inner
            .shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tx);

        let app = receiver.router();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "push receiver stopped");
            }
        });

        info!(addr = %local_addr, "push receiver listening");
        Ok(receiver)
    }

    /// The webhook routes, for mounting into an existing application.
    pub fn router(&self) -> Router {
        let path = self.inner.config.path.clone();
        Router::new()
            .route(&path, post(handle_webhook).get(handle_ping))
            .route("/notifications", get(handle_list))
            .route("/notifications/clear", post(handle_clear))
            .with_state(self.inner.clone())
    }

    /// Address the receiver is bound to, when started with [`bind`](Self::bind).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr
    }

    /// URL to register with agents.
    pub fn webhook_url(&self) -> Option<String> {
        if let Some(url) = &self.inner.config.public_url {
            return Some(url.clone());
        }
        self.inner
            .local_addr
            .map(|addr| format!("http://{addr}{}", self.inner.config.path))
    }

    /// Token agents must echo back.
    pub fn token(&self) -> Option<&str> {
        self.inner.config.token.as_deref()
    }

    /// Route deliveries for `task_id` into `sender` until the returned
    /// registration is dropped. Several sessions may follow one task; each
    /// gets its own copy of every delivery.
    pub(crate) fn register(&self, task_id: &str, sender: InboundSender) -> PushRegistration {
        let registration = self.inner.next_registration.fetch_add(1, Ordering::Relaxed);
        let listeners = {
            let mut routes = self.inner.routes();
            let routes = routes.entry(task_id.to_string()).or_default();
            routes.push(Route {
                registration,
                sender,
            });
            routes.len()
        };
        debug!(task_id = %task_id, listeners, "push route registered");
        PushRegistration {
            task_id: task_id.to_string(),
            registration,
            inner: self.inner.clone(),
        }
    }

    /// Number of live registrations for `task_id`.
    pub fn listeners(&self, task_id: &str) -> usize {
        self.inner.routes().get(task_id).map_or(0, Vec::len)
    }

    /// Recent deliveries, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.log().iter().cloned().collect()
    }

    /// Forget every logged delivery.
    pub fn clear_notifications(&self) {
        self.inner.log().clear();
    }

    /// Stop serving. Only meaningful for receivers started with
    /// [`bind`](Self::bind).
    pub fn shutdown(&self) {
        let sender = self
            .inner
            .shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(());
            info!("push receiver shutting down");
        }
    }
}

/// Keeps a push route alive. Dropping it removes the route.
pub(crate) struct PushRegistration {
    task_id: String,
    registration: u64,
    inner: Arc<Inner>,
}

impl PushRegistration {
    pub(crate) fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl Drop for PushRegistration {
    fn drop(&mut self) {
        let mut routes = self.inner.routes();
        if let Some(listeners) = routes.get_mut(&self.task_id) {
            listeners.retain(|route| route.registration != self.registration);
            if listeners.is_empty() {
                routes.remove(&self.task_id);
            }
            debug!(task_id = %self.task_id, "push route removed");
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn reject(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    warn!(status = %status, "rejected push notification: {}", message);
    (status, Json(json!({"status": "error", "message": message}))).into_response()
}

async fn handle_ping() -> Json<Value> {
    Json(json!({"status": "ok", "message": "Webhook is active"}))
}

async fn handle_list(State(inner): State<Arc<Inner>>) -> Json<Value> {
    let log = inner.log();
    Json(json!({
        "count": log.len(),
        "notifications": log.iter().collect::<Vec<_>>(),
    }))
}

async fn handle_clear(State(inner): State<Arc<Inner>>) -> Json<Value> {
    inner.log().clear();
    Json(json!({"status": "ok", "message": "Notifications cleared"}))
}

async fn handle_webhook(
    State(inner): State<Arc<Inner>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(expected) = inner.config.token.as_deref() {
        let presented = headers
            .get(NOTIFICATION_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(expected) {
            return reject(StatusCode::BAD_REQUEST, "missing or wrong notification token");
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => return reject(StatusCode::BAD_REQUEST, format!("body is not JSON: {e}")),
    };

    let Some(task_id) = payload_task_id(&payload) else {
        return reject(StatusCode::BAD_REQUEST, "payload carries no task id");
    };

    let event = match decode_payload(&payload) {
        Ok(event) => event,
        Err(message) => return reject(StatusCode::BAD_REQUEST, message),
    };

    {
        let mut log = inner.log();
        if inner.config.log_capacity > 0 {
            while log.len() >= inner.config.log_capacity {
                log.pop_front();
            }
            log.push_back(Notification {
                timestamp: Utc::now(),
                task_id: task_id.clone(),
                payload,
            });
        }
    }

    let listeners: Vec<(u64, InboundSender)> = inner
        .routes()
        .get(&task_id)
        .map(|routes| {
            routes
                .iter()
                .map(|route| (route.registration, route.sender.clone()))
                .collect()
        })
        .unwrap_or_default();
    if listeners.is_empty() {
        debug!(task_id = %task_id, "push notification for unregistered task");
        return reject(StatusCode::NOT_FOUND, format!("no listener for task {task_id}"));
    }

    let mut gone = Vec::new();
    for (registration, sender) in &listeners {
        if sender.send(Inbound::Event(event.clone())).await.is_err() {
            gone.push(*registration);
        }
    }
    if !gone.is_empty() {
        let mut routes = inner.routes();
        if let Some(live) = routes.get_mut(&task_id) {
            live.retain(|route| !gone.contains(&route.registration));
            if live.is_empty() {
                routes.remove(&task_id);
            }
        }
    }
    if gone.len() == listeners.len() {
        return reject(StatusCode::NOT_FOUND, format!("listener for task {task_id} is gone"));
    }

    debug!(
        task_id = %task_id,
        delivered = listeners.len() - gone.len(),
        "push notification delivered"
    );
    Json(json!({"status": "ok", "received": true})).into_response()
}

fn payload_task_id(payload: &Value) -> Option<String> {
    ["taskId", "id", "task_id"]
        .iter()
        .filter_map(|key| payload.get(*key))
        .filter_map(Value::as_str)
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// A `kind`-tagged event, a task snapshot, or a bare `{taskId, status}`.
fn decode_payload(payload: &Value) -> Result<StreamResponse, String> {
    if payload.get("kind").is_some() {
        return serde_json::from_value::<StreamResponse>(payload.clone())
            .map_err(|e| format!("undecodable event: {e}"));
    }
    if let Ok(task) = serde_json::from_value::<Task>(payload.clone()) {
        return Ok(StreamResponse::Task(task));
    }
    serde_json::from_value::<TaskStatusUpdateEvent>(payload.clone())
        .map(StreamResponse::StatusUpdate)
        .map_err(|e| format!("undecodable status: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn post_json(path: &str, body: Value) -> Request<Body> {
        Request::post(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn delivers_to_registered_task() {
        let receiver = PushReceiver::new(PushReceiverConfig::default());
        let (tx, mut rx) = mpsc::channel(4);
        let _registration = receiver.register("t1", tx);

        let response = receiver
            .router()
            .oneshot(post_json(
                "/webhook",
                json!({"taskId": "t1", "status": {"state": "working"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        match rx.recv().await {
            Some(Inbound::Event(StreamResponse::StatusUpdate(update))) => {
                assert_eq!(update.task_id, "t1");
            }
            other => panic!("unexpected delivery {other:?}"),
        }
        assert_eq!(receiver.notifications().len(), 1);
    }

    #[tokio::test]
    async fn unknown_task_is_404_and_bad_input_is_400() {
        let receiver = PushReceiver::new(PushReceiverConfig::default());
        let app = receiver.router();

        let unknown = app
            .clone()
            .oneshot(post_json(
                "/webhook",
                json!({"taskId": "nobody", "status": {"state": "working"}}),
            ))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let garbage = app
            .clone()
            .oneshot(
                Request::post("/webhook")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);

        let no_id = app
            .clone()
            .oneshot(post_json("/webhook", json!({"status": {"state": "working"}})))
            .await
            .unwrap();
        assert_eq!(no_id.status(), StatusCode::BAD_REQUEST);

        let bad_status = app
            .oneshot(post_json("/webhook", json!({"taskId": "t1", "status": 7})))
            .await
            .unwrap();
        assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn token_is_enforced() {
        let receiver = PushReceiver::new(PushReceiverConfig {
            token: Some("sekrit".into()),
            ..Default::default()
        });
        let (tx, _rx) = mpsc::channel(4);
        let _registration = receiver.register("t1", tx);
        let body = json!({"taskId": "t1", "status": {"state": "working"}});

        let denied = receiver
            .router()
            .oneshot(post_json("/webhook", body.clone()))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::BAD_REQUEST);

        let mut request = post_json("/webhook", body);
        request
            .headers_mut()
            .insert(NOTIFICATION_TOKEN_HEADER, "sekrit".parse().unwrap());
        let accepted = receiver.router().oneshot(request).await.unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn dropped_registration_unroutes() {
        let receiver = PushReceiver::new(PushReceiverConfig::default());
        let (tx, _rx) = mpsc::channel(4);
        drop(receiver.register("t1", tx));

        let response = receiver
            .router()
            .oneshot(post_json(
                "/webhook",
                json!({"taskId": "t1", "status": {"state": "working"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn every_session_on_a_task_gets_the_delivery() {
        let receiver = PushReceiver::new(PushReceiverConfig::default());
        let (first_tx, mut first_rx) = mpsc::channel(4);
        let (second_tx, mut second_rx) = mpsc::channel(4);
        let first = receiver.register("t1", first_tx);
        let _second = receiver.register("t1", second_tx);
        assert_eq!(receiver.listeners("t1"), 2);

        let deliver = || {
            receiver.router().oneshot(post_json(
                "/webhook",
                json!({"taskId": "t1", "status": {"state": "working"}}),
            ))
        };
        assert_eq!(deliver().await.unwrap().status(), StatusCode::OK);
        assert!(matches!(first_rx.recv().await, Some(Inbound::Event(_))));
        assert!(matches!(second_rx.recv().await, Some(Inbound::Event(_))));

        drop(first);
        assert_eq!(receiver.listeners("t1"), 1);
        assert_eq!(deliver().await.unwrap().status(), StatusCode::OK);
        assert!(matches!(second_rx.recv().await, Some(Inbound::Event(_))));
        assert!(first_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn log_is_bounded_and_clearable() {
        let receiver = PushReceiver::new(PushReceiverConfig {
            log_capacity: 3,
            ..Default::default()
        });
        for i in 0..5 {
            let _ = receiver
                .router()
                .oneshot(post_json(
                    "/webhook",
                    json!({"taskId": format!("t{i}"), "status": {"state": "working"}}),
                ))
                .await
                .unwrap();
        }
        let log = receiver.notifications();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].task_id, "t2");

        let cleared = receiver
            .router()
            .oneshot(Request::post("/notifications/clear").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(cleared.status(), StatusCode::OK);
        assert!(receiver.notifications().is_empty());
    }
}
