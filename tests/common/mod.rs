//! Shared test utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use a2a_handler::builders::{AgentCardBuilder, ServerBuilder};
use a2a_handler::error::A2AResult;
use a2a_handler::server::{AgentExecutor, EventQueue, RequestContext};
use a2a_handler::types::{AgentCard, Message, Part, SecurityScheme, StreamResponse};
use async_trait::async_trait;
use axum::extract::Request;
use axum::middleware::{self, Next};

/// Records the task id of every execution and asks for more input.
///
/// Tasks stay open (`input-required`), so follow-ups continue the same task.
#[derive(Default, Clone)]
pub struct RecordingAgent {
    pub seen: Arc<Mutex<Vec<RecordedTurn>>>,
}

/// One execution as seen by [`RecordingAgent`].
#[derive(Debug, Clone)]
pub struct RecordedTurn {
    pub task_id: String,
    pub message_task_id: Option<String>,
    pub input: String,
}

impl RecordingAgent {
    pub fn turns(&self) -> Vec<RecordedTurn> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentExecutor for RecordingAgent {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        self.seen.lock().unwrap().push(RecordedTurn {
            task_id: context.task_id.clone(),
            message_task_id: context.message.as_ref().and_then(|m| m.task_id.clone()),
            input: context.user_input(" "),
        });
        let updater = context.updater(event_queue);
        let question = updater.new_agent_message(vec![Part::text("Anything else?")]);
        updater.requires_input(Some(question), true).await
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        context.updater(event_queue).cancel(None).await
    }
}

/// Answers with a plain message; no task is kept.
pub struct ReplyAgent;

#[async_trait]
impl AgentExecutor for ReplyAgent {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let mut reply = Message::agent_text(format!("You said: {}", context.user_input(" ")));
        reply.context_id = Some(context.context_id.clone());
        event_queue
            .enqueue_event(StreamResponse::Message(reply))
            .await
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        context.updater(event_queue).cancel(None).await
    }
}

/// Says nothing for a long time.
pub struct SilentAgent;

#[async_trait]
impl AgentExecutor for SilentAgent {
    async fn execute(&self, _context: RequestContext, _event_queue: EventQueue) -> A2AResult<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        context.updater(event_queue).cancel(None).await
    }
}

/// Options for [`start_server`].
#[derive(Default)]
pub struct ServerOptions {
    pub push_notifications: bool,
    pub bearer_auth: bool,
}

/// A running test server.
pub struct TestServer {
    pub base_url: String,
    pub card: AgentCard,
    /// `Authorization` header of every JSON-RPC request received.
    pub authorization: Arc<Mutex<Vec<Option<String>>>>,
    pub handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Build the card served by test servers.
pub fn test_agent_card(base_url: &str, options: &ServerOptions) -> AgentCard {
    let mut builder = AgentCardBuilder::new("Test Agent", "An agent for testing", "0.1.0")
        .with_url(format!("{base_url}/"))
        .with_streaming(true)
        .with_push_notifications(options.push_notifications)
        .with_skill("echo", "Echo", "Echoes back messages", vec!["test".to_string()]);
    if options.bearer_auth {
        builder = builder.with_security_scheme("bearer", SecurityScheme::http("bearer"));
    }
    builder.build()
}

/// Start a test server on a random port with default options.
pub async fn start_test_server(executor: Arc<dyn AgentExecutor>) -> TestServer {
    start_server(executor, ServerOptions::default()).await
}

/// Send library logs to the test output. Controlled by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start a test server on a random port.
pub async fn start_server(executor: Arc<dyn AgentExecutor>, options: ServerOptions) -> TestServer {
    init_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let card = test_agent_card(&base_url, &options);

    let authorization = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&authorization);
    let app = ServerBuilder::new(executor)
        .with_agent_card_direct(card.clone())
        .with_push_notifications(options.push_notifications)
        .build()
        .layer(middleware::from_fn(move |request: Request, next: Next| {
            let recorded = Arc::clone(&recorded);
            async move {
                if request.method() == axum::http::Method::POST {
                    let header = request
                        .headers()
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    recorded.lock().unwrap().push(header);
                }
                next.run(request).await
            }
        }));

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url,
        card,
        authorization,
        handle,
    }
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
