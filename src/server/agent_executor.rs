//! Agent executor trait: the core integration point for agent logic.
//!
//! Implementors read a [`RequestContext`] and publish events (status
//! updates, artifacts, messages) to an [`EventQueue`]. [`EchoAgent`] is the
//! built-in executor used by the reference server.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::A2AResult;
use crate::types::{Message, Part, SendMessageConfiguration, Task, TaskState};

use super::event_queue::EventQueue;
use super::task_updater::TaskUpdater;

// ---------------------------------------------------------------------------
// RequestContext: agent execution context
// ---------------------------------------------------------------------------

/// Context for an agent execution request.
///
/// Contains all the information an agent needs to process a request:
/// the task identifiers, the incoming message, the existing task state
/// and optional metadata.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this task.
    pub task_id: String,

    /// Conversation context identifier: groups related tasks.
    pub context_id: String,

    /// The incoming user message that triggered this execution.
    /// `None` for cancel requests.
    pub message: Option<Message>,

    /// The task as stored when the request arrived.
    pub task: Option<Task>,

    /// Optional configuration from the client request.
    pub configuration: Option<SendMessageConfiguration>,

    /// Optional metadata from the client request.
    pub metadata: Option<Value>,
}

impl RequestContext {
    /// Text content of the user's message parts, joined by `delimiter`.
    ///
    /// Empty when there is no message or it has no text parts.
    pub fn user_input(&self, delimiter: &str) -> String {
        self.message
            .as_ref()
            .map(|message| crate::utils::text::join_text(&message.parts, delimiter))
            .unwrap_or_default()
    }

    /// A [`TaskUpdater`] for this context's task.
    pub fn updater(&self, event_queue: EventQueue) -> TaskUpdater {
        TaskUpdater::new(event_queue, self.task_id.clone(), self.context_id.clone())
    }
}

// ---------------------------------------------------------------------------
// AgentExecutor trait
// ---------------------------------------------------------------------------

/// Core trait for agent execution logic.
///
/// The server calls [`execute`](AgentExecutor::execute) when a new message
/// arrives and [`cancel`](AgentExecutor::cancel) when a cancellation is
/// requested.
///
/// # Examples
///
/// ```rust,ignore
/// use a2a_handler::server::{AgentExecutor, RequestContext, EventQueue};
/// use a2a_handler::A2AResult;
/// use async_trait::async_trait;
///
/// struct MyAgent;
///
/// #[async_trait]
/// impl AgentExecutor for MyAgent {
///     async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
///         context.updater(event_queue).complete_with_text("Done!").await
///     }
///
///     async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
///         context.updater(event_queue).cancel(None).await
///     }
/// }
/// ```
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Execute the agent's logic for a given request.
    ///
    /// This method should return once the agent's execution is complete
    /// or yields control (e.g. enters an `input-required` state). The queue
    /// is closed when it returns.
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()>;

    /// Request the agent to cancel an ongoing task.
    ///
    /// The agent should publish a status update with state `canceled`.
    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()>;
}

// ---------------------------------------------------------------------------
// EchoAgent
// ---------------------------------------------------------------------------

/// Executor that answers every message with its own text.
///
/// Each turn goes `working` → artifact `echo` → `completed`. A step delay
/// keeps tasks running long enough to observe streaming or cancel them.
#[derive(Debug, Clone, Default)]
pub struct EchoAgent {
    step_delay: Option<Duration>,
}

impl EchoAgent {
    /// An echo agent that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause for `delay` before each step.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    async fn pause(&self) {
        if let Some(delay) = self.step_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AgentExecutor for EchoAgent {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let updater = context.updater(event_queue);
        let input = context.user_input("\n");
        debug!(task_id = %context.task_id, chars = input.len(), "echo agent executing");

        updater
            .update_status_text(TaskState::Working, "Processing...")
            .await?;
        self.pause().await;

        updater
            .add_artifact(
                vec![Part::text(input.clone())],
                None,
                Some("echo".to_string()),
                None,
                Some(true),
            )
            .await?;
        self.pause().await;

        updater.complete_with_text(&format!("Echo: {input}")).await
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        context
            .updater(event_queue)
            .cancel(Some(Message::agent_text("Task canceled")))
            .await
    }
}
