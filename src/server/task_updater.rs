//! Task updater: how executors publish progress.
//!
//! An updater is bound to one task and one queue. Once it has published a
//! terminal state it refuses further status changes, so an executor cannot
//! move a finished task back to `working`. Artifacts are not gated.

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    Artifact, Message, Part, StreamResponse, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};

use super::event_queue::EventQueue;

/// Publishes status and artifact events for one task.
pub struct TaskUpdater {
    event_queue: EventQueue,
    task_id: String,
    context_id: String,
    finished: Mutex<bool>,
}

impl TaskUpdater {
    pub fn new(
        event_queue: EventQueue,
        task_id: impl Into<String>,
        context_id: impl Into<String>,
    ) -> Self {
        Self {
            event_queue,
            task_id: task_id.into(),
            context_id: context_id.into(),
            finished: Mutex::new(false),
        }
    }

    /// Whether a terminal state has been published.
    pub async fn is_terminal(&self) -> bool {
        *self.finished.lock().await
    }

    /// Publish a status change. Terminal states are always marked `final`.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` once a terminal state has been published.
    pub async fn update_status(
        &self,
        state: TaskState,
        message: Option<Message>,
        r#final: bool,
    ) -> A2AResult<()> {
        let terminal = state.is_terminal();
        {
            let mut finished = self.finished.lock().await;
            if *finished {
                warn!(
                    task_id = %self.task_id,
                    state = %state,
                    "status change after terminal state refused"
                );
                return Err(A2AError::invalid_request(format!(
                    "task {} is already finished; cannot move to {}",
                    self.task_id, state
                )));
            }
            *finished = terminal;
        }

        self.event_queue
            .enqueue_event(StreamResponse::StatusUpdate(TaskStatusUpdateEvent {
                task_id: self.task_id.clone(),
                context_id: self.context_id.clone(),
                kind: "status-update".to_string(),
                status: TaskStatus {
                    state,
                    message,
                    timestamp: Some(Utc::now().to_rfc3339()),
                },
                r#final: terminal || r#final,
                metadata: None,
            }))
            .await?;

        debug!(task_id = %self.task_id, state = %state, terminal, "status published");
        Ok(())
    }

    /// Status change carrying a one-part agent message.
    pub async fn update_status_text(&self, state: TaskState, text: &str) -> A2AResult<()> {
        let message = self.new_agent_message(vec![Part::text(text)]);
        self.update_status(state, Some(message), false).await
    }

    /// Publish an artifact chunk. A fresh id is generated when none is given.
    pub async fn add_artifact(
        &self,
        parts: Vec<Part>,
        artifact_id: Option<String>,
        name: Option<String>,
        append: Option<bool>,
        last_chunk: Option<bool>,
    ) -> A2AResult<()> {
        let artifact_id = artifact_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        self.event_queue
            .enqueue_event(StreamResponse::ArtifactUpdate(TaskArtifactUpdateEvent {
                task_id: self.task_id.clone(),
                context_id: self.context_id.clone(),
                kind: "artifact-update".to_string(),
                artifact: Artifact {
                    artifact_id: artifact_id.clone(),
                    name,
                    description: None,
                    parts,
                    metadata: None,
                },
                append,
                last_chunk,
                metadata: None,
            }))
            .await?;

        debug!(task_id = %self.task_id, artifact_id = %artifact_id, "artifact published");
        Ok(())
    }

    // ---- Shorthands ----

    pub async fn complete_with_text(&self, text: &str) -> A2AResult<()> {
        let message = self.new_agent_message(vec![Part::text(text)]);
        self.update_status(TaskState::Completed, Some(message), true)
            .await
    }

    pub async fn failed_with_text(&self, text: &str) -> A2AResult<()> {
        let message = self.new_agent_message(vec![Part::text(text)]);
        self.update_status(TaskState::Failed, Some(message), true)
            .await
    }

    pub async fn cancel(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Canceled, message, true).await
    }

    /// Ask the user for more. With `final` set, streams for this turn end
    /// here; the task stays open for a follow-up message.
    pub async fn requires_input(&self, message: Option<Message>, r#final: bool) -> A2AResult<()> {
        self.update_status(TaskState::InputRequired, message, r#final)
            .await
    }

    /// Agent message addressed to this task. Not published.
    pub fn new_agent_message(&self, parts: Vec<Part>) -> Message {
        let mut message = Message::agent(parts);
        message.context_id = Some(self.context_id.clone());
        message.task_id = Some(self.task_id.clone());
        message
    }
}
