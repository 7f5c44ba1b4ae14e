//! Client-side conversation state.
//!
//! A [`Session`] is the one place a conversation's `contextId` and `taskId`
//! live. Every session operation on
//! [`SessionClient`](crate::client::SessionClient) takes it by `&mut`, reads
//! the ids to build the next request and absorbs whatever the agent sends
//! back. Sessions can be persisted between process runs through a
//! [`SessionStore`]; credentials never are.

mod store;

pub use store::{FileSessionStore, InMemorySessionStore, SessionStore, SESSION_DIR_ENV};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthCredentials;
use crate::types::{Message, Part, Task};

/// Correlation record for one conversation with one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Store key. Defaults to the agent URL.
    pub id: String,

    /// Base URL of the agent.
    pub agent_url: String,

    /// Conversation context, set once the agent assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// Task currently being tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Credentials for this agent. Never serialized.
    #[serde(skip)]
    pub auth: Option<AuthCredentials>,

    /// Messages exchanged so far, oldest first.
    #[serde(default)]
    pub history: Vec<Message>,

    /// Last time any field changed.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Listing entry returned by [`SessionStore::list`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Store key.
    pub id: String,
    /// Base URL of the agent.
    pub agent_url: String,
    /// Current context id, if any.
    pub context_id: Option<String>,
    /// Current task id, if any.
    pub task_id: Option<String>,
    /// Number of messages in the history.
    pub message_count: usize,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session for `agent_url`, keyed by the URL.
    pub fn new(agent_url: impl Into<String>) -> Self {
        let agent_url = agent_url.into();
        Self {
            id: agent_url.clone(),
            agent_url,
            context_id: None,
            task_id: None,
            auth: None,
            history: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Use a store key other than the agent URL.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach credentials.
    pub fn with_auth(mut self, auth: AuthCredentials) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Build the next user message, threading the session's ids.
    ///
    /// The text part comes first, followed by `parts`. Empty text adds no
    /// text part.
    pub fn build_message(&self, text: &str, parts: Vec<Part>) -> Message {
        let mut all_parts = Vec::with_capacity(parts.len() + 1);
        if !text.is_empty() {
            all_parts.push(Part::text(text));
        }
        all_parts.extend(parts);

        let mut message = Message::user(all_parts);
        message.context_id = self.context_id.clone();
        message.task_id = self.task_id.clone();
        message
    }

    /// Append a message to the history.
    pub fn record(&mut self, message: Message) {
        self.history.push(message);
        self.touch();
    }

    /// Adopt a task's identity: its id becomes the tracked task and its
    /// context the session context.
    pub fn absorb_task(&mut self, task: &Task) {
        self.task_id = Some(task.id.clone());
        if !task.context_id.is_empty() {
            self.context_id = Some(task.context_id.clone());
        }
        self.touch();
    }

    /// Adopt a reply message's context. The tracked task is left alone.
    pub fn absorb_message(&mut self, message: &Message) {
        if let Some(context_id) = &message.context_id {
            self.context_id = Some(context_id.clone());
            self.touch();
        }
    }

    /// Switch the tracked task explicitly, e.g. after a stream reported
    /// that the agent moved the conversation to another task.
    pub fn adopt_task(&mut self, task_id: impl Into<String>, context_id: Option<String>) {
        let task_id = task_id.into();
        tracing::debug!(session = %self.id, task_id = %task_id, "session adopted task");
        self.task_id = Some(task_id);
        if let Some(context_id) = context_id.filter(|c| !c.is_empty()) {
            self.context_id = Some(context_id);
        }
        self.touch();
    }

    /// Forget the conversation: ids and history are reset, credentials kept.
    pub fn clear(&mut self) {
        self.context_id = None;
        self.task_id = None;
        self.history.clear();
        self.touch();
    }

    /// Summary used by store listings.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            agent_url: self.agent_url.clone(),
            context_id: self.context_id.clone(),
            task_id: self.task_id.clone(),
            message_count: self.history.len(),
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskState, TaskStatus};

    fn task(id: &str, context: &str) -> Task {
        Task {
            id: id.into(),
            context_id: context.into(),
            kind: "task".into(),
            status: TaskStatus::now(TaskState::Working),
            artifacts: None,
            history: None,
            metadata: None,
        }
    }

    #[test]
    fn message_threads_ids() {
        let mut session = Session::new("http://agent");
        let first = session.build_message("hi", vec![]);
        assert!(first.context_id.is_none());
        assert!(first.task_id.is_none());

        session.absorb_task(&task("t1", "c1"));
        let next = session.build_message("again", vec![Part::data(serde_json::json!({"k": 1}))]);
        assert_eq!(next.task_id.as_deref(), Some("t1"));
        assert_eq!(next.context_id.as_deref(), Some("c1"));
        assert_eq!(next.parts.len(), 2);
        assert_eq!(next.parts[0], Part::text("again"));
        assert_ne!(first.message_id, next.message_id);
    }

    #[test]
    fn message_reply_keeps_task() {
        let mut session = Session::new("http://agent");
        let mut reply = crate::types::Message::agent_text("ok");
        reply.context_id = Some("c2".into());
        session.absorb_message(&reply);
        assert_eq!(session.context_id.as_deref(), Some("c2"));
        assert!(session.task_id.is_none());
    }

    #[test]
    fn clear_keeps_auth() {
        let mut session =
            Session::new("http://agent").with_auth(AuthCredentials::bearer("tok"));
        session.absorb_task(&task("t1", "c1"));
        session.record(session.build_message("x", vec![]));
        session.clear();
        assert!(session.task_id.is_none());
        assert!(session.context_id.is_none());
        assert!(session.history.is_empty());
        assert!(session.auth.is_some());
    }

    #[test]
    fn auth_is_never_serialized() {
        let session = Session::new("http://agent").with_auth(AuthCredentials::bearer("secret"));
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("secret"));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert!(back.auth.is_none());
    }
}
