//! What a session operation produced, and the stream that yields it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};

use crate::error::{A2AError, A2AResult};
use crate::session::Session;
use crate::types::{Artifact, Message, StreamResponse, Task, TaskStatus};

use super::push_receiver::{PushReceiver, PushRegistration};
use super::sse::{SseStream, StreamClosed};

/// One result of talking to an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// A plain message reply; no task involved.
    Message(Message),

    /// A task snapshot.
    Task(Task),

    /// A status change of the tracked task.
    Status {
        /// Task the status belongs to.
        task_id: String,
        /// Context of the task.
        context_id: String,
        /// The new status.
        status: TaskStatus,
        /// True when the state is terminal or the sender marked the event
        /// `final`; nothing more follows on this stream.
        terminal: bool,
    },

    /// A (possibly partial) artifact of the tracked task.
    Artifact {
        /// Task that produced the artifact.
        task_id: String,
        /// Context of the task.
        context_id: String,
        /// The artifact content.
        artifact: Artifact,
        /// Append to a previously streamed artifact with the same id.
        append: bool,
        /// Last chunk of this artifact.
        last_chunk: bool,
    },

    /// An event for a task other than the one the session tracks. The
    /// session keeps its id; call [`Session::adopt_task`] (or
    /// [`OutcomeStream::adopt_task`] mid-stream) to switch. The task that
    /// answers a streamed message is adopted, never reported this way.
    TaskChanged {
        /// Task the session tracks.
        tracked: String,
        /// Task the event was about.
        received: String,
        /// The event itself.
        update: Box<MessageOutcome>,
    },
}

impl MessageOutcome {
    /// Convert a wire event.
    pub fn from_event(event: StreamResponse) -> Self {
        match event {
            StreamResponse::Message(message) => MessageOutcome::Message(message),
            StreamResponse::Task(task) => MessageOutcome::Task(task),
            StreamResponse::StatusUpdate(update) => MessageOutcome::Status {
                terminal: update.status.state.is_terminal() || update.r#final,
                task_id: update.task_id,
                context_id: update.context_id,
                status: update.status,
            },
            StreamResponse::ArtifactUpdate(update) => MessageOutcome::Artifact {
                task_id: update.task_id,
                context_id: update.context_id,
                artifact: update.artifact,
                append: update.append.unwrap_or(false),
                last_chunk: update.last_chunk.unwrap_or(false),
            },
        }
    }

    /// True for terminal task states and for plain messages. A stream ends
    /// after yielding a terminal outcome.
    pub fn is_terminal(&self) -> bool {
        match self {
            MessageOutcome::Message(_) => true,
            MessageOutcome::Task(task) => task.status.state.is_terminal(),
            MessageOutcome::Status { terminal, .. } => *terminal,
            MessageOutcome::Artifact { .. } | MessageOutcome::TaskChanged { .. } => false,
        }
    }

    /// The task this outcome is about, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            MessageOutcome::Message(message) => message.task_id.as_deref(),
            MessageOutcome::Task(task) => Some(&task.id),
            MessageOutcome::Status { task_id, .. } | MessageOutcome::Artifact { task_id, .. } => {
                Some(task_id)
            }
            MessageOutcome::TaskChanged { received, .. } => Some(received),
        }
    }

    fn context_id(&self) -> Option<&str> {
        let id = match self {
            MessageOutcome::Message(message) => message.context_id.as_deref(),
            MessageOutcome::Task(task) => Some(task.context_id.as_str()),
            MessageOutcome::Status { context_id, .. }
            | MessageOutcome::Artifact { context_id, .. } => Some(context_id.as_str()),
            MessageOutcome::TaskChanged { .. } => None,
        };
        id.filter(|id| !id.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Per-session merge queue
// ---------------------------------------------------------------------------

/// An item on a session's merge queue. SSE and push deliveries both land
/// here, in arrival order.
#[derive(Debug)]
pub(crate) enum Inbound {
    Event(StreamResponse),
    Failed(A2AError),
    /// The SSE connection ended.
    Closed,
}

pub(crate) type InboundSender = mpsc::Sender<Inbound>;

/// Pull-based sequence of [`MessageOutcome`]s for one session.
///
/// Borrows the session mutably for its lifetime, absorbing ids as events
/// arrive. Ends after a terminal outcome, when the server closes the
/// stream, or after yielding an error. Dropping it early closes the
/// connection and unregisters any push routes.
pub struct OutcomeStream<'a> {
    session: &'a mut Session,
    queue: mpsc::Receiver<Inbound>,
    /// Kept for push registrations made as tasks are adopted.
    sender: InboundSender,
    forwarder: Option<JoinHandle<()>>,
    closed: Option<StreamClosed>,
    push: Option<PushReceiver>,
    registrations: Vec<PushRegistration>,
    idle_timeout: Duration,
    /// Reset every time an item arrives.
    idle: Pin<Box<Sleep>>,
    /// The next task id seen answers the message this stream sent.
    awaiting_reply: bool,
    done: bool,
}

impl std::fmt::Debug for OutcomeStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeStream")
            .field("session", &self.session.id)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<'a> OutcomeStream<'a> {
    /// Merge an SSE stream (if any) and push deliveries for `session`.
    pub(crate) fn new(
        session: &'a mut Session,
        sse: Option<SseStream>,
        push: Option<PushReceiver>,
        idle_timeout: Duration,
        buffer: usize,
    ) -> Self {
        let (sender, queue) = mpsc::channel(buffer.max(1));

        let closed = sse.as_ref().map(SseStream::closed_handle);
        let forwarder = sse.map(|mut sse| {
            let tx = sender.clone();
            tokio::spawn(async move {
                while let Some(item) = sse.next().await {
                    let inbound = match item {
                        Ok(event) => Inbound::Event(event),
                        Err(e) => Inbound::Failed(e),
                    };
                    if tx.send(inbound).await.is_err() {
                        return;
                    }
                }
                let _ = tx.send(Inbound::Closed).await;
            })
        });

        let mut stream = Self {
            session,
            queue,
            sender,
            forwarder,
            closed,
            push,
            registrations: Vec::new(),
            idle_timeout,
            idle: Box::pin(tokio::time::sleep(idle_timeout)),
            awaiting_reply: false,
            done: false,
        };
        if let Some(task_id) = stream.session.task_id.clone() {
            stream.register_push(&task_id);
        }
        stream
    }

    /// Treat the first task id on the stream as the reply to a sent
    /// message, the way a blocking send adopts its task reply.
    pub(crate) fn expecting_reply(mut self) -> Self {
        self.awaiting_reply = true;
        self
    }

    /// The session this stream updates.
    pub fn session(&self) -> &Session {
        self.session
    }

    /// Switch the tracked task without ending the stream. Later events for
    /// `task_id` are no longer reported as [`MessageOutcome::TaskChanged`].
    pub fn adopt_task(&mut self, task_id: impl Into<String>, context_id: Option<String>) {
        let task_id = task_id.into();
        self.session.adopt_task(task_id.clone(), context_id);
        self.register_push(&task_id);
    }

    /// Observe release of the SSE connection. `None` for push-only streams.
    pub fn closed_handle(&self) -> Option<StreamClosed> {
        self.closed.clone()
    }

    /// Next outcome, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<A2AResult<MessageOutcome>> {
        futures::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    pub(crate) fn register_push(&mut self, task_id: &str) {
        if let Some(push) = &self.push {
            if self.registrations.iter().any(|r| r.task_id() == task_id) {
                return;
            }
            self.registrations
                .push(push.register(task_id, self.sender.clone()));
        }
    }

    fn finish(&mut self) {
        self.done = true;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.registrations.clear();
    }

    /// Fold an event into the session and classify it.
    fn absorb(&mut self, event: StreamResponse) -> MessageOutcome {
        let outcome = MessageOutcome::from_event(event);

        if let MessageOutcome::Message(message) = &outcome {
            self.session.absorb_message(message);
            self.session.record(message.clone());
            return outcome;
        }
        let Some(received) = outcome.task_id().map(str::to_string) else {
            return outcome;
        };
        let context_id = outcome.context_id().map(str::to_string);
        let reply = std::mem::take(&mut self.awaiting_reply);

        match self.session.task_id.clone() {
            Some(tracked) if tracked == received => {
                if let Some(context_id) = context_id {
                    if self.session.context_id.as_deref() != Some(context_id.as_str()) {
                        self.session.context_id = Some(context_id);
                    }
                }
            }
            Some(tracked) if !reply => {
                tracing::info!(
                    session = %self.session.id,
                    tracked = %tracked,
                    received = %received,
                    "stream delivered an event for a different task"
                );
                return MessageOutcome::TaskChanged {
                    tracked,
                    received,
                    update: Box::new(outcome),
                };
            }
            _ => {
                self.session.adopt_task(received.clone(), context_id);
                self.registrations.retain(|r| r.task_id() == received);
                self.register_push(&received);
            }
        }
        outcome
    }
}

impl Stream for OutcomeStream<'_> {
    type Item = A2AResult<MessageOutcome>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }

        let item = match this.queue.poll_recv(cx) {
            Poll::Ready(item) => {
                let deadline = Instant::now() + this.idle_timeout;
                this.idle.as_mut().reset(deadline);
                item
            }
            Poll::Pending => match this.idle.as_mut().poll(cx) {
                Poll::Ready(()) => Some(Inbound::Failed(A2AError::IdleTimeout(this.idle_timeout))),
                Poll::Pending => return Poll::Pending,
            },
        };

        match item {
            None | Some(Inbound::Closed) => {
                tracing::debug!(session = %this.session.id, "outcome stream closed by server");
                this.finish();
                Poll::Ready(None)
            }
            Some(Inbound::Failed(e)) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            Some(Inbound::Event(event)) => {
                let outcome = this.absorb(event);
                if outcome.is_terminal() {
                    this.finish();
                }
                Poll::Ready(Some(Ok(outcome)))
            }
        }
    }
}

impl Drop for OutcomeStream<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskArtifactUpdateEvent, TaskState, TaskStatusUpdateEvent};

    fn status(task: &str, state: TaskState) -> StreamResponse {
        StreamResponse::StatusUpdate(TaskStatusUpdateEvent {
            task_id: task.into(),
            context_id: "c1".into(),
            kind: "status-update".into(),
            status: TaskStatus::now(state),
            r#final: false,
            metadata: None,
        })
    }

    fn artifact(task: &str) -> StreamResponse {
        StreamResponse::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: task.into(),
            context_id: "c1".into(),
            kind: "artifact-update".into(),
            artifact: Artifact {
                artifact_id: "a1".into(),
                name: None,
                description: None,
                parts: vec![crate::types::Part::text("partial")],
                metadata: None,
            },
            append: None,
            last_chunk: Some(true),
            metadata: None,
        })
    }

    async fn feed(tx: &InboundSender, events: Vec<StreamResponse>) {
        for event in events {
            tx.send(Inbound::Event(event)).await.unwrap();
        }
    }

    #[test]
    fn terminal_classification() {
        assert!(MessageOutcome::from_event(status("t", TaskState::Completed)).is_terminal());
        assert!(!MessageOutcome::from_event(status("t", TaskState::InputRequired)).is_terminal());
        assert!(!MessageOutcome::from_event(artifact("t")).is_terminal());
        assert!(MessageOutcome::Message(Message::agent_text("hi")).is_terminal());
    }

    #[tokio::test]
    async fn stream_adopts_first_task_and_ends_on_terminal() {
        let mut session = Session::new("http://agent");
        let mut stream = OutcomeStream::new(&mut session, None, None, Duration::from_secs(5), 8);
        let tx = stream.sender.clone();
        feed(
            &tx,
            vec![
                status("t1", TaskState::Working),
                artifact("t1"),
                status("t1", TaskState::Completed),
                status("t1", TaskState::Working),
            ],
        )
        .await;

        let mut outcomes = Vec::new();
        while let Some(outcome) = stream.next().await {
            outcomes.push(outcome.unwrap());
        }
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[2].is_terminal());
        drop(stream);
        assert_eq!(session.task_id.as_deref(), Some("t1"));
        assert_eq!(session.context_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn foreign_task_is_reported_not_adopted() {
        let mut session = Session::new("http://agent");
        session.task_id = Some("t1".into());
        let mut stream = OutcomeStream::new(&mut session, None, None, Duration::from_secs(5), 8);
        let tx = stream.sender.clone();
        feed(&tx, vec![status("t2", TaskState::Working), status("t2", TaskState::Working)]).await;

        match stream.next().await.unwrap().unwrap() {
            MessageOutcome::TaskChanged {
                tracked, received, ..
            } => {
                assert_eq!(tracked, "t1");
                assert_eq!(received, "t2");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(stream.session().task_id.as_deref(), Some("t1"));

        stream.adopt_task("t2", None);
        assert!(matches!(
            stream.next().await.unwrap().unwrap(),
            MessageOutcome::Status { .. }
        ));
    }

    #[tokio::test]
    async fn reply_task_replaces_finished_task() {
        let mut session = Session::new("http://agent");
        session.task_id = Some("t1".into());
        let mut stream =
            OutcomeStream::new(&mut session, None, None, Duration::from_secs(5), 8)
                .expecting_reply();
        let tx = stream.sender.clone();
        feed(
            &tx,
            vec![
                status("t2", TaskState::Working),
                status("t3", TaskState::Working),
                status("t2", TaskState::Completed),
            ],
        )
        .await;

        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, MessageOutcome::Status { .. }));
        assert_eq!(stream.session().task_id.as_deref(), Some("t2"));

        match stream.next().await.unwrap().unwrap() {
            MessageOutcome::TaskChanged {
                tracked, received, ..
            } => {
                assert_eq!(tracked, "t2");
                assert_eq!(received, "t3");
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        assert!(stream.next().await.unwrap().unwrap().is_terminal());
        assert!(stream.next().await.is_none());
        drop(stream);
        assert_eq!(session.task_id.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn streamed_message_keeps_task_untracked() {
        let mut session = Session::new("http://agent");
        let mut stream =
            OutcomeStream::new(&mut session, None, None, Duration::from_secs(5), 8)
                .expecting_reply();
        let tx = stream.sender.clone();
        let mut reply = Message::agent_text("hello");
        reply.task_id = Some("t9".into());
        reply.context_id = Some("c9".into());
        feed(&tx, vec![StreamResponse::Message(reply)]).await;

        assert!(stream.next().await.unwrap().unwrap().is_terminal());
        drop(stream);
        assert!(session.task_id.is_none());
        assert_eq!(session.context_id.as_deref(), Some("c9"));
        assert_eq!(session.history.len(), 1);
    }

    #[tokio::test]
    async fn idle_queue_times_out() {
        let mut session = Session::new("http://agent");
        let mut stream =
            OutcomeStream::new(&mut session, None, None, Duration::from_millis(30), 8);
        assert!(matches!(
            stream.next().await,
            Some(Err(A2AError::IdleTimeout(_)))
        ));
        assert!(stream.next().await.is_none());
    }
}
