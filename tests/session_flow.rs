//! Multi-turn conversations through `SessionClient` against a live server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use a2a_handler::client::{MessageOutcome, SessionClient};
use a2a_handler::server::EchoAgent;
use a2a_handler::types::TaskState;
use a2a_handler::utils::outcome_text;
use common::{start_test_server, RecordingAgent, ReplyAgent};

// ===========================================================================
// Task and context stickiness
// ===========================================================================

/// After a reply introduces a task id, the next request carries it.
#[tokio::test]
async fn follow_up_carries_task_id() {
    let agent = RecordingAgent::default();
    let server = start_test_server(Arc::new(agent.clone())).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let first = client
        .send_message(&mut session, "first", vec![])
        .await
        .unwrap();
    let task = match first {
        MessageOutcome::Task(task) => task,
        other => panic!("expected task, got {other:?}"),
    };
    assert_eq!(task.status.state, TaskState::InputRequired);
    assert_eq!(session.task_id.as_deref(), Some(task.id.as_str()));
    assert_eq!(session.context_id.as_deref(), Some(task.context_id.as_str()));

    let second = client
        .send_message(&mut session, "second", vec![])
        .await
        .unwrap();
    assert_eq!(second.task_id(), Some(task.id.as_str()));

    let turns = agent.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].message_task_id, Some(task.id.clone()));
    assert_eq!(turns[1].message_task_id, Some(task.id.clone()));
    assert_eq!(turns[1].task_id, task.id);
    assert_eq!(turns[1].input, "second");

    // Task replies stay on the task; only user turns are recorded.
    assert_eq!(session.history.len(), 2);
}

/// A plain message reply does not touch the tracked task.
#[tokio::test]
async fn message_reply_leaves_task_id_unchanged() {
    let server = start_test_server(Arc::new(ReplyAgent)).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let outcome = client
        .send_message(&mut session, "hello", vec![])
        .await
        .unwrap();

    assert!(matches!(outcome, MessageOutcome::Message(_)));
    assert_eq!(outcome_text(&outcome), "You said: hello");
    assert!(session.task_id.is_none());
    assert!(session.context_id.is_some());
    assert_eq!(session.history.len(), 2);
}

/// Clearing the session starts a new task.
#[tokio::test]
async fn cleared_session_starts_new_task() {
    let agent = RecordingAgent::default();
    let server = start_test_server(Arc::new(agent.clone())).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    client.send_message(&mut session, "one", vec![]).await.unwrap();
    let first = session.task_id.clone().unwrap();
    session.clear();
    assert!(session.task_id.is_none());

    client.send_message(&mut session, "two", vec![]).await.unwrap();
    assert_ne!(session.task_id.as_deref(), Some(first.as_str()));
    assert_eq!(agent.turns()[1].message_task_id, session.task_id);
}

// ===========================================================================
// Task operations
// ===========================================================================

/// `tasks/get` returns the stored task and keeps the session on it.
#[tokio::test]
async fn get_task_returns_stored_task() {
    let server = start_test_server(Arc::new(EchoAgent::new())).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let outcome = client
        .send_message(&mut session, "ping", vec![])
        .await
        .unwrap();
    let task_id = outcome.task_id().unwrap().to_string();

    let task = client.get_task(&mut session, &task_id).await.unwrap();
    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(session.task_id.as_deref(), Some(task_id.as_str()));
    assert!(outcome_text(&MessageOutcome::Task(task)).contains("Echo: ping"));
}

/// Canceling twice reports the same terminal state without an error.
#[tokio::test]
async fn cancel_twice_returns_same_terminal_state() {
    let agent = EchoAgent::new().with_step_delay(Duration::from_secs(5));
    let server = start_test_server(Arc::new(agent)).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let mut stream = client
        .stream_message(&mut session, "slow", vec![])
        .await
        .unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert!(!first.is_terminal());
    drop(stream);
    let task_id = session.task_id.clone().unwrap();

    let canceled = client.cancel_task(&mut session, &task_id).await.unwrap();
    assert_eq!(canceled.status.state, TaskState::Canceled);

    let again = client.cancel_task(&mut session, &task_id).await.unwrap();
    assert_eq!(again.status.state, TaskState::Canceled);
    assert_eq!(again.id, canceled.id);
}

/// Unknown task ids surface as `TaskNotFound`.
#[tokio::test]
async fn unknown_task_is_not_found() {
    let server = start_test_server(Arc::new(EchoAgent::new())).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let err = client.get_task(&mut session, "missing").await.unwrap_err();
    assert!(matches!(err, a2a_handler::A2AError::TaskNotFound { .. }));
    assert!(session.task_id.is_none());
}
