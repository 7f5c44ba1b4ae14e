//! SSE streaming through `SessionClient`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use a2a_handler::builders::ClientBuilder;
use a2a_handler::client::{MessageOutcome, SessionClient};
use a2a_handler::error::INVALID_PARAMS;
use a2a_handler::server::EchoAgent;
use a2a_handler::types::TaskState;
use a2a_handler::A2AError;
use common::{start_test_server, SilentAgent};

#[tokio::test]
async fn echo_stream_ends_on_terminal_outcome() {
    let server = start_test_server(Arc::new(EchoAgent::new())).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let mut stream = client
        .stream_message(&mut session, "stream me", vec![])
        .await
        .unwrap();

    let mut outcomes = Vec::new();
    while let Some(outcome) = stream.next().await {
        outcomes.push(outcome.unwrap());
    }
    drop(stream);

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(
        &outcomes[0],
        MessageOutcome::Status { status, terminal: false, .. } if status.state == TaskState::Working
    ));
    match &outcomes[1] {
        MessageOutcome::Artifact { artifact, .. } => {
            assert_eq!(artifact.name.as_deref(), Some("echo"));
        }
        other => panic!("expected artifact, got {other:?}"),
    }
    assert!(outcomes[2].is_terminal());

    let task_id = outcomes[0].task_id().unwrap();
    assert_eq!(session.task_id.as_deref(), Some(task_id));
    assert!(session.context_id.is_some());
}

#[tokio::test]
async fn second_streamed_turn_follows_new_task() {
    let server = start_test_server(Arc::new(EchoAgent::new())).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let mut stream = client
        .stream_message(&mut session, "one", vec![])
        .await
        .unwrap();
    while let Some(outcome) = stream.next().await {
        outcome.unwrap();
    }
    drop(stream);
    let first_task = session.task_id.clone().unwrap();
    let context_id = session.context_id.clone();

    // The first task is finished, so the agent answers with a fresh one.
    let mut stream = client
        .stream_message(&mut session, "two", vec![])
        .await
        .unwrap();
    let mut outcomes = Vec::new();
    while let Some(outcome) = stream.next().await {
        outcomes.push(outcome.unwrap());
    }
    drop(stream);

    assert!(!outcomes
        .iter()
        .any(|o| matches!(o, MessageOutcome::TaskChanged { .. })));
    assert!(outcomes.last().unwrap().is_terminal());
    let second_task = outcomes[0].task_id().unwrap().to_string();
    assert_ne!(second_task, first_task);
    assert_eq!(session.task_id.as_deref(), Some(second_task.as_str()));
    assert_eq!(session.context_id, context_id);
}

#[tokio::test]
async fn dropping_stream_releases_connection() {
    let agent = EchoAgent::new().with_step_delay(Duration::from_secs(5));
    let server = start_test_server(Arc::new(agent)).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let mut stream = client
        .stream_message(&mut session, "long", vec![])
        .await
        .unwrap();
    let closed = stream.closed_handle().unwrap();
    assert!(!stream.next().await.unwrap().unwrap().is_terminal());
    assert!(!closed.is_closed());

    drop(stream);
    tokio::time::timeout(Duration::from_secs(2), closed.wait())
        .await
        .expect("connection not released after drop");
}

#[tokio::test]
async fn silent_stream_hits_idle_timeout() {
    let server = start_test_server(Arc::new(SilentAgent)).await;
    let client = ClientBuilder::new(&server.base_url)
        .with_idle_timeout(Duration::from_millis(200))
        .build()
        .await
        .unwrap();
    let mut session = client.session(None);

    let mut stream = client
        .stream_message(&mut session, "hello?", vec![])
        .await
        .unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap();
    assert!(matches!(outcome, Some(Err(A2AError::IdleTimeout(_)))));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn resubscribe_to_unknown_task_fails() {
    let server = start_test_server(Arc::new(EchoAgent::new())).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let err = client
        .resubscribe(&mut session, "no-such-task")
        .await
        .unwrap_err();
    assert!(matches!(err, A2AError::TaskNotFound { .. }));
}

#[tokio::test]
async fn resubscribe_picks_up_running_task() {
    let agent = EchoAgent::new().with_step_delay(Duration::from_millis(500));
    let server = start_test_server(Arc::new(agent)).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    let mut stream = client
        .stream_message(&mut session, "again", vec![])
        .await
        .unwrap();
    stream.next().await.unwrap().unwrap();
    drop(stream);
    let task_id = session.task_id.clone().unwrap();

    let mut stream = client.resubscribe(&mut session, &task_id).await.unwrap();
    let mut last = None;
    while let Some(outcome) = stream.next().await {
        let outcome = outcome.unwrap();
        assert_eq!(outcome.task_id(), Some(task_id.as_str()));
        last = Some(outcome);
    }
    assert!(last.unwrap().is_terminal());
}

#[tokio::test]
async fn resubscribe_to_finished_task_is_rejected() {
    let server = start_test_server(Arc::new(EchoAgent::new())).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    client.send_message(&mut session, "done", vec![]).await.unwrap();
    let task_id = session.task_id.clone().unwrap();

    let err = client.resubscribe(&mut session, &task_id).await.unwrap_err();
    assert!(matches!(err, A2AError::JsonRpc { code: INVALID_PARAMS, .. }));
}
