//! Webhook deliveries from the reference server to a client push receiver.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use a2a_handler::builders::ClientBuilder;
use a2a_handler::client::{MessageOutcome, PushReceiverConfig, SessionClient};
use a2a_handler::error::PUSH_NOTIFICATION_NOT_SUPPORTED;
use a2a_handler::server::EchoAgent;
use a2a_handler::types::{PushNotificationConfig, TaskState};
use a2a_handler::A2AError;
use common::{eventually, start_server, start_test_server, ServerOptions};

fn any_port() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn receiver_config(token: &str) -> PushReceiverConfig {
    PushReceiverConfig {
        token: Some(token.to_string()),
        ..Default::default()
    }
}

fn push_enabled() -> ServerOptions {
    ServerOptions {
        push_notifications: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn send_registers_webhook_and_receives_snapshots() {
    let server = start_server(Arc::new(EchoAgent::new()), push_enabled()).await;
    let client = ClientBuilder::new(&server.base_url)
        .with_push_listener(any_port(), receiver_config("s3cret"))
        .build()
        .await
        .unwrap();
    let receiver = client.push_receiver().unwrap().clone();
    let mut session = client.session(None);

    let outcome = client
        .send_message(&mut session, "notify me", vec![])
        .await
        .unwrap();
    let task_id = outcome.task_id().unwrap().to_string();

    let delivered = eventually(Duration::from_secs(5), || {
        receiver.notifications().iter().any(|n| {
            n.task_id == task_id && n.payload["status"]["state"] == "completed"
        })
    })
    .await;
    assert!(delivered, "no completed snapshot delivered");

    let config = client.get_push_config(&session, &task_id).await.unwrap();
    assert_eq!(config.push_notification_config.url, receiver.webhook_url().unwrap());
    assert_eq!(config.push_notification_config.token.as_deref(), Some("s3cret"));
}

#[tokio::test]
async fn watch_task_follows_running_task_to_completion() {
    let agent = EchoAgent::new().with_step_delay(Duration::from_millis(500));
    let server = start_server(Arc::new(agent), push_enabled()).await;
    let client = ClientBuilder::new(&server.base_url)
        .with_streaming(true)
        .with_push_listener(any_port(), receiver_config("watch"))
        .build()
        .await
        .unwrap();
    let mut session = client.session(None);

    let mut stream = client
        .stream_message(&mut session, "watch this", vec![])
        .await
        .unwrap();
    stream.next().await.unwrap().unwrap();
    drop(stream);
    let task_id = session.task_id.clone().unwrap();

    let mut watch = client.watch_task(&mut session, &task_id).await.unwrap();
    assert!(watch.closed_handle().is_none());

    let last = tokio::time::timeout(Duration::from_secs(10), async {
        let mut last = None;
        while let Some(outcome) = watch.next().await {
            let outcome = outcome.unwrap();
            let terminal = outcome.is_terminal();
            last = Some(outcome);
            if terminal {
                break;
            }
        }
        last
    })
    .await
    .unwrap();

    match last {
        Some(MessageOutcome::Task(task)) => {
            assert_eq!(task.id, task_id);
            assert_eq!(task.status.state, TaskState::Completed);
        }
        other => panic!("expected a completed task snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_merges_sse_and_push_deliveries() {
    let agent = EchoAgent::new().with_step_delay(Duration::from_millis(400));
    let server = start_server(Arc::new(agent), push_enabled()).await;
    let client = ClientBuilder::new(&server.base_url)
        .with_streaming(true)
        .with_push_listener(any_port(), receiver_config("merge"))
        .build()
        .await
        .unwrap();
    let receiver = client.push_receiver().unwrap().clone();
    let mut session = client.session(None);

    let mut stream = client
        .stream_message(&mut session, "both ways", vec![])
        .await
        .unwrap();
    let mut outcomes = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(outcome) = stream.next().await {
            outcomes.push(outcome.unwrap());
        }
    })
    .await
    .unwrap();
    assert!(stream.next().await.is_none());
    drop(stream);

    let task_id = session.task_id.clone().unwrap();
    assert!(outcomes
        .iter()
        .all(|o| o.task_id() == Some(task_id.as_str())));

    // SSE carries status and artifact events, the webhook full snapshots.
    assert!(outcomes.iter().any(|o| matches!(
        o,
        MessageOutcome::Status { .. } | MessageOutcome::Artifact { .. }
    )));
    assert!(outcomes.iter().any(|o| matches!(o, MessageOutcome::Task(_))));

    assert_eq!(outcomes.iter().filter(|o| o.is_terminal()).count(), 1);
    assert!(outcomes.last().unwrap().is_terminal());
    assert_eq!(receiver.listeners(&task_id), 0);
}

#[tokio::test]
async fn watch_task_without_receiver_fails() {
    let server = start_server(Arc::new(EchoAgent::new()), push_enabled()).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    client.send_message(&mut session, "hi", vec![]).await.unwrap();
    let task_id = session.task_id.clone().unwrap();

    let err = client.watch_task(&mut session, &task_id).await.unwrap_err();
    assert!(matches!(err, A2AError::Push(_)));
}

#[tokio::test]
async fn server_without_push_rejects_config() {
    let server = start_test_server(Arc::new(EchoAgent::new())).await;
    let client = SessionClient::connect(&server.base_url).await.unwrap();
    let mut session = client.session(None);

    client.send_message(&mut session, "hi", vec![]).await.unwrap();
    let task_id = session.task_id.clone().unwrap();

    let config = PushNotificationConfig {
        id: None,
        url: "http://127.0.0.1:9/webhook".to_string(),
        token: None,
        authentication: None,
    };
    let err = client
        .set_push_config(&session, &task_id, config)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        A2AError::JsonRpc { code: PUSH_NOTIFICATION_NOT_SUPPORTED, .. }
    ));
}

#[tokio::test]
async fn wrong_token_is_rejected_by_receiver() {
    let client_server = start_test_server(Arc::new(EchoAgent::new())).await;
    let client = ClientBuilder::new(&client_server.base_url)
        .with_push_listener(any_port(), receiver_config("right"))
        .build()
        .await
        .unwrap();
    let receiver = client.push_receiver().unwrap();
    let url = receiver.webhook_url().unwrap();

    let response = reqwest::Client::new()
        .post(&url)
        .header("X-A2A-Notification-Token", "wrong")
        .json(&serde_json::json!({"taskId": "t1", "status": {"state": "working"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(receiver.notifications().is_empty());
}
