//! Multi-turn conversation through a session, with a push receiver.
//!
//! Start the reference server first:
//! ```sh
//! cargo run --example reference_server
//! ```
//!
//! Then in another terminal:
//! ```sh
//! cargo run --example multi_turn
//! ```
//!
//! The session is saved to `$HANDLER_SESSION_DIR` (default `~/.handler`), so
//! running the example again continues the same conversation.

use std::net::SocketAddr;

use a2a_handler::builders::ClientBuilder;
use a2a_handler::client::{MessageOutcome, PushReceiverConfig};
use a2a_handler::session::{FileSessionStore, SessionStore};
use a2a_handler::utils::{join_text, outcome_text};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8000".to_string());

    let listen: SocketAddr = "127.0.0.1:0".parse()?;
    let client = ClientBuilder::new(&url)
        .with_push_listener(
            listen,
            PushReceiverConfig {
                token: Some(uuid::Uuid::new_v4().to_string()),
                ..Default::default()
            },
        )
        .build()
        .await?;
    println!("Talking to {}", client.card().name);

    let store = FileSessionStore::open_default().await?;
    let mut session = match store.load(&url).await? {
        Some(saved) => {
            println!("Resuming context {:?}", saved.context_id);
            saved
        }
        None => client.session(None),
    };

    // Turn 1: streamed.
    let mut stream = client
        .stream_message(&mut session, "What is the A2A protocol?", vec![])
        .await?;
    while let Some(outcome) = stream.next().await {
        match outcome? {
            MessageOutcome::Status { status, .. } => println!("  [{}]", status.state),
            MessageOutcome::Artifact { artifact, .. } => {
                println!("  artifact: {}", join_text(&artifact.parts, " "))
            }
            MessageOutcome::TaskChanged { received, .. } => {
                println!("  agent moved on to task {received}")
            }
            other => println!("  {}", outcome_text(&other)),
        }
    }
    drop(stream);

    // Turn 2: same task and context, no bookkeeping needed.
    let reply = client
        .send_message(&mut session, "Tell me more about streaming.", vec![])
        .await?;
    println!("Turn 2 ({:?}): {}", reply.task_id(), outcome_text(&reply));

    if let Some(receiver) = client.push_receiver() {
        println!("{} push deliveries received", receiver.notifications().len());
    }

    store.save(&session).await?;
    Ok(())
}
