//! Reference server: the built-in echo agent with streaming and push
//! notifications.
//!
//! Run with:
//! ```sh
//! cargo run --example reference_server
//! # or somewhere else
//! HANDLER_HOST=0.0.0.0 HANDLER_PORT=9000 cargo run --example reference_server
//! ```
//!
//! Then check it:
//! ```sh
//! curl http://localhost:8000/.well-known/agent-card.json | jq
//! curl -X POST http://localhost:8000/ \
//!   -H "Content-Type: application/json" \
//!   -d '{"jsonrpc":"2.0","id":1,"method":"message/send","params":{"message":
//!        {"kind":"message","messageId":"m1","role":"user",
//!         "parts":[{"kind":"text","text":"Hello"}]}}}'
//! ```

use std::sync::Arc;
use std::time::Duration;

use a2a_handler::builders::{reference_card, ServerBuilder};
use a2a_handler::server::EchoAgent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let host = std::env::var("HANDLER_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port: u16 = match std::env::var("HANDLER_PORT") {
        Ok(port) => port.parse()?,
        Err(_) => 8000,
    };

    // A short pause between steps makes streaming and cancel visible.
    let agent = EchoAgent::new().with_step_delay(Duration::from_millis(300));
    let card = reference_card(&host, port);
    let app = ServerBuilder::new(Arc::new(agent))
        .with_agent_card_direct(card)
        .with_push_notifications(true)
        .build();

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    println!("Handler agent listening on http://{host}:{port}/");
    println!("  Agent card: http://{host}:{port}/.well-known/agent-card.json");

    axum::serve(listener, app).await?;
    Ok(())
}
