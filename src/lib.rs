//! # a2a-handler: session-aware A2A v0.3 client, push receiver and reference server
//!
//! This crate talks to agents that speak the
//! [A2A protocol](https://a2a-protocol.org/latest/specification/) over
//! JSON-RPC 2.0 with Server-Sent Events, and keeps the bookkeeping a
//! multi-turn conversation needs: which task and context the next message
//! belongs to, which credentials to present, and which updates arrived by
//! stream or by webhook.
//!
//! ## Overview
//!
//! - **Transport**: JSON-RPC over HTTP with SSE streaming ([`client::JsonRpcTransport`])
//! - **Card discovery and validation**: [`client::CardResolver`], [`validation`]
//! - **Session core**: [`client::SessionClient`] + [`session::Session`]; replies are
//!   classified into [`client::MessageOutcome`]s and their ids flow back into the session
//! - **Push receiver**: [`client::PushReceiver`], an axum webhook whose deliveries
//!   merge into the same outcome stream as SSE events
//! - **Session store**: [`session::SessionStore`] with in-memory and JSON-file backends
//! - **Reference server**: [`server`], an echo agent with streaming and push notifications
//!
//! ## Feature flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `client` | yes     | Session client, SSE transport and push receiver (reqwest + axum) |
//! | `server` | yes     | Server traits + axum integration for building agents |
//! | `full`   | no      | Enable all features |
//!
//! ## Quick Start: Client
//!
//! ```no_run
//! use a2a_handler::client::{MessageOutcome, SessionClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SessionClient::connect("http://localhost:8000").await?;
//!     let mut session = client.session(None);
//!
//!     // Stream the first turn; the session picks up the task id.
//!     let mut stream = client
//!         .stream_message(&mut session, "Write a haiku about Rust", vec![])
//!         .await?;
//!     while let Some(outcome) = stream.next().await {
//!         match outcome? {
//!             MessageOutcome::Status { status, terminal, .. } => {
//!                 println!("Status: {} (terminal: {terminal})", status.state);
//!             }
//!             MessageOutcome::Artifact { artifact, .. } => {
//!                 println!("Artifact: {}", a2a_handler::utils::join_text(&artifact.parts, "\n"));
//!             }
//!             other => println!("{other:?}"),
//!         }
//!     }
//!     drop(stream);
//!
//!     // The follow-up carries the same task and context.
//!     let reply = client.send_message(&mut session, "Another one", vec![]).await?;
//!     println!("{}", a2a_handler::utils::outcome_text(&reply));
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start: Server
//!
//! ```rust,ignore
//! use a2a_handler::builders::{reference_card, ServerBuilder};
//! use a2a_handler::server::EchoAgent;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = ServerBuilder::new(Arc::new(EchoAgent::new()))
//!         .with_agent_card_direct(reference_card("localhost", 8000))
//!         .with_push_notifications(true)
//!         .build();
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! The server provides:
//! - `POST /` and `POST /a2a`: JSON-RPC 2.0 endpoint for all A2A methods
//! - `GET /.well-known/agent-card.json` and `/.well-known/agent.json`: agent card discovery
//!
//! ## Protocol Compliance
//!
//! Supported JSON-RPC methods, on both sides:
//! - `message/send`: Send a message and get a task or a message
//! - `message/stream`: Send a message with SSE streaming
//! - `tasks/get`: Retrieve a task by ID
//! - `tasks/cancel`: Cancel a running task
//! - `tasks/resubscribe`: Re-attach to a running task's stream
//! - `tasks/pushNotificationConfig/set` and `/get`: Webhook registration
//!
//! ### Core Types
//!
//! - [`types::Task`]: A2A task with status, history, and artifacts
//! - [`types::Message`]: A message with text/file/data parts
//! - [`types::TaskState`]: Task lifecycle state machine
//! - [`types::StreamResponse`]: Stream and push event payloads
//! - [`types::AgentCard`]: Agent metadata and capabilities
//! - [`error::A2AError`]: Error types with JSON-RPC error codes

pub mod auth;
pub mod builders;
pub mod error;
pub mod session;
pub mod types;
pub mod utils;
pub mod validation;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

/// Prelude module that re-exports commonly used types and traits.
///
/// # Example
///
/// ```
/// use a2a_handler::prelude::*;
///
/// let message = Message::user(vec![Part::text("hello")]);
/// assert_eq!(message.role, Role::User);
/// ```
pub mod prelude {
    // Core types
    pub use crate::types::{
        AgentCapabilities, AgentCard, AgentSkill, Artifact, FileContent, Message, Part, Role,
        StreamResponse, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
        TaskStatusUpdateEvent,
    };

    // Error types
    pub use crate::error::{A2AError, A2AResult};

    // Sessions, credentials, validation
    pub use crate::auth::{AuthCredentials, AuthScheme};
    pub use crate::session::{FileSessionStore, InMemorySessionStore, Session, SessionStore};
    pub use crate::validation::{validate_card, ValidationReport};

    // Builders
    pub use crate::builders::AgentCardBuilder;

    #[cfg(feature = "client")]
    pub use crate::builders::ClientBuilder;

    #[cfg(feature = "client")]
    pub use crate::client::{
        MessageOutcome, OutcomeStream, PushReceiver, PushReceiverConfig, SessionClient,
    };

    #[cfg(feature = "server")]
    pub use crate::builders::ServerBuilder;

    #[cfg(feature = "server")]
    pub use crate::server::{
        a2a_router, AgentExecutor, DefaultRequestHandler, EchoAgent, EventQueue,
        InMemoryTaskStore, RequestContext, TaskStore, TaskUpdater,
    };
}

// Re-export core types at crate root for convenience.
pub use builders::AgentCardBuilder;
pub use error::{A2AError, A2AResult};
pub use types::*;

#[cfg(feature = "client")]
pub use builders::ClientBuilder;

#[cfg(feature = "server")]
pub use builders::ServerBuilder;
