//! A2A client: talk to remote agents.
//!
//! - [`SessionClient`]: the session core. Threads `contextId`/`taskId`
//!   through a [`Session`](crate::session::Session) across turns and turns
//!   every reply into a [`MessageOutcome`]
//! - [`OutcomeStream`]: pull-based stream of outcomes merged from SSE and
//!   push deliveries
//! - [`A2AClient`]: typed method per A2A JSON-RPC call, no state
//! - [`CardResolver`]: discover agent cards via the well-known URL convention
//! - [`Transport`] / [`JsonRpcTransport`]: pluggable transport layer
//! - [`SseStream`]: parsed SSE event stream for streaming responses
//! - [`PushReceiver`]: webhook endpoint for push notifications
//!
//! # Quick Start
//!
//! ```no_run
//! use a2a_handler::client::{MessageOutcome, SessionClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Resolve the agent card and connect:
//! let client = SessionClient::connect("http://localhost:7420").await?;
//! let mut session = client.session(None);
//!
//! // Send a text message:
//! match client.send_message(&mut session, "Hello, agent!", vec![]).await? {
//!     MessageOutcome::Task(task) => {
//!         println!("Task {} is {}", task.id, task.status.state);
//!     }
//!     MessageOutcome::Message(msg) => {
//!         println!("Direct reply: {:?}", msg);
//!     }
//!     _ => {}
//! }
//!
//! // Stream responses:
//! let mut stream = client.stream_message(&mut session, "Write a haiku", vec![]).await?;
//! while let Some(outcome) = stream.next().await {
//!     println!("{:?}", outcome?);
//! }
//! # Ok(())
//! # }
//! ```

mod a2a_client;
mod card_resolver;
mod outcome;
mod push_receiver;
mod session_client;
mod sse;
mod transport;

pub use crate::auth::{AuthCredentials, AuthScheme};
pub use crate::types::SendMessageResponse;
pub use a2a_client::A2AClient;
pub use card_resolver::{CardResolver, DEFAULT_AGENT_CARD_PATH, PREV_AGENT_CARD_PATH};
pub use outcome::{MessageOutcome, OutcomeStream};
pub use push_receiver::{
    Notification, PushReceiver, PushReceiverConfig, NOTIFICATION_TOKEN_HEADER,
};
pub use session_client::SessionClient;
pub use sse::{SseStream, StreamClosed};
pub use transport::{JsonRpcTransport, Transport, TransportConfig};
