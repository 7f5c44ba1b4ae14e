//! A2A server framework: traits and implementations for building A2A agents.
//!
//! - [`AgentExecutor`] trait: implement your agent logic ([`EchoAgent`] is built in)
//! - [`RequestContext`]: execution context with task IDs, message, metadata
//! - [`TaskStore`] trait + [`InMemoryTaskStore`]: task persistence
//! - [`TaskUpdater`]: thread-safe task state transition helper
//! - [`EventQueue`]: broadcast channel for streaming events
//! - [`PushSender`] + [`PushConfigStore`]: webhook delivery of task snapshots
//! - [`RequestHandler`] trait + [`DefaultRequestHandler`]: JSON-RPC method logic
//! - [`a2a_router`]: ready-made axum routes for A2A servers
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_handler::server::*;
//!
//! // 1. Implement your agent logic.
//! struct MyAgent;
//!
//! #[async_trait::async_trait]
//! impl AgentExecutor for MyAgent {
//!     async fn execute(&self, ctx: RequestContext, queue: EventQueue) -> a2a_handler::A2AResult<()> {
//!         let updater = ctx.updater(queue);
//!         updater.update_status_text(TaskState::Working, "Processing...").await?;
//!         // ... do work ...
//!         updater.complete_with_text("Done!").await
//!     }
//!
//!     async fn cancel(&self, ctx: RequestContext, queue: EventQueue) -> a2a_handler::A2AResult<()> {
//!         ctx.updater(queue).cancel(None).await
//!     }
//! }
//!
//! // 2. Wire up the server.
//! let executor: Arc<dyn AgentExecutor> = Arc::new(MyAgent);
//! let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
//! let handler: Arc<dyn RequestHandler> = Arc::new(
//!     DefaultRequestHandler::new(executor, store).with_push_notifications()
//! );
//!
//! // 3. Create the router and serve.
//! let app = a2a_router(handler, agent_card);
//! ```

pub mod agent_executor;
pub mod axum_integration;
pub mod event_queue;
pub mod push_sender;
pub mod request_handler;
pub mod task_store;
pub mod task_updater;

// Re-export key types at the server module level for convenience.
pub use crate::types::SendMessageResponse;
pub use agent_executor::{AgentExecutor, EchoAgent, RequestContext};
pub use axum_integration::{a2a_router, AGENT_CARD_PATH, PREV_AGENT_CARD_PATH};
pub use event_queue::{EventQueue, EventSubscriber};
pub use push_sender::{PushConfigStore, PushSender};
pub use request_handler::{DefaultRequestHandler, RequestHandler};
pub use task_store::{InMemoryTaskStore, TaskStore};
pub use task_updater::TaskUpdater;
