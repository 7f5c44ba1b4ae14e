//! Event queue: broadcast channel for streaming A2A events.
//!
//! The event queue connects agent executors (producers) to request handlers
//! (consumers). Agents publish [`StreamResponse`] events, and the server
//! delivers them to SSE streams, persists them, and forwards task snapshots
//! to push webhooks.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::error::A2AResult;
use crate::types::StreamResponse;

/// Default channel capacity for the event queue.
const DEFAULT_CAPACITY: usize = 1024;

/// Event queue for publishing and subscribing to A2A streaming events.
///
/// Built on top of a `tokio::sync::broadcast` channel, allowing multiple
/// consumers to independently receive events from a single producer.
/// Closing the queue ends every subscription once it has drained the events
/// published before the close.
///
/// # Usage
///
/// ```rust,ignore
/// let queue = EventQueue::new(256);
/// let mut events = queue.subscribe();
///
/// // In agent executor:
/// queue.enqueue_event(event).await?;
/// queue.close();
///
/// // In request handler / SSE stream:
/// while let Some(event) = events.recv().await {
///     // process event
/// }
/// ```
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: broadcast::Sender<StreamResponse>,
    closed: Arc<watch::Sender<bool>>,
}

impl EventQueue {
    /// Create a new event queue with the given channel capacity.
    ///
    /// The capacity determines how many events can be buffered before
    /// slow consumers start missing events. A capacity of zero is raised
    /// to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        let (closed, _) = watch::channel(false);
        Self {
            tx,
            closed: Arc::new(closed),
        }
    }

    /// Create a new event queue with the default capacity (1024).
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            rx: self.tx.subscribe(),
            closed: self.closed.subscribe(),
        }
    }

    /// Publish an event to all subscribers.
    ///
    /// If the queue is closed, the event is dropped with a warning.
    pub async fn enqueue_event(&self, event: StreamResponse) -> A2AResult<()> {
        if self.is_closed() {
            warn!("Queue is closed. Event will not be enqueued.");
            return Ok(());
        }

        match self.tx.send(event) {
            Ok(count) => {
                debug!(subscriber_count = count, "Published event to queue");
            }
            Err(_) => {
                // Not fatal: subscriber may have disconnected.
                warn!("Failed to publish event (no subscribers)");
            }
        }
        Ok(())
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Close the queue. Later events are dropped; subscribers finish after
    /// the events already published.
    pub fn close(&self) {
        if !self.closed.send_replace(true) {
            debug!("Closing EventQueue.");
        }
    }

    /// Check if the queue has been closed.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// One consumer's view of an [`EventQueue`].
#[derive(Debug)]
pub struct EventSubscriber {
    rx: broadcast::Receiver<StreamResponse>,
    closed: watch::Receiver<bool>,
}

impl EventSubscriber {
    /// Next event, or `None` once the queue is closed and drained.
    ///
    /// A consumer that falls more than the queue capacity behind skips the
    /// missed events with a warning.
    pub async fn recv(&mut self) -> Option<StreamResponse> {
        loop {
            tokio::select! {
                biased;
                received = self.rx.recv() => match received {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Closed) => return None,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed = missed, "Event consumer lagged");
                    }
                },
                _ = self.closed.wait_for(|closed| *closed) => {
                    // Drain what was published before the close.
                    return match self.rx.try_recv() {
                        Ok(event) => Some(event),
                        Err(_) => None,
                    };
                }
            }
        }
    }
}
