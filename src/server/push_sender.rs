//! Push notifications: per-task webhook configs and the sender that
//! delivers task snapshots to them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::types::{PushNotificationConfig, Task};

/// Header carrying the token a client registered with its webhook.
pub const NOTIFICATION_TOKEN_HEADER: &str = "X-A2A-Notification-Token";

const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// In-memory webhook configuration, one per task.
#[derive(Debug, Clone, Default)]
pub struct PushConfigStore {
    configs: Arc<RwLock<HashMap<String, PushNotificationConfig>>>,
}

impl PushConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the webhook for a task.
    pub async fn set(&self, task_id: &str, config: PushNotificationConfig) {
        debug!(task_id = %task_id, url = %config.url, "Push config registered");
        self.configs
            .write()
            .await
            .insert(task_id.to_string(), config);
    }

    /// The webhook registered for a task, if any.
    pub async fn get(&self, task_id: &str) -> Option<PushNotificationConfig> {
        self.configs.read().await.get(task_id).cloned()
    }

    /// Forget the webhook for a task.
    pub async fn remove(&self, task_id: &str) {
        self.configs.write().await.remove(task_id);
    }
}

/// POSTs task snapshots to webhooks.
///
/// Delivery is best effort: failures are logged and never reach the
/// request that triggered them.
#[derive(Debug, Clone)]
pub struct PushSender {
    http: reqwest::Client,
}

impl PushSender {
    /// A sender with the default 30 second request timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_PUSH_TIMEOUT)
    }

    /// A sender with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }

    /// Deliver `task` to the webhook in `config`. Returns whether the
    /// webhook accepted it.
    pub async fn send(&self, config: &PushNotificationConfig, task: &Task) -> bool {
        let mut request = self.http.post(&config.url).json(task);
        if let Some(token) = &config.token {
            request = request.header(NOTIFICATION_TOKEN_HEADER, token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(
                    task_id = %task.id,
                    state = %task.status.state,
                    url = %config.url,
                    "Push notification delivered"
                );
                true
            }
            Ok(response) => {
                warn!(
                    task_id = %task.id,
                    url = %config.url,
                    status = response.status().as_u16(),
                    "Push notification rejected"
                );
                false
            }
            Err(e) => {
                warn!(
                    task_id = %task.id,
                    url = %config.url,
                    error = %e,
                    "Push notification failed"
                );
                false
            }
        }
    }
}

impl Default for PushSender {
    fn default() -> Self {
        Self::new()
    }
}
