//! Task store: where the reference server keeps task snapshots.
//!
//! The request handler writes a snapshot after every event it folds and
//! reads them back for `tasks/get`, `tasks/cancel` and follow-up messages.
//! [`InMemoryTaskStore`] is the only backend shipped; tasks vanish when the
//! process exits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::A2AResult;
use crate::types::Task;

/// Snapshot storage keyed by task id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or replace the snapshot for `task.id`.
    async fn save(&self, task: Task) -> A2AResult<()>;

    /// Latest snapshot, or `None` for an unknown id.
    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>>;

    /// Drop a snapshot. Unknown ids are not an error.
    async fn delete(&self, task_id: &str) -> A2AResult<()>;
}

/// `HashMap` behind a tokio `RwLock`. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: Task) -> A2AResult<()> {
        let task_id = task.id.clone();
        let is_new = self.tasks.write().await.insert(task_id.clone(), task).is_none();
        debug!(task_id = %task_id, is_new, "task snapshot saved");
        Ok(())
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>> {
        let task = self.tasks.read().await.get(task_id).cloned();
        debug!(task_id = %task_id, found = task.is_some(), "task snapshot lookup");
        Ok(task)
    }

    async fn delete(&self, task_id: &str) -> A2AResult<()> {
        if self.tasks.write().await.remove(task_id).is_some() {
            debug!(task_id = %task_id, "task snapshot dropped");
        } else {
            warn!(task_id = %task_id, "no snapshot to drop");
        }
        Ok(())
    }
}
