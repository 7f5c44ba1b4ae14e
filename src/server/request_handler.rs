//! Request handler: coordinates agent execution, task storage, and event delivery.
//!
//! The [`RequestHandler`] trait defines the interface that the axum integration
//! layer calls for each JSON-RPC method. [`DefaultRequestHandler`] provides
//! the standard implementation that wires together an [`AgentExecutor`],
//! [`TaskStore`], and [`EventQueue`].
//!
//! Every execution gets one persister: a background task that subscribes to
//! the execution's queue before the executor starts, folds each event into
//! the stored task, forwards the snapshot to the task's push webhook and
//! publishes it on a `watch` channel that `message/send` and `tasks/cancel`
//! wait on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    GetTaskParams, GetTaskPushNotificationConfigParams, Message, SendMessageConfiguration,
    SendMessageParams, SendMessageResponse, StreamResponse, Task, TaskIdParams,
    TaskPushNotificationConfig, TaskState, TaskStatus,
};

use super::agent_executor::{AgentExecutor, RequestContext};
use super::event_queue::{EventQueue, EventSubscriber};
use super::push_sender::{PushConfigStore, PushSender};
use super::task_store::TaskStore;
use super::task_updater::TaskUpdater;

/// Trait for handling A2A JSON-RPC requests.
///
/// Each method corresponds to an A2A JSON-RPC method. The axum integration
/// layer dispatches incoming requests to these methods.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle `message/send`: execute agent logic and return the task or a direct message.
    async fn on_message_send(&self, params: SendMessageParams) -> A2AResult<SendMessageResponse>;

    /// Handle `message/stream`: execute agent logic and return an event stream.
    async fn on_message_send_stream(&self, params: SendMessageParams)
        -> A2AResult<EventSubscriber>;

    /// Handle `tasks/get`: retrieve a task by ID.
    async fn on_get_task(&self, params: GetTaskParams) -> A2AResult<Task>;

    /// Handle `tasks/cancel`: cancel a running task.
    async fn on_cancel_task(&self, params: TaskIdParams) -> A2AResult<Task>;

    /// Handle `tasks/resubscribe`: re-attach to the event stream of a running task.
    async fn on_resubscribe(&self, params: TaskIdParams) -> A2AResult<EventSubscriber>;

    /// Handle `tasks/pushNotificationConfig/set`.
    ///
    /// Default implementation returns `PushNotificationNotSupported`.
    async fn on_set_push_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let _ = params;
        Err(A2AError::push_notification_not_supported(
            "Push notifications are not supported by this agent",
        ))
    }

    /// Handle `tasks/pushNotificationConfig/get`.
    ///
    /// Default implementation returns `PushNotificationNotSupported`.
    async fn on_get_push_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let _ = params;
        Err(A2AError::push_notification_not_supported(
            "Push notifications are not supported by this agent",
        ))
    }
}

// ---------------------------------------------------------------------------
// Execution tracking
// ---------------------------------------------------------------------------

/// What the persister has seen of one execution so far.
#[derive(Debug, Clone)]
struct Snapshot {
    task: Task,
    /// A direct message the agent answered with instead of updating the task.
    reply: Option<Message>,
    /// The turn has produced its answer (terminal, final, input-required or a message).
    settled: bool,
    /// The persister has stopped.
    done: bool,
}

impl Snapshot {
    fn ready(&self) -> bool {
        self.settled || self.done
    }
}

/// Tracks a running agent execution.
struct RunningAgent {
    run: u64,
    /// Handle to the spawned tokio task running the agent.
    handle: JoinHandle<()>,
    /// The event queue for this execution.
    event_queue: EventQueue,
    snapshot: watch::Receiver<Snapshot>,
}

type RunningAgents = Arc<Mutex<HashMap<String, RunningAgent>>>;

#[derive(Clone)]
struct PushSupport {
    configs: PushConfigStore,
    sender: PushSender,
}

/// Default request handler: standard implementation wiring executor, store, and events.
///
/// # Lifecycle
///
/// 1. `on_message_send` or `on_message_send_stream` creates a new task (or
///    continues the one named by the message's `taskId`), persists it, and
///    spawns the agent executor.
/// 2. The executor publishes events to the execution's `EventQueue`; the
///    queue is closed when `execute` returns.
/// 3. The persister folds every event into the stored task and forwards the
///    snapshot to the task's push webhook, if one is registered.
/// 4. For `message/send`: the handler waits until the turn settles and
///    returns the task, or the agent's direct message.
/// 5. For `message/stream`: the subscriber is returned directly for SSE delivery.
/// 6. `on_cancel_task` calls the executor's cancel method, aborts the running
///    execution and waits for the canceled state.
pub struct DefaultRequestHandler {
    executor: Arc<dyn AgentExecutor>,
    task_store: Arc<dyn TaskStore>,
    push: Option<PushSupport>,
    running_agents: RunningAgents,
    runs: AtomicU64,
}

impl DefaultRequestHandler {
    /// Create a new default request handler without push notifications.
    pub fn new(executor: Arc<dyn AgentExecutor>, task_store: Arc<dyn TaskStore>) -> Self {
        Self {
            executor,
            task_store,
            push: None,
            running_agents: Arc::new(Mutex::new(HashMap::new())),
            runs: AtomicU64::new(0),
        }
    }

    /// Enable `tasks/pushNotificationConfig/*` and webhook delivery.
    pub fn with_push_notifications(self) -> Self {
        self.with_push_sender(PushSender::new())
    }

    /// Enable push notifications with a custom sender.
    pub fn with_push_sender(mut self, sender: PushSender) -> Self {
        self.push = Some(PushSupport {
            configs: PushConfigStore::new(),
            sender,
        });
        self
    }

    /// Whether push notifications are enabled.
    pub fn supports_push_notifications(&self) -> bool {
        self.push.is_some()
    }

    async fn load_task(&self, task_id: &str) -> A2AResult<Task> {
        self.task_store
            .get(task_id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(task_id))
    }

    /// Create or retrieve a task for the given message.
    ///
    /// 1. If `taskId` names a live task, the message joins its history.
    /// 2. If `taskId` names a terminal task, a new task starts in the same context.
    /// 3. If `taskId` names nothing, `TaskNotFound`.
    /// 4. Otherwise a new task starts in `submitted` state.
    ///
    /// Returns the task and whether it was created by this call.
    async fn get_or_create_task(&self, params: &SendMessageParams) -> A2AResult<(Task, bool)> {
        let mut context_id = params.message.context_id.clone();

        if let Some(task_id) = &params.message.task_id {
            let Some(mut task) = self.task_store.get(task_id).await? else {
                return Err(A2AError::task_not_found(format!(
                    "Task {task_id} was specified but does not exist"
                )));
            };

            if task.status.state.is_terminal() {
                info!(
                    task_id = %task_id,
                    state = %task.status.state,
                    "Task is finished, starting a new one in its context"
                );
                context_id = Some(task.context_id);
            } else {
                let history = task.history.get_or_insert_with(Vec::new);
                if let Some(status_message) = task.status.message.take() {
                    history.push(status_message);
                }
                history.push(params.message.clone());
                self.task_store.save(task.clone()).await?;
                self.remember_push_config(&task.id, params.configuration.as_ref())
                    .await?;
                return Ok((task, false));
            }
        }

        let task_id = Uuid::new_v4().to_string();
        let context_id = context_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut message = params.message.clone();
        message.task_id = Some(task_id.clone());
        message.context_id = Some(context_id.clone());

        let task = Task {
            id: task_id,
            context_id,
            kind: "task".to_string(),
            status: TaskStatus::now(TaskState::Submitted),
            artifacts: None,
            history: Some(vec![message]),
            metadata: params.metadata.clone(),
        };

        self.task_store.save(task.clone()).await?;
        self.remember_push_config(&task.id, params.configuration.as_ref())
            .await?;
        debug!(task_id = %task.id, context_id = %task.context_id, "Created new task");

        Ok((task, true))
    }

    async fn remember_push_config(
        &self,
        task_id: &str,
        configuration: Option<&SendMessageConfiguration>,
    ) -> A2AResult<()> {
        let Some(config) = configuration.and_then(|c| c.push_notification_config.clone()) else {
            return Ok(());
        };
        match &self.push {
            Some(push) => {
                push.configs.set(task_id, config).await;
                Ok(())
            }
            None => Err(A2AError::push_notification_not_supported(
                "Push notifications are not supported by this agent",
            )),
        }
    }

    /// Spawn the agent executor for a task.
    ///
    /// Returns a subscriber created before the executor started, plus the
    /// snapshot channel of the execution's persister.
    async fn spawn_executor(
        &self,
        task: &Task,
        params: &SendMessageParams,
    ) -> A2AResult<(EventSubscriber, watch::Receiver<Snapshot>)> {
        let event_queue = EventQueue::with_default_capacity();
        let subscriber = event_queue.subscribe();

        let mut message = params.message.clone();
        message.task_id = Some(task.id.clone());
        message.context_id = Some(task.context_id.clone());

        let context = RequestContext {
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            message: Some(message),
            task: Some(task.clone()),
            configuration: params.configuration.clone(),
            metadata: params.metadata.clone(),
        };

        // Held until the entry is inserted so a fast persister cannot remove
        // it first.
        let mut running = self.running_agents.lock().await;
        if let Some(previous) = running.remove(&task.id) {
            warn!(task_id = %task.id, "Replacing a still-running execution");
            previous.handle.abort();
            previous.event_queue.close();
        }

        let run = self.runs.fetch_add(1, Ordering::Relaxed);
        let snapshot = self.track(run, task.clone(), &event_queue);

        let executor = Arc::clone(&self.executor);
        let queue = event_queue.clone();
        let task_id = task.id.clone();
        let context_id = task.context_id.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = executor.execute(context, queue.clone()).await {
                error!(task_id = %task_id, error = %e, "Agent execution failed");

                let updater = TaskUpdater::new(queue.clone(), task_id, context_id);
                let _ = updater
                    .failed_with_text(&format!("Agent execution failed: {e}"))
                    .await;
            }
            queue.close();
        });

        running.insert(
            task.id.clone(),
            RunningAgent {
                run,
                handle,
                event_queue,
                snapshot: snapshot.clone(),
            },
        );

        Ok((subscriber, snapshot))
    }

    /// Start the persister for one execution.
    ///
    /// Subscribes synchronously, so every event published after this call
    /// returns is seen.
    fn track(&self, run: u64, task: Task, event_queue: &EventQueue) -> watch::Receiver<Snapshot> {
        let mut events = event_queue.subscribe();
        let (tx, rx) = watch::channel(Snapshot {
            task: task.clone(),
            reply: None,
            settled: false,
            done: false,
        });

        let task_store = Arc::clone(&self.task_store);
        let push = self.push.clone();
        let running = Arc::clone(&self.running_agents);

        tokio::spawn(async move {
            let task_id = task.id.clone();
            let mut task = task;

            while let Some(event) = events.recv().await {
                let mut reply = None;
                let settled = match &event {
                    StreamResponse::Message(message) => {
                        task.history
                            .get_or_insert_with(Vec::new)
                            .push(message.clone());
                        reply = Some(message.clone());
                        true
                    }
                    StreamResponse::StatusUpdate(update) => {
                        update.r#final
                            || update.status.state.is_terminal()
                            || update.status.state == TaskState::InputRequired
                    }
                    StreamResponse::Task(snapshot) => snapshot.status.state.is_terminal(),
                    StreamResponse::ArtifactUpdate(_) => false,
                };
                if !matches!(event, StreamResponse::Message(_)) {
                    apply_event(&mut task, &event);
                }

                if let Err(e) = task_store.save(task.clone()).await {
                    error!(task_id = %task_id, error = %e, "Failed to persist task");
                }

                let terminal = task.status.state.is_terminal();
                tx.send_modify(|snapshot| {
                    snapshot.task = task.clone();
                    if reply.is_some() {
                        snapshot.reply = reply;
                    }
                    snapshot.settled |= settled;
                });

                if let Some(push) = &push {
                    if let Some(config) = push.configs.get(&task_id).await {
                        push.sender.send(&config, &task).await;
                    }
                }

                if terminal {
                    break;
                }
            }

            tx.send_modify(|snapshot| snapshot.done = true);

            let mut running = running.lock().await;
            if running.get(&task_id).is_some_and(|agent| agent.run == run) {
                running.remove(&task_id);
            }
            debug!(task_id = %task_id, state = %task.status.state, "Execution finished");
        });

        rx
    }

    /// Wait until the persister reports something worth returning.
    async fn wait_ready(snapshot: watch::Receiver<Snapshot>) -> Snapshot {
        Self::wait_until(snapshot, Snapshot::ready).await
    }

    async fn wait_done(snapshot: watch::Receiver<Snapshot>) -> Snapshot {
        Self::wait_until(snapshot, |s| s.done).await
    }

    async fn wait_until(
        mut snapshot: watch::Receiver<Snapshot>,
        condition: impl FnMut(&Snapshot) -> bool,
    ) -> Snapshot {
        if let Ok(ready) = snapshot.wait_for(condition).await {
            return ready.clone();
        }
        // The persister is gone; its last snapshot is final.
        let last = snapshot.borrow().clone();
        last
    }

    /// Wait for the first change after the initial snapshot.
    async fn wait_changed(mut snapshot: watch::Receiver<Snapshot>) -> Snapshot {
        let _ = snapshot.changed().await;
        let current = snapshot.borrow_and_update().clone();
        current
    }

    /// Trim task history to the requested length.
    ///
    /// Only trims if `max_length` is `Some` AND > 0 AND history exists.
    /// Keeps the most recent N messages (tail).
    fn trim_history(task: &mut Task, max_length: Option<usize>) {
        if let Some(max) = max_length.filter(|max| *max > 0) {
            if let Some(history) = task.history.as_mut() {
                if history.len() > max {
                    let start = history.len() - max;
                    *history = history.split_off(start);
                }
            }
        }
    }
}

/// Fold a stream event into a task.
///
/// - `StatusUpdate`: moves the current status message to history, merges
///   event metadata into task metadata, then replaces the status. Ignored
///   once the task is terminal.
/// - `ArtifactUpdate`: replaces or adds the artifact; with `append` the parts
///   are added to the existing artifact, and a chunk for an unknown
///   artifact is dropped.
/// - `Task`: replaces the task.
/// - `Message`: appended to history.
pub(crate) fn apply_event(task: &mut Task, event: &StreamResponse) {
    match event {
        StreamResponse::StatusUpdate(update) => {
            if task.status.state.is_terminal() {
                warn!(
                    task_id = %task.id,
                    state = %task.status.state,
                    requested_state = %update.status.state,
                    "Ignoring status update for finished task"
                );
                return;
            }

            if let Some(current) = task.status.message.take() {
                task.history.get_or_insert_with(Vec::new).push(current);
            }

            if let Some(event_meta) = &update.metadata {
                match task.metadata.as_mut().and_then(|m| m.as_object_mut()) {
                    Some(task_obj) => {
                        if let Some(event_obj) = event_meta.as_object() {
                            for (k, v) in event_obj {
                                task_obj.insert(k.clone(), v.clone());
                            }
                        }
                    }
                    None => task.metadata = Some(event_meta.clone()),
                }
            }

            task.status = update.status.clone();
        }
        StreamResponse::ArtifactUpdate(update) => {
            let artifacts = task.artifacts.get_or_insert_with(Vec::new);
            let artifact_id = &update.artifact.artifact_id;
            let existing = artifacts.iter().position(|a| &a.artifact_id == artifact_id);

            match (update.append.unwrap_or(false), existing) {
                (false, Some(idx)) => artifacts[idx] = update.artifact.clone(),
                (false, None) => artifacts.push(update.artifact.clone()),
                (true, Some(idx)) => artifacts[idx].parts.extend(update.artifact.parts.clone()),
                (true, None) => {
                    warn!(
                        task_id = %task.id,
                        artifact_id = %artifact_id,
                        "Received append for nonexistent artifact, ignoring chunk"
                    );
                }
            }
        }
        StreamResponse::Task(updated) => {
            *task = updated.clone();
        }
        StreamResponse::Message(message) => {
            task.history.get_or_insert_with(Vec::new).push(message.clone());
        }
    }
}

#[async_trait]
impl RequestHandler for DefaultRequestHandler {
    async fn on_message_send(&self, params: SendMessageParams) -> A2AResult<SendMessageResponse> {
        let (task, created) = self.get_or_create_task(&params).await?;
        let (_, snapshot) = self.spawn_executor(&task, &params).await?;

        let blocking = params
            .configuration
            .as_ref()
            .and_then(|c| c.blocking)
            .unwrap_or(true);
        let result = if blocking {
            Self::wait_ready(snapshot).await
        } else {
            Self::wait_changed(snapshot).await
        };

        if let Some(reply) = result.reply {
            if created && result.task.status.state == TaskState::Submitted {
                self.task_store.delete(&task.id).await?;
            }
            return Ok(SendMessageResponse::Message(reply));
        }

        let mut final_task = result.task;
        let history_length = params.configuration.as_ref().and_then(|c| c.history_length);
        Self::trim_history(&mut final_task, history_length);

        Ok(SendMessageResponse::Task(final_task))
    }

    async fn on_message_send_stream(
        &self,
        params: SendMessageParams,
    ) -> A2AResult<EventSubscriber> {
        let (task, _) = self.get_or_create_task(&params).await?;
        let (subscriber, _) = self.spawn_executor(&task, &params).await?;
        Ok(subscriber)
    }

    async fn on_get_task(&self, params: GetTaskParams) -> A2AResult<Task> {
        let mut task = self.load_task(&params.id).await?;
        Self::trim_history(&mut task, params.history_length);
        Ok(task)
    }

    async fn on_cancel_task(&self, params: TaskIdParams) -> A2AResult<Task> {
        let task = self.load_task(&params.id).await?;

        if task.status.state.is_terminal() {
            return Err(A2AError::task_not_cancelable(format!(
                "Task cannot be canceled - current state: {}",
                task.status.state
            )));
        }

        let (event_queue, snapshot) = {
            let running = self.running_agents.lock().await;
            match running.get(&params.id) {
                Some(agent) => (agent.event_queue.clone(), agent.snapshot.clone()),
                None => {
                    // No running agent: a temporary queue with its own persister.
                    let queue = EventQueue::with_default_capacity();
                    let run = self.runs.fetch_add(1, Ordering::Relaxed);
                    let snapshot = self.track(run, task.clone(), &queue);
                    (queue, snapshot)
                }
            }
        };

        let context = RequestContext {
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            message: None,
            task: Some(task.clone()),
            configuration: None,
            metadata: params.metadata,
        };

        self.executor.cancel(context, event_queue.clone()).await?;

        if let Some(agent) = self.running_agents.lock().await.get(&params.id) {
            agent.handle.abort();
        }
        event_queue.close();

        let final_task = Self::wait_done(snapshot).await.task;

        if final_task.status.state != TaskState::Canceled {
            return Err(A2AError::task_not_cancelable(format!(
                "Task cannot be canceled - current state: {}",
                final_task.status.state
            )));
        }

        info!(task_id = %final_task.id, "Task canceled");
        Ok(final_task)
    }

    async fn on_resubscribe(&self, params: TaskIdParams) -> A2AResult<EventSubscriber> {
        let task = self.load_task(&params.id).await?;

        if task.status.state.is_terminal() {
            return Err(A2AError::invalid_params(format!(
                "Task {} is in terminal state: {}",
                params.id, task.status.state
            )));
        }

        let running = self.running_agents.lock().await;
        match running.get(&params.id) {
            Some(agent) => Ok(agent.event_queue.subscribe()),
            None => Err(A2AError::task_not_found(format!(
                "Task {} has no active agent execution",
                params.id
            ))),
        }
    }

    async fn on_set_push_config(
        &self,
        params: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let Some(push) = &self.push else {
            return Err(A2AError::push_notification_not_supported(
                "Push notifications are not supported by this agent",
            ));
        };
        self.load_task(&params.task_id).await?;

        let mut config = params.push_notification_config;
        if config.id.is_none() {
            config.id = Some(params.task_id.clone());
        }
        push.configs.set(&params.task_id, config.clone()).await;

        Ok(TaskPushNotificationConfig {
            task_id: params.task_id,
            push_notification_config: config,
        })
    }

    async fn on_get_push_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let Some(push) = &self.push else {
            return Err(A2AError::push_notification_not_supported(
                "Push notifications are not supported by this agent",
            ));
        };
        self.load_task(&params.id).await?;

        let config = push.configs.get(&params.id).await.ok_or_else(|| {
            A2AError::invalid_params(format!(
                "No push notification config for task {}",
                params.id
            ))
        })?;
        if let Some(wanted) = &params.push_notification_config_id {
            if config.id.as_deref() != Some(wanted.as_str()) {
                return Err(A2AError::invalid_params(format!(
                    "No push notification config {wanted} for task {}",
                    params.id
                )));
            }
        }

        Ok(TaskPushNotificationConfig {
            task_id: params.id,
            push_notification_config: config,
        })
    }
}
