//! Session-aware client.
//!
//! [`SessionClient`] drives a conversation with one agent. It owns the typed
//! [`A2AClient`], the agent's resolved card and optionally a shared
//! [`PushReceiver`]; all conversation state lives in the [`Session`] each
//! call borrows.

use tracing::{debug, info, warn};

use crate::auth::AuthCredentials;
use crate::error::{A2AError, A2AResult};
use crate::session::Session;
use crate::types::{
    AgentCard, GetTaskParams, GetTaskPushNotificationConfigParams, Message, Part,
    PushNotificationConfig, SendMessageConfiguration, SendMessageParams, SendMessageResponse,
    Task, TaskIdParams, TaskPushNotificationConfig,
};

use super::a2a_client::A2AClient;
use super::card_resolver::CardResolver;
use super::outcome::{MessageOutcome, OutcomeStream};
use super::push_receiver::PushReceiver;
use super::transport::TransportConfig;

/// Client for one agent that keeps conversation ids in a [`Session`].
///
/// ```no_run
/// use a2a_handler::client::{MessageOutcome, SessionClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SessionClient::connect("http://localhost:7420").await?;
/// let mut session = client.session(None);
///
/// match client.send_message(&mut session, "Hello", vec![]).await? {
///     MessageOutcome::Task(task) => println!("task {} is {}", task.id, task.status.state),
///     other => println!("{other:?}"),
/// }
///
/// // The follow-up carries the task and context ids from the first reply.
/// let mut stream = client.stream_message(&mut session, "And then?", vec![]).await?;
/// while let Some(outcome) = stream.next().await {
///     println!("{:?}", outcome?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionClient {
    client: A2AClient,
    card: AgentCard,
    base_url: String,
    config: TransportConfig,
    push: Option<PushReceiver>,
    prefer_streaming: bool,
    default_auth: Option<AuthCredentials>,
}

impl SessionClient {
    /// Resolve the agent card at `base_url` and connect to its endpoint with
    /// default settings.
    pub async fn connect(base_url: &str) -> A2AResult<Self> {
        Self::connect_with(base_url, TransportConfig::default(), &CardResolver::new()).await
    }

    /// Resolve the card with `resolver` and connect using `config`.
    pub async fn connect_with(
        base_url: &str,
        config: TransportConfig,
        resolver: &CardResolver,
    ) -> A2AResult<Self> {
        let card = resolver.resolve(base_url).await?;
        let endpoint = CardResolver::endpoint_url(&card, base_url);
        info!(agent = %card.name, endpoint = %endpoint, "connected to agent");

        let client = A2AClient::from_endpoint_with_config(&endpoint, config.clone())?;
        Ok(Self::new(client, card, base_url, config))
    }

    /// Assemble a client from parts.
    pub fn new(
        client: A2AClient,
        card: AgentCard,
        base_url: impl Into<String>,
        config: TransportConfig,
    ) -> Self {
        let prefer_streaming = card.supports_streaming();
        Self {
            client,
            card,
            base_url: base_url.into(),
            config,
            push: None,
            prefer_streaming,
            default_auth: None,
        }
    }

    /// Attach a push receiver. Sends then register its webhook with the
    /// agent, provided the card advertises `pushNotifications`.
    pub fn with_push_receiver(mut self, receiver: PushReceiver) -> Self {
        if !self.card.supports_push_notifications() {
            warn!(
                agent = %self.card.name,
                "agent does not advertise push notifications; webhook will not be registered"
            );
        }
        self.push = Some(receiver);
        self
    }

    /// Override the streaming preference. By default it follows the card.
    pub fn with_streaming(mut self, prefer_streaming: bool) -> Self {
        self.prefer_streaming = prefer_streaming;
        self
    }

    /// Credentials for sessions created without their own.
    pub fn with_default_auth(mut self, auth: AuthCredentials) -> Self {
        self.default_auth = Some(auth);
        self
    }

    /// The resolved agent card.
    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    /// Base URL the card was resolved from; the default session id.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The attached push receiver, if any.
    pub fn push_receiver(&self) -> Option<&PushReceiver> {
        self.push.as_ref()
    }

    /// True when streaming is both preferred and advertised by the agent.
    pub fn wants_streaming(&self) -> bool {
        self.prefer_streaming && self.card.supports_streaming()
    }

    /// A fresh session for this agent, using `auth` or else the default
    /// credentials. Credentials that do not match the card's security
    /// schemes are accepted with a logged warning.
    pub fn session(&self, auth: Option<AuthCredentials>) -> Session {
        let mut session = Session::new(self.base_url.clone());
        if let Some(auth) = auth.or_else(|| self.default_auth.clone()) {
            auth.check_against_card(&self.card);
            session.auth = Some(auth);
        }
        session
    }

    /// Compare the session's credentials with the card's security schemes.
    pub fn check_auth(&self, session: &Session) -> Vec<String> {
        session
            .auth
            .as_ref()
            .map(|auth| auth.check_against_card(&self.card))
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Conversation
    // -----------------------------------------------------------------------

    /// Send a message and wait for the reply (`message/send`).
    ///
    /// A task reply moves the session onto that task and context. A message
    /// reply only updates the context.
    pub async fn send_message(
        &self,
        session: &mut Session,
        text: &str,
        parts: Vec<Part>,
    ) -> A2AResult<MessageOutcome> {
        let message = session.build_message(text, parts);
        session.record(message.clone());
        let auth = self.auth_for(session);

        debug!(
            session = %session.id,
            message_id = %message.message_id,
            task_id = ?session.task_id,
            "sending message"
        );
        let response = self
            .client
            .send_message(self.message_params(message), auth.as_ref())
            .await?;

        match response {
            SendMessageResponse::Task(task) => {
                session.absorb_task(&task);
                debug!(
                    session = %session.id,
                    task_id = %task.id,
                    state = %task.status.state,
                    "task reply"
                );
                Ok(MessageOutcome::Task(task))
            }
            SendMessageResponse::Message(reply) => {
                session.absorb_message(&reply);
                session.record(reply.clone());
                Ok(MessageOutcome::Message(reply))
            }
        }
    }

    /// Send a message and stream the agent's progress (`message/stream`).
    ///
    /// The first task on the stream answers this message and becomes the
    /// session's task, as with a task reply to [`send_message`](Self::send_message).
    pub async fn stream_message<'a>(
        &self,
        session: &'a mut Session,
        text: &str,
        parts: Vec<Part>,
    ) -> A2AResult<OutcomeStream<'a>> {
        let message = session.build_message(text, parts);
        session.record(message.clone());
        let auth = self.auth_for(session);

        debug!(
            session = %session.id,
            message_id = %message.message_id,
            task_id = ?session.task_id,
            "streaming message"
        );
        let sse = self
            .client
            .send_message_stream(self.message_params(message), auth.as_ref())
            .await?;
        Ok(self.outcome_stream(session, Some(sse)).expecting_reply())
    }

    /// Fetch a task (`tasks/get`). The session adopts it when it tracks no
    /// task or this one.
    pub async fn get_task(&self, session: &mut Session, task_id: &str) -> A2AResult<Task> {
        let params = GetTaskParams {
            id: task_id.to_string(),
            history_length: None,
            metadata: None,
        };
        let auth = self.auth_for(session);
        let task = self.client.get_task(params, auth.as_ref()).await?;
        absorb_if_tracked(session, &task);
        Ok(task)
    }

    /// Cancel a task (`tasks/cancel`).
    ///
    /// Canceling a task that already finished is not an error: the agent's
    /// not-cancelable reply is answered with the task's current state.
    pub async fn cancel_task(&self, session: &mut Session, task_id: &str) -> A2AResult<Task> {
        let auth = self.auth_for(session);
        match self
            .client
            .cancel_task(TaskIdParams::new(task_id), auth.as_ref())
            .await
        {
            Ok(task) => {
                absorb_if_tracked(session, &task);
                info!(task_id = %task.id, state = %task.status.state, "task canceled");
                Ok(task)
            }
            Err(err @ A2AError::TaskNotCancelable { .. }) => {
                let task = self.get_task(session, task_id).await?;
                if task.status.state.is_terminal() {
                    debug!(task_id = %task_id, state = %task.status.state, "task already finished");
                    Ok(task)
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Reopen the event stream of a running task (`tasks/resubscribe`).
    pub async fn resubscribe<'a>(
        &self,
        session: &'a mut Session,
        task_id: &str,
    ) -> A2AResult<OutcomeStream<'a>> {
        let auth = self.auth_for(session);
        let sse = self
            .client
            .resubscribe(TaskIdParams::new(task_id), auth.as_ref())
            .await?;
        debug!(session = %session.id, task_id = %task_id, "resubscribed");
        Ok(self.outcome_stream(session, Some(sse)))
    }

    /// Register a webhook for a task (`tasks/pushNotificationConfig/set`).
    pub async fn set_push_config(
        &self,
        session: &Session,
        task_id: &str,
        config: PushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let params = TaskPushNotificationConfig {
            task_id: task_id.to_string(),
            push_notification_config: config,
        };
        let auth = self.auth_for(session);
        self.client.set_push_config(params, auth.as_ref()).await
    }

    /// Read back a task's webhook (`tasks/pushNotificationConfig/get`).
    pub async fn get_push_config(
        &self,
        session: &Session,
        task_id: &str,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let params = GetTaskPushNotificationConfigParams {
            id: task_id.to_string(),
            push_notification_config_id: None,
            metadata: None,
        };
        let auth = self.auth_for(session);
        self.client.get_push_config(params, auth.as_ref()).await
    }

    /// Follow a task through push notifications only.
    ///
    /// Registers the attached receiver's webhook for `task_id` and returns a
    /// stream fed by its deliveries.
    ///
    /// # Errors
    ///
    /// [`A2AError::Push`] when no receiver is attached or it has no
    /// reachable URL; otherwise whatever the set call returns.
    pub async fn watch_task<'a>(
        &self,
        session: &'a mut Session,
        task_id: &str,
    ) -> A2AResult<OutcomeStream<'a>> {
        let config = self
            .push_config()
            .ok_or_else(|| A2AError::Push("no push receiver with a webhook URL attached".into()))?;
        self.set_push_config(session, task_id, config).await?;

        let mut stream = self.outcome_stream(session, None);
        stream.register_push(task_id);
        Ok(stream)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn auth_for(&self, session: &Session) -> Option<AuthCredentials> {
        session.auth.clone().map(|auth| auth.for_card(&self.card))
    }

    fn push_config(&self) -> Option<PushNotificationConfig> {
        let receiver = self.push.as_ref()?;
        Some(PushNotificationConfig {
            id: None,
            url: receiver.webhook_url()?,
            token: receiver.token().map(str::to_string),
            authentication: None,
        })
    }

    fn message_params(&self, message: Message) -> SendMessageParams {
        let configuration = self
            .push_config()
            .filter(|_| self.card.supports_push_notifications())
            .map(|push| SendMessageConfiguration {
                push_notification_config: Some(push),
                ..Default::default()
            });
        SendMessageParams {
            message,
            configuration,
            metadata: None,
        }
    }

    fn outcome_stream<'a>(
        &self,
        session: &'a mut Session,
        sse: Option<super::sse::SseStream>,
    ) -> OutcomeStream<'a> {
        OutcomeStream::new(
            session,
            sse,
            self.push.clone(),
            self.config.idle_timeout,
            self.config.stream_buffer,
        )
    }
}

fn absorb_if_tracked(session: &mut Session, task: &Task) {
    if session.task_id.as_deref().map_or(true, |tracked| tracked == task.id) {
        session.absorb_task(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::push_receiver::PushReceiverConfig;
    use crate::types::AgentCapabilities;

    fn card(push: bool) -> AgentCard {
        AgentCard {
            name: "test".into(),
            url: "http://127.0.0.1:1/".into(),
            capabilities: Some(AgentCapabilities {
                streaming: Some(true),
                push_notifications: Some(push),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn client(push: bool) -> SessionClient {
        let card = card(push);
        let a2a = A2AClient::from_endpoint(&card.url).unwrap();
        SessionClient::new(a2a, card, "http://127.0.0.1:1", TransportConfig::default())
    }

    #[test]
    fn push_config_only_when_advertised() {
        let receiver = PushReceiver::new(PushReceiverConfig {
            public_url: Some("http://me/webhook".into()),
            token: Some("tok".into()),
            ..Default::default()
        });

        let with_push = client(true).with_push_receiver(receiver.clone());
        let params = with_push.message_params(Message::user(vec![]));
        let push = params
            .configuration
            .and_then(|c| c.push_notification_config)
            .unwrap();
        assert_eq!(push.url, "http://me/webhook");
        assert_eq!(push.token.as_deref(), Some("tok"));

        let without = client(false).with_push_receiver(receiver);
        assert!(without
            .message_params(Message::user(vec![]))
            .configuration
            .is_none());
    }

    #[test]
    fn sessions_default_to_base_url() {
        let client = client(false);
        let session = client.session(Some(AuthCredentials::bearer("t")));
        assert_eq!(session.id, "http://127.0.0.1:1");
        assert!(session.auth.is_some());
        assert!(client.wants_streaming());
    }

    #[tokio::test]
    async fn watch_requires_receiver() {
        let client = client(true);
        let mut session = client.session(None);
        assert!(matches!(
            client.watch_task(&mut session, "t1").await,
            Err(A2AError::Push(_))
        ));
    }
}
