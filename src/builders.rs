//! Builder patterns for ergonomic construction of agent cards, clients and servers.

use crate::types::*;

/// Protocol version written into built cards.
pub const PROTOCOL_VERSION: &str = "0.3.0";

/// Builder for constructing [`AgentCard`] with sensible defaults.
///
/// # Example
///
/// ```
/// use a2a_handler::builders::AgentCardBuilder;
///
/// let card = AgentCardBuilder::new("My Agent", "An example agent", "1.0.0")
///     .with_url("http://localhost:8000/")
///     .with_skill("chat", "Chat", "Conversational AI", vec!["conversation".to_string()])
///     .with_streaming(true)
///     .build();
/// assert_eq!(card.protocol_version.as_deref(), Some("0.3.0"));
/// ```
#[derive(Debug, Clone)]
pub struct AgentCardBuilder {
    card: AgentCard,
    capabilities: AgentCapabilities,
}

impl AgentCardBuilder {
    /// Create a new builder with required fields.
    ///
    /// # Arguments
    ///
    /// * `name` - Human-readable agent name
    /// * `description` - Description of agent capabilities
    /// * `version` - Version string (e.g., "1.0.0")
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            card: AgentCard {
                name: name.into(),
                description: description.into(),
                version: version.into(),
                protocol_version: Some(PROTOCOL_VERSION.to_string()),
                preferred_transport: Some("JSONRPC".to_string()),
                default_input_modes: vec!["text/plain".to_string()],
                default_output_modes: vec!["text/plain".to_string()],
                ..Default::default()
            },
            capabilities: AgentCapabilities::default(),
        }
    }

    /// Set the JSON-RPC endpoint URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.card.url = url.into();
        self
    }

    /// Add an extra interface.
    pub fn with_interface(mut self, url: impl Into<String>, transport: impl Into<String>) -> Self {
        self.card.additional_interfaces.push(AgentInterface {
            url: url.into(),
            transport: transport.into(),
        });
        self
    }

    /// Set the provider information.
    pub fn with_provider(
        mut self,
        organization: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.card.provider = Some(AgentProvider {
            organization: organization.into(),
            url: url.into(),
        });
        self
    }

    /// Set the documentation URL.
    pub fn with_documentation_url(mut self, url: impl Into<String>) -> Self {
        self.card.documentation_url = Some(url.into());
        self
    }

    /// Enable or disable streaming support.
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.capabilities.streaming = Some(enabled);
        self
    }

    /// Enable or disable push notifications support.
    pub fn with_push_notifications(mut self, enabled: bool) -> Self {
        self.capabilities.push_notifications = Some(enabled);
        self
    }

    /// Declare a security scheme and require it.
    pub fn with_security_scheme(mut self, name: impl Into<String>, scheme: SecurityScheme) -> Self {
        let name = name.into();
        self.card
            .security
            .push([(name.clone(), Vec::new())].into_iter().collect());
        self.card.security_schemes.insert(name, scheme);
        self
    }

    /// Add a skill to the agent card.
    pub fn with_skill(
        self,
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        self.with_skill_examples(id, name, description, tags, Vec::new())
    }

    /// Add a skill with examples.
    pub fn with_skill_examples(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
        examples: Vec<String>,
    ) -> Self {
        self.card.skills.push(AgentSkill {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tags,
            examples: (!examples.is_empty()).then_some(examples),
            ..Default::default()
        });
        self
    }

    /// Set the default input MIME types.
    pub fn with_input_modes(mut self, modes: Vec<String>) -> Self {
        self.card.default_input_modes = modes;
        self
    }

    /// Set the default output MIME types.
    pub fn with_output_modes(mut self, modes: Vec<String>) -> Self {
        self.card.default_output_modes = modes;
        self
    }

    /// Set the icon URL.
    pub fn with_icon_url(mut self, url: impl Into<String>) -> Self {
        self.card.icon_url = Some(url.into());
        self
    }

    /// Build the [`AgentCard`].
    pub fn build(mut self) -> AgentCard {
        self.card.capabilities = Some(self.capabilities);
        self.card
    }
}

/// Card of the reference echo agent served at `http://{host}:{port}/`:
/// streaming and push notifications on, one `handler_assistant` skill.
pub fn reference_card(host: &str, port: u16) -> AgentCard {
    AgentCardBuilder::new("Handler Agent", "Handler A2A agent", "1.0.0")
        .with_url(format!("http://{host}:{port}/"))
        .with_streaming(true)
        .with_push_notifications(true)
        .with_skill_examples(
            "handler_assistant",
            "Handler Assistant",
            "Answers questions about the Handler A2A toolkit and helps with usage",
            vec!["a2a".to_string(), "handler".to_string(), "help".to_string()],
            vec![
                "What is Handler?".to_string(),
                "How do I use the CLI?".to_string(),
                "Tell me about A2A".to_string(),
            ],
        )
        .build()
}

/// Builder for constructing a [`crate::client::SessionClient`] with custom configuration.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use a2a_handler::builders::ClientBuilder;
/// use std::time::Duration;
///
/// let client = ClientBuilder::new("http://localhost:8000")
///     .with_timeout(Duration::from_secs(30))
///     .with_idle_timeout(Duration::from_secs(120))
///     .build()
///     .await?;
/// let mut session = client.session(None);
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "client")]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    url: String,
    config: crate::client::TransportConfig,
    card_path: Option<String>,
    streaming: Option<bool>,
    auth: Option<crate::auth::AuthCredentials>,
    push: Option<PushSetup>,
}

#[cfg(feature = "client")]
#[derive(Debug, Clone)]
enum PushSetup {
    Receiver(crate::client::PushReceiver),
    Listen(std::net::SocketAddr, crate::client::PushReceiverConfig),
}

#[cfg(feature = "client")]
impl ClientBuilder {
    /// Create a new client builder for the agent at the given base URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: crate::client::TransportConfig::default(),
            card_path: None,
            streaming: None,
            auth: None,
            push: None,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the longest silence tolerated on an open stream.
    pub fn with_idle_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set how many stream events may be buffered ahead of the consumer.
    pub fn with_stream_buffer(mut self, events: usize) -> Self {
        self.config.stream_buffer = events.max(1);
        self
    }

    /// Add a custom HTTP header to every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    /// Credentials for sessions created without their own.
    pub fn with_auth(mut self, auth: crate::auth::AuthCredentials) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Shorthand for bearer-token credentials.
    pub fn with_bearer_token(self, token: impl Into<String>) -> Self {
        self.with_auth(crate::auth::AuthCredentials::bearer(token))
    }

    /// Shorthand for API-key credentials.
    pub fn with_api_key(self, key: impl Into<String>) -> Self {
        self.with_auth(crate::auth::AuthCredentials::api_key(key))
    }

    /// Fetch the agent card from this path instead of the well-known ones.
    pub fn with_card_path(mut self, path: impl Into<String>) -> Self {
        self.card_path = Some(path.into());
        self
    }

    /// Prefer (or avoid) streaming. By default it follows the card.
    pub fn with_streaming(mut self, prefer: bool) -> Self {
        self.streaming = Some(prefer);
        self
    }

    /// Attach an existing push receiver.
    pub fn with_push_receiver(mut self, receiver: crate::client::PushReceiver) -> Self {
        self.push = Some(PushSetup::Receiver(receiver));
        self
    }

    /// Bind a push receiver on `addr` when building.
    pub fn with_push_listener(
        mut self,
        addr: std::net::SocketAddr,
        config: crate::client::PushReceiverConfig,
    ) -> Self {
        self.push = Some(PushSetup::Listen(addr, config));
        self
    }

    /// Resolve the agent card and connect.
    pub async fn build(self) -> crate::A2AResult<crate::client::SessionClient> {
        use crate::client::{CardResolver, PushReceiver, SessionClient};

        let mut resolver = CardResolver::new().with_timeout(self.config.timeout);
        if let Some(path) = self.card_path {
            resolver = resolver.with_card_path(path);
        }

        let mut client = SessionClient::connect_with(&self.url, self.config, &resolver).await?;

        if let Some(prefer) = self.streaming {
            client = client.with_streaming(prefer);
        }
        if let Some(auth) = self.auth {
            client = client.with_default_auth(auth);
        }
        match self.push {
            Some(PushSetup::Receiver(receiver)) => client = client.with_push_receiver(receiver),
            Some(PushSetup::Listen(addr, config)) => {
                let receiver = PushReceiver::bind(addr, config).await?;
                client = client.with_push_receiver(receiver);
            }
            None => {}
        }

        Ok(client)
    }
}

/// Builder for constructing an A2A axum server with fluent configuration.
///
/// # Example
///
/// ```rust,ignore
/// use a2a_handler::builders::ServerBuilder;
/// use a2a_handler::server::EchoAgent;
/// use std::sync::Arc;
///
/// # async fn example() {
/// let app = ServerBuilder::new(Arc::new(EchoAgent::new()))
///     .with_agent_card(|builder| {
///         builder
///             .with_url("http://localhost:8000/")
///             .with_streaming(true)
///     })
///     .with_push_notifications(true)
///     .with_cors(true)
///     .build();
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
/// axum::serve(listener, app).await.unwrap();
/// # }
/// ```
#[cfg(feature = "server")]
pub struct ServerBuilder {
    executor: std::sync::Arc<dyn crate::server::AgentExecutor>,
    task_store: Option<std::sync::Arc<dyn crate::server::TaskStore>>,
    agent_card: Option<AgentCard>,
    push_notifications: bool,
    cors_enabled: bool,
}

#[cfg(feature = "server")]
impl ServerBuilder {
    /// Create a new server builder with the given agent executor.
    pub fn new(executor: std::sync::Arc<dyn crate::server::AgentExecutor>) -> Self {
        Self {
            executor,
            task_store: None,
            agent_card: None,
            push_notifications: false,
            cors_enabled: false,
        }
    }

    /// Set the task store implementation.
    pub fn with_task_store(mut self, store: std::sync::Arc<dyn crate::server::TaskStore>) -> Self {
        self.task_store = Some(store);
        self
    }

    /// Configure the agent card using a builder callback.
    pub fn with_agent_card<F>(mut self, f: F) -> Self
    where
        F: FnOnce(AgentCardBuilder) -> AgentCardBuilder,
    {
        let builder = AgentCardBuilder::new("A2A Agent", "An A2A-compatible agent", "1.0.0");
        self.agent_card = Some(f(builder).build());
        self
    }

    /// Set the agent card directly.
    pub fn with_agent_card_direct(mut self, card: AgentCard) -> Self {
        self.agent_card = Some(card);
        self
    }

    /// Enable or disable push notification support.
    pub fn with_push_notifications(mut self, enabled: bool) -> Self {
        self.push_notifications = enabled;
        self
    }

    /// Enable or disable CORS middleware.
    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.cors_enabled = enabled;
        self
    }

    /// Build the axum router.
    pub fn build(self) -> axum::Router {
        use crate::server::{a2a_router, DefaultRequestHandler, InMemoryTaskStore};
        use std::sync::Arc;

        let store = self
            .task_store
            .unwrap_or_else(|| Arc::new(InMemoryTaskStore::new()));
        let mut handler = DefaultRequestHandler::new(self.executor, store);
        if self.push_notifications {
            handler = handler.with_push_notifications();
        }
        let card = self.agent_card.unwrap_or_else(|| {
            AgentCardBuilder::new("A2A Agent", "An A2A-compatible agent", "1.0.0").build()
        });

        let mut router = a2a_router(Arc::new(handler), card);

        if self.cors_enabled {
            use tower_http::cors::CorsLayer;
            router = router.layer(CorsLayer::permissive());
        }

        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_card_builder_basic() {
        let card = AgentCardBuilder::new("Test Agent", "A test", "1.0.0")
            .with_url("http://localhost:8080/")
            .with_interface("http://localhost:8080/a2a", "JSONRPC")
            .build();

        assert_eq!(card.name, "Test Agent");
        assert_eq!(card.description, "A test");
        assert_eq!(card.url, "http://localhost:8080/");
        assert_eq!(card.additional_interfaces.len(), 1);
        assert!(crate::validation::validate_card(&card).valid());
    }

    #[test]
    fn agent_card_builder_with_capabilities_and_security() {
        let card = AgentCardBuilder::new("Test", "Test", "1.0.0")
            .with_streaming(true)
            .with_push_notifications(false)
            .with_security_scheme("bearer", SecurityScheme::http("bearer"))
            .build();

        assert!(card.supports_streaming());
        assert!(!card.supports_push_notifications());
        assert!(card.security_schemes.contains_key("bearer"));
        assert_eq!(card.security.len(), 1);
    }

    #[test]
    fn fully_described_card_has_no_findings() {
        let card = AgentCardBuilder::new("Docs", "Answers questions", "2.0.0")
            .with_url("https://agent.example.com/")
            .with_provider("Example Org", "https://example.com")
            .with_documentation_url("https://example.com/docs")
            .with_icon_url("https://example.com/icon.png")
            .with_input_modes(vec!["text/plain".into(), "application/json".into()])
            .with_output_modes(vec!["text/markdown".into()])
            .with_streaming(true)
            .with_skill_examples(
                "qa",
                "Q&A",
                "Answers questions about the docs",
                vec!["docs".into()],
                vec!["How do I install it?".into()],
            )
            .build();

        let report = crate::validation::validate_card(&card);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert_eq!(card.default_output_modes, vec!["text/markdown"]);
    }

    #[test]
    fn reference_card_matches_server() {
        let card = reference_card("localhost", 8000);
        assert_eq!(card.url, "http://localhost:8000/");
        assert!(card.supports_streaming());
        assert!(card.supports_push_notifications());
        assert_eq!(card.skills[0].id, "handler_assistant");
        assert_eq!(card.skills[0].tags, vec!["a2a", "handler", "help"]);
    }

    #[cfg(feature = "client")]
    #[test]
    fn client_builder_collects_config() {
        let builder = ClientBuilder::new("http://localhost:8080")
            .with_timeout(std::time::Duration::from_secs(30))
            .with_stream_buffer(0)
            .with_header("X-Trace", "1")
            .with_bearer_token("test-token");

        assert_eq!(builder.url, "http://localhost:8080");
        assert_eq!(builder.config.timeout, std::time::Duration::from_secs(30));
        assert_eq!(builder.config.stream_buffer, 1);
        assert_eq!(builder.config.headers.get("X-Trace").map(String::as_str), Some("1"));
        assert!(builder.auth.is_some());

        let builder = ClientBuilder::new("http://localhost:8080")
            .with_api_key("k")
            .with_card_path("/card.json");
        assert_eq!(
            builder.auth.map(|a| a.scheme),
            Some(crate::auth::AuthScheme::ApiKey)
        );
        assert_eq!(builder.card_path.as_deref(), Some("/card.json"));
    }
}
