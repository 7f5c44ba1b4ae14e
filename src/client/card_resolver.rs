//! Agent card discovery and resolution.
//!
//! Implements the well-known URI convention for discovering A2A agent cards.
//! An agent card describes the agent's capabilities, supported interfaces,
//! skills, and the endpoint URL for JSON-RPC communication.

use std::time::Duration;

use crate::error::{A2AError, A2AResult};
use crate::types::AgentCard;
use crate::validation::{self, ValidationReport, ValidationSource};

use super::transport::map_send_error;

/// Default path for the agent card well-known endpoint (A2A v0.3+).
pub const DEFAULT_AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

/// Previous well-known path (pre-v0.3 compat).
pub const PREV_AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Resolves [`AgentCard`]s from agent base URLs.
///
/// # Example
///
/// ```no_run
/// use a2a_handler::client::CardResolver;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = CardResolver::new();
/// let card = resolver.resolve("http://localhost:7420").await?;
/// println!("Agent: {} v{}", card.name, card.version);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CardResolver {
    client: reqwest::Client,
    /// Override the default agent card path. If `None`, tries
    /// `/.well-known/agent-card.json` then `/.well-known/agent.json`.
    card_path: Option<String>,
    timeout: Duration,
}

impl CardResolver {
    /// Create a new resolver with default settings.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create a new resolver with an existing `reqwest::Client`.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            card_path: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the agent card path.
    pub fn with_card_path(mut self, path: impl Into<String>) -> Self {
        self.card_path = Some(path.into());
        self
    }

    /// Per-fetch deadline. Defaults to 30 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch, decode and sanity-check the agent card for `base_url`.
    ///
    /// # Errors
    ///
    /// - [`A2AError::CardNotFound`] when every candidate path answers 404.
    /// - [`A2AError::CardParse`] on malformed JSON, or when `name`,
    ///   `protocolVersion` or `capabilities` is missing.
    /// - [`A2AError::Connection`], [`A2AError::Timeout`] or
    ///   [`A2AError::Http`] for other transport failures.
    pub async fn resolve(&self, base_url: &str) -> A2AResult<AgentCard> {
        let (url, value) = self.resolve_value(base_url).await?;

        let card: AgentCard = serde_json::from_value(value)
            .map_err(|e| {
                A2AError::CardParse(format!("failed to parse agent card from {url}: {e}"))
            })?;

        if card.name.trim().is_empty() {
            return Err(A2AError::CardParse(format!("agent card at {url} has no name")));
        }
        if card
            .protocol_version
            .as_deref()
            .map_or(true, |v| v.trim().is_empty())
        {
            return Err(A2AError::CardParse(format!(
                "agent card at {url} has no protocolVersion"
            )));
        }
        if card.capabilities.is_none() {
            return Err(A2AError::CardParse(format!(
                "agent card at {url} has no capabilities"
            )));
        }

        tracing::debug!(agent = %card.name, version = %card.version, "resolved agent card");
        Ok(card)
    }

    /// Fetch the raw card JSON, returning the URL it was found at.
    pub async fn resolve_value(&self, base_url: &str) -> A2AResult<(String, serde_json::Value)> {
        let base = base_url.trim_end_matches('/');

        if let Some(path) = self.card_path.as_deref() {
            // Custom path: no fallback.
            return self.fetch(base, path).await;
        }

        match self.fetch(base, DEFAULT_AGENT_CARD_PATH).await {
            Err(A2AError::CardNotFound { .. }) => {
                tracing::debug!(
                    "agent card not found at {}{}, trying fallback path {}",
                    base,
                    DEFAULT_AGENT_CARD_PATH,
                    PREV_AGENT_CARD_PATH,
                );
                self.fetch(base, PREV_AGENT_CARD_PATH).await
            }
            other => other,
        }
    }

    /// Fetch the card and validate it, folding every failure into the report.
    pub async fn validate_url(&self, base_url: &str) -> ValidationReport {
        match self.resolve_value(base_url).await {
            Ok((_, value)) => validation::validate_json(&value, base_url, ValidationSource::Url),
            Err(A2AError::Http { status, body }) => {
                let snippet: String = body.chars().take(200).collect();
                ValidationReport::failed(
                    base_url,
                    ValidationSource::Url,
                    "http",
                    format!("HTTP {status}: {snippet}"),
                )
            }
            Err(A2AError::CardNotFound { url }) => ValidationReport::failed(
                base_url,
                ValidationSource::Url,
                "http",
                format!("HTTP 404: no agent card at {url}"),
            ),
            Err(A2AError::CardParse(message)) => {
                ValidationReport::failed(base_url, ValidationSource::Url, "json", message)
            }
            Err(e) => ValidationReport::failed(
                base_url,
                ValidationSource::Url,
                "connection",
                e.to_string(),
            ),
        }
    }

    async fn fetch(&self, base: &str, path: &str) -> A2AResult<(String, serde_json::Value)> {
        let url = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };

        tracing::debug!("resolving agent card from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| map_send_error(e, "agent card fetch"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(A2AError::CardNotFound { url });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_send_error(e, "reading agent card"))?;

        let value = serde_json::from_slice(&bytes)
            .map_err(|e| A2AError::CardParse(format!("agent card at {url} is not JSON: {e}")))?;

        Ok((url, value))
    }

    /// Pick the JSON-RPC endpoint for a card.
    ///
    /// The card's `url`, else the first `JSONRPC` interface (supported, then
    /// additional), else `base_url` itself.
    pub fn endpoint_url(card: &AgentCard, base_url: &str) -> String {
        if !card.url.trim().is_empty() {
            return card.url.clone();
        }
        card.supported_interfaces
            .iter()
            .chain(card.additional_interfaces.iter())
            .find(|iface| iface.transport.eq_ignore_ascii_case("JSONRPC"))
            .map(|iface| iface.url.clone())
            .unwrap_or_else(|| base_url.to_string())
    }
}

impl Default for CardResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentInterface;

    #[test]
    fn endpoint_prefers_card_url() {
        let mut card = AgentCard {
            url: "http://agent/rpc".into(),
            ..Default::default()
        };
        assert_eq!(CardResolver::endpoint_url(&card, "http://agent"), "http://agent/rpc");

        card.url.clear();
        card.additional_interfaces.push(AgentInterface {
            url: "http://agent/grpc".into(),
            transport: "GRPC".into(),
        });
        assert_eq!(CardResolver::endpoint_url(&card, "http://agent"), "http://agent");

        card.additional_interfaces.push(AgentInterface {
            url: "http://agent/jsonrpc".into(),
            transport: "jsonrpc".into(),
        });
        assert_eq!(
            CardResolver::endpoint_url(&card, "http://agent"),
            "http://agent/jsonrpc"
        );
    }
}
