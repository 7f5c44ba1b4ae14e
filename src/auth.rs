//! Authentication material attached to outgoing requests.
//!
//! Credentials are opaque: the crate turns them into HTTP headers and never
//! persists them. Whether they fit what an agent advertises is only ever a
//! warning, since cards frequently under-declare their security.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::types::{AgentCard, SecuritySchemeKind};

const AUTHORIZATION: &str = "Authorization";

/// Header used for API keys when neither the caller nor the card names one.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// How a credential is presented to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `<header>: <key>`, header defaulting to [`DEFAULT_API_KEY_HEADER`].
    ApiKey,
    /// `Authorization: Basic base64(user:pass)`
    Basic,
}

/// Credentials for a single agent.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCredentials {
    /// Presentation scheme.
    pub scheme: AuthScheme,
    /// Token, key, or `user:pass` for [`AuthScheme::Basic`].
    pub value: String,
    /// API key header override.
    pub header_name: Option<String>,
}

// Keep secrets out of logs.
impl std::fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("scheme", &self.scheme)
            .field("value", &"<redacted>")
            .field("header_name", &self.header_name)
            .finish()
    }
}

impl AuthCredentials {
    /// Bearer token credentials.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::Bearer,
            value: token.into(),
            header_name: None,
        }
    }

    /// API key credentials; the header is taken from the card or defaulted.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::ApiKey,
            value: key.into(),
            header_name: None,
        }
    }

    /// API key credentials sent in a specific header.
    pub fn api_key_in(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::ApiKey,
            value: key.into(),
            header_name: Some(header.into()),
        }
    }

    /// HTTP Basic credentials.
    pub fn basic(user: &str, password: &str) -> Self {
        Self {
            scheme: AuthScheme::Basic,
            value: format!("{user}:{password}"),
            header_name: None,
        }
    }

    /// The header these credentials are sent in.
    pub fn header_name(&self) -> &str {
        match self.scheme {
            AuthScheme::Bearer | AuthScheme::Basic => AUTHORIZATION,
            AuthScheme::ApiKey => self
                .header_name
                .as_deref()
                .unwrap_or(DEFAULT_API_KEY_HEADER),
        }
    }

    /// The header value, as sent on the wire.
    pub fn header_value(&self) -> String {
        match self.scheme {
            AuthScheme::Bearer => format!("Bearer {}", self.value),
            AuthScheme::Basic => format!("Basic {}", STANDARD.encode(self.value.as_bytes())),
            AuthScheme::ApiKey => self.value.clone(),
        }
    }

    /// The `(name, value)` header pair to attach to requests.
    pub fn to_header(&self) -> (String, String) {
        (self.header_name().to_string(), self.header_value())
    }

    /// Fill in the API key header from the card's `apiKey` scheme when the
    /// caller did not choose one.
    pub fn for_card(mut self, card: &AgentCard) -> Self {
        if self.scheme == AuthScheme::ApiKey && self.header_name.is_none() {
            self.header_name = card
                .security_schemes
                .values()
                .filter(|s| s.kind() == Some(SecuritySchemeKind::ApiKey))
                .filter(|s| s.location.as_deref().map_or(true, |l| l == "header"))
                .find_map(|s| s.name.clone());
        }
        self
    }

    /// Compare these credentials with the card's security schemes.
    ///
    /// Returns one warning per mismatch, also logged. Never fails: the
    /// request is still sent with the credentials as given.
    pub fn check_against_card(&self, card: &AgentCard) -> Vec<String> {
        let mut warnings = Vec::new();

        if card.security_schemes.is_empty() {
            warnings.push(format!(
                "agent '{}' declares no security schemes; sending {:?} credentials anyway",
                card.name, self.scheme
            ));
        } else {
            let matched = card.security_schemes.values().any(|s| {
                match (self.scheme, s.kind()) {
                    (AuthScheme::ApiKey, Some(SecuritySchemeKind::ApiKey)) => true,
                    (AuthScheme::Bearer, Some(SecuritySchemeKind::OAuth2))
                    | (AuthScheme::Bearer, Some(SecuritySchemeKind::OpenIdConnect)) => true,
                    (AuthScheme::Bearer, Some(SecuritySchemeKind::Http)) => s
                        .scheme
                        .as_deref()
                        .map_or(false, |v| v.eq_ignore_ascii_case("bearer")),
                    (AuthScheme::Basic, Some(SecuritySchemeKind::Http)) => s
                        .scheme
                        .as_deref()
                        .map_or(false, |v| v.eq_ignore_ascii_case("basic")),
                    _ => false,
                }
            });
            if !matched {
                let advertised: Vec<&str> = card
                    .security_schemes
                    .values()
                    .map(|s| s.scheme_type.as_str())
                    .collect();
                warnings.push(format!(
                    "{:?} credentials do not match any advertised scheme ({})",
                    self.scheme,
                    advertised.join(", ")
                ));
            }
        }

        if self.scheme == AuthScheme::ApiKey {
            if let Some(expected) = card
                .security_schemes
                .values()
                .filter(|s| s.kind() == Some(SecuritySchemeKind::ApiKey))
                .find_map(|s| s.name.as_deref())
            {
                if !expected.eq_ignore_ascii_case(self.header_name()) {
                    warnings.push(format!(
                        "card expects API key in '{}', sending it in '{}'",
                        expected,
                        self.header_name()
                    ));
                }
            }
        }

        for warning in &warnings {
            tracing::warn!(agent = %card.name, "{}", warning);
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecurityScheme;

    fn card_with(schemes: Vec<(&str, SecurityScheme)>) -> AgentCard {
        AgentCard {
            name: "secured".into(),
            security_schemes: schemes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn bearer_header() {
        let (name, value) = AuthCredentials::bearer("tok").to_header();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Bearer tok");
    }

    #[test]
    fn api_key_default_and_custom_header() {
        let (name, value) = AuthCredentials::api_key("k1").to_header();
        assert_eq!((name.as_str(), value.as_str()), ("X-API-Key", "k1"));

        let (name, _) = AuthCredentials::api_key_in("X-Custom-Key", "k2").to_header();
        assert_eq!(name, "X-Custom-Key");
    }

    #[test]
    fn basic_is_base64_encoded() {
        let (name, value) = AuthCredentials::basic("aladdin", "opensesame").to_header();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Basic YWxhZGRpbjpvcGVuc2VzYW1l");
    }

    #[test]
    fn debug_redacts_value() {
        let printed = format!("{:?}", AuthCredentials::bearer("super-secret"));
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn card_supplies_api_key_header() {
        let card = card_with(vec![("key", SecurityScheme::api_key_header("X-Agent-Key"))]);
        let creds = AuthCredentials::api_key("k").for_card(&card);
        assert_eq!(creds.header_name(), "X-Agent-Key");
        assert!(creds.check_against_card(&card).is_empty());
    }

    #[test]
    fn mismatch_is_a_warning() {
        let card = card_with(vec![("basic", SecurityScheme::http("basic"))]);
        let warnings = AuthCredentials::bearer("tok").check_against_card(&card);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("http"));

        let bearer_card = card_with(vec![("jwt", SecurityScheme::http("Bearer"))]);
        assert!(AuthCredentials::bearer("tok")
            .check_against_card(&bearer_card)
            .is_empty());
    }

    #[test]
    fn no_schemes_on_card_warns() {
        let warnings = AuthCredentials::api_key("k").check_against_card(&AgentCard::default());
        assert_eq!(warnings.len(), 1);
    }
}
