//! Agent card validation.
//!
//! Validation never fails: every problem, including an unreadable file or a
//! body that is not JSON, becomes a [`Finding`] in the returned
//! [`ValidationReport`]. Errors make a card unusable; warnings are advice.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::types::{AgentCard, SecuritySchemeKind};

/// Protocol major versions this crate can talk to.
pub const SUPPORTED_PROTOCOL_MAJORS: &[u64] = &[0, 1];

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The card violates the protocol.
    Error,
    /// The card is usable but incomplete.
    Warning,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// JSON path of the offending field, e.g. `skills[1].id`.
    pub field: String,
    /// Error or warning.
    pub severity: Severity,
    /// Human-readable explanation.
    pub message: String,
}

impl Finding {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "[{}] {}: {}", level, self.field, self.message)
    }
}

/// Where a validated card came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSource {
    /// Fetched from an agent's well-known URL.
    Url,
    /// Read from a local file.
    File,
    /// Passed in directly.
    Inline,
}

/// Outcome of validating one agent card.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// URL, file path or `inline`.
    pub source: String,
    /// Kind of `source`.
    pub source_kind: ValidationSource,
    /// Findings in the order they were produced.
    pub findings: Vec<Finding>,
    /// The decoded card, when decoding got that far.
    #[serde(skip)]
    pub card: Option<AgentCard>,
}

impl ValidationReport {
    /// A report holding a single error, used when the card never decoded.
    pub(crate) fn failed(
        source: impl Into<String>,
        source_kind: ValidationSource,
        field: &str,
        message: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let message = message.into();
        tracing::warn!(source = %source, field, "agent card validation failed: {}", message);
        Self {
            source,
            source_kind,
            findings: vec![Finding::error(field, message)],
            card: None,
        }
    }

    /// True when there are no error findings.
    pub fn valid(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Error findings.
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    /// Warning findings.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    /// The card's name, or `"Unknown"` when it did not decode.
    pub fn agent_name(&self) -> &str {
        match &self.card {
            Some(card) if !card.name.is_empty() => &card.name,
            _ => "Unknown",
        }
    }
}

/// Validate a decoded card.
pub fn validate_card(card: &AgentCard) -> ValidationReport {
    let mut findings = Vec::new();

    check_required(card, &mut findings);
    check_protocol_version(card, &mut findings);
    check_streaming_modes(card, &mut findings);
    check_security_schemes(card, &mut findings);
    check_skill_ids(card, &mut findings);
    check_best_practices(card, &mut findings);

    let report = ValidationReport {
        source: "inline".to_string(),
        source_kind: ValidationSource::Inline,
        findings,
        card: Some(card.clone()),
    };
    tracing::debug!(
        agent = %card.name,
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "validated agent card"
    );
    report
}

/// Validate raw card JSON. Decoding failures become a single error finding.
pub fn validate_json(
    value: &serde_json::Value,
    source: impl Into<String>,
    source_kind: ValidationSource,
) -> ValidationReport {
    let source = source.into();
    if !value.is_object() {
        return ValidationReport::failed(
            source,
            source_kind,
            "root",
            "agent card must be a JSON object",
        );
    }
    match serde_json::from_value::<AgentCard>(value.clone()) {
        Ok(card) => {
            let mut report = validate_card(&card);
            report.source = source;
            report.source_kind = source_kind;
            report
        }
        Err(e) => {
            ValidationReport::failed(source, source_kind, "json", format!("invalid agent card: {e}"))
        }
    }
}

/// Validate a card stored in a local JSON file.
pub fn validate_file(path: impl AsRef<Path>) -> ValidationReport {
    let path = path.as_ref();
    let source = path.display().to_string();

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return ValidationReport::failed(
                source,
                ValidationSource::File,
                "file",
                "file not found",
            );
        }
        Err(e) => {
            return ValidationReport::failed(
                source,
                ValidationSource::File,
                "file",
                format!("failed to read file: {e}"),
            );
        }
    };

    match serde_json::from_str::<serde_json::Value>(&contents) {
        Ok(value) => validate_json(&value, source, ValidationSource::File),
        Err(e) => ValidationReport::failed(
            source,
            ValidationSource::File,
            "json",
            format!("invalid JSON: {e}"),
        ),
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_required(card: &AgentCard, findings: &mut Vec<Finding>) {
    let required_strings = [
        ("name", card.name.as_str()),
        ("description", card.description.as_str()),
        ("url", card.url.as_str()),
        ("version", card.version.as_str()),
    ];
    for (field, value) in required_strings {
        if value.trim().is_empty() {
            findings.push(Finding::error(field, "required field is missing or empty"));
        }
    }

    if card
        .protocol_version
        .as_deref()
        .map_or(true, |v| v.trim().is_empty())
    {
        findings.push(Finding::error(
            "protocolVersion",
            "required field is missing or empty",
        ));
    }
    if card.capabilities.is_none() {
        findings.push(Finding::error("capabilities", "required field is missing"));
    }
    if card.default_input_modes.is_empty() {
        findings.push(Finding::error(
            "defaultInputModes",
            "at least one input mode is required",
        ));
    }
    if card.default_output_modes.is_empty() {
        findings.push(Finding::error(
            "defaultOutputModes",
            "at least one output mode is required",
        ));
    }
}

fn check_protocol_version(card: &AgentCard, findings: &mut Vec<Finding>) {
    let Some(version) = card.protocol_version.as_deref().map(str::trim) else {
        return;
    };
    if version.is_empty() {
        return;
    }
    let major = version
        .split('.')
        .next()
        .and_then(|m| m.parse::<u64>().ok());
    match major {
        Some(major) if SUPPORTED_PROTOCOL_MAJORS.contains(&major) => {}
        Some(major) => findings.push(Finding::error(
            "protocolVersion",
            format!("unsupported protocol major version {major} in '{version}'"),
        )),
        None => findings.push(Finding::error(
            "protocolVersion",
            format!("'{version}' is not a version number"),
        )),
    }
}

fn check_streaming_modes(card: &AgentCard, findings: &mut Vec<Finding>) {
    if !card.supports_streaming() {
        return;
    }
    let has_output = if card.skills.is_empty() {
        !card.default_output_modes.is_empty()
    } else {
        card.skills.iter().any(|skill| match &skill.output_modes {
            Some(modes) if !modes.is_empty() => true,
            _ => !card.default_output_modes.is_empty(),
        })
    };
    if !has_output {
        findings.push(Finding::warning(
            "capabilities.streaming",
            "streaming is advertised but no skill declares an output mode",
        ));
    }
}

fn check_security_schemes(card: &AgentCard, findings: &mut Vec<Finding>) {
    for (name, scheme) in &card.security_schemes {
        let field = format!("securitySchemes.{name}");
        match scheme.kind() {
            None if scheme.scheme_type.is_empty() => {
                findings.push(Finding::error(format!("{field}.type"), "scheme type is missing"));
            }
            None => findings.push(Finding::error(
                format!("{field}.type"),
                format!("unrecognized scheme type '{}'", scheme.scheme_type),
            )),
            Some(SecuritySchemeKind::ApiKey) => {
                if scheme.name.as_deref().map_or(true, str::is_empty) {
                    findings.push(Finding::warning(
                        format!("{field}.name"),
                        "apiKey scheme does not name its parameter",
                    ));
                }
            }
            Some(_) => {}
        }
    }
}

fn check_skill_ids(card: &AgentCard, findings: &mut Vec<Finding>) {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for skill in &card.skills {
        *seen.entry(skill.id.as_str()).or_default() += 1;
    }
    // Report each duplicated id once, at its first position.
    for (i, skill) in card.skills.iter().enumerate() {
        let count = seen.get(skill.id.as_str()).copied().unwrap_or(0);
        if count > 1 {
            findings.push(Finding::error(
                format!("skills[{i}].id"),
                format!("duplicate skill id '{}' ({} occurrences)", skill.id, count),
            ));
            seen.remove(skill.id.as_str());
        }
    }
}

fn check_best_practices(card: &AgentCard, findings: &mut Vec<Finding>) {
    if card.provider.is_none() {
        findings.push(Finding::warning(
            "provider",
            "agent card should specify a provider for better discoverability",
        ));
    }
    if card.documentation_url.is_none() {
        findings.push(Finding::warning(
            "documentationUrl",
            "agent card should include a documentation URL",
        ));
    }
    if card.icon_url.is_none() {
        findings.push(Finding::warning(
            "iconUrl",
            "agent card should include an icon URL for UI display",
        ));
    }
    for (i, skill) in card.skills.iter().enumerate() {
        if skill.description.trim().is_empty() {
            findings.push(Finding::warning(
                format!("skills[{i}].description"),
                format!("skill '{}' should have a description", skill.name),
            ));
        }
        if skill.examples.as_ref().map_or(true, Vec::is_empty) {
            findings.push(Finding::warning(
                format!("skills[{i}].examples"),
                format!("skill '{}' should include example prompts", skill.name),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentCapabilities, AgentProvider, AgentSkill, SecurityScheme};
    use serde_json::json;

    fn complete_card() -> AgentCard {
        AgentCard {
            name: "Echo".into(),
            description: "Echoes".into(),
            url: "http://localhost:7420/".into(),
            version: "1.0.0".into(),
            protocol_version: Some("0.3.0".into()),
            provider: Some(AgentProvider {
                organization: "Acme".into(),
                url: "https://acme.example".into(),
            }),
            documentation_url: Some("https://acme.example/docs".into()),
            icon_url: Some("https://acme.example/icon.png".into()),
            capabilities: Some(AgentCapabilities {
                streaming: Some(true),
                ..Default::default()
            }),
            default_input_modes: vec!["text/plain".into()],
            default_output_modes: vec!["text/plain".into()],
            skills: vec![AgentSkill {
                id: "echo".into(),
                name: "Echo".into(),
                description: "Echo input".into(),
                examples: Some(vec!["hello".into()]),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn complete_card_is_clean() {
        let report = validate_card(&complete_card());
        assert!(report.valid());
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }

    #[test]
    fn missing_protocol_version_is_one_error() {
        let mut card = complete_card();
        card.protocol_version = None;
        let report = validate_card(&card);
        assert!(!report.valid());
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "protocolVersion");
    }

    #[test]
    fn unsupported_major_version() {
        let mut card = complete_card();
        card.protocol_version = Some("2.0".into());
        let report = validate_card(&card);
        assert_eq!(report.errors().count(), 1);

        card.protocol_version = Some("1.0".into());
        assert!(validate_card(&card).valid());

        card.protocol_version = Some("latest".into());
        assert!(!validate_card(&card).valid());
    }

    #[test]
    fn duplicate_skill_ids() {
        let mut card = complete_card();
        let skill = card.skills[0].clone();
        card.skills.push(skill.clone());
        card.skills.push(skill);
        let report = validate_card(&card);
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "skills[0].id");
        assert!(errors[0].message.contains("3 occurrences"));
    }

    #[test]
    fn security_scheme_checks() {
        let mut card = complete_card();
        card.security_schemes
            .insert("ok".into(), SecurityScheme::http("bearer"));
        card.security_schemes.insert(
            "nameless".into(),
            SecurityScheme {
                scheme_type: "apiKey".into(),
                ..Default::default()
            },
        );
        card.security_schemes.insert(
            "weird".into(),
            SecurityScheme {
                scheme_type: "smoke-signal".into(),
                ..Default::default()
            },
        );
        let report = validate_card(&card);
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "securitySchemes.weird.type");
        assert!(report
            .warnings()
            .any(|w| w.field == "securitySchemes.nameless.name"));
    }

    #[test]
    fn streaming_without_output_modes_warns() {
        let mut card = complete_card();
        card.default_output_modes.clear();
        let report = validate_card(&card);
        assert!(report
            .warnings()
            .any(|w| w.field == "capabilities.streaming"));
        assert!(report.errors().any(|e| e.field == "defaultOutputModes"));
    }

    #[test]
    fn best_practice_warnings() {
        let mut card = complete_card();
        card.provider = None;
        card.icon_url = None;
        card.skills[0].examples = None;
        let report = validate_card(&card);
        assert!(report.valid());
        let fields: Vec<_> = report.warnings().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["provider", "iconUrl", "skills[0].examples"]);
    }

    #[test]
    fn json_that_is_not_a_card() {
        let report = validate_json(&json!([1, 2]), "inline", ValidationSource::Inline);
        assert!(!report.valid());
        assert_eq!(report.agent_name(), "Unknown");

        let report = validate_json(&json!({"name": 5}), "inline", ValidationSource::Inline);
        assert!(!report.valid());
        assert_eq!(report.findings[0].field, "json");
    }

    #[test]
    fn empty_object_lists_every_required_field() {
        let report = validate_json(&json!({}), "inline", ValidationSource::Inline);
        let fields: Vec<_> = report.errors().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "name",
                "description",
                "url",
                "version",
                "protocolVersion",
                "capabilities",
                "defaultInputModes",
                "defaultOutputModes"
            ]
        );
    }

    #[test]
    fn file_validation() {
        let dir = tempfile::tempdir().unwrap();
        let missing = validate_file(dir.path().join("nope.json"));
        assert_eq!(missing.findings[0].field, "file");

        let path = dir.path().join("card.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(validate_file(&path).findings[0].field, "json");

        std::fs::write(&path, serde_json::to_string(&complete_card()).unwrap()).unwrap();
        let report = validate_file(&path);
        assert!(report.valid());
        assert_eq!(report.source_kind, ValidationSource::File);
        assert_eq!(report.agent_name(), "Echo");
    }
}
