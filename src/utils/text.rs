//! Readable text out of parts, tasks and outcomes.

use serde_json::Value;

use crate::types::{FileContent, Part, Role, Task};

/// Text of every text part, in order.
///
/// ```
/// use a2a_handler::types::Part;
/// use a2a_handler::utils::text_parts;
///
/// let parts = vec![Part::text("Hello"), Part::data(serde_json::json!({})), Part::text("World")];
/// assert_eq!(text_parts(&parts), vec!["Hello", "World"]);
/// ```
pub fn text_parts(parts: &[Part]) -> Vec<&str> {
    parts
        .iter()
        .filter_map(|part| match part {
            Part::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Payload of every data part, in order.
pub fn data_parts(parts: &[Part]) -> Vec<&Value> {
    parts
        .iter()
        .filter_map(|part| match part {
            Part::Data { data, .. } => Some(data),
            _ => None,
        })
        .collect()
}

/// Content of every file part, in order.
pub fn file_parts(parts: &[Part]) -> Vec<&FileContent> {
    parts
        .iter()
        .filter_map(|part| match part {
            Part::File { file, .. } => Some(file),
            _ => None,
        })
        .collect()
}

/// Non-empty text parts joined by `delimiter`.
pub fn join_text(parts: &[Part], delimiter: &str) -> String {
    text_parts(parts)
        .into_iter()
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(delimiter)
}

/// What the agent has said about a task: artifact text, then agent messages
/// from the history, then the current status message. Sections are
/// separated by newlines; empty ones are skipped.
pub fn task_text(task: &Task) -> String {
    let artifacts = task
        .artifacts
        .iter()
        .flatten()
        .map(|artifact| join_text(&artifact.parts, "\n"));
    let history = task
        .history
        .iter()
        .flatten()
        .filter(|message| message.role == Role::Agent)
        .map(|message| join_text(&message.parts, "\n"));
    let status = task
        .status
        .message
        .iter()
        .map(|message| join_text(&message.parts, "\n"));

    artifacts
        .chain(history)
        .chain(status)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(feature = "client")]
/// Text carried by a single outcome.
pub fn outcome_text(outcome: &crate::client::MessageOutcome) -> String {
    use crate::client::MessageOutcome;

    match outcome {
        MessageOutcome::Message(message) => join_text(&message.parts, "\n"),
        MessageOutcome::Task(task) => task_text(task),
        MessageOutcome::Status { status, .. } => status
            .message
            .as_ref()
            .map(|message| join_text(&message.parts, "\n"))
            .unwrap_or_default(),
        MessageOutcome::Artifact { artifact, .. } => join_text(&artifact.parts, "\n"),
        MessageOutcome::TaskChanged { update, .. } => outcome_text(update),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Artifact, Message, TaskState, TaskStatus};
    use serde_json::json;

    #[test]
    fn joins_skip_empty_text() {
        let parts = vec![Part::text("a"), Part::text(""), Part::data(json!(1)), Part::text("b")];
        assert_eq!(join_text(&parts, "\n"), "a\nb");
        assert_eq!(data_parts(&parts), vec![&json!(1)]);
        assert!(file_parts(&parts).is_empty());
    }

    #[test]
    fn task_text_orders_sections() {
        let mut status = TaskStatus::now(TaskState::Completed);
        status.message = Some(Message::agent_text("done"));
        let task = Task {
            id: "t".into(),
            context_id: "c".into(),
            kind: "task".into(),
            status,
            artifacts: Some(vec![Artifact {
                artifact_id: "a".into(),
                name: None,
                description: None,
                parts: vec![Part::text("result")],
                metadata: None,
            }]),
            history: Some(vec![
                Message::user(vec![Part::text("question")]),
                Message::agent_text("thinking"),
            ]),
            metadata: None,
        };
        assert_eq!(task_text(&task), "result\nthinking\ndone");
    }
}
