//! Chat pipeline orchestrator
//!
//! Two-pass protocol against the language-model oracle, modeled as typed
//! stages rather than string-sniffing control flow: a planning pass whose
//! output is parsed into a [`PlanningOutcome`], an optional constrained
//! query execution, and a summarization pass that turns rows back into
//! prose. The model is untrusted throughout; everything it emits is parsed,
//! validated and bounded before touching the registry.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::db::{
    query_spec::{self, QuerySpecError, RawQuerySpec},
    Registry, RegistryError, Row,
};
use crate::services::llm_client::{LanguageModel, LlmError};

/// Turns of prior history forwarded to the planner
const HISTORY_WINDOW: usize = 10;

/// Fixed schema description and protocol for the planning pass
const PLANNER_SYSTEM_PROMPT: &str = "\
You are a query planner for a vehicle registry. You may read exactly two tables:

  license_plates(plate_number, driver_name, driver_phone, vehicle_make, vehicle_model, vehicle_color, registered_at)
  detection_logs(plate_number, image_url, created_at)

Answer in exactly one of two shapes:

1. To run a query:
ACTION: QUERY
DATA: {\"table\": \"<table>\", \"select\": \"*\", \"filters\": [{\"col\": \"<column>\", \"op\": \"<eq|neq|gt|lt|gte|lte|like|ilike>\", \"val\": <value>}], \"limit\": <n>}

2. To answer directly without data:
ACTION: ANSWER
<your answer>

Filters combine with AND only. Keep limit at or below 100. \
Never write anything other than these two shapes.";

/// Instructions for the summarization pass
const SUMMARIZER_SYSTEM_PROMPT: &str = "\
You summarize vehicle registry query results for an end user. Answer the \
user's question in natural language using only the rows provided. Never \
mention tables, columns, queries, JSON, or how the data is stored. If the \
rows are empty, say that no matching records were found.";

/// Answer used when the summarizer oracle fails; the raw rows still go back
const SUMMARY_FALLBACK: &str =
    "I found matching records but could not put together a summary. The raw results are attached.";

/// Chat pipeline errors
#[derive(Debug, Error)]
pub enum ChatError {
    /// Planner oracle unreachable (transport class)
    #[error("Planner unavailable: {0}")]
    PlannerUnavailable(String),

    /// Planner oracle answered non-2xx or with an unreadable body
    #[error("Planner error {0}: {1}")]
    PlannerError(u16, String),

    /// Planner asked for a query the validator refuses
    #[error("Query rejected: {0}")]
    QueryRejected(#[from] QuerySpecError),

    #[error("Registry error: {0}")]
    Registry(RegistryError),
}

fn planner_err(e: LlmError) -> ChatError {
    match e {
        LlmError::Unavailable(msg) => ChatError::PlannerUnavailable(msg),
        LlmError::Api(status, msg) => ChatError::PlannerError(status, msg),
        LlmError::Parse(msg) => ChatError::PlannerError(502, msg),
    }
}

/// One inbound chat turn; request-scoped, never persisted
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub message: String,
    #[serde(default)]
    pub context_plate: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Prior conversation entry supplied by the caller
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// Parsed planner output
#[derive(Debug, Clone, PartialEq)]
pub enum PlanningOutcome {
    /// The planner wants a registry query executed
    Query(RawQuerySpec),
    /// The planner answered directly
    Answer(String),
}

/// Final chat result
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub answer: String,
    /// Raw rows, present only when a query was executed (for programmatic
    /// consumers)
    pub data: Option<Vec<Row>>,
}

/// Chat request orchestrator
pub struct ChatPipeline {
    llm: Arc<dyn LanguageModel>,
    registry: Arc<dyn Registry>,
}

impl ChatPipeline {
    pub fn new(llm: Arc<dyn LanguageModel>, registry: Arc<dyn Registry>) -> Self {
        Self { llm, registry }
    }

    /// Run one chat turn through planning and, when planned, execution and
    /// summarization.
    pub async fn run(&self, turn: &ChatTurn) -> Result<ChatOutcome, ChatError> {
        let user_prompt = build_planning_prompt(turn);
        let planner_response = self
            .llm
            .complete(PLANNER_SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(planner_err)?;

        match parse_planner_response(&planner_response) {
            PlanningOutcome::Answer(text) => {
                tracing::debug!("Planner answered directly");
                Ok(ChatOutcome {
                    answer: text,
                    data: None,
                })
            }
            PlanningOutcome::Query(raw) => {
                let spec = query_spec::validate(raw)?;
                tracing::info!(
                    table = %spec.table,
                    filters = spec.filters.len(),
                    limit = spec.limit,
                    "Executing planned query"
                );
                let rows = self
                    .registry
                    .select(&spec)
                    .await
                    .map_err(ChatError::Registry)?;

                let answer = self.summarize(&turn.message, &rows).await;
                Ok(ChatOutcome {
                    answer,
                    data: Some(rows),
                })
            }
        }
    }

    /// Summarization pass. Oracle failure degrades to a fallback string
    /// rather than failing the turn.
    async fn summarize(&self, question: &str, rows: &[Row]) -> String {
        let rows_json = serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string());
        let user_prompt = format!("Question: {}\n\nRows:\n{}", question, rows_json);

        match self.llm.complete(SUMMARIZER_SYSTEM_PROMPT, &user_prompt).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Summarizer failed, returning fallback answer");
                SUMMARY_FALLBACK.to_string()
            }
        }
    }
}

/// Assemble the planning-pass user prompt from the turn.
fn build_planning_prompt(turn: &ChatTurn) -> String {
    let mut prompt = String::new();

    if let Some(plate) = &turn.context_plate {
        prompt.push_str(&format!("Current plate in context: {}\n", plate));
    }

    if !turn.history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        let start = turn.history.len().saturating_sub(HISTORY_WINDOW);
        for entry in &turn.history[start..] {
            prompt.push_str(&format!("{}: {}\n", entry.role, entry.content));
        }
    }

    prompt.push_str(&format!("User question: {}", turn.message));
    prompt
}

/// Parse the planner's raw response into a typed outcome.
///
/// `ACTION: ANSWER` wins outright. Otherwise the response is scanned for a
/// brace-balanced JSON object; if one parses as a query description it is
/// executed, and any parse failure falls back to treating the response as
/// a direct answer with the action markers stripped.
pub fn parse_planner_response(response: &str) -> PlanningOutcome {
    if response.contains("ACTION: ANSWER") {
        return PlanningOutcome::Answer(strip_action_markers(response));
    }

    if let Some(candidate) = extract_json_object(response) {
        if let Ok(raw) = serde_json::from_str::<RawQuerySpec>(candidate) {
            return PlanningOutcome::Query(raw);
        }
        tracing::debug!("Planner JSON did not parse as a query spec, treating as answer");
    }

    PlanningOutcome::Answer(strip_action_markers(response))
}

/// Extract the first brace-balanced JSON object, string-aware.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_action_markers(response: &str) -> String {
    response
        .replace("ACTION: QUERY", "")
        .replace("ACTION: ANSWER", "")
        .replace("DATA:", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_query_action_with_json() {
        let response = r#"ACTION: QUERY
DATA: {"table":"license_plates","filters":[{"col":"vehicle_make","op":"ilike","val":"Ford"}]}"#;

        match parse_planner_response(response) {
            PlanningOutcome::Query(raw) => {
                assert_eq!(raw.table, "license_plates");
                assert_eq!(raw.filters.len(), 1);
                assert_eq!(raw.filters[0].col, "vehicle_make");
                assert_eq!(raw.filters[0].op, "ilike");
                assert_eq!(raw.filters[0].val, Some(json!("Ford")));
                assert!(raw.limit.is_none());
            }
            other => panic!("expected query outcome, got {:?}", other),
        }
    }

    #[test]
    fn answer_action_wins_even_with_braces_in_text() {
        let response = "ACTION: ANSWER\nBraces like {this} are just prose.";
        assert_eq!(
            parse_planner_response(response),
            PlanningOutcome::Answer("Braces like {this} are just prose.".to_string())
        );
    }

    #[test]
    fn malformed_json_falls_back_to_answer_with_markers_stripped() {
        let response = "ACTION: QUERY\nDATA: {\"table\": \"license_plates\", nope}";
        match parse_planner_response(response) {
            PlanningOutcome::Answer(text) => {
                assert!(!text.contains("ACTION"));
                assert!(!text.contains("DATA:"));
            }
            other => panic!("expected answer fallback, got {:?}", other),
        }
    }

    #[test]
    fn extracts_nested_objects_and_braces_in_strings() {
        let text = r#"noise {"a": {"b": "}"}, "c": 1} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"a": {"b": "}"}, "c": 1}"#)
        );
    }

    #[test]
    fn no_json_object_means_direct_answer() {
        let response = "The registry holds Tunisian plates.";
        assert_eq!(
            parse_planner_response(response),
            PlanningOutcome::Answer(response.to_string())
        );
    }

    #[test]
    fn planning_prompt_includes_context_and_history() {
        let turn = ChatTurn {
            message: "Who owns it?".to_string(),
            context_plate: Some("125تونس8365".to_string()),
            history: vec![HistoryEntry {
                role: "user".to_string(),
                content: "I just scanned a plate".to_string(),
            }],
        };
        let prompt = build_planning_prompt(&turn);
        assert!(prompt.contains("125تونس8365"));
        assert!(prompt.contains("I just scanned a plate"));
        assert!(prompt.ends_with("User question: Who owns it?"));
    }
}
