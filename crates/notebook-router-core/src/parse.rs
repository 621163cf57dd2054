//! Best-effort readers for the notebook engine's output.
//!
//! The engine prints either a JSON document or human-oriented text, and the
//! shape differs between versions. Nothing here fails: every reader returns
//! the most useful value it can recover and leaves logging to the caller.
//!
//! # Answer Output
//!
//! ```text
//! raw stdout ──▶ RawOutput::Structured(map) ──┐
//!            └─▶ RawOutput::PlainText(text) ──┴──▶ QueryResult
//! ```
//!
//! Plain text is cleaned of ANSI colour codes, and the trailing
//! `Conversation ID: …` / `Use --conversation-id for follow-up questions.`
//! lines are lifted out of the answer into [`QueryResult::conversation_id`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::models::{NotebookSummary, QueryResult, NO_ANSWER_PLACEHOLDER, UNTITLED_NOTEBOOK};

static ANSI_SGR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
static CONVERSATION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Conversation ID:\s*([a-f0-9-]+)").unwrap());
static CONVERSATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)Conversation ID:.*$").unwrap());
static FOLLOW_UP_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)Use --conversation-id for follow-up questions.*$").unwrap());
static TASK_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Task ID:\s*([a-f0-9-]+)").unwrap());
static LIST_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^ID\s+Title").unwrap());
static COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Marker the engine prints next to finished research tasks.
pub const COMPLETED_MARKER: &str = "completed";

/// Returned by [`parse_source_id`] when the engine printed no id.
pub const SOURCE_ADDED: &str = "added_successfully";

/// Engine output after the structured-or-text decision.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    /// The output was a JSON object.
    Structured(Map<String, Value>),
    /// Anything else, kept verbatim.
    PlainText(String),
}

impl RawOutput {
    /// Decide how to read `raw`.
    pub fn detect(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => RawOutput::Structured(map),
            _ => RawOutput::PlainText(raw.to_string()),
        }
    }
}

/// Remove ANSI SGR (colour/style) escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_SGR.replace_all(text, "").into_owned()
}

/// Normalize the output of a question/answer call.
///
/// `notebook_used` is left empty; the caller knows which notebook it asked.
pub fn parse_answer(raw: &str) -> QueryResult {
    let mut result = match RawOutput::detect(raw) {
        RawOutput::Structured(map) => from_structured(&map, raw),
        RawOutput::PlainText(text) => from_plain_text(&text),
    };

    if result.answer.trim().is_empty() {
        result.answer = NO_ANSWER_PLACEHOLDER.to_string();
    }
    result
}

fn from_structured(map: &Map<String, Value>, raw: &str) -> QueryResult {
    let answer = ["answer", "response", "text"]
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| raw.trim().to_string());

    let citations = map
        .get("citations")
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::to_string(v).ok());

    let conversation_id = ["conversation_id", "conversationId"]
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string);

    QueryResult {
        answer,
        citations,
        conversation_id,
        notebook_used: None,
    }
}

fn from_plain_text(text: &str) -> QueryResult {
    let mut clean = strip_ansi(text).trim().to_string();

    let conversation_id = CONVERSATION_ID
        .captures(&clean)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    if conversation_id.is_some() {
        let without_marker = CONVERSATION_MARKER.replace(&clean, "");
        clean = FOLLOW_UP_HINT
            .replace(&without_marker, "")
            .trim()
            .to_string();
    }

    QueryResult {
        answer: clean,
        citations: None,
        conversation_id,
        notebook_used: None,
    }
}

/// Extract the task id printed by `research start`.
pub fn parse_task_id(raw: &str) -> Option<String> {
    TASK_ID
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether a `research status` listing reports `task_id` as finished.
pub fn research_completed(raw: &str, task_id: &str) -> bool {
    raw.contains(task_id) && raw.contains(COMPLETED_MARKER)
}

/// Parse the tabular output of `notebook list`.
///
/// Columns are separated by two or more spaces. The first column is the id,
/// the last the update time, the one before it the source count, and
/// whatever lies between is the title.
pub fn parse_notebook_list(raw: &str) -> Vec<NotebookSummary> {
    let clean = strip_ansi(raw);
    let mut notebooks = Vec::new();

    for line in clean.lines().filter(|l| !l.trim().is_empty()) {
        let line = line.trim();
        if LIST_HEADER.is_match(line) {
            continue;
        }

        let tokens: Vec<&str> = COLUMN_GAP.split(line).collect();
        if tokens.len() < 2 {
            continue;
        }

        let last = tokens.len() - 1;
        let source_count = if tokens.len() >= 3 {
            leading_number(tokens[last - 1])
        } else {
            0
        };
        let middle = if tokens.len() >= 3 {
            &tokens[1..last - 1]
        } else {
            &tokens[1..1]
        };
        let title = middle.join(" ");

        notebooks.push(NotebookSummary {
            id: tokens[0].to_string(),
            title: if title.is_empty() {
                UNTITLED_NOTEBOOK.to_string()
            } else {
                title
            },
            source_count,
            updated: tokens[last].to_string(),
        });
    }

    notebooks
}

fn leading_number(token: &str) -> u32 {
    let digits: String = token
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Read the id of a freshly added source, falling back to [`SOURCE_ADDED`].
pub fn parse_source_id(raw: &str) -> String {
    match RawOutput::detect(raw) {
        RawOutput::Structured(map) => ["sourceId", "id"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "unknown".to_string()),
        RawOutput::PlainText(_) => SOURCE_ADDED.to_string(),
    }
}

/// Read a `source list` JSON payload.
///
/// Accepts a bare array or an object with a `sources` array. Returns `None`
/// when the output is not JSON at all, and an empty list for JSON of any
/// other shape.
pub fn parse_source_list(raw: &str) -> Option<Vec<Value>> {
    let value: Value = serde_json::from_str(raw).ok()?;
    Some(match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("sources") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_answer() {
        let result = parse_answer(r#"{"answer":"hello"}"#);
        assert_eq!(result.answer, "hello");
        assert_eq!(result.citations, None);
        assert_eq!(result.conversation_id, None);
        assert_eq!(result.notebook_used, None);
    }

    #[test]
    fn structured_answer_field_precedence() {
        let result = parse_answer(r#"{"text":"third","response":"second","answer":""}"#);
        assert_eq!(result.answer, "second");
    }

    #[test]
    fn structured_citations_and_conversation() {
        let raw = r#"{"response":"ok","citations":[{"source":"s1","page":2}],"conversationId":"c-9"}"#;
        let result = parse_answer(raw);
        assert_eq!(result.answer, "ok");
        assert_eq!(
            result.citations.as_deref(),
            Some(r#"[{"page":2,"source":"s1"}]"#)
        );
        assert_eq!(result.conversation_id.as_deref(), Some("c-9"));
    }

    #[test]
    fn null_citations_are_absent() {
        let result = parse_answer(r#"{"answer":"a","citations":null,"conversation_id":"x1"}"#);
        assert_eq!(result.citations, None);
        assert_eq!(result.conversation_id.as_deref(), Some("x1"));
    }

    #[test]
    fn structured_without_answer_field_keeps_raw_text() {
        let result = parse_answer(r#"{"status":"ok"}"#);
        assert_eq!(result.answer, r#"{"status":"ok"}"#);
    }

    #[test]
    fn json_scalars_are_plain_text() {
        assert!(matches!(RawOutput::detect("42"), RawOutput::PlainText(_)));
        assert_eq!(parse_answer("\"quoted\"").answer, "\"quoted\"");
    }

    #[test]
    fn plain_text_with_conversation_marker() {
        let raw = "Hello\nConversation ID: abc-123\nUse --conversation-id for follow-up questions.\n";
        let result = parse_answer(raw);
        assert_eq!(result.answer, "Hello");
        assert_eq!(result.conversation_id.as_deref(), Some("abc-123"));
        assert_eq!(result.citations, None);
    }

    #[test]
    fn plain_text_strips_ansi() {
        let raw = "\x1b[1;32mXin chào\x1b[0m\n\n\x1b[2mConversation ID: 0f3e-77aa\x1b[0m\n";
        let result = parse_answer(raw);
        assert_eq!(result.answer, "Xin chào");
        assert_eq!(result.conversation_id.as_deref(), Some("0f3e-77aa"));
    }

    #[test]
    fn plain_text_without_marker_is_kept_whole() {
        let raw = "  Line one\nLine two  \n";
        let result = parse_answer(raw);
        assert_eq!(result.answer, "Line one\nLine two");
        assert_eq!(result.conversation_id, None);
    }

    #[test]
    fn empty_output_gets_placeholder() {
        assert_eq!(parse_answer("").answer, NO_ANSWER_PLACEHOLDER);
        assert_eq!(parse_answer("   \n").answer, NO_ANSWER_PLACEHOLDER);
        assert_eq!(parse_answer(r#"{"answer":"   "}"#).answer, NO_ANSWER_PLACEHOLDER);
    }

    #[test]
    fn marker_only_output_gets_placeholder() {
        let result = parse_answer("Conversation ID: abc\n");
        assert_eq!(result.answer, NO_ANSWER_PLACEHOLDER);
        assert_eq!(result.conversation_id.as_deref(), Some("abc"));
    }

    #[test]
    fn task_id_extraction() {
        let raw = "Research started.\nTask ID: 40479b0b-a01b-49dd-9257-9f1fc700bcb1\n";
        assert_eq!(
            parse_task_id(raw).as_deref(),
            Some("40479b0b-a01b-49dd-9257-9f1fc700bcb1")
        );
        assert_eq!(parse_task_id("task id:   abc123").as_deref(), Some("abc123"));
        assert_eq!(parse_task_id("Research could not start"), None);
    }

    #[test]
    fn completion_requires_task_and_marker() {
        let status = "Task ID: t-1  Status: completed\nTask ID: t-2  Status: running";
        assert!(research_completed(status, "t-1"));
        assert!(!research_completed("Task ID: t-2  Status: running", "t-1"));
        assert!(!research_completed("Task ID: t-1  Status: running", "t-1"));
    }

    #[test]
    fn notebook_table() {
        let raw = "\
ID                                    Title                     Sources  Updated
3f1c-aa  Exeol OPA  Hướng dẫn  12  2025-01-02
b2d9-01  Competitors  7  2025-02-10

e55e-ff  2025-03-01
";
        let notebooks = parse_notebook_list(raw);
        assert_eq!(notebooks.len(), 3);

        assert_eq!(notebooks[0].id, "3f1c-aa");
        assert_eq!(notebooks[0].title, "Exeol OPA Hướng dẫn");
        assert_eq!(notebooks[0].source_count, 12);
        assert_eq!(notebooks[0].updated, "2025-01-02");

        assert_eq!(notebooks[1].title, "Competitors");
        assert_eq!(notebooks[1].source_count, 7);

        assert_eq!(notebooks[2].id, "e55e-ff");
        assert_eq!(notebooks[2].title, UNTITLED_NOTEBOOK);
        assert_eq!(notebooks[2].source_count, 0);
        assert_eq!(notebooks[2].updated, "2025-03-01");
    }

    #[test]
    fn notebook_table_bad_count_and_single_column() {
        let raw = "onlyid\nabc  Title  n/a  yesterday\n";
        let notebooks = parse_notebook_list(raw);
        assert_eq!(notebooks.len(), 1);
        assert_eq!(notebooks[0].source_count, 0);
        assert_eq!(notebooks[0].title, "Title");
    }

    #[test]
    fn source_id_variants() {
        assert_eq!(parse_source_id(r#"{"sourceId":"s-1","id":"x"}"#), "s-1");
        assert_eq!(parse_source_id(r#"{"id":17}"#), "17");
        assert_eq!(parse_source_id(r#"{"ok":true}"#), "unknown");
        assert_eq!(parse_source_id("Added source."), SOURCE_ADDED);
    }

    #[test]
    fn source_list_shapes() {
        assert_eq!(parse_source_list(r#"[{"id":1}]"#).unwrap().len(), 1);
        assert_eq!(
            parse_source_list(r#"{"sources":[{"id":1},{"id":2}]}"#)
                .unwrap()
                .len(),
            2
        );
        assert!(parse_source_list(r#"{"other":[]}"#).unwrap().is_empty());
        assert!(parse_source_list("not json").is_none());
    }
}
