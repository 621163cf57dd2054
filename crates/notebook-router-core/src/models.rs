//! Data types shared by the router, the research poller, and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed answer used when the engine produced nothing readable.
pub const NO_ANSWER_PLACEHOLDER: &str = "Không có câu trả lời.";

/// Title used for notebooks listed without one.
pub const UNTITLED_NOTEBOOK: &str = "(No Title)";

/// Normalized answer returned to the upstream consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Answer text. Never empty.
    pub answer: String,
    /// Opaque serialized citation data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<String>,
    /// Identifier for continuing the conversation on a later call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Notebook that produced the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook_used: Option<String>,
}

/// How much work to do before answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Fast research pass, then answer.
    Quick,
    /// Deep research pass, then answer.
    Extended,
    /// Answer directly from the notebook.
    #[default]
    Chat,
}

impl QueryMode {
    /// Research pass implied by this mode, if any.
    pub fn research_mode(self) -> Option<ResearchMode> {
        match self {
            QueryMode::Quick => Some(ResearchMode::Fast),
            QueryMode::Extended => Some(ResearchMode::Deep),
            QueryMode::Chat => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryMode::Quick => "quick",
            QueryMode::Extended => "extended",
            QueryMode::Chat => "chat",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(QueryMode::Quick),
            "extended" => Ok(QueryMode::Extended),
            "chat" => Ok(QueryMode::Chat),
            other => Err(format!(
                "Unknown query mode: '{}'. Use quick, extended, or chat.",
                other
            )),
        }
    }
}

/// Research depth passed to the engine's `--mode` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchMode {
    Fast,
    Deep,
}

impl ResearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResearchMode::Fast => "fast",
            ResearchMode::Deep => "deep",
        }
    }
}

impl fmt::Display for ResearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the engine's notebook listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookSummary {
    pub id: String,
    pub title: String,
    pub source_count: u32,
    pub updated: String,
}

/// Result of a service health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ok: bool,
    pub message: String,
}
