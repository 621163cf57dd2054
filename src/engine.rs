//! Notebook engine boundary.
//!
//! The answering engine is an external CLI (`nlm`, from
//! `notebooklm-mcp-cli`). Every call is described by an [`EngineCommand`],
//! validated, and turned into an argument vector. No shell is involved, so
//! question text and ids can never be interpreted as shell syntax.
//!
//! | Command | Arguments |
//! |---------|-----------|
//! | [`EngineCommand::ResearchStart`] | `research start <question> --notebook-id <id> --mode <fast\|deep>` |
//! | [`EngineCommand::ResearchStatus`] | `research status <id>` |
//! | [`EngineCommand::ResearchImport`] | `research import <id> <task>` |
//! | [`EngineCommand::Query`] | `notebook query <id> <prompt> [--conversation-id <cid>]` |
//! | [`EngineCommand::SourceAdd`] | `source add <id> --file <path>` |
//! | [`EngineCommand::SourceList`] | `source list <id>` |
//! | [`EngineCommand::NotebookList`] | `notebook list` |
//! | [`EngineCommand::Version`] | `--version` |
//!
//! [`CliEngine`] runs commands with a per-operation timeout and maps
//! failures onto [`EngineError`]. The [`NotebookEngine`] trait is the seam
//! the query service and research poller depend on.

use async_trait::async_trait;
use notebook_router_core::models::ResearchMode;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::EngineConfig;
use crate::error::EngineError;

/// One invocation of the engine CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    ResearchStart {
        question: String,
        notebook_id: String,
        mode: ResearchMode,
    },
    ResearchStatus {
        notebook_id: String,
    },
    ResearchImport {
        notebook_id: String,
        task_id: String,
    },
    Query {
        notebook_id: String,
        prompt: String,
        conversation_id: Option<String>,
    },
    SourceAdd {
        notebook_id: String,
        path: PathBuf,
    },
    SourceList {
        notebook_id: String,
    },
    NotebookList,
    Version,
}

impl EngineCommand {
    /// Short name used in logs and errors.
    pub fn operation(&self) -> &'static str {
        match self {
            EngineCommand::ResearchStart { .. } => "research start",
            EngineCommand::ResearchStatus { .. } => "research status",
            EngineCommand::ResearchImport { .. } => "research import",
            EngineCommand::Query { .. } => "notebook query",
            EngineCommand::SourceAdd { .. } => "source add",
            EngineCommand::SourceList { .. } => "source list",
            EngineCommand::NotebookList => "notebook list",
            EngineCommand::Version => "version",
        }
    }

    /// Validate every argument and build the argument vector.
    pub fn args(&self) -> Result<Vec<String>, EngineError> {
        let args = match self {
            EngineCommand::ResearchStart {
                question,
                notebook_id,
                mode,
            } => vec![
                "research".to_string(),
                "start".to_string(),
                free_text("question", question)?,
                "--notebook-id".to_string(),
                identifier("notebook id", notebook_id)?,
                "--mode".to_string(),
                mode.as_str().to_string(),
            ],
            EngineCommand::ResearchStatus { notebook_id } => vec![
                "research".to_string(),
                "status".to_string(),
                identifier("notebook id", notebook_id)?,
            ],
            EngineCommand::ResearchImport {
                notebook_id,
                task_id,
            } => vec![
                "research".to_string(),
                "import".to_string(),
                identifier("notebook id", notebook_id)?,
                identifier("task id", task_id)?,
            ],
            EngineCommand::Query {
                notebook_id,
                prompt,
                conversation_id,
            } => {
                let mut args = vec![
                    "notebook".to_string(),
                    "query".to_string(),
                    identifier("notebook id", notebook_id)?,
                    free_text("prompt", prompt)?,
                ];
                if let Some(cid) = conversation_id {
                    args.push("--conversation-id".to_string());
                    args.push(identifier("conversation id", cid)?);
                }
                args
            }
            EngineCommand::SourceAdd { notebook_id, path } => vec![
                "source".to_string(),
                "add".to_string(),
                identifier("notebook id", notebook_id)?,
                "--file".to_string(),
                free_text("file path", &path.to_string_lossy())?,
            ],
            EngineCommand::SourceList { notebook_id } => vec![
                "source".to_string(),
                "list".to_string(),
                identifier("notebook id", notebook_id)?,
            ],
            EngineCommand::NotebookList => vec!["notebook".to_string(), "list".to_string()],
            EngineCommand::Version => vec!["--version".to_string()],
        };
        Ok(args)
    }
}

/// Ids are positional arguments: ASCII alphanumerics, `-` and `_`, and never
/// a leading `-` that the CLI would read as a flag.
fn identifier(what: &str, value: &str) -> Result<String, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::InvalidArgument(format!("{} must not be empty", what)));
    }
    if value.starts_with('-') {
        return Err(EngineError::InvalidArgument(format!(
            "{} must not start with '-': {:?}",
            what, value
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(EngineError::InvalidArgument(format!(
            "{} contains invalid characters: {:?}",
            what, value
        )));
    }
    Ok(value.to_string())
}

/// Free text is positional too: anything the CLI could read as an option
/// (`--mode=deep`) is refused.
fn free_text(what: &str, value: &str) -> Result<String, EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidArgument(format!("{} must not be empty", what)));
    }
    if value.trim_start().starts_with('-') {
        return Err(EngineError::InvalidArgument(format!(
            "{} must not start with '-': {:?}",
            what, value
        )));
    }
    if value.contains('\0') {
        return Err(EngineError::InvalidArgument(format!(
            "{} must not contain NUL bytes",
            what
        )));
    }
    Ok(value.to_string())
}

/// Captured output of a successful engine call.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs engine commands.
#[async_trait]
pub trait NotebookEngine: Send + Sync {
    /// Run `command` and return its output, or the mapped failure.
    async fn run(&self, command: EngineCommand) -> Result<EngineOutput, EngineError>;
}

/// Per-operation timeouts.
#[derive(Debug, Clone)]
pub struct EngineTimeouts {
    pub query: Duration,
    pub source_add: Duration,
    pub list: Duration,
    pub research_call: Duration,
}

impl EngineTimeouts {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            query: Duration::from_secs(config.query_timeout_secs),
            source_add: Duration::from_secs(config.source_add_timeout_secs),
            list: Duration::from_secs(config.list_timeout_secs),
            research_call: Duration::from_secs(config.research_call_timeout_secs),
        }
    }

    /// Timeout applied to `command`.
    pub fn for_command(&self, command: &EngineCommand) -> Duration {
        match command {
            EngineCommand::Query { .. } => self.query,
            EngineCommand::SourceAdd { .. } => self.source_add,
            EngineCommand::SourceList { .. }
            | EngineCommand::NotebookList
            | EngineCommand::Version => self.list,
            EngineCommand::ResearchStart { .. }
            | EngineCommand::ResearchStatus { .. }
            | EngineCommand::ResearchImport { .. } => self.research_call,
        }
    }
}

/// Engine backed by the installed CLI.
pub struct CliEngine {
    program: String,
    timeouts: EngineTimeouts,
}

impl CliEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: config.command.clone(),
            timeouts: EngineTimeouts::from_config(config),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl NotebookEngine for CliEngine {
    async fn run(&self, command: EngineCommand) -> Result<EngineOutput, EngineError> {
        let operation = command.operation();
        let args = command.args()?;
        let timeout = self.timeouts.for_command(&command);

        tracing::debug!(program = %self.program, ?args, "Running engine command");

        let child = Command::new(&self.program)
            .args(&args)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EngineError::NotInstalled {
                    command: self.program.clone(),
                },
                _ => EngineError::Io(e),
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("Engine call '{}' timed out after {:?}", operation, timeout);
                return Err(EngineError::Timeout { operation, timeout });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(classify_failure(operation, output.status.code(), &stdout, &stderr));
        }

        if !stderr.trim().is_empty() {
            tracing::warn!("Engine stderr ({}): {}", operation, stderr.trim());
        }

        Ok(EngineOutput { stdout, stderr })
    }
}

/// Map a non-zero exit onto the error taxonomy.
///
/// Output mentioning `auth` or `cookie` means the engine's Google session
/// has expired.
fn classify_failure(
    operation: &'static str,
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> EngineError {
    let text = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    let detail = match code {
        Some(code) => format!("exit status {}: {}", code, text),
        None => format!("terminated by signal: {}", text),
    };

    let lower = format!("{}\n{}", stderr, stdout).to_lowercase();
    if lower.contains("auth") || lower.contains("cookie") {
        EngineError::AuthExpired { operation, detail }
    } else {
        EngineError::Failed { operation, detail }
    }
}
