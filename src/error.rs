//! Error taxonomy for engine calls, research passes, and answered queries.
//!
//! `Display` on every type is the English diagnostic that goes to the log.
//! What the end user sees comes from [`QueryError::user_message`].

use std::time::Duration;
use thiserror::Error;

/// Hint printed when the engine's Google session has expired.
pub const REAUTH_COMMAND: &str = "notebooklm-mcp-auth";

/// Install command for the engine CLI.
pub const INSTALL_COMMAND: &str = "uv tool install notebooklm-mcp-cli";

/// Failure of a single engine CLI invocation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine command '{command}' is not installed")]
    NotInstalled { command: String },

    #[error("engine call '{operation}' timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("engine session expired during '{operation}': {detail}")]
    AuthExpired {
        operation: &'static str,
        detail: String,
    },

    #[error("engine call '{operation}' failed: {detail}")]
    Failed {
        operation: &'static str,
        detail: String,
    },

    #[error("invalid engine argument: {0}")]
    InvalidArgument(String),

    #[error("failed to run engine command: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a research pass. Never fatal to the overall query.
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("research did not return a task id (output: {output:?})")]
    MissingTaskId { output: String },

    #[error("research task {task_id} did not complete within {timeout:?}")]
    TimedOut { task_id: String, timeout: Duration },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Failure surfaced to the caller of the query service.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("no notebook id is configured")]
    NotConfigured,

    #[error("engine CLI is not installed: {0}")]
    ToolNotInstalled(String),

    #[error("engine call timed out: {0}")]
    Timeout(String),

    #[error("engine authentication expired: {0}")]
    AuthExpired(String),

    #[error("engine call failed: {0}")]
    Engine(String),

    #[error("adding a source failed: {0}")]
    SourceAdd(String),
}

impl From<EngineError> for QueryError {
    fn from(err: EngineError) -> Self {
        let detail = err.to_string();
        match err {
            EngineError::NotInstalled { .. } => QueryError::ToolNotInstalled(detail),
            EngineError::Timeout { .. } => QueryError::Timeout(detail),
            EngineError::AuthExpired { .. } => QueryError::AuthExpired(detail),
            EngineError::Failed { .. } | EngineError::InvalidArgument(_) | EngineError::Io(_) => {
                QueryError::Engine(detail)
            }
        }
    }
}

impl QueryError {
    /// Short machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::NotConfigured => "not_configured",
            QueryError::ToolNotInstalled(_) => "tool_not_installed",
            QueryError::Timeout(_) => "timeout",
            QueryError::AuthExpired(_) => "auth_expired",
            QueryError::Engine(_) => "engine_error",
            QueryError::SourceAdd(_) => "source_add_failed",
        }
    }

    /// Localized message for the end user.
    pub fn user_message(&self) -> String {
        match self {
            QueryError::NotConfigured => {
                "NotebookLM chưa được cấu hình (Không tìm thấy Notebook ID nào).".to_string()
            }
            QueryError::ToolNotInstalled(_) => {
                format!("CLI tool chưa được cài đặt. Chạy: {}", INSTALL_COMMAND)
            }
            QueryError::Timeout(_) => "Timeout khi truy vấn. Vui lòng thử lại.".to_string(),
            QueryError::AuthExpired(_) => format!(
                "Phiên đăng nhập Google đã hết hạn. Chạy: {}",
                REAUTH_COMMAND
            ),
            QueryError::Engine(_) => {
                "Không thể truy vấn NotebookLM. Vui lòng thử lại sau.".to_string()
            }
            QueryError::SourceAdd(_) => "Không thể thêm tài liệu vào NotebookLM.".to_string(),
        }
    }

    /// Internal detail, for logs and dev mode.
    pub fn detail(&self) -> Option<&str> {
        match self {
            QueryError::NotConfigured => None,
            QueryError::ToolNotInstalled(d)
            | QueryError::Timeout(d)
            | QueryError::AuthExpired(d)
            | QueryError::Engine(d)
            | QueryError::SourceAdd(d) => Some(d),
        }
    }
}
