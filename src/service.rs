//! Query orchestration.
//!
//! [`QueryService`] is the single entry point the upstream consumer calls.
//! It is constructed once with its collaborators and shared (it is cheap to
//! clone); nothing in it is mutable after construction.
//!
//! # Answer Flow
//!
//! 1. Resolve the target notebook: the explicit one, or classify → registry
//!    → default notebook.
//! 2. For `quick`/`extended`, run a fast/deep research pass. Failures are
//!    logged and ignored.
//! 3. Prefix the question with the answer-language directive.
//! 4. Ask the notebook, continuing `conversation_id` when given.
//! 5. Parse the output and record which notebook answered.

use notebook_router_core::models::{HealthStatus, NotebookSummary, QueryMode, QueryResult};
use notebook_router_core::parse::{parse_answer, parse_notebook_list, parse_source_id, parse_source_list};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::classifier::{create_model, Classifier};
use crate::config::Config;
use crate::engine::{CliEngine, EngineCommand, NotebookEngine};
use crate::error::{EngineError, QueryError};
use crate::registry::NotebookRegistry;
use crate::research::{ResearchPoller, ResearchTimings};

/// A question from the upstream consumer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Notebook to ask. Skips classification when set.
    #[serde(default)]
    pub notebook_id: Option<String>,
    /// Conversation to continue.
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub mode: QueryMode,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }
}

/// Routes questions to notebooks and answers them.
#[derive(Clone)]
pub struct QueryService {
    classifier: Classifier,
    registry: Arc<NotebookRegistry>,
    engine: Arc<dyn NotebookEngine>,
    poller: ResearchPoller,
    language_directive: String,
}

impl QueryService {
    pub fn new(
        classifier: Classifier,
        registry: Arc<NotebookRegistry>,
        engine: Arc<dyn NotebookEngine>,
        timings: ResearchTimings,
        language_directive: impl Into<String>,
    ) -> Self {
        let poller = ResearchPoller::new(engine.clone(), timings);
        Self {
            classifier,
            registry,
            engine,
            poller,
            language_directive: language_directive.into(),
        }
    }

    /// Wire up the production collaborators described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let model = create_model(&config.classifier)?;
        Ok(Self::new(
            Classifier::new(model),
            Arc::new(NotebookRegistry::from_config(config)),
            Arc::new(CliEngine::new(&config.engine)),
            ResearchTimings::from_config(&config.research),
            config.answer.language_directive.clone(),
        ))
    }

    pub fn registry(&self) -> &NotebookRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// All configured notebook ids.
    pub fn notebook_ids(&self) -> &[String] {
        self.registry.notebook_ids()
    }

    /// Answer a question.
    pub async fn answer(&self, request: &AskRequest) -> Result<QueryResult, QueryError> {
        let target = self.resolve_target(request).await?;

        if let Some(research_mode) = request.mode.research_mode() {
            if let Err(e) = self
                .poller
                .conduct_research(&request.question, &target, research_mode)
                .await
            {
                tracing::warn!("Research failed, falling back to direct query: {}", e);
            }
        }

        let prompt = self.compose_prompt(&request.question);
        tracing::info!(
            "Querying notebook {}: {}...",
            target,
            prompt.chars().take(50).collect::<String>()
        );

        let output = self
            .engine
            .run(EngineCommand::Query {
                notebook_id: target.clone(),
                prompt,
                conversation_id: request.conversation_id.clone(),
            })
            .await
            .map_err(|e| {
                tracing::error!("Query error: {}", e);
                QueryError::from(e)
            })?;

        let mut result = parse_answer(&output.stdout);
        result.notebook_used = Some(target);
        Ok(result)
    }

    async fn resolve_target(&self, request: &AskRequest) -> Result<String, QueryError> {
        if let Some(id) = request.notebook_id.as_deref().filter(|id| !id.trim().is_empty()) {
            return Ok(id.trim().to_string());
        }

        tracing::info!("Auto-routing query...");
        let category = self.classifier.classify(&request.question).await;

        match self.registry.route(category) {
            Some((id, false)) => {
                tracing::info!("Routed to {} ({})", category, id);
                Ok(id.to_string())
            }
            Some((id, true)) => {
                tracing::warn!(
                    "No notebook found for category {}. Falling back to default {}.",
                    category,
                    id
                );
                Ok(id.to_string())
            }
            None => Err(QueryError::NotConfigured),
        }
    }

    fn compose_prompt(&self, question: &str) -> String {
        let directive = self.language_directive.trim();
        if directive.is_empty() {
            question.to_string()
        } else {
            format!("{} {}", directive, question)
        }
    }

    fn target_or_default(&self, notebook_id: Option<&str>) -> Option<String> {
        notebook_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| id.trim().to_string())
            .or_else(|| self.registry.default_notebook().map(str::to_string))
    }

    /// Upload a document into a notebook. Returns the new source id.
    pub async fn add_source(
        &self,
        path: &Path,
        notebook_id: Option<&str>,
    ) -> Result<String, QueryError> {
        let target = self
            .target_or_default(notebook_id)
            .ok_or(QueryError::NotConfigured)?;

        tracing::info!("Adding source to {}: {}", target, path.display());
        let output = self
            .engine
            .run(EngineCommand::SourceAdd {
                notebook_id: target,
                path: path.to_path_buf(),
            })
            .await
            .map_err(|e| {
                tracing::error!("Add source error: {}", e);
                QueryError::SourceAdd(e.to_string())
            })?;

        Ok(parse_source_id(&output.stdout))
    }

    /// Sources of a notebook. Never fails; problems yield an empty list.
    pub async fn list_sources(&self, notebook_id: Option<&str>) -> Vec<serde_json::Value> {
        let target = match self.target_or_default(notebook_id) {
            Some(target) => target,
            None => return Vec::new(),
        };

        match self
            .engine
            .run(EngineCommand::SourceList {
                notebook_id: target,
            })
            .await
        {
            Ok(output) => parse_source_list(&output.stdout).unwrap_or_else(|| {
                tracing::warn!("Failed to parse source list JSON output");
                Vec::new()
            }),
            Err(e) => {
                tracing::error!("List sources error: {}", e);
                Vec::new()
            }
        }
    }

    /// Every notebook the engine account can see.
    pub async fn list_notebooks(&self) -> Result<Vec<NotebookSummary>, QueryError> {
        let output = self
            .engine
            .run(EngineCommand::NotebookList)
            .await
            .map_err(|e| {
                tracing::error!("List notebooks error: {}", e);
                QueryError::from(e)
            })?;
        Ok(parse_notebook_list(&output.stdout))
    }

    /// Whether the engine is installed and at least one notebook is bound.
    pub async fn health_check(&self) -> HealthStatus {
        match self.engine.run(EngineCommand::Version).await {
            Ok(_) => {}
            Err(EngineError::NotInstalled { command }) => {
                return HealthStatus {
                    ok: false,
                    message: format!("{} not installed", command),
                }
            }
            Err(e) => {
                return HealthStatus {
                    ok: false,
                    message: format!("engine check failed: {}", e),
                }
            }
        }

        if self.registry.is_empty() {
            return HealthStatus {
                ok: false,
                message: "NOTEBOOK_IDs not configured".to_string(),
            };
        }

        HealthStatus {
            ok: true,
            message: format!(
                "NotebookLM service ready ({} notebooks)",
                self.registry.notebook_ids().len()
            ),
        }
    }
}
