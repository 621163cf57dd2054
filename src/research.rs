//! Research passes: start, poll to completion, import.
//!
//! ```text
//! research start ──▶ Task ID ──▶ research status (every poll_interval)
//!                                    │ task id + "completed"
//!                                    ▼
//!                              research import
//! ```
//!
//! Polling is strictly sequential. A failed status call counts as "not yet
//! complete"; only the deadline ends the loop. On timeout the remote task
//! is left running: the engine offers no way to cancel it.

use notebook_router_core::models::ResearchMode;
use notebook_router_core::parse::{parse_task_id, research_completed};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ResearchConfig;
use crate::engine::{EngineCommand, NotebookEngine};
use crate::error::ResearchError;

/// Poll interval and per-mode ceilings.
#[derive(Debug, Clone)]
pub struct ResearchTimings {
    pub poll_interval: Duration,
    pub fast_timeout: Duration,
    pub deep_timeout: Duration,
}

impl ResearchTimings {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            fast_timeout: Duration::from_secs(config.fast_timeout_secs),
            deep_timeout: Duration::from_secs(config.deep_timeout_secs),
        }
    }

    pub fn timeout_for(&self, mode: ResearchMode) -> Duration {
        match mode {
            ResearchMode::Fast => self.fast_timeout,
            ResearchMode::Deep => self.deep_timeout,
        }
    }
}

/// Drives research jobs on the engine.
#[derive(Clone)]
pub struct ResearchPoller {
    engine: Arc<dyn NotebookEngine>,
    timings: ResearchTimings,
}

impl ResearchPoller {
    pub fn new(engine: Arc<dyn NotebookEngine>, timings: ResearchTimings) -> Self {
        Self { engine, timings }
    }

    /// Run a full research pass for `question` against `notebook_id`.
    pub async fn conduct_research(
        &self,
        question: &str,
        notebook_id: &str,
        mode: ResearchMode,
    ) -> Result<(), ResearchError> {
        tracing::info!("Starting research ({}) for {:?}", mode, question);

        let started = self
            .engine
            .run(EngineCommand::ResearchStart {
                question: question.to_string(),
                notebook_id: notebook_id.to_string(),
                mode,
            })
            .await?;

        let task_id = parse_task_id(&started.stdout).ok_or_else(|| ResearchError::MissingTaskId {
            output: started.stdout.trim().to_string(),
        })?;
        tracing::info!("Research task id: {}", task_id);

        self.wait_for_completion(notebook_id, &task_id, self.timings.timeout_for(mode))
            .await?;

        tracing::info!("Importing research results...");
        self.engine
            .run(EngineCommand::ResearchImport {
                notebook_id: notebook_id.to_string(),
                task_id: task_id.clone(),
            })
            .await?;
        tracing::info!("Research {} imported successfully.", task_id);

        Ok(())
    }

    /// Poll `research status` until `task_id` is reported completed.
    pub async fn wait_for_completion(
        &self,
        notebook_id: &str,
        task_id: &str,
        timeout: Duration,
    ) -> Result<(), ResearchError> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            let status = self
                .engine
                .run(EngineCommand::ResearchStatus {
                    notebook_id: notebook_id.to_string(),
                })
                .await;

            match status {
                Ok(output) if research_completed(&output.stdout, task_id) => return Ok(()),
                Ok(_) => tracing::debug!("Research {} still running", task_id),
                Err(e) => tracing::warn!("Check status failed, retrying: {}", e),
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.timings.poll_interval.min(remaining)).await;
        }

        Err(ResearchError::TimedOut {
            task_id: task_id.to_string(),
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOutput;
    use crate::error::EngineError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Engine that answers research commands from a script.
    struct ScriptedEngine {
        start_output: String,
        /// Status outputs returned in order; the last one repeats.
        statuses: Mutex<Vec<Result<String, ()>>>,
        calls: Mutex<Vec<EngineCommand>>,
        import_fails: bool,
    }

    impl ScriptedEngine {
        fn new(start_output: &str, statuses: Vec<Result<String, ()>>) -> Arc<Self> {
            Arc::new(Self {
                start_output: start_output.to_string(),
                statuses: Mutex::new(statuses),
                calls: Mutex::new(Vec::new()),
                import_fails: false,
            })
        }

        fn operations(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().iter().map(|c| c.operation()).collect()
        }
    }

    #[async_trait]
    impl NotebookEngine for ScriptedEngine {
        async fn run(&self, command: EngineCommand) -> Result<EngineOutput, EngineError> {
            command.args()?;
            self.calls.lock().unwrap().push(command.clone());
            let stdout = match command {
                EngineCommand::ResearchStart { .. } => self.start_output.clone(),
                EngineCommand::ResearchStatus { .. } => {
                    let mut statuses = self.statuses.lock().unwrap();
                    let next = if statuses.len() > 1 {
                        statuses.remove(0)
                    } else {
                        statuses[0].clone()
                    };
                    next.map_err(|_| EngineError::Failed {
                        operation: "research status",
                        detail: "transient".to_string(),
                    })?
                }
                EngineCommand::ResearchImport { .. } if self.import_fails => {
                    return Err(EngineError::Failed {
                        operation: "research import",
                        detail: "import rejected".to_string(),
                    })
                }
                _ => String::new(),
            };
            Ok(EngineOutput {
                stdout,
                stderr: String::new(),
            })
        }
    }

    fn timings() -> ResearchTimings {
        ResearchTimings {
            poll_interval: Duration::from_millis(10),
            fast_timeout: Duration::from_millis(80),
            deep_timeout: Duration::from_millis(160),
        }
    }

    #[tokio::test]
    async fn completes_after_polling_and_imports() {
        let engine = ScriptedEngine::new(
            "Task ID: 40479b0b-a01b\n",
            vec![
                Ok("Task ID: 40479b0b-a01b  Status: in_progress".to_string()),
                Err(()),
                Ok("Task ID: 40479b0b-a01b  Status: completed".to_string()),
            ],
        );
        let poller = ResearchPoller::new(engine.clone(), timings());

        poller
            .conduct_research("OPA", "nb-1", ResearchMode::Fast)
            .await
            .unwrap();

        assert_eq!(
            engine.operations(),
            vec![
                "research start",
                "research status",
                "research status",
                "research status",
                "research import"
            ]
        );
        let calls = engine.calls.lock().unwrap();
        assert_eq!(
            calls.last(),
            Some(&EngineCommand::ResearchImport {
                notebook_id: "nb-1".to_string(),
                task_id: "40479b0b-a01b".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn missing_task_id_fails_without_polling() {
        let engine = ScriptedEngine::new("Research queued.", vec![Ok(String::new())]);
        let poller = ResearchPoller::new(engine.clone(), timings());

        let err = poller
            .conduct_research("OPA", "nb-1", ResearchMode::Fast)
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::MissingTaskId { .. }));
        assert_eq!(engine.operations(), vec!["research start"]);
    }

    #[tokio::test]
    async fn times_out_at_mode_ceiling() {
        let engine = ScriptedEngine::new(
            "Task ID: abc\n",
            vec![Ok("Task ID: other  Status: completed".to_string())],
        );
        let poller = ResearchPoller::new(engine.clone(), timings());

        let start = Instant::now();
        let err = poller
            .conduct_research("OPA", "nb-1", ResearchMode::Deep)
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        match err {
            ResearchError::TimedOut { task_id, timeout } => {
                assert_eq!(task_id, "abc");
                assert_eq!(timeout, Duration::from_millis(160));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(elapsed >= Duration::from_millis(160), "gave up after {:?}", elapsed);
        assert!(!engine.operations().contains(&"research import"));
    }

    #[tokio::test]
    async fn failing_polls_do_not_abort() {
        let engine = ScriptedEngine::new("Task ID: abc\n", vec![Err(())]);
        let poller = ResearchPoller::new(engine.clone(), timings());

        let err = poller
            .wait_for_completion("nb-1", "abc", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::TimedOut { .. }));
        let polls = engine
            .operations()
            .iter()
            .filter(|op| **op == "research status")
            .count();
        assert!(polls >= 2, "only {} polls", polls);
    }

    #[tokio::test]
    async fn deadline_does_not_wait_out_a_full_interval() {
        let engine = ScriptedEngine::new("Task ID: abc\n", vec![Err(())]);
        let poller = ResearchPoller::new(
            engine.clone(),
            ResearchTimings {
                poll_interval: Duration::from_millis(400),
                fast_timeout: Duration::from_millis(100),
                deep_timeout: Duration::from_millis(100),
            },
        );

        let start = Instant::now();
        let err = poller
            .wait_for_completion("nb-1", "abc", Duration::from_millis(100))
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, ResearchError::TimedOut { .. }));
        assert!(elapsed >= Duration::from_millis(100), "gave up after {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(350), "overshot to {:?}", elapsed);
    }

    #[tokio::test]
    async fn import_failure_propagates() {
        let engine = Arc::new(ScriptedEngine {
            start_output: "Task ID: abc".to_string(),
            statuses: Mutex::new(vec![Ok("abc completed".to_string())]),
            calls: Mutex::new(Vec::new()),
            import_fails: true,
        });
        let poller = ResearchPoller::new(engine, timings());
        let err = poller
            .conduct_research("OPA", "nb-1", ResearchMode::Fast)
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Engine(EngineError::Failed { .. })));
    }
}
