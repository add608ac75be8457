//! Runs a stored playbook against the shared inventory.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use plays_core::config::ToolConfig;
use plays_core::content::ContentStore;
use plays_core::job::RunRecord;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::runner::{Invocation, ProcessOutput, ProcessRunner};
use crate::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Full standard output of the tool.
    pub output: String,
    /// Standard error on failure, or the reason the tool never ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    fn from_output(output: ProcessOutput, started_at: DateTime<Utc>) -> Self {
        let success = output.success();
        let error = if success {
            None
        } else if !output.stderr.trim().is_empty() {
            Some(output.stderr)
        } else {
            Some(match output.exit_code {
                Some(code) => format!("exited with code {code}"),
                None => "terminated by signal".to_string(),
            })
        };
        Self {
            success,
            exit_code: output.exit_code,
            output: output.stdout,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn from_error(err: &EngineError, started_at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            exit_code: None,
            output: String::new(),
            error: Some(err.to_string()),
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn into_run_record(self) -> RunRecord {
        RunRecord {
            success: self.success,
            exit_code: self.exit_code,
            output: self.output,
            error: self.error,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

pub struct Executor {
    store: ContentStore,
    tool: ToolConfig,
    runner: Arc<dyn ProcessRunner>,
    permits: Arc<Semaphore>,
}

impl Executor {
    pub fn new(
        store: ContentStore,
        tool: ToolConfig,
        runner: Arc<dyn ProcessRunner>,
        permits: Arc<Semaphore>,
    ) -> Self {
        Self {
            store,
            tool,
            runner,
            permits,
        }
    }

    /// Run the stored file for `playbook_id`. Failures of any kind are
    /// reported in the result rather than as an error.
    pub async fn execute(&self, playbook_id: u64, cancel: &CancellationToken) -> ExecutionResult {
        let started_at = Utc::now();
        match self.try_execute(playbook_id, cancel).await {
            Ok(output) => {
                let result = ExecutionResult::from_output(output, started_at);
                tracing::info!(
                    playbook_id,
                    success = result.success,
                    exit_code = ?result.exit_code,
                    "playbook run finished"
                );
                result
            }
            Err(e) => {
                tracing::warn!(playbook_id, error = %e, "playbook run failed to complete");
                ExecutionResult::from_error(&e, started_at)
            }
        }
    }

    async fn try_execute(
        &self,
        playbook_id: u64,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput> {
        let path = self.store.playbook_path(playbook_id);
        if !path.is_file() {
            return Err(EngineError::PlaybookFileMissing(path));
        }
        self.store.ensure_ready()?;

        let invocation = self.invocation(&path.display().to_string());
        let _permit = tokio::select! {
            permit = self.permits.acquire() => permit.map_err(|_| EngineError::Cancelled)?,
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        };
        tracing::info!(playbook_id, path = %path.display(), "running playbook");
        self.runner.run(&invocation, cancel).await
    }

    fn invocation(&self, playbook: &str) -> Invocation {
        let mut invocation = Invocation::new(&self.tool.program)
            .args(self.tool.args.iter().cloned())
            .arg("-i")
            .arg(self.store.inventory_path().display().to_string())
            .arg(playbook);
        if self.tool.verbose {
            invocation = invocation.arg("-v");
        }
        invocation
    }
}
