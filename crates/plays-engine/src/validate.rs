//! Syntax-check pipeline.
//!
//! Candidate text is written to a fresh scratch file next to the stored
//! playbooks, checked with `<tool> --syntax-check -i <inventory> <scratch>`,
//! and the scratch file is deleted on every path. Any fault along the way
//! (write, spawn, timeout, delete) counts as a failed check.

use std::sync::Arc;

use plays_core::config::ToolConfig;
use plays_core::content::ContentStore;
use plays_core::PlaysError;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::runner::{Invocation, ProcessRunner};
use crate::{EngineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Set when the check could not be carried out at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationReport {
    fn fault(err: &EngineError) -> Self {
        Self {
            passed: false,
            error: Some(err.to_string()),
            ..Self::default()
        }
    }

    /// One-line explanation of a failed check.
    pub fn reason(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.exit_code {
            Some(code) => format!("syntax check exited with code {code}"),
            None => "syntax check was terminated".to_string(),
        }
    }
}

pub struct Validator {
    store: ContentStore,
    tool: ToolConfig,
    runner: Arc<dyn ProcessRunner>,
    permits: Arc<Semaphore>,
}

impl Validator {
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

    /// True iff the tool accepts `content`. Never errors.
    pub async fn validate(&self, content: &str, cancel: &CancellationToken) -> bool {
        self.check(content, cancel).await.passed
    }

    pub async fn check(&self, content: &str, cancel: &CancellationToken) -> ValidationReport {
        match self.try_check(content, cancel).await {
            Ok(report) => {
                if !report.passed {
                    tracing::info!(reason = %report.reason(), "playbook rejected by syntax check");
                }
                report
            }
            Err(e) => {
                tracing::warn!(error = %e, "syntax check could not run");
                ValidationReport::fault(&e)
            }
        }
    }

    async fn try_check(
        &self,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport> {
        self.store.ensure_ready()?;
        let scratch = self.store.scratch_file(content)?;
        let invocation = self.invocation(&scratch.path().display().to_string());

        let result = async {
            let _permit = tokio::select! {
                permit = self.permits.acquire() => permit.map_err(|_| EngineError::Cancelled)?,
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            };
            self.runner.run(&invocation, cancel).await
        }
        .await;

        let scratch_path = scratch.path().to_path_buf();
        let cleanup = scratch
            .close()
            .map_err(|e| PlaysError::filesystem(&scratch_path, e));
        let output = result?;
        cleanup?;

        Ok(ValidationReport {
            passed: output.success(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            error: None,
        })
    }

    fn invocation(&self, scratch: &str) -> Invocation {
        Invocation::new(&self.tool.program)
            .args(self.tool.args.iter().cloned())
            .arg("--syntax-check")
            .arg("-i")
            .arg(self.store.inventory_path().display().to_string())
            .arg(scratch)
    }
}
