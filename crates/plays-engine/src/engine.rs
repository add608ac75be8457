//! Orchestration of playbook records, stored content, and job status.
//!
//! A job moved to `running` is executed before its record is written back,
//! so the persisted status is always one of planned, done, failed, or
//! archived. Mutations of one record are serialized by a per-id lock;
//! identifiers are shared by playbooks and jobs, so one lock map covers
//! both.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use plays_core::config::Config;
use plays_core::content::ContentStore;
use plays_core::job::{Job, JobDraft};
use plays_core::playbook::{Playbook, PlaybookDraft};
use plays_core::repo::Repository;
use plays_core::types::JobStatus;
use plays_core::PlaysError;
use tokio::sync::{OwnedMutexGuard, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::execute::{ExecutionResult, Executor};
use crate::runner::{ProcessRunner, TokioRunner};
use crate::validate::{ValidationReport, Validator};
use crate::{EngineError, Result};

type RecordLock = Arc<tokio::sync::Mutex<()>>;

pub struct Engine {
    repo: Arc<Repository>,
    store: ContentStore,
    validator: Validator,
    executor: Executor,
    locks: Mutex<HashMap<u64, RecordLock>>,
    active_runs: Mutex<HashMap<u64, CancellationToken>>,
    shutdown: CancellationToken,
}

impl Engine {
    /// Engine over `root` using the real process runner. Prepares the
    /// playbook directory and inventory up front so a broken root fails
    /// here rather than on the first request.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let repo = Arc::new(Repository::open(root)?);
        let runner = Arc::new(TokioRunner::new(config.limits.timeout()));
        Self::new(root, &config, repo, runner)
    }

    pub fn new(
        root: &Path,
        config: &Config,
        repo: Arc<Repository>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self> {
        let store = ContentStore::new(root, config)?;
        store.ensure_ready()?;

        if config.tool.locate().is_none() {
            tracing::warn!(
                program = %config.tool.program,
                "execution tool not found on PATH; validation and runs will fail"
            );
        }

        let permits = Arc::new(Semaphore::new(config.limits.max_concurrent_runs.max(1)));
        let validator = Validator::new(
            store.clone(),
            config.tool.clone(),
            Arc::clone(&runner),
            Arc::clone(&permits),
        );
        let executor = Executor::new(store.clone(), config.tool.clone(), runner, permits);

        Ok(Self {
            repo,
            store,
            validator,
            executor,
            locks: Mutex::new(HashMap::new()),
            active_runs: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Cancel every in-flight run. Jobs being executed resolve to failed.
    pub fn shutdown(&self) {
        tracing::info!("engine shutting down; cancelling active runs");
        self.shutdown.cancel();
    }

    /// Ids of jobs whose tool process is currently running.
    pub fn active_runs(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .active_runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Serialize mutations of record `id`. The map entry lives only while
    /// some caller holds or waits on it, so requests for unknown ids leave
    /// nothing behind.
    async fn lock_record(&self, id: u64) -> RecordGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(id).or_default())
        };
        // Declared before the wait so a dropped caller still cleans up.
        let mut record = RecordGuard {
            locks: &self.locks,
            id,
            guard: None,
        };
        record.guard = Some(lock.lock_owned().await);
        record
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    // -----------------------------------------------------------------------
    // Validation / execution
    // -----------------------------------------------------------------------

    pub async fn check(&self, content: &str) -> ValidationReport {
        self.validator.check(content, &self.shutdown).await
    }

    pub async fn validate(&self, content: &str) -> bool {
        self.validator.validate(content, &self.shutdown).await
    }

    /// Run a stored playbook outside of any job.
    pub async fn execute(&self, playbook_id: u64) -> ExecutionResult {
        self.executor.execute(playbook_id, &self.shutdown).await
    }

    // -----------------------------------------------------------------------
    // Playbooks
    // -----------------------------------------------------------------------

    pub fn list_playbooks(&self) -> Vec<Playbook> {
        self.repo.list_playbooks()
    }

    pub fn get_playbook(&self, id: u64) -> Result<Playbook> {
        Ok(self.repo.get_playbook(id)?)
    }

    pub async fn create_playbook(&self, draft: PlaybookDraft) -> Result<Playbook> {
        draft.check()?;
        self.ensure_valid(&draft.content).await?;

        let id = self.repo.next_id()?;
        let _guard = self.lock_record(id).await;

        self.store.save(id, &draft.content)?;
        let playbook = Playbook::new(id, draft);
        if let Err(e) = self.repo.put_playbook(playbook.clone()) {
            if let Err(cleanup) = self.store.remove(id) {
                tracing::warn!(playbook_id = id, error = %cleanup, "failed to remove orphaned playbook file");
            }
            return Err(e.into());
        }
        tracing::info!(playbook_id = id, name = %playbook.name, "playbook created");
        Ok(playbook)
    }

    pub async fn update_playbook(&self, id: u64, draft: PlaybookDraft) -> Result<Playbook> {
        let _guard = self.lock_record(id).await;

        let mut playbook = self.repo.get_playbook(id)?;
        draft.check()?;
        self.ensure_valid(&draft.content).await?;

        let previous = playbook.content.clone();
        self.store.save(id, &draft.content)?;
        playbook.apply(draft);
        if let Err(e) = self.repo.put_playbook(playbook.clone()) {
            if let Err(restore) = self.store.save(id, &previous) {
                tracing::error!(playbook_id = id, error = %restore, "failed to restore playbook file");
            }
            return Err(e.into());
        }
        tracing::info!(playbook_id = id, "playbook updated");
        Ok(playbook)
    }

    /// Remove the record and its stored file. Jobs that reference the
    /// playbook are kept; running them later fails.
    pub async fn delete_playbook(&self, id: u64) -> Result<Playbook> {
        let guard = self.lock_record(id).await;

        let playbook = self.repo.remove_playbook(id)?;
        if let Err(e) = self.store.remove(id) {
            tracing::warn!(playbook_id = id, error = %e, "failed to remove playbook file");
        }
        drop(guard);
        tracing::info!(playbook_id = id, "playbook deleted");
        Ok(playbook)
    }

    async fn ensure_valid(&self, content: &str) -> Result<()> {
        let report = self.check(content).await;
        if report.passed {
            Ok(())
        } else {
            Err(EngineError::ValidationFailed(report.reason()))
        }
    }

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    pub fn list_jobs(&self) -> Vec<Job> {
        self.repo.list_jobs()
    }

    pub fn get_job(&self, id: u64) -> Result<Job> {
        Ok(self.repo.get_job(id)?)
    }

    /// Create a job. A job created as `running` is executed immediately
    /// and stored with its resolved status.
    pub async fn create_job(&self, draft: JobDraft) -> Result<Job> {
        self.repo.get_playbook(draft.playbook_id)?;
        if !draft.status.is_initial() {
            return Err(PlaysError::InvalidStatus(format!(
                "jobs cannot be created as {}",
                draft.status
            ))
            .into());
        }

        let id = self.repo.next_id()?;
        let _guard = self.lock_record(id).await;

        let mut job = Job::new(id, &draft)?;
        if job.status == JobStatus::Running {
            self.resolve_execution(&mut job).await?;
        }
        self.repo.put_job(job.clone())?;
        tracing::info!(job_id = id, status = %job.status, "job created");
        Ok(job)
    }

    /// Apply an explicit status request. `running` executes the playbook
    /// and returns the job in its resolved state.
    pub async fn update_job_status(&self, id: u64, target: JobStatus) -> Result<Job> {
        let _guard = self.lock_record(id).await;

        let mut job = self.repo.get_job(id)?;
        self.transition(&mut job, target).await?;
        self.repo.put_job(job.clone())?;
        Ok(job)
    }

    pub async fn assign_job(&self, id: u64, user: u64) -> Result<Job> {
        let _guard = self.lock_record(id).await;

        let mut job = self.repo.get_job(id)?;
        job.assign(user)?;
        self.repo.put_job(job.clone())?;
        tracing::info!(job_id = id, assigned_to = user, "job assigned");
        Ok(job)
    }

    pub async fn reschedule_job(
        &self,
        id: u64,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<Job> {
        let _guard = self.lock_record(id).await;

        let mut job = self.repo.get_job(id)?;
        job.reschedule(start_time)?;
        self.repo.put_job(job.clone())?;
        tracing::info!(job_id = id, start_time = ?start_time, "job rescheduled");
        Ok(job)
    }

    /// Delete a job, terminating its tool process first if one is running.
    pub async fn delete_job(&self, id: u64) -> Result<Job> {
        let token = self
            .active_runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned();
        if let Some(token) = token {
            tracing::info!(job_id = id, "cancelling active run before delete");
            token.cancel();
        }

        let guard = self.lock_record(id).await;
        let job = self.repo.remove_job(id)?;
        drop(guard);
        tracing::info!(job_id = id, "job deleted");
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    async fn transition(&self, job: &mut Job, target: JobStatus) -> Result<()> {
        let from = job.status;
        job.transition(target)?;
        tracing::info!(job_id = job.id, %from, to = %target, "job status changed");
        if target == JobStatus::Running {
            self.resolve_execution(job).await?;
        }
        Ok(())
    }

    /// Run the job's playbook and move it from running to done or failed.
    async fn resolve_execution(&self, job: &mut Job) -> Result<()> {
        let result = if self.repo.get_playbook(job.playbook_id).is_ok() {
            let cancel = self.shutdown.child_token();
            let _active = ActiveRun::register(&self.active_runs, job.id, cancel.clone());
            self.executor.execute(job.playbook_id, &cancel).await
        } else {
            let now = Utc::now();
            let missing = EngineError::PlaybookFileMissing(self.store.playbook_path(job.playbook_id));
            tracing::warn!(job_id = job.id, playbook_id = job.playbook_id, "job references a deleted playbook");
            ExecutionResult {
                success: false,
                exit_code: None,
                output: String::new(),
                error: Some(missing.to_string()),
                started_at: now,
                finished_at: now,
            }
        };

        let outcome = if result.success {
            JobStatus::Done
        } else {
            JobStatus::Failed
        };
        job.record_run(result.into_run_record());
        job.transition(outcome)?;
        tracing::info!(job_id = job.id, status = %outcome, "job run resolved");
        Ok(())
    }
}

/// Held lock on one record. On drop the map entry is removed unless another
/// caller still holds or waits on the same lock.
struct RecordGuard<'a> {
    locks: &'a Mutex<HashMap<u64, RecordLock>>,
    id: u64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

/// Registration of an in-flight run, removed when dropped.
struct ActiveRun<'a> {
    runs: &'a Mutex<HashMap<u64, CancellationToken>>,
    id: u64,
}

impl<'a> ActiveRun<'a> {
    fn register(
        runs: &'a Mutex<HashMap<u64, CancellationToken>>,
        id: u64,
        token: CancellationToken,
    ) -> Self {
        runs.lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, token);
        Self { runs, id }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}
