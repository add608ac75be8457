use crate::error::{PlaysError, Result};
use crate::types::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StatusTransition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub status: JobStatus,
    pub entered: DateTime<Utc>,
    pub exited: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// RunRecord
// ---------------------------------------------------------------------------

/// Audit trail of one execution attempt. Output is stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub playbook_id: u64,
    pub assigned_to: u64,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status_history: Vec<StatusTransition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunRecord>,
}

impl Job {
    /// Build a job in its requested initial status (`planned` or `running`).
    pub fn new(id: u64, draft: &JobDraft) -> Result<Self> {
        if !draft.status.is_initial() {
            return Err(PlaysError::InvalidTransition {
                from: "none".to_string(),
                to: draft.status.to_string(),
                reason: "jobs start as planned or running".to_string(),
            });
        }
        let now = Utc::now();
        Ok(Self {
            id,
            playbook_id: draft.playbook_id,
            assigned_to: draft.assigned_to,
            status: draft.status,
            start_time: draft.start_time,
            created_at: now,
            updated_at: now,
            status_history: vec![StatusTransition {
                status: draft.status,
                entered: now,
                exited: None,
            }],
            last_run: None,
        })
    }

    // ---------------------------------------------------------------------------
    // Status transitions
    // ---------------------------------------------------------------------------

    pub fn can_transition_to(&self, target: JobStatus) -> Result<()> {
        let reject = |reason: &str| -> Result<()> {
            Err(PlaysError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
                reason: reason.to_string(),
            })
        };

        match (self.status, target) {
            (JobStatus::Archived, _) => reject("archived jobs are terminal"),
            (_, JobStatus::Archived) => Ok(()),
            (JobStatus::Planned, JobStatus::Running) => Ok(()),
            (JobStatus::Running, JobStatus::Done | JobStatus::Failed) => Ok(()),
            (_, JobStatus::Running) => reject("only planned jobs can be started"),
            (_, JobStatus::Done | JobStatus::Failed) => {
                reject("done and failed are reached only by running the job")
            }
            (_, JobStatus::Planned) => reject("jobs cannot return to planned"),
        }
    }

    pub fn transition(&mut self, target: JobStatus) -> Result<()> {
        self.can_transition_to(target)?;

        let now = Utc::now();
        if let Some(last) = self.status_history.last_mut() {
            last.exited = Some(now);
        }

        self.status = target;
        self.updated_at = now;
        self.status_history.push(StatusTransition {
            status: target,
            entered: now,
            exited: None,
        });

        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Planned-only edits
    // ---------------------------------------------------------------------------

    fn ensure_planned(&self) -> Result<()> {
        if self.status != JobStatus::Planned {
            return Err(PlaysError::JobLocked {
                id: self.id,
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    pub fn assign(&mut self, user: u64) -> Result<()> {
        self.ensure_planned()?;
        self.assigned_to = user;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn reschedule(&mut self, start_time: Option<DateTime<Utc>>) -> Result<()> {
        self.ensure_planned()?;
        self.start_time = start_time;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_run(&mut self, run: RunRecord) {
        self.last_run = Some(run);
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// JobDraft
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDraft {
    pub playbook_id: u64,
    #[serde(default)]
    pub assigned_to: u64,
    #[serde(default = "default_initial_status")]
    pub status: JobStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

fn default_initial_status() -> JobStatus {
    JobStatus::Planned
}
