use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Planned,
    Running,
    Done,
    Failed,
    Archived,
}

impl JobStatus {
    pub fn all() -> &'static [JobStatus] {
        &[
            JobStatus::Planned,
            JobStatus::Running,
            JobStatus::Done,
            JobStatus::Failed,
            JobStatus::Archived,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Planned => "planned",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Archived => "archived",
        }
    }

    /// No automatic transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Archived)
    }

    /// Statuses a caller may ask for when creating a job.
    pub fn is_initial(self) -> bool {
        matches!(self, JobStatus::Planned | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::error::PlaysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(JobStatus::Planned),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            "archived" => Ok(JobStatus::Archived),
            _ => Err(crate::error::PlaysError::InvalidStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_str() {
        for &s in JobStatus::all() {
            assert_eq!(JobStatus::from_str(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(JobStatus::from_str("paused").is_err());
        assert!(JobStatus::from_str("Running").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Planned.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Archived.is_terminal());
    }

    #[test]
    fn serde_uses_snake_case() {
        let yaml = serde_yaml::to_string(&JobStatus::Archived).unwrap();
        assert_eq!(yaml.trim(), "archived");
    }
}
