use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaysError {
    #[error("playbook not found: {0}")]
    PlaybookNotFound(u64),

    #[error("job not found: {0}")]
    JobNotFound(u64),

    #[error("invalid job status: {0}")]
    InvalidStatus(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("job {id} is {status}: only planned jobs can be edited")]
    JobLocked { id: u64, status: String },

    #[error("invalid playbook: {0}")]
    InvalidPlaybook(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("filesystem failure at {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl PlaysError {
    pub fn filesystem(path: &std::path::Path, source: std::io::Error) -> Self {
        PlaysError::Filesystem {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaysError>;
