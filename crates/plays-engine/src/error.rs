use std::path::PathBuf;
use std::time::Duration;

use plays_core::PlaysError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] PlaysError),

    #[error("invalid playbook syntax: {0}")]
    ValidationFailed(String),

    #[error("playbook file not found: {}", .0.display())]
    PlaybookFileMissing(PathBuf),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("process cancelled")]
    Cancelled,

    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
}
