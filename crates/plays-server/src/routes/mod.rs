pub mod jobs;
pub mod playbooks;

use std::future::Future;

use crate::error::AppError;

/// Run an engine operation on its own task so a dropped connection cannot
/// abandon a job half-way through its execution.
pub(crate) async fn detached<F, T>(op: F) -> Result<T, AppError>
where
    F: Future<Output = plays_engine::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(op)
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?
        .map_err(AppError::from)
}
