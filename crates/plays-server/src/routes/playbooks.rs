use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use plays_core::playbook::PlaybookDraft;
use serde::Deserialize;

use super::detached;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/playbooks: list all playbooks.
pub async fn list_playbooks(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::json!(app.engine.list_playbooks())))
}

/// GET /api/playbooks/{id}
pub async fn get_playbook(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let playbook = app.engine.get_playbook(id)?;
    Ok(Json(serde_json::json!(playbook)))
}

/// POST /api/playbooks: validate, store, and record a new playbook.
pub async fn create_playbook(
    State(app): State<AppState>,
    Json(draft): Json<PlaybookDraft>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let engine = app.engine.clone();
    let playbook = detached(async move { engine.create_playbook(draft).await }).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!(playbook))))
}

/// PATCH /api/playbooks/{id}: replace name, description, and content.
pub async fn update_playbook(
    State(app): State<AppState>,
    Path(id): Path<u64>,
    Json(draft): Json<PlaybookDraft>,
) -> Result<Json<serde_json::Value>, AppError> {
    let engine = app.engine.clone();
    let playbook = detached(async move { engine.update_playbook(id, draft).await }).await?;
    Ok(Json(serde_json::json!(playbook)))
}

/// DELETE /api/playbooks/{id}
pub async fn delete_playbook(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.engine.delete_playbook(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ValidateBody {
    pub content: String,
}

/// POST /api/playbooks/validate: syntax-check content without storing it.
pub async fn validate_playbook(
    State(app): State<AppState>,
    Json(body): Json<ValidateBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.content.trim().is_empty() {
        return Err(AppError::bad_request("content must not be empty"));
    }
    let report = app.engine.check(&body.content).await;
    Ok(Json(serde_json::json!({
        "valid": report.passed,
        "exit_code": report.exit_code,
        "stdout": report.stdout,
        "stderr": report.stderr,
        "error": report.error,
    })))
}
