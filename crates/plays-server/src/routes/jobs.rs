use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use plays_core::job::JobDraft;
use plays_core::types::JobStatus;
use serde::Deserialize;

use super::detached;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/jobs: list all jobs.
pub async fn list_jobs(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::json!(app.engine.list_jobs())))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job = app.engine.get_job(id)?;
    Ok(Json(serde_json::json!(job)))
}

/// POST /api/jobs: create a job. A job created as `running` is executed
/// before the response is sent and comes back as done or failed.
pub async fn create_job(
    State(app): State<AppState>,
    Json(draft): Json<JobDraft>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let engine = app.engine.clone();
    let job = detached(async move { engine.create_job(draft).await }).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!(job))))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// PATCH /api/jobs/{id}/status
pub async fn update_job_status(
    State(app): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<StatusBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status: JobStatus = body.status.parse()?;
    let engine = app.engine.clone();
    let job = detached(async move { engine.update_job_status(id, status).await }).await?;
    Ok(Json(serde_json::json!(job)))
}

#[derive(Deserialize)]
pub struct AssignBody {
    #[serde(alias = "assignedTo")]
    pub assigned_to: u64,
}

/// PATCH /api/jobs/{id}/assign
pub async fn assign_job(
    State(app): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<AssignBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job = app.engine.assign_job(id, body.assigned_to).await?;
    Ok(Json(serde_json::json!(job)))
}

#[derive(Deserialize)]
pub struct StartTimeBody {
    #[serde(default, alias = "startTime")]
    pub start_time: Option<DateTime<Utc>>,
}

/// PATCH /api/jobs/{id}/start-time: `null` clears the start time.
pub async fn reschedule_job(
    State(app): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<StartTimeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job = app.engine.reschedule_job(id, body.start_time).await?;
    Ok(Json(serde_json::json!(job)))
}

/// DELETE /api/jobs/{id}: terminates the job's run if one is in flight.
pub async fn delete_job(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.engine.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
