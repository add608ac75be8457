use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use plays_core::PlaysError;
use plays_engine::EngineError;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 400 Bad Request errors
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 400 through the `anyhow::Error` chain for
/// request problems that have no domain error of their own.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<BadRequestError>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if let Some(e) = self.0.downcast_ref::<EngineError>() {
            return match e {
                EngineError::Core(core) => core_status(core),
                EngineError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
                EngineError::PlaybookFileMissing(_)
                | EngineError::Spawn { .. }
                | EngineError::Timeout(_)
                | EngineError::Cancelled
                | EngineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        if let Some(e) = self.0.downcast_ref::<PlaysError>() {
            return core_status(e);
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn core_status(e: &PlaysError) -> StatusCode {
    match e {
        PlaysError::PlaybookNotFound(_) | PlaysError::JobNotFound(_) => StatusCode::NOT_FOUND,
        PlaysError::InvalidStatus(_) | PlaysError::InvalidPlaybook(_) => StatusCode::BAD_REQUEST,
        PlaysError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PlaysError::JobLocked { .. } => StatusCode::CONFLICT,
        PlaysError::InvalidConfig(_)
        | PlaysError::Filesystem { .. }
        | PlaysError::Io(_)
        | PlaysError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<anyhow::Error>) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(status_of(PlaysError::PlaybookNotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(PlaysError::JobNotFound(2)), StatusCode::NOT_FOUND);
    }

    #[test]
    fn wrapped_core_errors_keep_their_status() {
        let err = EngineError::Core(PlaysError::JobNotFound(2));
        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_failure_maps_to_400() {
        let err = EngineError::ValidationFailed("bad yaml".into());
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_status_maps_to_400() {
        assert_eq!(
            status_of(PlaysError::InvalidStatus("paused".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn invalid_transition_maps_to_422() {
        let err = PlaysError::InvalidTransition {
            from: "archived".into(),
            to: "running".into(),
            reason: "archived jobs are terminal".into(),
        };
        assert_eq!(status_of(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn job_locked_maps_to_409() {
        let err = PlaysError::JobLocked {
            id: 3,
            status: "done".into(),
        };
        assert_eq!(status_of(err), StatusCode::CONFLICT);
    }

    #[test]
    fn process_faults_map_to_500() {
        assert_eq!(status_of(EngineError::Cancelled), StatusCode::INTERNAL_SERVER_ERROR);
        let io = std::io::Error::other("disk full");
        assert_eq!(status_of(PlaysError::Io(io)), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_of(anyhow::anyhow!("something unexpected")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn bad_request_constructor_maps_to_400() {
        let response = AppError::bad_request("id must be numeric").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError(PlaysError::JobNotFound(9).into()).into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
