use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use argus_core::{CoreError, LifecycleError, Unauthenticated};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => Self::not_found(msg),
            CoreError::Validation(msg) => Self::bad_request(msg),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound(_) => Self::not_found(err.to_string()),
            LifecycleError::CameraBusy(_) => Self::conflict(err.to_string()),
            LifecycleError::WorkerStartFailed { .. } => Self::bad_gateway(err.to_string()),
            LifecycleError::InvalidTransition(_) => Self::conflict(err.to_string()),
            LifecycleError::Store(inner) => inner.into(),
            LifecycleError::Interrupted { .. } => Self::internal(err.to_string()),
        }
    }
}

impl From<Unauthenticated> for AppError {
    fn from(err: Unauthenticated) -> Self {
        Self::unauthorized(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::WorkerError;

    #[test]
    fn lifecycle_errors_map_to_statuses() {
        let busy: AppError = LifecycleError::CameraBusy("cam1".into()).into();
        assert_eq!(busy.status, StatusCode::CONFLICT);

        let missing: AppError = LifecycleError::NotFound("cam1".into()).into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let failed: AppError = LifecycleError::WorkerStartFailed {
            camera_id: "cam1".into(),
            source: WorkerError::Unreachable("refused".into()),
        }
        .into();
        assert_eq!(failed.status, StatusCode::BAD_GATEWAY);
        assert!(failed.message.contains("cam1"));

        let interrupted: AppError = LifecycleError::Interrupted {
            camera_id: "cam1".into(),
            message: "task panicked".into(),
        }
        .into();
        assert_eq!(interrupted.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn core_errors_map_to_statuses() {
        let invalid: AppError = CoreError::Validation("confidence".into()).into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

        let missing: AppError = CoreError::camera_not_found("cam9").into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }
}
