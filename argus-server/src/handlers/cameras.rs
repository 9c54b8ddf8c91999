use argus_core::{Camera, LifecyclePhase, VerifiedIdentity};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::info;

use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Serialize)]
pub struct CameraLifecycleResponse {
    pub camera: Camera,
    pub phase: LifecyclePhase,
}

pub async fn start_camera_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(camera_id): Path<String>,
) -> AppResult<Json<Camera>> {
    info!(camera_id = %camera_id, subject_id = identity.subject_id(), "start requested");
    let camera = state.lifecycle.start(&camera_id).await?;
    Ok(Json(camera))
}

pub async fn stop_camera_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(camera_id): Path<String>,
) -> AppResult<Json<Camera>> {
    info!(camera_id = %camera_id, subject_id = identity.subject_id(), "stop requested");
    let camera = state.lifecycle.stop(&camera_id).await?;
    Ok(Json(camera))
}

pub async fn camera_lifecycle_handler(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> AppResult<Json<CameraLifecycleResponse>> {
    let (camera, phase) = state.lifecycle.status(&camera_id).await?;
    Ok(Json(CameraLifecycleResponse { camera, phase }))
}
