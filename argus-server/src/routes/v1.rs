use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    auth::auth_middleware,
    handlers::{
        alerts::create_alert_handler,
        cameras::{camera_lifecycle_handler, start_camera_handler, stop_camera_handler},
    },
    infra::app_state::AppState,
};

pub const CAMERA_START: &str = "/cameras/{id}/start";
pub const CAMERA_STOP: &str = "/cameras/{id}/stop";
pub const CAMERA_LIFECYCLE: &str = "/cameras/{id}/lifecycle";
pub const ALERTS: &str = "/alerts";

/// Create all v1 API routes
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        // Detection worker submits alerts without a user credential
        .route(ALERTS, post(create_alert_handler))
        .merge(create_camera_routes(state))
}

fn create_camera_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(CAMERA_START, post(start_camera_handler))
        .route(CAMERA_STOP, post(stop_camera_handler))
        .route(CAMERA_LIFECYCLE, get(camera_lifecycle_handler))
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}
