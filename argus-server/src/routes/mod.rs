pub mod v1;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    handlers::{handle_websocket::websocket_handler, health::health_handler},
    infra::app_state::AppState,
};

/// Create the main API router with all versions
pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new().nest("/api/v1", v1::create_v1_router(state))
}

/// Full application: health, websocket endpoint and versioned API, with CORS
/// and request tracing.
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors.allowed_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(websocket_handler))
        .merge(create_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use argus_core::{DetectionWorker, WorkerError};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::infra::{app_state::Stores, config::Config};

    struct IdleWorker;

    #[async_trait]
    impl DetectionWorker for IdleWorker {
        async fn start_camera(&self, _camera_id: &str) -> Result<(), WorkerError> {
            Ok(())
        }

        async fn stop_camera(&self, _camera_id: &str) -> Result<(), WorkerError> {
            Ok(())
        }
    }

    fn app() -> Router {
        let state = AppState::new(
            Arc::new(Config::development()),
            Stores::in_memory(),
            Arc::new(IdleWorker),
        );
        create_app(state)
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/v1/alerts")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn preflight_allows_listed_origin() {
        let response = app().oneshot(preflight("http://localhost:5173")).await.unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:5173"))
        );
    }

    #[tokio::test]
    async fn preflight_ignores_unlisted_origin() {
        let response = app().oneshot(preflight("http://evil.test")).await.unwrap();

        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn camera_routes_reject_missing_credential() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/cameras/cam1/start")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
