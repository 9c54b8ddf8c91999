use std::{collections::VecDeque, sync::Arc};

use argus_core::{
    Camera, DetectionWorker, WorkerError,
    database::{InMemoryAlertRepository, InMemoryCameraRepository},
    identity::Claims,
    worker::WorkerCommand,
};
use argus_server::{AppState, Stores, infra::config::Config, routes::create_app};
use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use parking_lot::Mutex;

pub const SECRET: &str = "integration-secret";

/// Worker double that replays queued outcomes and records every call.
/// With nothing queued it acknowledges.
#[derive(Debug, Default)]
pub struct ScriptedWorker {
    outcomes: Mutex<VecDeque<Result<(), WorkerError>>>,
    calls: Mutex<Vec<(WorkerCommand, String)>>,
}

// Code is used by test modules, but not in this scope
#[allow(unused)]
impl ScriptedWorker {
    pub fn push(&self, outcome: Result<(), WorkerError>) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(WorkerCommand, String)> {
        self.calls.lock().clone()
    }

    fn next(&self, command: WorkerCommand, camera_id: &str) -> Result<(), WorkerError> {
        self.calls.lock().push((command, camera_id.to_string()));
        self.outcomes.lock().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl DetectionWorker for ScriptedWorker {
    async fn start_camera(&self, camera_id: &str) -> Result<(), WorkerError> {
        self.next(WorkerCommand::Start, camera_id)
    }

    async fn stop_camera(&self, camera_id: &str) -> Result<(), WorkerError> {
        self.next(WorkerCommand::Stop, camera_id)
    }
}

#[allow(unused)]
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub worker: Arc<ScriptedWorker>,
    pub cameras: Arc<InMemoryCameraRepository>,
    pub alerts: Arc<InMemoryAlertRepository>,
}

pub fn test_config() -> Config {
    let mut config = Config::development();
    config.auth.jwt_secret = SECRET.to_string();
    config
}

fn seeded_cameras() -> InMemoryCameraRepository {
    InMemoryCameraRepository::with_cameras([
        Camera::new("cam1", "Lobby", "rtsp://10.0.0.2/stream").with_location("Entrance"),
        Camera::new("cam2", "Loading dock", "rtsp://10.0.0.3/stream"),
    ])
}

/// Router served over a real socket so WebSocket upgrades work too.
#[allow(unused)]
pub fn build_test_app() -> TestApp {
    let cameras = Arc::new(seeded_cameras());
    let alerts = Arc::new(InMemoryAlertRepository::new());
    let worker = Arc::new(ScriptedWorker::default());

    let state = AppState::new(
        Arc::new(test_config()),
        Stores::new(cameras.clone(), alerts.clone()),
        worker.clone(),
    );

    let server = TestServer::builder()
        .http_transport()
        .build(create_app(state.clone()))
        .expect("failed to start test server");

    TestApp {
        server,
        state,
        worker,
        cameras,
        alerts,
    }
}

#[allow(unused)]
pub fn token_for(user_id: &str) -> String {
    token_signed_with(user_id, SECRET)
}

#[allow(unused)]
pub fn token_signed_with(user_id: &str, secret: &str) -> String {
    let now = Utc::now();
    let claims = Claims {
        user_id: user_id.to_string(),
        username: Some(format!("{user_id}-name")),
        exp: (now + Duration::hours(24)).timestamp(),
        iat: Some(now.timestamp()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to sign test token")
}
