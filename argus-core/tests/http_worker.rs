use std::{sync::Arc, time::Duration};

use argus_core::{DetectionWorker, HttpDetectionWorker, WorkerError, WorkerFailureReason};
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;

type Seen = Arc<Mutex<Vec<String>>>;

async fn accept(State(seen): State<Seen>, Path((id, command)): Path<(String, String)>) -> StatusCode {
    seen.lock().push(format!("{command}:{id}"));
    if id == "broken" {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    if id == "slow" {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    StatusCode::NO_CONTENT
}

/// Serves a stand-in worker on an ephemeral port and returns its base URL.
async fn spawn_fake_worker() -> (String, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/cameras/{id}/{command}", post(accept))
        .with_state(seen.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), seen)
}

#[tokio::test]
async fn success_status_acknowledges_command() {
    let (base_url, seen) = spawn_fake_worker().await;
    let worker = HttpDetectionWorker::new(&base_url, Duration::from_secs(2)).unwrap();

    worker.start_camera("cam1").await.unwrap();
    worker.stop_camera("cam1").await.unwrap();

    assert_eq!(*seen.lock(), vec!["start:cam1", "stop:cam1"]);
}

#[tokio::test]
async fn error_status_is_a_rejection() {
    let (base_url, _seen) = spawn_fake_worker().await;
    let worker = HttpDetectionWorker::new(&base_url, Duration::from_secs(2)).unwrap();

    let err = worker.start_camera("broken").await.unwrap_err();
    assert!(
        matches!(err, WorkerError::Rejected { status: 500, .. }),
        "got {err:?}"
    );
    assert_eq!(err.reason(), WorkerFailureReason::Rejected);
}

#[tokio::test]
async fn slow_worker_times_out() {
    let (base_url, _seen) = spawn_fake_worker().await;
    let worker = HttpDetectionWorker::new(&base_url, Duration::from_millis(200)).unwrap();

    let err = worker.start_camera("slow").await.unwrap_err();
    assert_eq!(err, WorkerError::Timeout(Duration::from_millis(200)));
    assert_eq!(err.reason(), WorkerFailureReason::Timeout);
}
