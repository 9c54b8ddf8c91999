//! # Argus Core
//!
//! Core library for the Argus camera monitoring server: camera and alert
//! models, the camera lifecycle coordinator, bearer credential verification,
//! and the storage and detection-worker ports the server wires together.
//!
//! ## Feature Flags
//!
//! - `database`: Enables the PostgreSQL stores and embedded migrations
//!
//! ## Architecture
//!
//! - [`camera`]: Camera records and the streaming lifecycle state machine
//! - [`alert`]: Alert submissions, persisted records and broadcast payloads
//! - [`identity`]: Credential verification
//! - [`lifecycle`]: Start/stop coordination with rollback
//! - [`worker`]: Detection worker port and its HTTP client
//! - [`database`]: Store traits with in-memory and PostgreSQL backends
//!
//! ## Examples
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use argus_core::{
//!     camera::Camera,
//!     database::InMemoryCameraRepository,
//!     lifecycle::CameraLifecycleCoordinator,
//!     worker::HttpDetectionWorker,
//! };
//!
//! async fn start_lobby() -> Result<(), Box<dyn std::error::Error>> {
//!     let cameras = Arc::new(InMemoryCameraRepository::with_cameras([Camera::new(
//!         "lobby",
//!         "Lobby",
//!         "rtsp://10.0.0.2/stream",
//!     )]));
//!     let worker = HttpDetectionWorker::new("http://localhost:8080", Duration::from_secs(10))?;
//!     let coordinator =
//!         CameraLifecycleCoordinator::new(cameras, Arc::new(worker), Duration::from_secs(10));
//!
//!     let camera = coordinator.start("lobby").await?;
//!     assert!(camera.is_streaming);
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod camera;
pub mod database;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod worker;

pub use alert::{Alert, AlertEvent, BoundingBox, NewAlert};
pub use camera::{Camera, CameraPatch, CameraSummary, LifecyclePhase};
pub use error::{CoreError, Result};
pub use identity::{IdentityVerifier, JwtIdentityVerifier, Unauthenticated, VerifiedIdentity};
pub use lifecycle::{CameraLifecycleCoordinator, CameraStatusPublisher, LifecycleError};
pub use worker::{DetectionWorker, HttpDetectionWorker, WorkerError, WorkerFailureReason};

/// Embedded schema migrations for the PostgreSQL stores, run by
/// [`database::PostgresDatabase::initialize_schema`] and `argus-server db migrate`.
#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
