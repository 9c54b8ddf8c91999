//! # Argus Server
//!
//! Axum service exposing the realtime alert channel (`GET /ws`), camera
//! lifecycle commands, and the alert ingest endpoint used by the detection
//! worker.

pub mod auth;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::{AppState, Stores};
