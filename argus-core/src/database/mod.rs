//! Storage ports and their backends.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;
pub mod ports;

pub use memory::{InMemoryAlertRepository, InMemoryCameraRepository};
#[cfg(feature = "database")]
pub use postgres::{PostgresAlertRepository, PostgresCameraRepository, PostgresDatabase};
pub use ports::{AlertRepository, CameraRepository};
