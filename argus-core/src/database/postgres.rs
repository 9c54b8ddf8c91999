//! PostgreSQL stores, enabled by the `database` feature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};
use tracing::info;
use uuid::Uuid;

use super::ports::{AlertRepository, CameraRepository};
use crate::{
    MIGRATOR, Result,
    alert::{Alert, BoundingBox, NewAlert},
    camera::{Camera, CameraPatch},
    error::CoreError,
};

/// Connection pool plus schema management.
#[derive(Clone, Debug)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    /// Open a pool of up to ten connections.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pool shared with the repositories.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from [`MIGRATOR`].
    pub async fn initialize_schema(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to run migrations: {e}")))?;
        info!("database migrations applied");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CameraRow {
    id: String,
    name: String,
    rtsp_url: String,
    location: Option<String>,
    is_enabled: bool,
    is_streaming: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CameraRow> for Camera {
    fn from(row: CameraRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            rtsp_url: row.rtsp_url,
            location: row.location,
            is_enabled: row.is_enabled,
            is_streaming: row.is_streaming,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    camera_id: String,
    confidence: f64,
    bounding_box: Json<BoundingBox>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AlertRow> for Alert {
    fn from(row: AlertRow) -> Self {
        Self {
            id: row.id,
            camera_id: row.camera_id,
            confidence: row.confidence,
            bounding_box: row.bounding_box.0,
            image_url: row.image_url,
            created_at: row.created_at,
        }
    }
}

/// [`CameraRepository`] over the `cameras` table.
#[derive(Clone, Debug)]
pub struct PostgresCameraRepository {
    pool: PgPool,
}

impl PostgresCameraRepository {
    /// Repository sharing `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CameraRepository for PostgresCameraRepository {
    async fn get_camera(&self, id: &str) -> Result<Option<Camera>> {
        let row = sqlx::query_as::<_, CameraRow>(
            r#"
            SELECT id, name, rtsp_url, location, is_enabled, is_streaming, created_at, updated_at
            FROM cameras
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Camera::from))
    }

    async fn update_camera(&self, id: &str, patch: &CameraPatch) -> Result<Camera> {
        let row = sqlx::query_as::<_, CameraRow>(
            r#"
            UPDATE cameras
            SET is_enabled = COALESCE($2, is_enabled),
                is_streaming = COALESCE($3, is_streaming),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, rtsp_url, location, is_enabled, is_streaming, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.is_enabled)
        .bind(patch.is_streaming)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Camera::from)
            .ok_or_else(|| CoreError::camera_not_found(id))
    }
}

/// [`AlertRepository`] over the `alerts` table.
#[derive(Clone, Debug)]
pub struct PostgresAlertRepository {
    pool: PgPool,
}

impl PostgresAlertRepository {
    /// Repository sharing `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for PostgresAlertRepository {
    async fn create_alert(&self, alert: &NewAlert) -> Result<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            INSERT INTO alerts (id, camera_id, confidence, bounding_box, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, camera_id, confidence, bounding_box, image_url, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&alert.camera_id)
        .bind(alert.confidence)
        .bind(Json(alert.bounding_box))
        .bind(alert.image_url.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error()
                && db_err.is_foreign_key_violation()
            {
                return CoreError::camera_not_found(&alert.camera_id);
            }
            CoreError::Database(e)
        })?;

        Ok(row.into())
    }
}
