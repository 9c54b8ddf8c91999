use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use tracing::debug;
use url::Url;

use super::{DetectionWorker, WorkerCommand, WorkerError};
use crate::error::{self, CoreError};

/// Client for the worker's `POST /cameras/{id}/{start|stop}` endpoints.
#[derive(Debug, Clone)]
pub struct HttpDetectionWorker {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpDetectionWorker {
    /// Parse `base_url` and build a client whose requests give up after
    /// `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> error::Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CoreError::Validation(format!("invalid worker URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CoreError::Validation(format!(
                "worker URL {base_url} cannot carry a path"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal(format!("failed to build worker client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Root every command path is appended to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn command_url(&self, camera_id: &str, command: WorkerCommand) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["cameras", camera_id, command.as_str()]);
        }
        url
    }

    async fn send_command(&self, camera_id: &str, command: WorkerCommand) -> Result<(), WorkerError> {
        let url = self.command_url(camera_id, command);
        debug!(camera_id, %command, %url, "sending worker command");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(WorkerError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn classify(&self, err: reqwest::Error) -> WorkerError {
        if err.is_timeout() {
            WorkerError::Timeout(self.timeout)
        } else {
            WorkerError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl DetectionWorker for HttpDetectionWorker {
    async fn start_camera(&self, camera_id: &str) -> Result<(), WorkerError> {
        self.send_command(camera_id, WorkerCommand::Start).await
    }

    async fn stop_camera(&self, camera_id: &str) -> Result<(), WorkerError> {
        self.send_command(camera_id, WorkerCommand::Stop).await
    }
}
