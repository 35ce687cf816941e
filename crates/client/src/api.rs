//! REST client for the job API.
//!
//! Wraps submission, status and result reads using [`reqwest`].

use async_trait::async_trait;
use base64::Engine as _;
use motion_core::generation::GenerationSettings;
use motion_core::types::{JobId, UserId};
use serde::Serialize;

use crate::error::ClientError;
use crate::poller::StatusSource;
use crate::status::{Envelope, StatusPayload, Submitted};

/// HTTP client for one API deployment.
#[derive(Clone)]
pub struct MotionApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    user_id: UserId,
    image_data: String,
    #[serde(flatten)]
    settings: &'a GenerationSettings,
}

impl MotionApi {
    /// * `base_url` - e.g. `http://localhost:8000`, without a trailing slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit an image for generation.
    ///
    /// A full queue comes back as [`ClientError::ApiError`] with status 429;
    /// see [`ClientError::is_queue_full`].
    pub async fn submit(
        &self,
        user_id: UserId,
        image: &[u8],
        settings: &GenerationSettings,
    ) -> Result<Submitted, ClientError> {
        let body = SubmitBody {
            user_id,
            image_data: base64::engine::general_purpose::STANDARD.encode(image),
            settings,
        };

        let response = self
            .client
            .post(format!("{}/api/v1/jobs", self.base_url))
            .json(&body)
            .send()
            .await?;

        Ok(Self::parse_response::<Envelope<Submitted>>(response).await?.data)
    }

    /// `GET /api/v1/jobs/{id}/status`.
    pub async fn status(&self, job_id: JobId) -> Result<StatusPayload, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/{job_id}/status", self.base_url))
            .send()
            .await?;

        Ok(Self::parse_response::<Envelope<StatusPayload>>(response).await?.data)
    }

    /// `GET /api/v1/jobs/{id}/result`, returned as raw JSON.
    pub async fn result(&self, job_id: JobId) -> Result<serde_json::Value, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/{job_id}/result", self.base_url))
            .send()
            .await?;

        Ok(Self::parse_response::<Envelope<serde_json::Value>>(response).await?.data)
    }

    /// Download the finished video.
    pub async fn download(&self, job_id: JobId) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/{job_id}/download", self.base_url))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl StatusSource for MotionApi {
    async fn fetch_status(&self, job_id: JobId) -> Result<StatusPayload, ClientError> {
        self.status(job_id).await
    }
}
