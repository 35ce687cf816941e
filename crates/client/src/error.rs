/// Errors from the job API client layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The progress sink refused an update.
    #[error("Progress update failed: {0}")]
    Sink(String),
}

impl ClientError {
    /// Whether the server rejected the submission because its queue is full.
    pub fn is_queue_full(&self) -> bool {
        matches!(self, ClientError::ApiError { status: 429, .. })
    }
}
