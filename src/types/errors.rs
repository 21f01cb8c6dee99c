/// Failure of a single upstream request.
///
/// Every variant is retryable: the ingestion loop treats a malformed body exactly like a
/// connection failure and lets the retry controller decide whether to retry, rotate or abandon.
/// Schema gaps inside an otherwise valid pool body are not errors at all (see `pools::normalize`).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error from {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },
}

impl FetchError {
    pub fn transport(url: &str, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(url: &str, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Status { .. } | Self::MalformedResponse { .. } => true,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::MalformedResponse { url, .. } => url,
        }
    }
}
