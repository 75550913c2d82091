use thiserror::Error;

use super::controller::WorkerState;

#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Failed to cache {url}: {source}")]
    Install {
        url: String,
        #[source]
        source: Box<OfflineError>,
    },

    #[error("Cache storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache partition: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Worker is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: WorkerState,
        actual: WorkerState,
    },

    #[error("Unknown control message: {0}")]
    UnknownMessage(String),
}

/// Maximum length for response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

impl OfflineError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    /// Error for a response that cannot be cached during install.
    pub fn from_status(status: u16, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            404 | 410 => OfflineError::NotFound(truncated),
            500..=599 => OfflineError::ServerError(truncated),
            _ => OfflineError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(OfflineError::from_status(404, ""), OfflineError::NotFound(_)));
        assert!(matches!(OfflineError::from_status(503, ""), OfflineError::ServerError(_)));
        assert!(matches!(
            OfflineError::from_status(301, ""),
            OfflineError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "ñ".repeat(300);
        let OfflineError::NotFound(message) = OfflineError::from_status(404, &body) else {
            panic!("expected not found");
        };
        assert!(message.contains("truncated"));
        assert!(message.contains("600 total bytes"));
    }
}
