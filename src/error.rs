use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::batch::ItemId;

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Invalid quality value: {0}. Must be between 10 and 100")]
    InvalidQuality(u8),

    #[error("Image could not be encoded: {0}")]
    Encode(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("File too large: {0} bytes. Maximum allowed: {1} bytes")]
    FileTooLarge(u64, u64),

    #[error("No image files found in input path: {0}")]
    NoImageFilesFound(String),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),

    #[error("Invalid caption settings: {0}")]
    InvalidSettings(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<CaptionError>,
    },

    #[error("Invalid response from caption service: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Item {0} is being processed and cannot be removed")]
    ItemBusy(ItemId),

    #[error("A batch run is already in progress")]
    BatchRunning,
}

impl CaptionError {
    /// Connection failures, timeouts and 5xx responses may succeed on resubmission.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CaptionError::Network(_) | CaptionError::Timeout(_) | CaptionError::Server { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CaptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CaptionError::Network("refused".into()).is_retryable());
        assert!(CaptionError::Timeout(Duration::from_secs(60)).is_retryable());
        assert!(CaptionError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());

        assert!(!CaptionError::Client {
            status: 400,
            message: "bad image".into()
        }
        .is_retryable());
        assert!(!CaptionError::InvalidResponse("truncated".into()).is_retryable());
        assert!(!CaptionError::RetriesExhausted {
            attempts: 4,
            last: Box::new(CaptionError::Network("reset".into())),
        }
        .is_retryable());
    }

    #[test]
    fn test_retries_exhausted_message_carries_last_error() {
        let err = CaptionError::RetriesExhausted {
            attempts: 4,
            last: Box::new(CaptionError::Server {
                status: 503,
                message: "Service Unavailable".into(),
            }),
        };
        let message = err.to_string();
        assert!(message.contains("4 attempts"));
        assert!(message.contains("503"));
    }
}
