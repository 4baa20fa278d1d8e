//! Error types for the SkillConnect SDK

use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types
///
/// Payloads are plain strings so an error can be both returned to the caller
/// and published as a user-visible notice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// Bad input shape, resolved locally and never sent to the network
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Entity is not present in local state (or the server says it is gone)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server declined the mutation
    #[error("Rejected by server ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// The server could not be reached
    #[error("Network error: {0}")]
    Transport(String),

    /// Credential missing, expired or revoked
    #[error("Not authorized; sign in again")]
    Unauthorized,

    /// No response within the configured deadline
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Response body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An unresolved intent already owns a field that cannot be superseded
    #[error("Another change is still pending: {0}")]
    Conflict(String),
}

impl SdkError {
    /// Transport-class failures (network, timeout); only the message differs
    /// from a server rejection, recovery is the same.
    pub fn is_transport(&self) -> bool {
        matches!(self, SdkError::Transport(_) | SdkError::Timeout(_))
    }

    /// Errors that come back from a remote call, as opposed to local checks
    pub fn is_remote(&self) -> bool {
        !matches!(
            self,
            SdkError::Validation(_) | SdkError::Config(_) | SdkError::Conflict(_)
        )
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SdkError::Transport(format!("timed out: {}", err))
        } else if err.is_decode() {
            SdkError::Serialization(err.to_string())
        } else {
            SdkError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<skillconnect_storage_client::StorageError> for SdkError {
    fn from(err: skillconnect_storage_client::StorageError) -> Self {
        SdkError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        SdkError::Storage(err.to_string())
    }
}

/// Media selection and upload failures
///
/// Each variant maps to its own user-facing message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// Selection would exceed the per-post limit; the whole batch is rejected
    #[error("You can only attach up to {max} media files (tried to add {attempted} to {existing})")]
    TooManyFiles {
        max: usize,
        existing: usize,
        attempted: usize,
    },

    /// One or more files were neither image nor video and were dropped
    #[error("Only images and videos are supported; skipped {}", .names.join(", "))]
    UnsupportedType { names: Vec<String> },

    /// A video exceeded the duration limit
    #[error("Video {name} is {seconds:.1}s long; videos must be {limit:.0} seconds or shorter")]
    VideoTooLong {
        name: String,
        seconds: f64,
        limit: f64,
    },

    /// Duration could not be read from a video
    #[error("Could not read the length of video {name}: {reason}")]
    MetadataProbeFailed { name: String, reason: String },

    /// No object store client is configured
    #[error("Media storage is unavailable; posts with media cannot be created right now")]
    UploadServiceUnavailable,

    /// Uploading the file at `file_index` failed; the batch is abandoned
    #[error("Upload of file {} failed: {reason}", .file_index + 1)]
    UploadFailed { file_index: usize, reason: String },

    /// Files were picked while `upload_all` was running
    #[error("Wait for the current upload to finish before adding more media")]
    UploadInProgress,

    /// Index does not name a pending item
    #[error("No media file at position {0}")]
    NoSuchItem(usize),

    /// The composer was closed
    #[error("The post composer is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(SdkError::Timeout(15).is_transport());
        assert!(SdkError::Transport("refused".into()).is_transport());
        assert!(!SdkError::RemoteRejected {
            status: 400,
            message: "bad".into()
        }
        .is_transport());
        assert!(!SdkError::Validation("empty".into()).is_remote());
    }

    #[test]
    fn test_media_messages_are_distinct() {
        let messages = [
            MediaError::TooManyFiles { max: 3, existing: 2, attempted: 2 }.to_string(),
            MediaError::UnsupportedType { names: vec!["a.pdf".into()] }.to_string(),
            MediaError::VideoTooLong { name: "v.mp4".into(), seconds: 31.0, limit: 30.0 }.to_string(),
            MediaError::MetadataProbeFailed { name: "v.mp4".into(), reason: "no moov".into() }.to_string(),
            MediaError::UploadServiceUnavailable.to_string(),
            MediaError::UploadFailed { file_index: 1, reason: "503".into() }.to_string(),
            MediaError::UploadInProgress.to_string(),
        ];

        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(messages[5].contains("file 2"));
    }
}
