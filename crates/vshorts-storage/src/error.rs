//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to the media store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("File too large: {size_mb:.1}MB exceeds the {max_mb:.0}MB limit")]
    AssetTooLarge {
        size_bytes: u64,
        max_bytes: u64,
        size_mb: f64,
        max_mb: f64,
    },

    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("Upload failed{}: {message}", status_suffix(status))]
    UploadFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid store response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn too_large(size_bytes: u64, max_bytes: u64) -> Self {
        const MIB: f64 = 1024.0 * 1024.0;
        Self::AssetTooLarge {
            size_bytes,
            max_bytes,
            size_mb: size_bytes as f64 / MIB,
            max_mb: max_bytes as f64 / MIB,
        }
    }

    pub fn upload_failed(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::UploadFailed {
            status,
            message: msg.into(),
        }
    }

    /// Whether the asset was rejected locally, before any network call.
    pub fn is_rejected_locally(&self) -> bool {
        matches!(
            self,
            StorageError::AssetTooLarge { .. } | StorageError::UnsupportedAsset(_)
        )
    }

    /// HTTP status reported by the store, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            StorageError::UploadFailed { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        Self::UploadFailed {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_large_message() {
        let err = StorageError::too_large(150 * 1024 * 1024, 100 * 1024 * 1024);
        assert_eq!(err.to_string(), "File too large: 150.0MB exceeds the 100MB limit");
        assert!(err.is_rejected_locally());
    }

    #[test]
    fn test_upload_failed_carries_status() {
        let err = StorageError::upload_failed(Some(502), "bad gateway");
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.to_string(), "Upload failed (502): bad gateway");

        let err = StorageError::upload_failed(None, "connection reset");
        assert_eq!(err.to_string(), "Upload failed: connection reset");
    }
}
