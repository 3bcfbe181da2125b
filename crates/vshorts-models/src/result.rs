//! Terminal outcome of a submission.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::asset::ContentId;

/// Classification of a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ErrorKind {
    /// Rejected locally: oversized asset or too-short text
    InputRejected,
    /// Transport failure while uploading the asset
    UploadFailed,
    /// Unrecognized processing mode
    InvalidMode,
    /// A stage reported failure on the remote side
    StageFailed,
    /// A stage or the run exceeded its time budget
    StageTimeout,
    /// Anything else; the message carries the underlying error
    UnknownFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputRejected => "InputRejected",
            ErrorKind::UploadFailed => "UploadFailed",
            ErrorKind::InvalidMode => "InvalidMode",
            ErrorKind::StageFailed => "StageFailed",
            ErrorKind::StageTimeout => "StageTimeout",
            ErrorKind::UnknownFailure => "UnknownFailure",
        }
    }

    /// Whether the error was detected before any network call.
    pub fn is_local(&self) -> bool {
        matches!(self, ErrorKind::InputRejected | ErrorKind::InvalidMode)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result boundary handed back to the presentation layer.
///
/// A success always carries a download URL; a failure never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Name of the stage whose failure ended the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<ContentId>,
}

impl ProcessingResult {
    /// A successful result.
    pub fn success(download_url: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            download_url: Some(download_url.into()),
            error: None,
            error_kind: None,
            failed_stage: None,
            processing_time_ms: Some(processing_time_ms),
            output_bytes: None,
            content_id: None,
        }
    }

    /// A failed result.
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            download_url: None,
            error: Some(message.into()),
            error_kind: Some(kind),
            failed_stage: None,
            processing_time_ms: None,
            output_bytes: None,
            content_id: None,
        }
    }

    pub fn with_failed_stage(mut self, stage: impl Into<String>) -> Self {
        self.failed_stage = Some(stage.into());
        self
    }

    pub fn with_processing_time(mut self, ms: u64) -> Self {
        self.processing_time_ms = Some(ms);
        self
    }

    pub fn with_output_bytes(mut self, bytes: Option<u64>) -> Self {
        self.output_bytes = bytes;
        self
    }

    pub fn with_content_id(mut self, content_id: Option<ContentId>) -> Self {
        self.content_id = content_id;
        self
    }
}
