//! Status boundary exposed while a submission is in flight.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse submission status, as rendered by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Uploading,
    Processing,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Uploading => "uploading",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of a submission's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct StatusSnapshot {
    pub status: SessionStatus,
    pub message: String,
    /// Upload percentage, only set while uploading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl StatusSnapshot {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn uploading(percent: u8) -> Self {
        let percent = percent.min(100);
        Self {
            status: SessionStatus::Uploading,
            message: format!("Uploading... {}%", percent),
            progress: Some(percent),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Processing,
            message: message.into(),
            progress: None,
        }
    }

    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Completed,
            message: message.into(),
            progress: None,
        }
    }

    /// Error snapshot; the message is rendered verbatim with a retry action.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Error,
            message: format!("Error: {}", message.into()),
            progress: None,
        }
    }
}
