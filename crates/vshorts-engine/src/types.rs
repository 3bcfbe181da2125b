//! Engine request/response types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use vshorts_models::{ContentId, RunId, StageId, StageKind, StageOperation};

/// Stage status as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl RemoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::Pending => "pending",
            RemoteStatus::Processing => "processing",
            RemoteStatus::Complete => "complete",
            RemoteStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Complete | RemoteStatus::Failed)
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One stage handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSubmission {
    pub run_id: RunId,
    pub stage_id: StageId,
    pub kind: StageKind,
    /// Declarative operation, for engines that prefer structured input
    pub operation: StageOperation,
    /// Input slot name -> concrete artifact
    pub inputs: BTreeMap<String, ContentId>,
    /// Operation rendered in the engine's URL grammar
    pub transformation: String,
}

/// Engine view of a submitted stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageState {
    pub ticket: String,
    pub status: RemoteStatus,
    /// Produced artifact, present once complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<ContentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    /// Remote error message, present once failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageState {
    pub fn pending(ticket: impl Into<String>) -> Self {
        Self {
            ticket: ticket.into(),
            status: RemoteStatus::Pending,
            artifact_id: None,
            bytes: None,
            error: None,
        }
    }

    pub fn processing(ticket: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Processing,
            ..Self::pending(ticket)
        }
    }

    pub fn complete(ticket: impl Into<String>, artifact: ContentId, bytes: Option<u64>) -> Self {
        Self {
            status: RemoteStatus::Complete,
            artifact_id: Some(artifact),
            bytes,
            ..Self::pending(ticket)
        }
    }

    pub fn failed(ticket: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Failed,
            error: Some(error.into()),
            ..Self::pending(ticket)
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
