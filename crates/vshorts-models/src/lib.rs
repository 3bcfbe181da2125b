//! Shared data models for the vshorts orchestration layer.
//!
//! This crate provides Serde-serializable types for:
//! - Submitted assets and remote content identifiers
//! - Processing modes and output/encoding parameters
//! - Transformation plans (a validated DAG of stages)
//! - Pipeline runs and their stage state machine
//! - The result and status boundaries exposed to callers
//! - The local text submission guard

pub mod asset;
pub mod mode;
pub mod plan;
pub mod result;
pub mod run;
pub mod status;
pub mod text;
pub mod transform;

// Re-export common types
pub use asset::{Asset, AssetSource, ContentId, MediaKind, UploadReceipt};
pub use mode::{ModeParseError, ProcessingMode};
pub use plan::{
    ArtifactRef, PlanError, PlanKind, StageId, StageKind, StageOperation, StageSpec,
    TransformationPlan,
};
pub use result::{ErrorKind, ProcessingResult};
pub use run::{
    FailureReason, PipelineRun, RunFailure, RunId, RunStatus, StageRecord, StageStatus,
    TransitionError,
};
pub use status::{SessionStatus, StatusSnapshot};
pub use text::{word_count, TextAdvice, TextGuard, TextRejected};
pub use transform::{
    CropMode, FormatParseError, FrameSpec, Gravity, OutputFormat, QualityParseError, QualityTier,
    SubtitleFormat,
};
