//! Pipeline runs and the per-stage state machine.
//!
//! Stage statuses only move forward: `pending -> running -> {done | failed}`.
//! Once a stage or the run itself is terminal, further transitions are
//! rejected with a [`TransitionError`] instead of overwriting history.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::asset::ContentId;
use crate::plan::{PlanKind, StageId, StageKind, TransformationPlan};
use crate::transform::OutputFormat;

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Done => "done",
            StageStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Done | StageStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (StageStatus::Pending, StageStatus::Running)
                | (StageStatus::Running, StageStatus::Done)
                | (StageStatus::Running, StageStatus::Failed)
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run ended in failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The remote engine reported the stage as failed
    Failed,
    /// A stage or the whole run exceeded its time budget
    Timeout,
    /// The engine could not be reached or answered garbage
    EngineError,
    /// The caller abandoned the run
    Abandoned,
}

/// The first failure observed in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<StageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<String>,
    pub reason: FailureReason,
    pub message: String,
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Unknown stage: {0}")]
    UnknownStage(StageId),

    #[error("Stage '{stage}' cannot move from {from} to {to}")]
    IllegalTransition {
        stage: StageId,
        from: StageStatus,
        to: StageStatus,
    },

    #[error("Stage '{stage}' started before producer '{producer}' is done")]
    ProducerNotDone { stage: StageId, producer: StageId },

    #[error("Run is already {0}")]
    RunTerminal(RunStatus),

    #[error("Run cannot complete: stage '{0}' is not done")]
    Incomplete(StageId),
}

/// Tracked state of one stage within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StageRecord {
    pub stage_id: StageId,
    pub name: String,
    pub kind: StageKind,
    pub status: StageStatus,
    /// Producers that must be done before this stage may start
    pub depends_on: Vec<StageId>,
    /// Remote handle returned on submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    /// Artifact produced once done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ContentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StageRecord {
    fn transition(&mut self, next: StageStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::IllegalTransition {
                stage: self.stage_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// One execution of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineRun {
    pub id: RunId,
    pub plan_kind: PlanKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<ContentId>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StageId>,
    pub stages: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    /// Container of the terminal stage's output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Create a pending run for a plan; every stage starts `pending`.
    pub fn new(plan: &TransformationPlan) -> Self {
        let stages = plan
            .stages()
            .iter()
            .map(|spec| StageRecord {
                stage_id: spec.id.clone(),
                name: spec.name.clone(),
                kind: spec.kind(),
                status: StageStatus::Pending,
                depends_on: spec.dependencies().into_iter().cloned().collect(),
                ticket: None,
                artifact: None,
                output_bytes: None,
                error: None,
                started_at: None,
                finished_at: None,
            })
            .collect();

        Self {
            id: RunId::new(),
            plan_kind: plan.kind(),
            content_id: plan.content_id().cloned(),
            status: RunStatus::Pending,
            current_stage: None,
            stages,
            failure: None,
            output_format: plan.terminal_stage().operation.output_format(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn stage(&self, id: &StageId) -> Option<&StageRecord> {
        self.stages.iter().find(|s| &s.stage_id == id)
    }

    /// Record of the last declared stage.
    pub fn terminal_record(&self) -> Option<&StageRecord> {
        self.stages.last()
    }

    /// Artifact produced by a done stage.
    pub fn artifact_of(&self, id: &StageId) -> Option<&ContentId> {
        self.stage(id)
            .filter(|s| s.status == StageStatus::Done)
            .and_then(|s| s.artifact.as_ref())
    }

    /// Wall-clock time since the run was created, frozen once terminal.
    pub fn elapsed_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }

    fn ensure_open(&self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::RunTerminal(self.status));
        }
        Ok(())
    }

    fn stage_mut(&mut self, id: &StageId) -> Result<&mut StageRecord, TransitionError> {
        self.stages
            .iter_mut()
            .find(|s| &s.stage_id == id)
            .ok_or_else(|| TransitionError::UnknownStage(id.clone()))
    }

    /// Move a stage to `running`. All of its producers must be `done`.
    pub fn start_stage(&mut self, id: &StageId) -> Result<(), TransitionError> {
        self.ensure_open()?;

        let depends_on = self
            .stage(id)
            .ok_or_else(|| TransitionError::UnknownStage(id.clone()))?
            .depends_on
            .clone();
        for producer in depends_on {
            let done = self
                .stage(&producer)
                .map(|p| p.status == StageStatus::Done)
                .unwrap_or(false);
            if !done {
                return Err(TransitionError::ProducerNotDone {
                    stage: id.clone(),
                    producer,
                });
            }
        }

        let record = self.stage_mut(id)?;
        record.transition(StageStatus::Running)?;
        record.started_at = Some(Utc::now());

        self.status = RunStatus::Running;
        self.current_stage = Some(id.clone());
        Ok(())
    }

    /// Remember the remote ticket of a running stage.
    pub fn attach_ticket(&mut self, id: &StageId, ticket: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_open()?;
        let record = self.stage_mut(id)?;
        if record.status != StageStatus::Running {
            return Err(TransitionError::IllegalTransition {
                stage: id.clone(),
                from: record.status,
                to: StageStatus::Running,
            });
        }
        record.ticket = Some(ticket.into());
        Ok(())
    }

    /// Move a running stage to `done` with the artifact it produced.
    pub fn complete_stage(
        &mut self,
        id: &StageId,
        artifact: ContentId,
        output_bytes: Option<u64>,
    ) -> Result<(), TransitionError> {
        self.ensure_open()?;
        let record = self.stage_mut(id)?;
        record.transition(StageStatus::Done)?;
        record.artifact = Some(artifact);
        record.output_bytes = output_bytes;
        record.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Move a running stage to `failed` and fail the whole run.
    pub fn fail_stage(
        &mut self,
        id: &StageId,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.ensure_open()?;
        let message = message.into();
        let record = self.stage_mut(id)?;
        record.transition(StageStatus::Failed)?;
        record.error = Some(message.clone());
        record.finished_at = Some(Utc::now());
        let stage_name = record.name.clone();

        self.fail_run(RunFailure {
            stage_id: Some(id.clone()),
            stage_name: Some(stage_name),
            reason,
            message,
        });
        Ok(())
    }

    /// Fail the run outside of any single stage (abandonment, run timeout).
    ///
    /// A stage still `running` is failed with the same message.
    pub fn abort(&mut self, reason: FailureReason, message: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_open()?;
        let message = message.into();

        let running = self
            .stages
            .iter()
            .find(|s| s.status == StageStatus::Running)
            .map(|s| s.stage_id.clone());

        match running {
            Some(id) => self.fail_stage(&id, reason, message),
            None => {
                self.fail_run(RunFailure {
                    stage_id: None,
                    stage_name: None,
                    reason,
                    message,
                });
                Ok(())
            }
        }
    }

    /// Mark the run `done`. Every stage must be `done`.
    pub fn finish(&mut self) -> Result<(), TransitionError> {
        self.ensure_open()?;
        if let Some(pending) = self.stages.iter().find(|s| s.status != StageStatus::Done) {
            return Err(TransitionError::Incomplete(pending.stage_id.clone()));
        }
        self.status = RunStatus::Done;
        self.current_stage = None;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn fail_run(&mut self, failure: RunFailure) {
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ProcessingMode;
    use crate::plan::{ArtifactRef, StageOperation, StageSpec};
    use crate::transform::{FrameSpec, QualityTier, SubtitleFormat};

    fn two_stage_plan() -> TransformationPlan {
        TransformationPlan::new(
            PlanKind::Video(ProcessingMode::Advanced),
            Some(ContentId::from("src")),
            vec![
                StageSpec::new(
                    "captions",
                    "Caption generation",
                    StageOperation::Captions {
                        source: ArtifactRef::Content(ContentId::from("src")),
                        format: SubtitleFormat::Srt,
                        language: "en-US".to_string(),
                    },
                ),
                StageSpec::new(
                    "merge",
                    "Final merge",
                    StageOperation::Merge {
                        top: ArtifactRef::Content(ContentId::from("src")),
                        bottom: ArtifactRef::Stage(StageId::new("captions")),
                        frame: FrameSpec::vertical(),
                        quality: QualityTier::Auto,
                        format: OutputFormat::Mp4,
                        progressive: true,
                    },
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_run_is_pending() {
        let run = PipelineRun::new(&two_stage_plan());
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.stages.iter().all(|s| s.status == StageStatus::Pending));
        assert_eq!(run.output_format, Some(OutputFormat::Mp4));
    }

    #[test]
    fn test_consumer_cannot_start_before_producer() {
        let mut run = PipelineRun::new(&two_stage_plan());
        let err = run.start_stage(&StageId::new("merge")).unwrap_err();
        assert!(matches!(err, TransitionError::ProducerNotDone { .. }));
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut run = PipelineRun::new(&two_stage_plan());
        let captions = StageId::new("captions");
        let merge = StageId::new("merge");

        run.start_stage(&captions).unwrap();
        run.attach_ticket(&captions, "t-1").unwrap();
        run.complete_stage(&captions, ContentId::from("src_subtitles"), None)
            .unwrap();
        run.start_stage(&merge).unwrap();
        run.complete_stage(&merge, ContentId::from("final"), Some(1024))
            .unwrap();
        run.finish().unwrap();

        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.artifact_of(&merge), Some(&ContentId::from("final")));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_done_stage_never_reverts() {
        let mut run = PipelineRun::new(&two_stage_plan());
        let captions = StageId::new("captions");
        run.start_stage(&captions).unwrap();
        run.complete_stage(&captions, ContentId::from("subs"), None).unwrap();

        let err = run.start_stage(&captions).unwrap_err();
        assert!(matches!(err, TransitionError::IllegalTransition { .. }));
        assert_eq!(run.stage(&captions).unwrap().status, StageStatus::Done);
    }

    #[test]
    fn test_failure_is_terminal_and_first_wins() {
        let mut run = PipelineRun::new(&two_stage_plan());
        let captions = StageId::new("captions");
        run.start_stage(&captions).unwrap();
        run.fail_stage(&captions, FailureReason::Failed, "no audio track")
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        let failure = run.failure.clone().unwrap();
        assert_eq!(failure.message, "no audio track");
        assert_eq!(failure.stage_name.as_deref(), Some("Caption generation"));

        let err = run.abort(FailureReason::Abandoned, "late").unwrap_err();
        assert_eq!(err, TransitionError::RunTerminal(RunStatus::Failed));
        assert_eq!(run.failure.unwrap().message, "no audio track");
    }

    #[test]
    fn test_abort_fails_running_stage() {
        let mut run = PipelineRun::new(&two_stage_plan());
        let captions = StageId::new("captions");
        run.start_stage(&captions).unwrap();
        run.abort(FailureReason::Timeout, "run exceeded 600s").unwrap();

        assert_eq!(run.stage(&captions).unwrap().status, StageStatus::Failed);
        assert_eq!(run.failure.unwrap().reason, FailureReason::Timeout);
    }

    #[test]
    fn test_finish_requires_all_stages_done() {
        let mut run = PipelineRun::new(&two_stage_plan());
        let err = run.finish().unwrap_err();
        assert_eq!(err, TransitionError::Incomplete(StageId::new("captions")));
    }
}
