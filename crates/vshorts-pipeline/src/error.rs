//! Pipeline error types.

use thiserror::Error;
use vshorts_engine::EngineError;
use vshorts_models::{ErrorKind, ModeParseError, PlanError, TextRejected, TransitionError};
use vshorts_storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised outside of a running pipeline.
///
/// Failures of individual stages are recorded on the run itself and
/// classified by the resolver; these are the errors that prevent a run from
/// starting or that indicate a broken invariant.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid processing mode: {0}")]
    InvalidMode(#[from] ModeParseError),

    #[error("{0}")]
    InputRejected(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid plan: {0}")]
    Plan(#[from] PlanError),

    #[error("Run state error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl From<TextRejected> for PipelineError {
    fn from(e: TextRejected) -> Self {
        Self::InputRejected(e.to_string())
    }
}

impl PipelineError {
    /// Classify into the error taxonomy surfaced to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidMode(_) => ErrorKind::InvalidMode,
            PipelineError::InputRejected(_) => ErrorKind::InputRejected,
            PipelineError::Storage(e) if e.is_rejected_locally() => ErrorKind::InputRejected,
            PipelineError::Storage(_) => ErrorKind::UploadFailed,
            PipelineError::Plan(_)
            | PipelineError::Transition(_)
            | PipelineError::Engine(_) => ErrorKind::UnknownFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err: PipelineError = ModeParseError("turbo".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidMode);
        assert_eq!(err.to_string(), "Invalid processing mode: Unknown processing mode: turbo");

        let err: PipelineError = StorageError::too_large(200, 100).into();
        assert_eq!(err.kind(), ErrorKind::InputRejected);

        let err: PipelineError = StorageError::upload_failed(Some(503), "unavailable").into();
        assert_eq!(err.kind(), ErrorKind::UploadFailed);

        let err: PipelineError = PlanError::Empty.into();
        assert_eq!(err.kind(), ErrorKind::UnknownFailure);
    }

    #[test]
    fn test_text_rejection_message() {
        let err: PipelineError = TextRejected {
            words: 5,
            min_words: 10,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InputRejected);
        assert!(err.to_string().starts_with("Please enter at least 10 words"));
    }
}
