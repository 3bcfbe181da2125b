//! Result resolver.

use vshorts_models::{ErrorKind, FailureReason, PipelineRun, ProcessingResult, RunStatus};
use vshorts_storage::DeliveryUrlBuilder;

/// Turns a terminal run into the caller-facing result.
#[derive(Debug, Clone)]
pub struct ResultResolver {
    delivery: DeliveryUrlBuilder,
}

impl ResultResolver {
    pub fn new(delivery: DeliveryUrlBuilder) -> Self {
        Self { delivery }
    }

    /// Resolve a run.
    ///
    /// A URL is only produced for a `done` run whose terminal stage carries
    /// an artifact. Anything else becomes a classified failure.
    pub fn resolve(&self, run: &PipelineRun) -> ProcessingResult {
        let elapsed = run.elapsed_ms();

        match run.status {
            RunStatus::Done => {
                let Some((artifact, bytes)) = run
                    .terminal_record()
                    .and_then(|r| r.artifact.as_ref().map(|artifact| (artifact, r.output_bytes)))
                else {
                    return ProcessingResult::failure(
                        ErrorKind::UnknownFailure,
                        "Pipeline finished without a final artifact",
                    )
                    .with_processing_time(elapsed);
                };
                let delivery = self
                    .delivery
                    .url_for(artifact, run.output_format.unwrap_or_default());

                ProcessingResult::success(delivery.url, elapsed)
                    .with_output_bytes(bytes)
                    .with_content_id(Some(artifact.clone()))
            }
            RunStatus::Failed => {
                let (kind, message, stage) = match &run.failure {
                    Some(failure) => (
                        classify(failure.reason),
                        failure.message.clone(),
                        failure.stage_name.clone(),
                    ),
                    None => (
                        ErrorKind::UnknownFailure,
                        "Pipeline failed without a recorded cause".to_string(),
                        None,
                    ),
                };

                let result = ProcessingResult::failure(kind, message).with_processing_time(elapsed);
                match stage {
                    Some(stage) => result.with_failed_stage(stage),
                    None => result,
                }
            }
            RunStatus::Pending | RunStatus::Running => ProcessingResult::failure(
                ErrorKind::UnknownFailure,
                format!("Pipeline run is still {}", run.status),
            ),
        }
    }
}

fn classify(reason: FailureReason) -> ErrorKind {
    match reason {
        FailureReason::Failed => ErrorKind::StageFailed,
        FailureReason::Timeout => ErrorKind::StageTimeout,
        FailureReason::EngineError | FailureReason::Abandoned => ErrorKind::UnknownFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vshorts_models::{ContentId, StageId};
    use vshorts_storage::DeliveryConfig;

    use crate::config::PipelineConfig;
    use crate::planner::{stages, Planner};

    fn resolver() -> ResultResolver {
        ResultResolver::new(DeliveryUrlBuilder::new(DeliveryConfig::default()))
    }

    fn simple_run() -> PipelineRun {
        let plan = Planner::new(&PipelineConfig::default())
            .build_plan(&ContentId::from("src"), "simple")
            .unwrap();
        PipelineRun::new(&plan)
    }

    #[test]
    fn test_done_run_resolves_to_url() {
        let mut run = simple_run();
        let stage = StageId::new(stages::REFORMAT);
        run.start_stage(&stage).unwrap();
        run.complete_stage(&stage, ContentId::from("final_out"), Some(2048))
            .unwrap();
        run.finish().unwrap();

        let result = resolver().resolve(&run);
        assert!(result.success);
        assert_eq!(
            result.download_url.as_deref(),
            Some("https://res.cloudinary.com/demo/video/upload/final_out.mp4")
        );
        assert_eq!(result.output_bytes, Some(2048));
        assert!(result.processing_time_ms.is_some());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_failed_stage_is_classified_with_verbatim_message() {
        let mut run = simple_run();
        let stage = StageId::new(stages::REFORMAT);
        run.start_stage(&stage).unwrap();
        run.fail_stage(&stage, FailureReason::Failed, "Invalid video codec")
            .unwrap();

        let result = resolver().resolve(&run);
        assert!(!result.success);
        assert!(result.download_url.is_none());
        assert_eq!(result.error_kind, Some(ErrorKind::StageFailed));
        assert_eq!(result.error.as_deref(), Some("Invalid video codec"));
        assert_eq!(result.failed_stage.as_deref(), Some("Vertical reformat"));
    }

    #[test]
    fn test_failure_reason_mapping() {
        assert_eq!(classify(FailureReason::Timeout), ErrorKind::StageTimeout);
        assert_eq!(classify(FailureReason::EngineError), ErrorKind::UnknownFailure);
        assert_eq!(classify(FailureReason::Abandoned), ErrorKind::UnknownFailure);
    }

    #[test]
    fn test_unfinished_run_never_yields_url() {
        let mut run = simple_run();
        run.start_stage(&StageId::new(stages::REFORMAT)).unwrap();

        let result = resolver().resolve(&run);
        assert!(!result.success);
        assert!(result.download_url.is_none());
        assert_eq!(result.error_kind, Some(ErrorKind::UnknownFailure));
    }
}
