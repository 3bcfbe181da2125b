//! Pipeline executor and status tracker.
//!
//! Walks a plan's stages in declared order. A stage is only started once
//! every producer it consumes is `done`; the plan constructor guarantees that
//! declared order already satisfies this, so the walk never reorders or skips.
//! Each stage is submitted once and then polled at a bounded interval until
//! the engine reports a terminal status, the stage times out, or the run is
//! cancelled. The first failure ends the run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};
use vshorts_engine::{RemoteStatus, StageSubmission, TransformEngine};
use vshorts_models::{
    ArtifactRef, ContentId, FailureReason, PipelineRun, StageKind, StageSpec, StageStatus,
    TransformationPlan,
};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::logging::RunLogger;
use crate::metrics;

/// Message recorded when a run is abandoned by its caller.
pub const ABANDONED_MESSAGE: &str = "pipeline run abandoned";

/// Timing knobs for the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub poll_interval: Duration,
    pub stage_timeout: Duration,
    pub caption_timeout: Duration,
    pub run_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for ExecutorSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            stage_timeout: config.stage_timeout,
            caption_timeout: config.caption_timeout,
            run_timeout: config.run_timeout,
        }
    }
}

impl ExecutorSettings {
    /// Time budget for one stage of the given kind.
    pub fn timeout_for(&self, kind: StageKind) -> Duration {
        match kind {
            StageKind::CaptionGeneration => self.caption_timeout,
            _ => self.stage_timeout,
        }
    }
}

/// How a single stage ended.
#[derive(Debug)]
enum StageOutcome {
    Done {
        artifact: ContentId,
        bytes: Option<u64>,
    },
    Failed(String),
    TimedOut(String),
    EngineError(String),
    Cancelled,
}

impl StageOutcome {
    fn label(&self) -> &'static str {
        match self {
            StageOutcome::Done { .. } => "done",
            StageOutcome::Failed(_) => "failed",
            StageOutcome::TimedOut(_) => "timeout",
            StageOutcome::EngineError(_) => "engine_error",
            StageOutcome::Cancelled => "abandoned",
        }
    }
}

/// Executes transformation plans against a remote engine.
///
/// Holds no per-run state; one executor can drive any number of concurrent
/// runs.
#[derive(Clone)]
pub struct PipelineExecutor {
    engine: Arc<dyn TransformEngine>,
    settings: ExecutorSettings,
}

impl PipelineExecutor {
    pub fn new(engine: Arc<dyn TransformEngine>, settings: ExecutorSettings) -> Self {
        Self { engine, settings }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<dyn TransformEngine> {
        &self.engine
    }

    /// Execute a plan to a terminal run.
    pub async fn execute(
        &self,
        plan: &TransformationPlan,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineRun> {
        self.execute_observed(plan, cancel, &|_| {}).await
    }

    /// Execute a plan, handing every state change of the run to `observer`.
    ///
    /// The returned run is always terminal. An `Err` means a run invariant
    /// was violated, never that a stage failed.
    pub async fn execute_observed(
        &self,
        plan: &TransformationPlan,
        cancel: &CancellationToken,
        observer: &(dyn Fn(&PipelineRun) + Send + Sync),
    ) -> PipelineResult<PipelineRun> {
        let mut run = PipelineRun::new(plan);
        let logger = RunLogger::new(&run.id, plan.kind().label());
        let span = logger.span();

        logger.started(plan.len(), self.engine.name());
        observer(&run);

        let mut in_flight = None;
        let driven = tokio::time::timeout(
            self.settings.run_timeout,
            self.drive(plan, &mut run, cancel, observer, &logger, &mut in_flight)
                .instrument(span),
        )
        .await;

        match driven {
            Ok(result) => result?,
            Err(_) => {
                if let Some((kind, started)) = in_flight {
                    metrics::record_stage_duration(kind.as_str(), "timeout", started.elapsed().as_secs_f64());
                }
                if !run.is_terminal() {
                    let message = format!(
                        "Pipeline exceeded its {}s time limit",
                        self.settings.run_timeout.as_secs()
                    );
                    logger.warning(&message);
                    run.abort(FailureReason::Timeout, message)?;
                    observer(&run);
                }
            }
        }

        match &run.failure {
            None => logger.completed(run.elapsed_ms()),
            Some(failure) => logger.failed(&format!(
                "{} ({:?}) after {}ms",
                failure.message,
                failure.reason,
                run.elapsed_ms()
            )),
        }

        Ok(run)
    }

    async fn drive(
        &self,
        plan: &TransformationPlan,
        run: &mut PipelineRun,
        cancel: &CancellationToken,
        observer: &(dyn Fn(&PipelineRun) + Send + Sync),
        logger: &RunLogger,
        in_flight: &mut Option<(StageKind, Instant)>,
    ) -> PipelineResult<()> {
        loop {
            if cancel.is_cancelled() {
                logger.warning(ABANDONED_MESSAGE);
                run.abort(FailureReason::Abandoned, ABANDONED_MESSAGE)?;
                observer(run);
                return Ok(());
            }

            let spec = match next_ready(plan, run) {
                Some(spec) => spec,
                None => break,
            };

            run.start_stage(&spec.id)?;
            logger.stage(spec, "running");
            observer(run);

            let started = Instant::now();
            *in_flight = Some((spec.kind(), started));
            let outcome = self.run_stage(run, spec, cancel, logger).await;
            *in_flight = None;

            metrics::record_stage_duration(
                spec.kind().as_str(),
                outcome.label(),
                started.elapsed().as_secs_f64(),
            );

            match outcome {
                StageOutcome::Done { artifact, bytes } => {
                    logger.stage(spec, &format!("done -> {}", artifact));
                    run.complete_stage(&spec.id, artifact, bytes)?;
                    observer(run);
                }
                StageOutcome::Failed(message) => {
                    return self.fail(run, spec, FailureReason::Failed, message, observer, logger);
                }
                StageOutcome::TimedOut(message) => {
                    return self.fail(run, spec, FailureReason::Timeout, message, observer, logger);
                }
                StageOutcome::EngineError(message) => {
                    return self.fail(run, spec, FailureReason::EngineError, message, observer, logger);
                }
                StageOutcome::Cancelled => {
                    return self.fail(
                        run,
                        spec,
                        FailureReason::Abandoned,
                        ABANDONED_MESSAGE.to_string(),
                        observer,
                        logger,
                    );
                }
            }
        }

        run.finish()?;
        observer(run);
        Ok(())
    }

    fn fail(
        &self,
        run: &mut PipelineRun,
        spec: &StageSpec,
        reason: FailureReason,
        message: String,
        observer: &(dyn Fn(&PipelineRun) + Send + Sync),
        logger: &RunLogger,
    ) -> PipelineResult<()> {
        logger.stage(spec, &format!("failed: {}", message));
        run.fail_stage(&spec.id, reason, message)?;
        observer(run);
        Ok(())
    }

    /// Submit one stage and wait for it, bounded by its timeout and the
    /// cancellation token.
    async fn run_stage(
        &self,
        run: &mut PipelineRun,
        spec: &StageSpec,
        cancel: &CancellationToken,
        logger: &RunLogger,
    ) -> StageOutcome {
        let inputs = match resolve_inputs(run, spec) {
            Ok(inputs) => inputs,
            Err(message) => return StageOutcome::EngineError(message),
        };

        let submission = StageSubmission {
            run_id: run.id.clone(),
            stage_id: spec.id.clone(),
            kind: spec.kind(),
            transformation: spec.operation.transformation(&inputs),
            operation: spec.operation.clone(),
            inputs,
        };

        debug!(
            run_id = %run.id,
            stage = %spec.id,
            transformation = %submission.transformation,
            "Submitting stage"
        );

        let timeout = self.settings.timeout_for(spec.kind());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => StageOutcome::Cancelled,
            waited = tokio::time::timeout(timeout, self.await_stage(run, &submission, logger)) => {
                match waited {
                    Ok(outcome) => outcome,
                    Err(_) => StageOutcome::TimedOut(format!(
                        "{} timed out after {}s",
                        spec.name,
                        timeout.as_secs()
                    )),
                }
            }
        }
    }

    /// Submit a stage and poll it to a terminal status. The ticket is
    /// recorded on the run as soon as the engine issues it.
    async fn await_stage(
        &self,
        run: &mut PipelineRun,
        submission: &StageSubmission,
        logger: &RunLogger,
    ) -> StageOutcome {
        let mut state = match self.engine.submit(submission).await {
            Ok(state) => state,
            Err(e) => return StageOutcome::EngineError(e.to_string()),
        };
        if let Err(e) = run.attach_ticket(&submission.stage_id, state.ticket.clone()) {
            return StageOutcome::EngineError(e.to_string());
        }

        loop {
            match state.status {
                RemoteStatus::Complete => {
                    return match state.artifact_id {
                        Some(artifact) => StageOutcome::Done {
                            artifact,
                            bytes: state.bytes,
                        },
                        None => StageOutcome::EngineError(format!(
                            "engine reported stage {} complete without an artifact",
                            submission.stage_id
                        )),
                    };
                }
                RemoteStatus::Failed => {
                    return StageOutcome::Failed(
                        state
                            .error
                            .unwrap_or_else(|| format!("stage {} failed", submission.stage_id)),
                    );
                }
                RemoteStatus::Pending | RemoteStatus::Processing => {
                    debug!(
                        run_id = %submission.run_id,
                        stage = %submission.stage_id,
                        ticket = %state.ticket,
                        "Stage {}", state.status
                    );
                }
            }

            tokio::time::sleep(self.settings.poll_interval).await;
            metrics::record_stage_poll(submission.kind.as_str());

            state = match self.engine.status(&state.ticket).await {
                Ok(next) => next,
                Err(e) => {
                    logger.warning(&format!("status query for {} failed: {}", submission.stage_id, e));
                    return StageOutcome::EngineError(e.to_string());
                }
            };
        }
    }
}

/// First pending stage, in declared order, whose producers are all done.
fn next_ready<'p>(plan: &'p TransformationPlan, run: &PipelineRun) -> Option<&'p StageSpec> {
    plan.stages().iter().find(|spec| {
        let pending = run
            .stage(&spec.id)
            .map(|r| r.status == StageStatus::Pending)
            .unwrap_or(false);
        pending
            && spec
                .dependencies()
                .iter()
                .all(|producer| run.artifact_of(producer).is_some())
    })
}

/// Map each input slot to a concrete artifact.
fn resolve_inputs(
    run: &PipelineRun,
    spec: &StageSpec,
) -> Result<BTreeMap<String, ContentId>, String> {
    spec.operation
        .inputs()
        .into_iter()
        .map(|(slot, input)| {
            let artifact = match input {
                ArtifactRef::Content(id) => id.clone(),
                ArtifactRef::Stage(producer) => run
                    .artifact_of(producer)
                    .cloned()
                    .ok_or_else(|| format!("stage {} has no output from {}", spec.id, producer))?,
            };
            Ok((slot.to_string(), artifact))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vshorts_engine::testing::{Script, ScriptedEngine};
    use vshorts_models::{ContentId, RunStatus, StageId};

    use crate::planner::{stages, Planner};

    fn settings() -> ExecutorSettings {
        ExecutorSettings {
            poll_interval: Duration::from_millis(100),
            stage_timeout: Duration::from_secs(30),
            caption_timeout: Duration::from_secs(60),
            run_timeout: Duration::from_secs(600),
        }
    }

    fn advanced_plan() -> TransformationPlan {
        Planner::new(&PipelineConfig::default())
            .build_plan(&ContentId::from("src"), "advanced")
            .unwrap()
    }

    fn executor(engine: Arc<ScriptedEngine>) -> PipelineExecutor {
        PipelineExecutor::new(engine, settings())
    }

    #[tokio::test(start_paused = true)]
    async fn test_advanced_run_completes_in_declared_order() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_stage(stages::CAPTIONS, Script::Complete { polls: 3 })
                .with_stage(stages::MERGE, Script::Complete { polls: 1 }),
        );
        let run = executor(engine.clone())
            .execute(&advanced_plan(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(
            engine.submitted_stages(),
            vec!["top", "captions", "bottom", "merge"]
        );
        assert!(run.stages.iter().all(|s| s.status == StageStatus::Done));
        assert_eq!(engine.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlay_consumes_caption_artifact() {
        let engine = Arc::new(ScriptedEngine::new());
        executor(engine.clone())
            .execute(&advanced_plan(), &CancellationToken::new())
            .await
            .unwrap();

        let overlay = engine
            .submissions()
            .into_iter()
            .find(|s| s.stage_id.as_str() == stages::BOTTOM)
            .unwrap();
        let captions_artifact = ScriptedEngine::artifact_for(&StageId::new(stages::CAPTIONS));
        assert_eq!(overlay.inputs.get("captions"), Some(&captions_artifact));
        assert!(overlay
            .transformation
            .contains(&format!("l_subtitles:{}", captions_artifact)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failure_stops_submission() {
        let engine = Arc::new(
            ScriptedEngine::new().with_stage(stages::CAPTIONS, Script::fail("No audio track found")),
        );
        let run = executor(engine.clone())
            .execute(&advanced_plan(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(engine.submitted_stages(), vec!["top", "captions"]);

        let failure = run.failure.unwrap();
        assert_eq!(failure.reason, FailureReason::Failed);
        assert_eq!(failure.message, "No audio track found");
        assert_eq!(failure.stage_name.as_deref(), Some("Caption generation"));

        let overlay = run.stages.iter().find(|s| s.stage_id.as_str() == stages::BOTTOM).unwrap();
        assert_eq!(overlay.status, StageStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caption_timeout_is_fatal() {
        let engine = Arc::new(ScriptedEngine::new().with_stage(stages::CAPTIONS, Script::Hang));
        let run = executor(engine.clone())
            .execute(&advanced_plan(), &CancellationToken::new())
            .await
            .unwrap();

        let failure = run.failure.unwrap();
        assert_eq!(failure.reason, FailureReason::Timeout);
        assert_eq!(failure.message, "Caption generation timed out after 60s");
        assert_eq!(engine.submitted_stages(), vec!["top", "captions"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timeout_bounds_total_time() {
        let engine = Arc::new(ScriptedEngine::new().with_stage(stages::CAPTIONS, Script::Hang));
        let executor = PipelineExecutor::new(
            engine,
            ExecutorSettings {
                run_timeout: Duration::from_secs(5),
                ..settings()
            },
        );
        let run = executor
            .execute(&advanced_plan(), &CancellationToken::new())
            .await
            .unwrap();

        let failure = run.failure.as_ref().unwrap();
        assert_eq!(failure.reason, FailureReason::Timeout);
        assert_eq!(failure.stage_id, Some(StageId::new(stages::CAPTIONS)));
        assert!(failure.message.contains("5s"));

        // The hanging stage keeps the ticket it was submitted under.
        let captions = run.stage(&StageId::new(stages::CAPTIONS)).unwrap();
        assert_eq!(captions.status, StageStatus::Failed);
        assert_eq!(captions.ticket.as_deref(), Some("ticket-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_error_fails_run() {
        let engine = Arc::new(
            ScriptedEngine::new().with_stage(stages::TOP, Script::Reject("connection refused".to_string())),
        );
        let run = executor(engine)
            .execute(&advanced_plan(), &CancellationToken::new())
            .await
            .unwrap();

        let failure = run.failure.unwrap();
        assert_eq!(failure.reason, FailureReason::EngineError);
        assert!(failure.message.contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let engine = Arc::new(ScriptedEngine::new().with_stage(stages::CAPTIONS, Script::Hang));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let run = executor(engine.clone())
            .execute(&advanced_plan(), &cancel)
            .await
            .unwrap();

        let failure = run.failure.unwrap();
        assert_eq!(failure.reason, FailureReason::Abandoned);
        assert_eq!(failure.message, ABANDONED_MESSAGE);

        let polls = engine.status_calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.status_calls(), polls);
        assert_eq!(engine.submitted_stages(), vec!["top", "captions"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_submits_nothing() {
        let engine = Arc::new(ScriptedEngine::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let run = executor(engine.clone())
            .execute(&advanced_plan(), &cancel)
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(engine.submitted_stages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_monotonic_stage_history() {
        use std::sync::Mutex;

        let engine = Arc::new(ScriptedEngine::new());
        let seen: Mutex<Vec<Vec<StageStatus>>> = Mutex::new(Vec::new());
        let observer = |run: &PipelineRun| {
            seen.lock()
                .unwrap()
                .push(run.stages.iter().map(|s| s.status).collect());
        };

        executor(engine)
            .execute_observed(&advanced_plan(), &CancellationToken::new(), &observer)
            .await
            .unwrap();

        let history = seen.into_inner().unwrap();
        for pair in history.windows(2) {
            for (before, after) in pair[0].iter().zip(pair[1].iter()) {
                if before.is_terminal() {
                    assert_eq!(before, after);
                }
            }
        }
        assert!(history.last().unwrap().iter().all(|s| *s == StageStatus::Done));
    }
}
