//! Submission orchestration.
//!
//! One call per submission: upload -> plan -> execute -> resolve. Every
//! outcome, including local rejections, ends as a [`ProcessingResult`] and a
//! terminal status snapshot on the session.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use vshorts_engine::{HttpEngine, TransformEngine};
use vshorts_models::{
    Asset, ContentId, ErrorKind, PipelineRun, ProcessingMode, ProcessingResult, RunStatus,
    StatusSnapshot, TextGuard, TransformationPlan,
};
use vshorts_storage::{DeliveryUrlBuilder, StoreClient};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::{ExecutorSettings, PipelineExecutor, ABANDONED_MESSAGE};
use crate::metrics;
use crate::planner::Planner;
use crate::resolver::ResultResolver;
use crate::session::Session;

/// Status message while a text submission renders.
pub const TEXT_PROCESSING_MESSAGE: &str = "Generating video from your text...";
/// Status message once a text submission rendered.
pub const TEXT_SUCCESS_MESSAGE: &str = "Video generated successfully!";

const TEXT_LABEL: &str = "text";

/// Drives submissions end to end.
///
/// Holds no per-submission state; concurrent submissions only share the
/// injected clients.
#[derive(Clone)]
pub struct Orchestrator {
    store: StoreClient,
    planner: Planner,
    executor: PipelineExecutor,
    resolver: ResultResolver,
    text_guard: TextGuard,
}

impl Orchestrator {
    pub fn new(
        store: StoreClient,
        engine: Arc<dyn TransformEngine>,
        delivery: DeliveryUrlBuilder,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            planner: Planner::new(config),
            executor: PipelineExecutor::new(engine, ExecutorSettings::from(config)),
            resolver: ResultResolver::new(delivery),
            text_guard: TextGuard::new(config.text_min_words),
        }
    }

    /// Build every collaborator from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        let store = StoreClient::from_env()?;
        let engine: Arc<dyn TransformEngine> = Arc::new(HttpEngine::from_env()?);
        Ok(Self::new(
            store,
            engine,
            DeliveryUrlBuilder::from_env(),
            &PipelineConfig::from_env(),
        ))
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Whether the transformation engine answers its health check.
    pub async fn engine_healthy(&self) -> bool {
        match self.executor.engine().health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!("Engine health check failed: {}", e);
                false
            }
        }
    }

    /// Process an uploaded video in the given mode.
    pub async fn process_video(&self, asset: &Asset, mode: &str, session: &Session) -> ProcessingResult {
        let started = Instant::now();

        let mode: ProcessingMode = match mode.parse() {
            Ok(mode) => mode,
            Err(e) => return self.reject("invalid", PipelineError::from(e), session, started),
        };
        let label = mode.as_str();
        metrics::record_run_started(label);

        if let Err(e) = self.store.check_asset(asset) {
            metrics::record_input_rejected("asset");
            return self.reject(label, e.into(), session, started);
        }

        info!(
            mode = %mode,
            asset = %asset.name(),
            "Uploading {:.1}MB asset",
            asset.size_mb()
        );

        session.report(StatusSnapshot::uploading(0));
        let report = session.reporter();
        let upload_started = Instant::now();
        let receipt = match self
            .store
            .upload(asset, move |percent| report(StatusSnapshot::uploading(percent)))
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => return self.reject(label, e.into(), session, started),
        };
        metrics::record_upload(asset.size_bytes(), upload_started.elapsed().as_secs_f64());

        if session.is_cancelled() {
            return self.abandoned(label, session, started);
        }

        let plan = match self.planner.plan_for(&receipt.content_id, mode) {
            Ok(plan) => plan,
            Err(e) => return self.reject(label, e.into(), session, started),
        };

        self.run_plan(
            &plan,
            label,
            mode.processing_message(),
            mode.success_message(),
            Some(receipt.content_id),
            session,
            started,
        )
        .await
    }

    /// Render a text submission into a video.
    ///
    /// Text below the minimum word count is rejected without any network
    /// call. Lengths outside the recommended range are accepted with a hint.
    pub async fn process_text(&self, text: &str, session: &Session) -> ProcessingResult {
        let started = Instant::now();

        let advice = match self.text_guard.check(text) {
            Ok(advice) => advice,
            Err(rejected) => {
                metrics::record_input_rejected("text");
                return self.reject(TEXT_LABEL, rejected.into(), session, started);
            }
        };
        metrics::record_run_started(TEXT_LABEL);

        let message = match advice.hint() {
            Some(hint) => {
                warn!(advice = ?advice, "Text length outside recommended range: {}", hint);
                format!("{} ({})", TEXT_PROCESSING_MESSAGE, hint)
            }
            None => TEXT_PROCESSING_MESSAGE.to_string(),
        };

        let plan = match self.planner.build_text_plan(text) {
            Ok(plan) => plan,
            Err(e) => return self.reject(TEXT_LABEL, e.into(), session, started),
        };

        self.run_plan(
            &plan,
            TEXT_LABEL,
            &message,
            TEXT_SUCCESS_MESSAGE,
            None,
            session,
            started,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_plan(
        &self,
        plan: &TransformationPlan,
        label: &str,
        processing_message: &str,
        success_message: &str,
        source: Option<ContentId>,
        session: &Session,
        started: Instant,
    ) -> ProcessingResult {
        session.report(StatusSnapshot::processing(processing_message));

        let observer = progress_observer(plan.len(), processing_message.to_string(), session);
        let run = match self
            .executor
            .execute_observed(plan, session.cancellation_token(), &observer)
            .await
        {
            Ok(run) => run,
            Err(e) => return self.reject(label, e, session, started),
        };

        let result = self
            .resolver
            .resolve(&run)
            .with_processing_time(started.elapsed().as_millis() as u64);

        if result.success {
            info!(
                run_id = %run.id,
                source = ?source,
                url = ?result.download_url,
                "Submission completed in {}ms",
                started.elapsed().as_millis()
            );
            metrics::record_run_completed(label, started.elapsed().as_secs_f64());
            session.report(StatusSnapshot::completed(success_message));
        } else {
            let kind = result.error_kind.map(|k| k.as_str()).unwrap_or("unknown_failure");
            warn!(
                run_id = %run.id,
                failed_stage = ?result.failed_stage,
                "Submission failed: {}",
                result.error.as_deref().unwrap_or_default()
            );
            metrics::record_run_failed(label, kind);
            session.report(StatusSnapshot::error(result.error.clone().unwrap_or_default()));
        }

        result
    }

    fn abandoned(&self, label: &str, session: &Session, started: Instant) -> ProcessingResult {
        metrics::record_run_failed(label, "abandoned");
        session.report(StatusSnapshot::error(ABANDONED_MESSAGE));
        ProcessingResult::failure(ErrorKind::UnknownFailure, ABANDONED_MESSAGE)
            .with_processing_time(started.elapsed().as_millis() as u64)
    }

    /// Turn an error raised outside a run into a terminal result.
    fn reject(
        &self,
        label: &str,
        error: PipelineError,
        session: &Session,
        started: Instant,
    ) -> ProcessingResult {
        let kind = error.kind();
        let message = error.to_string();

        if kind.is_local() {
            warn!(kind = %kind, "Submission rejected: {}", message);
        } else {
            warn!(kind = %kind, "Submission failed: {}", message);
        }
        metrics::record_run_failed(label, kind.as_str());
        session.report(StatusSnapshot::error(message.clone()));

        ProcessingResult::failure(kind, message)
            .with_processing_time(started.elapsed().as_millis() as u64)
    }
}

/// Status observer that names the running step of multi-stage plans.
fn progress_observer(
    total: usize,
    base: String,
    session: &Session,
) -> impl Fn(&PipelineRun) + Send + Sync + 'static {
    let report = session.reporter();
    move |run: &PipelineRun| {
        if total < 2 || run.status != RunStatus::Running {
            return;
        }
        let current = run
            .current_stage
            .as_ref()
            .and_then(|id| run.stages.iter().position(|s| &s.stage_id == id));
        if let Some(index) = current {
            report(StatusSnapshot::processing(format!(
                "{} (step {}/{}: {})",
                base,
                index + 1,
                total,
                run.stages[index].name
            )));
        }
    }
}
