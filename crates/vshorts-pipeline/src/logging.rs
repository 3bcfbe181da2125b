//! Structured run logging.
//!
//! Every lifecycle event of a pipeline run carries the run ID and the plan
//! label, so one run can be followed through interleaved output.

use tracing::{error, info, warn, Span};
use vshorts_models::{RunId, StageSpec};

/// Lifecycle logger for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: RunId,
    plan: &'static str,
}

impl RunLogger {
    /// `plan` is the plan label, e.g. "simple", "advanced" or "text".
    pub fn new(run_id: &RunId, plan: &'static str) -> Self {
        Self {
            run_id: run_id.clone(),
            plan,
        }
    }

    pub fn started(&self, stages: usize, engine: &str) {
        info!(
            run_id = %self.run_id,
            plan = self.plan,
            stages,
            engine,
            "Run started"
        );
    }

    pub fn stage(&self, spec: &StageSpec, event: &str) {
        info!(
            run_id = %self.run_id,
            plan = self.plan,
            stage = %spec.id,
            kind = %spec.kind(),
            "{}: {}", spec.name, event
        );
    }

    pub fn warning(&self, message: &str) {
        warn!(run_id = %self.run_id, plan = self.plan, "{}", message);
    }

    pub fn failed(&self, message: &str) {
        error!(run_id = %self.run_id, plan = self.plan, "Run failed: {}", message);
    }

    pub fn completed(&self, elapsed_ms: u64) {
        info!(
            run_id = %self.run_id,
            plan = self.plan,
            elapsed_ms,
            "Run completed"
        );
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn plan(&self) -> &'static str {
        self.plan
    }

    /// Span that scopes everything the run does.
    pub fn span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id, plan = self.plan)
    }
}
