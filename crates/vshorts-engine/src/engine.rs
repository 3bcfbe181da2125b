//! The engine seam driven by the pipeline executor.

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::types::{StageState, StageSubmission};

/// A remote transformation engine.
///
/// Implementations must not retry on their own and must not cache stage
/// state: every `status` call reads the engine's authoritative view.
#[async_trait]
pub trait TransformEngine: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Submit a stage. The returned state may already be terminal.
    async fn submit(&self, submission: &StageSubmission) -> EngineResult<StageState>;

    /// Read the current state of a submitted stage.
    async fn status(&self, ticket: &str) -> EngineResult<StageState>;

    /// Whether the engine is reachable and healthy.
    async fn health_check(&self) -> EngineResult<bool> {
        Ok(true)
    }
}
