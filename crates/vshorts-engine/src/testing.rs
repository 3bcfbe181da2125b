//! Scripted in-memory engine.
//!
//! Each stage id can be given a [`Script`] describing how the engine answers
//! for it. Stages without a script complete on submission. Every submission
//! and status query is recorded so tests can assert on what was sent.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use vshorts_models::{ContentId, StageId};

use crate::engine::TransformEngine;
use crate::error::{EngineError, EngineResult};
use crate::types::{StageState, StageSubmission};

/// How the engine answers for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Report `processing` for `polls` status queries, then complete.
    Complete { polls: usize },
    /// Report `processing` for `polls` status queries, then fail.
    Fail { polls: usize, message: String },
    /// Never reach a terminal status.
    Hang,
    /// Refuse the submission with a transport-level error.
    Reject(String),
}

impl Script {
    pub fn fail(message: impl Into<String>) -> Self {
        Script::Fail {
            polls: 0,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
struct Ticket {
    stage_id: StageId,
    script: Script,
    polls: usize,
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<StageId, Script>,
    tickets: HashMap<String, Ticket>,
    submissions: Vec<StageSubmission>,
    status_calls: usize,
    next_ticket: usize,
}

/// Engine whose answers are scripted per stage.
#[derive(Debug)]
pub struct ScriptedEngine {
    state: Mutex<State>,
    healthy: bool,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            healthy: true,
        }
    }

    /// Script the answers for `stage_id`.
    pub fn with_stage(self, stage_id: &str, script: Script) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.scripts.insert(StageId::new(stage_id), script);
        }
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Artifact id the engine reports for a completed stage.
    pub fn artifact_for(stage_id: &StageId) -> ContentId {
        ContentId::from(format!("artifact_{}", stage_id))
    }

    /// Submissions received so far, in order.
    pub fn submissions(&self) -> Vec<StageSubmission> {
        self.state
            .lock()
            .map(|s| s.submissions.clone())
            .unwrap_or_default()
    }

    /// Stage ids submitted so far, in order.
    pub fn submitted_stages(&self) -> Vec<String> {
        self.submissions()
            .into_iter()
            .map(|s| s.stage_id.to_string())
            .collect()
    }

    /// Number of status queries received.
    pub fn status_calls(&self) -> usize {
        self.state.lock().map(|s| s.status_calls).unwrap_or_default()
    }

    fn answer(ticket_id: &str, ticket: &Ticket) -> StageState {
        match &ticket.script {
            Script::Complete { polls } if ticket.polls >= *polls => StageState::complete(
                ticket_id,
                Self::artifact_for(&ticket.stage_id),
                Some(1024),
            ),
            Script::Fail { polls, message } if ticket.polls >= *polls => {
                StageState::failed(ticket_id, message.clone())
            }
            _ => StageState::processing(ticket_id),
        }
    }
}

#[async_trait]
impl TransformEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn submit(&self, submission: &StageSubmission) -> EngineResult<StageState> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| EngineError::request_failed(e.to_string()))?;
        state.submissions.push(submission.clone());

        let script = state
            .scripts
            .get(&submission.stage_id)
            .cloned()
            .unwrap_or(Script::Complete { polls: 0 });

        if let Script::Reject(message) = &script {
            return Err(EngineError::request_failed(message.clone()));
        }

        state.next_ticket += 1;
        let ticket_id = format!("ticket-{}", state.next_ticket);
        let ticket = Ticket {
            stage_id: submission.stage_id.clone(),
            script,
            polls: 0,
        };
        let answer = Self::answer(&ticket_id, &ticket);
        state.tickets.insert(ticket_id, ticket);
        Ok(answer)
    }

    async fn status(&self, ticket_id: &str) -> EngineResult<StageState> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| EngineError::request_failed(e.to_string()))?;
        state.status_calls += 1;

        let ticket = state
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| EngineError::UnknownTicket(ticket_id.to_string()))?;
        ticket.polls += 1;
        Ok(Self::answer(ticket_id, ticket))
    }

    async fn health_check(&self) -> EngineResult<bool> {
        Ok(self.healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vshorts_models::{FrameSpec, OutputFormat, QualityTier, RunId, StageKind, StageOperation};

    use crate::types::RemoteStatus;

    fn submission(stage: &str) -> StageSubmission {
        StageSubmission {
            run_id: RunId::new(),
            stage_id: StageId::new(stage),
            kind: StageKind::TextRender,
            operation: StageOperation::TextRender {
                text: "hello".to_string(),
                frame: FrameSpec::vertical(),
                quality: QualityTier::Auto,
                format: OutputFormat::Mp4,
            },
            inputs: BTreeMap::new(),
            transformation: String::new(),
        }
    }

    #[tokio::test]
    async fn test_unscripted_stage_completes_on_submit() {
        let engine = ScriptedEngine::new();
        let state = engine.submit(&submission("render")).await.unwrap();
        assert_eq!(state.status, RemoteStatus::Complete);
        assert_eq!(state.artifact_id, Some(ContentId::from("artifact_render")));
    }

    #[tokio::test]
    async fn test_scripted_polls_then_fail() {
        let engine = ScriptedEngine::new().with_stage(
            "captions",
            Script::Fail {
                polls: 2,
                message: "No speech detected".to_string(),
            },
        );
        let ticket = engine.submit(&submission("captions")).await.unwrap().ticket;
        assert_eq!(engine.status(&ticket).await.unwrap().status, RemoteStatus::Processing);
        let state = engine.status(&ticket).await.unwrap();
        assert_eq!(state.status, RemoteStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("No speech detected"));
        assert_eq!(engine.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_reject_and_unknown_ticket() {
        let engine = ScriptedEngine::new().with_stage("x", Script::Reject("down".to_string()));
        assert!(engine.submit(&submission("x")).await.is_err());
        assert_eq!(engine.submitted_stages(), vec!["x".to_string()]);
        assert!(matches!(
            engine.status("ticket-99").await.unwrap_err(),
            EngineError::UnknownTicket(_)
        ));
    }
}
