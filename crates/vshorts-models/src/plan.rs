//! Transformation plans.
//!
//! A plan is an ordered list of declarative stages. Each stage names the
//! artifacts it consumes; a [`ArtifactRef::Stage`] input is a
//! producer->consumer edge. Plans can only be built through
//! [`TransformationPlan::new`], which rejects any edge whose producer is not
//! declared earlier, so the declared order is always a valid topological
//! order of the stage graph.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::ContentId;
use crate::mode::ProcessingMode;
use crate::transform::{FrameSpec, OutputFormat, QualityTier, SubtitleFormat};

/// Identifier of a stage, unique within one plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct StageId(pub String);

impl StageId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of work a stage performs on the remote engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Crop/resize into a target frame
    Geometry,
    /// Speech-to-text subtitle generation
    CaptionGeneration,
    /// Layer composition (captions over a background)
    OverlayComposition,
    /// Merge of the split-screen halves plus output normalization
    FinalMerge,
    /// Render a video from free-form text
    TextRender,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Geometry => "geometry",
            StageKind::CaptionGeneration => "caption_generation",
            StageKind::OverlayComposition => "overlay_composition",
            StageKind::FinalMerge => "final_merge",
            StageKind::TextRender => "text_render",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An artifact consumed by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ArtifactRef {
    /// Something already in the remote store (uploaded or pre-provisioned)
    Content(ContentId),
    /// The output of another stage in the same plan
    Stage(StageId),
}

impl ArtifactRef {
    /// The producing stage, when this input is a stage output.
    pub fn producer(&self) -> Option<&StageId> {
        match self {
            ArtifactRef::Stage(id) => Some(id),
            ArtifactRef::Content(_) => None,
        }
    }
}

/// Declarative description of one stage's work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StageOperation {
    Geometry {
        source: ArtifactRef,
        frame: FrameSpec,
        quality: QualityTier,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<OutputFormat>,
        #[serde(default)]
        progressive: bool,
    },
    Captions {
        source: ArtifactRef,
        format: SubtitleFormat,
        language: String,
    },
    Overlay {
        background: ArtifactRef,
        captions: ArtifactRef,
        frame: FrameSpec,
    },
    Merge {
        top: ArtifactRef,
        bottom: ArtifactRef,
        frame: FrameSpec,
        quality: QualityTier,
        format: OutputFormat,
        #[serde(default)]
        progressive: bool,
    },
    TextRender {
        text: String,
        frame: FrameSpec,
        quality: QualityTier,
        format: OutputFormat,
    },
}

impl StageOperation {
    pub fn kind(&self) -> StageKind {
        match self {
            StageOperation::Geometry { .. } => StageKind::Geometry,
            StageOperation::Captions { .. } => StageKind::CaptionGeneration,
            StageOperation::Overlay { .. } => StageKind::OverlayComposition,
            StageOperation::Merge { .. } => StageKind::FinalMerge,
            StageOperation::TextRender { .. } => StageKind::TextRender,
        }
    }

    /// Named input slots of this operation.
    pub fn inputs(&self) -> Vec<(&'static str, &ArtifactRef)> {
        match self {
            StageOperation::Geometry { source, .. } => vec![("source", source)],
            StageOperation::Captions { source, .. } => vec![("source", source)],
            StageOperation::Overlay {
                background,
                captions,
                ..
            } => vec![("background", background), ("captions", captions)],
            StageOperation::Merge { top, bottom, .. } => vec![("top", top), ("bottom", bottom)],
            StageOperation::TextRender { .. } => Vec::new(),
        }
    }

    /// Output container, for stages that produce a deliverable video.
    pub fn output_format(&self) -> Option<OutputFormat> {
        match self {
            StageOperation::Geometry { format, .. } => *format,
            StageOperation::Merge { format, .. } | StageOperation::TextRender { format, .. } => {
                Some(*format)
            }
            StageOperation::Captions { .. } | StageOperation::Overlay { .. } => None,
        }
    }

    /// Render the engine transformation string.
    ///
    /// `inputs` maps input slot names to the concrete artifacts they resolved
    /// to. Slots that only name the subject of the transformation (`source`,
    /// `background`, `top`) are passed to the engine separately and do not
    /// appear in the string.
    pub fn transformation(&self, inputs: &BTreeMap<String, ContentId>) -> String {
        match self {
            StageOperation::Geometry {
                frame,
                quality,
                format,
                progressive,
                ..
            } => {
                let mut chain = vec![frame.to_component(), encode_component(*quality, *format)];
                if *progressive {
                    chain.push("fl_progressive".to_string());
                }
                chain.join("/")
            }
            StageOperation::Captions {
                format, language, ..
            } => format!("fl_speech_recognition:{}/f_{}", language, format.extension()),
            StageOperation::Overlay { frame, .. } => {
                let captions = inputs.get("captions").map(ContentId::as_str).unwrap_or_default();
                format!(
                    "{}/l_subtitles:{}/fl_layer_apply",
                    frame.to_component(),
                    captions
                )
            }
            StageOperation::Merge {
                frame,
                quality,
                format,
                progressive,
                ..
            } => {
                let bottom = inputs.get("bottom").map(ContentId::as_str).unwrap_or_default();
                let mut chain = vec![
                    format!(
                        "l_video:{},c_fill,g_south,h_{},w_{}",
                        bottom,
                        frame.height / 2,
                        frame.width
                    ),
                    "fl_layer_apply".to_string(),
                    frame.to_component(),
                    encode_component(*quality, Some(*format)),
                ];
                if *progressive {
                    chain.push("fl_progressive".to_string());
                }
                chain.join("/")
            }
            StageOperation::TextRender {
                frame,
                quality,
                format,
                ..
            } => format!("{}/{}", frame.to_component(), encode_component(*quality, Some(*format))),
        }
    }
}

fn encode_component(quality: QualityTier, format: Option<OutputFormat>) -> String {
    match format {
        Some(format) => format!("{},f_{}", quality.to_component(), format.extension()),
        None => quality.to_component().to_string(),
    }
}

/// One declared stage of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StageSpec {
    pub id: StageId,
    /// Human-readable stage name used in status and error messages
    pub name: String,
    pub operation: StageOperation,
}

impl StageSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, operation: StageOperation) -> Self {
        Self {
            id: StageId::new(id),
            name: name.into(),
            operation,
        }
    }

    pub fn kind(&self) -> StageKind {
        self.operation.kind()
    }

    /// Stages whose output this stage consumes.
    pub fn dependencies(&self) -> Vec<&StageId> {
        self.operation
            .inputs()
            .into_iter()
            .filter_map(|(_, input)| input.producer())
            .collect()
    }
}

/// What a plan was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "mode", rename_all = "snake_case")]
pub enum PlanKind {
    /// An uploaded video in the given mode
    Video(ProcessingMode),
    /// A text submission
    Text,
}

impl PlanKind {
    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            PlanKind::Video(mode) => mode.as_str(),
            PlanKind::Text => "text",
        }
    }
}

/// Errors raised while constructing a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Plan has no stages")]
    Empty,

    #[error("Duplicate stage id: {0}")]
    DuplicateStage(StageId),

    #[error("Stage '{stage}' consumes unknown stage '{producer}'")]
    UnknownProducer { stage: StageId, producer: StageId },

    #[error("Stage '{stage}' is declared before its producer '{producer}'")]
    OrderViolation { stage: StageId, producer: StageId },
}

/// An ordered, validated sequence of stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct TransformationPlan {
    kind: PlanKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_id: Option<ContentId>,
    stages: Vec<StageSpec>,
}

impl TransformationPlan {
    /// Build a plan, enforcing that every producer precedes its consumers.
    pub fn new(
        kind: PlanKind,
        content_id: Option<ContentId>,
        stages: Vec<StageSpec>,
    ) -> Result<Self, PlanError> {
        if stages.is_empty() {
            return Err(PlanError::Empty);
        }

        let all: HashSet<&StageId> = stages.iter().map(|s| &s.id).collect();
        if all.len() != stages.len() {
            let mut seen = HashSet::new();
            for stage in &stages {
                if !seen.insert(&stage.id) {
                    return Err(PlanError::DuplicateStage(stage.id.clone()));
                }
            }
        }

        let mut declared: HashSet<&StageId> = HashSet::new();
        for stage in &stages {
            for producer in stage.dependencies() {
                if !all.contains(producer) {
                    return Err(PlanError::UnknownProducer {
                        stage: stage.id.clone(),
                        producer: producer.clone(),
                    });
                }
                if !declared.contains(producer) {
                    return Err(PlanError::OrderViolation {
                        stage: stage.id.clone(),
                        producer: producer.clone(),
                    });
                }
            }
            declared.insert(&stage.id);
        }

        Ok(Self {
            kind,
            content_id,
            stages,
        })
    }

    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    /// Source content, absent for text plans.
    pub fn content_id(&self) -> Option<&ContentId> {
        self.content_id.as_ref()
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage(&self, id: &StageId) -> Option<&StageSpec> {
        self.stages.iter().find(|s| &s.id == id)
    }

    /// Position of a stage in declared order.
    pub fn position(&self, id: &StageId) -> Option<usize> {
        self.stages.iter().position(|s| &s.id == id)
    }

    /// The stage whose output is the deliverable.
    pub fn terminal_stage(&self) -> &StageSpec {
        // Non-empty by construction.
        &self.stages[self.stages.len() - 1]
    }
}
