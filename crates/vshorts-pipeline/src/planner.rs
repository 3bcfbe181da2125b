//! Transformation planner.
//!
//! Plans are pure functions of `(content id, mode)` and the planner's
//! settings: the same inputs always produce the same stages, in the same
//! order, with the same parameters. Nothing here talks to the network.

use vshorts_models::{
    ArtifactRef, ContentId, FrameSpec, Gravity, OutputFormat, PlanError, PlanKind,
    ProcessingMode, QualityTier, StageId, StageOperation, StageSpec, SubtitleFormat,
    TransformationPlan,
};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;

/// Stage ids used by the built-in plans.
pub mod stages {
    pub const REFORMAT: &str = "reformat";
    pub const TOP: &str = "top";
    pub const CAPTIONS: &str = "captions";
    pub const BOTTOM: &str = "bottom";
    pub const MERGE: &str = "merge";
    pub const RENDER: &str = "render";
}

/// Builds transformation plans.
#[derive(Debug, Clone)]
pub struct Planner {
    background: ContentId,
    output: FrameSpec,
    half: FrameSpec,
    merge: FrameSpec,
    quality: QualityTier,
    format: OutputFormat,
    caption_language: String,
}

impl Planner {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            background: config.background_asset_id.clone(),
            output: config.output_frame(),
            half: config.half_frame(Some(Gravity::Center)),
            merge: config.merge_frame(),
            quality: config.quality,
            format: config.format,
            caption_language: config.caption_language.clone(),
        }
    }

    /// Build the plan for an uploaded asset.
    ///
    /// An unrecognized `mode` fails with `InvalidMode` before anything else.
    pub fn build_plan(&self, content_id: &ContentId, mode: &str) -> PipelineResult<TransformationPlan> {
        let mode: ProcessingMode = mode.parse()?;
        Ok(self.plan_for(content_id, mode)?)
    }

    /// Build the plan for an already parsed mode.
    pub fn plan_for(
        &self,
        content_id: &ContentId,
        mode: ProcessingMode,
    ) -> Result<TransformationPlan, PlanError> {
        let stages = match mode {
            ProcessingMode::Simple => self.simple_stages(content_id),
            ProcessingMode::Advanced => self.advanced_stages(content_id),
        };
        TransformationPlan::new(PlanKind::Video(mode), Some(content_id.clone()), stages)
    }

    /// Build the single-stage plan for a text submission.
    pub fn build_text_plan(&self, text: &str) -> Result<TransformationPlan, PlanError> {
        TransformationPlan::new(
            PlanKind::Text,
            None,
            vec![StageSpec::new(
                stages::RENDER,
                "Text to video",
                StageOperation::TextRender {
                    text: text.trim().to_string(),
                    frame: self.output,
                    quality: self.quality,
                    format: self.format,
                },
            )],
        )
    }

    fn simple_stages(&self, content_id: &ContentId) -> Vec<StageSpec> {
        vec![StageSpec::new(
            stages::REFORMAT,
            "Vertical reformat",
            StageOperation::Geometry {
                source: ArtifactRef::Content(content_id.clone()),
                frame: self.output,
                quality: self.quality,
                format: Some(self.format),
                progressive: true,
            },
        )]
    }

    fn advanced_stages(&self, content_id: &ContentId) -> Vec<StageSpec> {
        let source = ArtifactRef::Content(content_id.clone());
        vec![
            StageSpec::new(
                stages::TOP,
                "Top half reformat",
                StageOperation::Geometry {
                    source: source.clone(),
                    frame: self.half,
                    quality: self.quality,
                    format: None,
                    progressive: false,
                },
            ),
            StageSpec::new(
                stages::CAPTIONS,
                "Caption generation",
                StageOperation::Captions {
                    source,
                    format: SubtitleFormat::Srt,
                    language: self.caption_language.clone(),
                },
            ),
            StageSpec::new(
                stages::BOTTOM,
                "Background overlay",
                StageOperation::Overlay {
                    background: ArtifactRef::Content(self.background.clone()),
                    captions: ArtifactRef::Stage(StageId::new(stages::CAPTIONS)),
                    frame: FrameSpec { gravity: None, ..self.half },
                },
            ),
            StageSpec::new(
                stages::MERGE,
                "Final merge",
                StageOperation::Merge {
                    top: ArtifactRef::Stage(StageId::new(stages::TOP)),
                    bottom: ArtifactRef::Stage(StageId::new(stages::BOTTOM)),
                    frame: self.merge,
                    quality: self.quality,
                    format: self.format,
                    progressive: true,
                },
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vshorts_models::{ErrorKind, StageKind};

    fn planner() -> Planner {
        Planner::new(&PipelineConfig::default())
    }

    fn content() -> ContentId {
        ContentId::from("src_123")
    }

    #[test]
    fn test_simple_plan_has_one_geometry_stage() {
        let plan = planner().build_plan(&content(), "simple").unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.stages()[0].kind(), StageKind::Geometry);
        assert_eq!(
            plan.stages()[0].operation.transformation(&BTreeMap::new()),
            "c_fill,g_center,h_1280,w_720/q_auto,f_mp4/fl_progressive"
        );
        assert_eq!(plan.kind(), PlanKind::Video(ProcessingMode::Simple));
    }

    #[test]
    fn test_advanced_plan_orders_captions_before_overlay() {
        let plan = planner().build_plan(&content(), "advanced").unwrap();
        let kinds: Vec<StageKind> = plan.stages().iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                StageKind::Geometry,
                StageKind::CaptionGeneration,
                StageKind::OverlayComposition,
                StageKind::FinalMerge,
            ]
        );

        let captions = plan.position(&StageId::new(stages::CAPTIONS)).unwrap();
        let overlay = plan.position(&StageId::new(stages::BOTTOM)).unwrap();
        assert!(captions < overlay);

        let overlay_spec = plan.stage(&StageId::new(stages::BOTTOM)).unwrap();
        assert_eq!(overlay_spec.dependencies(), vec![&StageId::new(stages::CAPTIONS)]);
        assert_eq!(plan.terminal_stage().kind(), StageKind::FinalMerge);
    }

    #[test]
    fn test_advanced_plan_uses_configured_background() {
        let config = PipelineConfig {
            background_asset_id: ContentId::from("custom_bg"),
            ..Default::default()
        };
        let plan = Planner::new(&config).build_plan(&content(), "advanced").unwrap();
        let overlay = plan.stage(&StageId::new(stages::BOTTOM)).unwrap();
        match &overlay.operation {
            StageOperation::Overlay { background, .. } => {
                assert_eq!(background, &ArtifactRef::Content(ContentId::from("custom_bg")));
            }
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[test]
    fn test_plans_are_deterministic() {
        let planner = planner();
        for mode in ["simple", "advanced"] {
            let a = planner.build_plan(&content(), mode).unwrap();
            let b = planner.build_plan(&content(), mode).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_invalid_mode_fails_fast() {
        let err = planner().build_plan(&content(), "cinematic").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMode);
    }

    #[test]
    fn test_text_plan_is_single_render_stage() {
        let plan = planner().build_text_plan("  a short story  ").unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.kind(), PlanKind::Text);
        assert!(plan.content_id().is_none());
        match &plan.stages()[0].operation {
            StageOperation::TextRender { text, .. } => assert_eq!(text, "a short story"),
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[test]
    fn test_merge_anchors_bottom_half_south() {
        let plan = planner().build_plan(&content(), "advanced").unwrap();
        let mut inputs = BTreeMap::new();
        inputs.insert("top".to_string(), ContentId::from("top_out"));
        inputs.insert("bottom".to_string(), ContentId::from("bottom_out"));
        assert_eq!(
            plan.terminal_stage().operation.transformation(&inputs),
            "l_video:bottom_out,c_fill,g_south,h_640,w_720/fl_layer_apply/c_fit,h_1280,w_720/q_auto,f_mp4/fl_progressive"
        );
    }
}
