//! Pipeline configuration.

use std::time::Duration;

use vshorts_models::{ContentId, CropMode, FrameSpec, Gravity, OutputFormat, QualityTier};

/// Pre-provisioned background used for the lower half of split-screen shorts.
pub const DEFAULT_BACKGROUND_ASSET: &str = "minecraft_gameplay_sample";

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Background asset composed under the captions in advanced mode
    pub background_asset_id: ContentId,
    /// Output frame width
    pub output_width: u32,
    /// Output frame height
    pub output_height: u32,
    /// Default quality tier
    pub quality: QualityTier,
    /// Output container
    pub format: OutputFormat,
    /// Speech recognition language for captions
    pub caption_language: String,
    /// Interval between stage status queries
    pub poll_interval: Duration,
    /// Timeout for a single stage
    pub stage_timeout: Duration,
    /// Timeout for caption generation, usually the slowest stage
    pub caption_timeout: Duration,
    /// Bound on the whole run
    pub run_timeout: Duration,
    /// Minimum words for a text submission
    pub text_min_words: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            background_asset_id: ContentId::from(DEFAULT_BACKGROUND_ASSET),
            output_width: 720,
            output_height: 1280,
            quality: QualityTier::Auto,
            format: OutputFormat::Mp4,
            caption_language: "en-US".to_string(),
            poll_interval: Duration::from_millis(2000),
            stage_timeout: Duration::from_secs(300),
            caption_timeout: Duration::from_secs(600),
            run_timeout: Duration::from_secs(1800), // 30 minutes
            text_min_words: 10,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            background_asset_id: std::env::var("BACKGROUND_ASSET_ID")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(ContentId::from)
                .unwrap_or(defaults.background_asset_id),
            output_width: std::env::var("OUTPUT_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|w: &u32| *w > 0)
                .unwrap_or(defaults.output_width),
            output_height: std::env::var("OUTPUT_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|h: &u32| *h > 1)
                .unwrap_or(defaults.output_height),
            quality: std::env::var("OUTPUT_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.quality),
            format: std::env::var("OUTPUT_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.format),
            caption_language: std::env::var("CAPTION_LANGUAGE")
                .unwrap_or(defaults.caption_language),
            poll_interval: positive_env("STAGE_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            stage_timeout: positive_env("STAGE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stage_timeout),
            caption_timeout: positive_env("CAPTION_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.caption_timeout),
            run_timeout: positive_env("RUN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.run_timeout),
            text_min_words: std::env::var("TEXT_MIN_WORDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.text_min_words),
        }
    }

    /// Full output frame, center filled.
    pub fn output_frame(&self) -> FrameSpec {
        FrameSpec::new(
            self.output_width,
            self.output_height,
            CropMode::Fill,
            Some(Gravity::Center),
        )
    }

    /// One half of the split-screen frame.
    pub fn half_frame(&self, gravity: Option<Gravity>) -> FrameSpec {
        FrameSpec::new(self.output_width, self.output_height / 2, CropMode::Fill, gravity)
    }

    /// Frame the split-screen halves are merged into.
    pub fn merge_frame(&self) -> FrameSpec {
        FrameSpec::new(self.output_width, self.output_height, CropMode::Fit, None)
    }
}

/// Non-zero integer from the environment. Zero would turn polling into a
/// busy loop and make every timeout fire immediately.
fn positive_env(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|v: &u64| *v > 0)
}
