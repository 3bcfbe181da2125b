//! Output geometry and encoding parameters.
//!
//! Every type here renders itself into the remote engine's transformation
//! grammar: comma-separated `key_value` components, with `/` separating
//! chained transformations (e.g. `c_fill,g_center,h_1280,w_720/q_auto,f_mp4`).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target output width (vertical 9:16)
pub const TARGET_WIDTH: u32 = 720;
/// Target output height (vertical 9:16)
pub const TARGET_HEIGHT: u32 = 1280;
/// Height of each half in the split-screen layout
pub const HALF_HEIGHT: u32 = TARGET_HEIGHT / 2;

/// How the source is fitted into the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Fill the frame, cropping whatever overflows
    #[default]
    Fill,
    /// Fit inside the frame, preserving everything
    Fit,
}

impl CropMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropMode::Fill => "fill",
            CropMode::Fit => "fit",
        }
    }
}

/// Anchor used when cropping or placing a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Gravity {
    Center,
    North,
    South,
}

impl Gravity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gravity::Center => "center",
            Gravity::North => "north",
            Gravity::South => "south",
        }
    }
}

/// Target frame of a geometry step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FrameSpec {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub crop: CropMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<Gravity>,
}

impl FrameSpec {
    pub fn new(width: u32, height: u32, crop: CropMode, gravity: Option<Gravity>) -> Self {
        Self {
            width,
            height,
            crop,
            gravity,
        }
    }

    /// Full vertical frame, center filled.
    pub fn vertical() -> Self {
        Self::new(TARGET_WIDTH, TARGET_HEIGHT, CropMode::Fill, Some(Gravity::Center))
    }

    /// One half of the split-screen frame.
    pub fn half(gravity: Option<Gravity>) -> Self {
        Self::new(TARGET_WIDTH, HALF_HEIGHT, CropMode::Fill, gravity)
    }

    /// Render as `c_<crop>[,g_<gravity>],h_<h>,w_<w>`.
    pub fn to_component(&self) -> String {
        let mut parts = vec![format!("c_{}", self.crop.as_str())];
        if let Some(gravity) = self.gravity {
            parts.push(format!("g_{}", gravity.as_str()));
        }
        parts.push(format!("h_{}", self.height));
        parts.push(format!("w_{}", self.width));
        parts.join(",")
    }
}

/// Output quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Let the engine choose
    #[default]
    Auto,
    High,
    Medium,
    Low,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Auto => "auto",
            QualityTier::High => "high",
            QualityTier::Medium => "medium",
            QualityTier::Low => "low",
        }
    }

    /// Render as a `q_` component.
    pub fn to_component(&self) -> &'static str {
        match self {
            QualityTier::Auto => "q_auto",
            QualityTier::High => "q_auto:best",
            QualityTier::Medium => "q_auto:good",
            QualityTier::Low => "q_auto:eco",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = QualityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(QualityTier::Auto),
            "high" => Ok(QualityTier::High),
            "medium" => Ok(QualityTier::Medium),
            "low" => Ok(QualityTier::Low),
            _ => Err(QualityParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown quality tier: {0}")]
pub struct QualityParseError(String);

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Webm,
}

impl OutputFormat {
    /// File extension, also used in `f_` components.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Webm => "webm",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Webm => "video/webm",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "webm" => Ok(OutputFormat::Webm),
            _ => Err(FormatParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown output format: {0}")]
pub struct FormatParseError(String);

/// Subtitle artifact format produced by caption generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
        }
    }
}
