//! Processing mode selection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How an uploaded video is turned into a vertical short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Single-stage geometry reformat to the vertical frame
    Simple,
    /// Split screen: source on top, captioned background below
    #[default]
    Advanced,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Simple => "simple",
            ProcessingMode::Advanced => "advanced",
        }
    }

    /// Status message shown while the pipeline runs.
    pub fn processing_message(&self) -> &'static str {
        match self {
            ProcessingMode::Simple => "Converting to vertical format...",
            ProcessingMode::Advanced => "Creating split-screen video...",
        }
    }

    /// Status message shown once the pipeline completed.
    pub fn success_message(&self) -> &'static str {
        match self {
            ProcessingMode::Simple => "Vertical video created successfully!",
            ProcessingMode::Advanced => "Split-screen video created successfully!",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(ProcessingMode::Simple),
            "advanced" => Ok(ProcessingMode::Advanced),
            _ => Err(ModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown processing mode: {0}")]
pub struct ModeParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("simple".parse::<ProcessingMode>().unwrap(), ProcessingMode::Simple);
        assert_eq!(" Advanced ".parse::<ProcessingMode>().unwrap(), ProcessingMode::Advanced);
    }

    #[test]
    fn test_parse_unknown_mode() {
        let err = "cinematic".parse::<ProcessingMode>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown processing mode: cinematic");
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&ProcessingMode::Simple).unwrap(), "\"simple\"");
    }
}
