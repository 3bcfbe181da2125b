//! Local guard for text submissions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum words before a text submission is accepted
pub const DEFAULT_MIN_WORDS: usize = 10;
/// Lower bound of the recommended range
pub const RECOMMENDED_MIN_WORDS: usize = 50;
/// Upper bound of the recommended range
pub const RECOMMENDED_MAX_WORDS: usize = 500;

/// Count whitespace-separated words, ignoring empty tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Text was rejected before submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Please enter at least {min_words} words to generate a video (got {words})")]
pub struct TextRejected {
    pub words: usize,
    pub min_words: usize,
}

/// Non-binding advice about the submitted length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TextAdvice {
    /// Inside the recommended range
    Recommended,
    /// Accepted, but shorter than recommended
    BelowRecommended,
    /// Accepted, but longer than recommended
    AboveRecommended,
}

impl TextAdvice {
    pub fn hint(&self) -> Option<String> {
        match self {
            TextAdvice::Recommended => None,
            TextAdvice::BelowRecommended | TextAdvice::AboveRecommended => Some(format!(
                "Recommended: {}-{} words for best results",
                RECOMMENDED_MIN_WORDS, RECOMMENDED_MAX_WORDS
            )),
        }
    }
}

/// Enforces the minimum word count and reports the recommended range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextGuard {
    pub min_words: usize,
    pub recommended: (usize, usize),
}

impl Default for TextGuard {
    fn default() -> Self {
        Self {
            min_words: DEFAULT_MIN_WORDS,
            recommended: (RECOMMENDED_MIN_WORDS, RECOMMENDED_MAX_WORDS),
        }
    }
}

impl TextGuard {
    pub fn new(min_words: usize) -> Self {
        Self {
            min_words,
            ..Default::default()
        }
    }

    /// Accept or reject `text`; accepted text comes back with advice.
    pub fn check(&self, text: &str) -> Result<TextAdvice, TextRejected> {
        let words = word_count(text);
        if words < self.min_words {
            return Err(TextRejected {
                words,
                min_words: self.min_words,
            });
        }

        let (low, high) = self.recommended;
        Ok(if words < low {
            TextAdvice::BelowRecommended
        } else if words > high {
            TextAdvice::AboveRecommended
        } else {
            TextAdvice::Recommended
        })
    }
}
