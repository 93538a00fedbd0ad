//! Generation request rules: prompt enhancement, provider duration clamping,
//! aspect-ratio mapping, and input validation.
//!
//! Everything here is pure so the submission endpoint and the runner agree
//! on exactly the same parameters.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// House aesthetic appended to every prompt before it reaches the provider.
pub const AESTHETIC_SUFFIX: &str =
    "cinematic lighting, rich color grading, smooth natural motion, high detail";

/// Length used when the request omits `length`.
pub const DEFAULT_LENGTH_SECS: i32 = 5;

/// Discrete durations the provider accepts, ascending.
pub const SUPPORTED_DURATIONS_SECS: &[i32] = &[4, 6, 8];

/// Maximum accepted prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Maximum accepted style tag length in characters.
pub const MAX_STYLE_CHARS: usize = 64;

// ---------------------------------------------------------------------------
// Aspect ratio
// ---------------------------------------------------------------------------

/// Aspect ratios supported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// Wire representation used by the provider and persisted on the job.
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }

    /// Map a client-supplied ratio onto the provider enum.
    ///
    /// Unsupported or missing values degrade to [`AspectRatio::Landscape`].
    pub fn from_request(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("9:16") | Some("portrait") => AspectRatio::Portrait,
            _ => AspectRatio::Landscape,
        }
    }
}

// ---------------------------------------------------------------------------
// Duration
// ---------------------------------------------------------------------------

/// Clamp a requested duration onto the provider's supported set.
///
/// Rounds up to the nearest supported value; anything longer than the
/// largest supported value becomes the largest.
pub fn clamp_duration(requested_secs: i32) -> i32 {
    let largest = SUPPORTED_DURATIONS_SECS[SUPPORTED_DURATIONS_SECS.len() - 1];
    SUPPORTED_DURATIONS_SECS
        .iter()
        .copied()
        .find(|&d| requested_secs <= d)
        .unwrap_or(largest)
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Build the provider prompt: user prompt, optional style, house suffix.
pub fn enhance_prompt(prompt: &str, style: Option<&str>) -> String {
    let prompt = prompt.trim();
    match style.map(str::trim).filter(|s| !s.is_empty()) {
        Some(style) => format!("{prompt}, {style} style, {AESTHETIC_SUFFIX}"),
        None => format!("{prompt}, {AESTHETIC_SUFFIX}"),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the user prompt. Must be non-blank and at most
/// [`MAX_PROMPT_CHARS`] characters.
pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("prompt must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_PROMPT_CHARS {
        return Err(CoreError::Validation(format!(
            "prompt must be at most {MAX_PROMPT_CHARS} characters"
        )));
    }
    Ok(())
}

/// Validate the optional style tag.
pub fn validate_style(style: Option<&str>) -> Result<(), CoreError> {
    match style {
        Some(s) if s.chars().count() > MAX_STYLE_CHARS => Err(CoreError::Validation(format!(
            "style must be at most {MAX_STYLE_CHARS} characters"
        ))),
        _ => Ok(()),
    }
}

/// Resolve the requested length, applying the default. Non-positive
/// lengths are rejected.
pub fn resolve_length(length: Option<i32>) -> Result<i32, CoreError> {
    match length {
        None => Ok(DEFAULT_LENGTH_SECS),
        Some(l) if l <= 0 => Err(CoreError::Validation(
            "length must be a positive number of seconds".into(),
        )),
        Some(l) => Ok(l),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
