//! Aspect ratio and style-control types for the generated video.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output aspect ratio.
///
/// Only the three families the video adapters are expected to support are
/// exposed as named constants; arbitrary `W:H` pairs still parse, since the
/// adapter is the actual source of truth on what it can render (queried via
/// `ModelClient::clip_sizes()`), not this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Landscape (16:9) — YouTube/web placements.
    pub const LANDSCAPE: AspectRatio = AspectRatio { width: 16, height: 9 };
    /// Portrait (9:16) — Reels/Shorts/TikTok placements.
    pub const PORTRAIT: AspectRatio = AspectRatio { width: 9, height: 16 };
    /// Square (1:1) — feed placements.
    pub const SQUARE: AspectRatio = AspectRatio { width: 1, height: 1 };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            return Err(AspectRatioParseError::InvalidFormat(s.to_string()));
        }

        let width = parts[0]
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(parts[0].to_string()))?;
        let height = parts[1]
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(parts[1].to_string()))?;

        if width == 0 || height == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }

        Ok(AspectRatio { width, height })
    }
}

#[derive(Debug, Error)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidFormat(String),
    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio cannot have zero values")]
    ZeroValue,
}

/// Maximum length of the free-text style-controls field accepted at Admission.
pub const MAX_STYLE_CONTROLS_LENGTH: usize = 2000;

/// Free-text visual style guidance carried alongside the brief (tone, palette,
/// brand voice). Validated for length at Admission; the script/scene stages
/// pass it through to the relevant model-client adapters untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct StyleControls(String);

impl StyleControls {
    pub fn new(text: impl Into<String>) -> Result<Self, StyleControlsError> {
        let text = text.into();
        if text.len() > MAX_STYLE_CONTROLS_LENGTH {
            return Err(StyleControlsError::TooLong(text.len()));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum StyleControlsError {
    #[error("style_controls exceeds {MAX_STYLE_CONTROLS_LENGTH} characters ({0} given)")]
    TooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::PORTRAIT);
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::LANDSCAPE);
        assert!("invalid".parse::<AspectRatio>().is_err());
        assert!("0:16".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_aspect_ratio_display() {
        assert_eq!(AspectRatio::SQUARE.to_string(), "1:1");
    }

    #[test]
    fn test_style_controls_length_limit() {
        assert!(StyleControls::new("warm, upbeat, minimalist").is_ok());
        let too_long = "x".repeat(MAX_STYLE_CONTROLS_LENGTH + 1);
        assert!(matches!(
            StyleControls::new(too_long),
            Err(StyleControlsError::TooLong(_))
        ));
    }
}
