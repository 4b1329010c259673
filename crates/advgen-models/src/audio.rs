//! The audio track specification produced by the script stage and consumed
//! by the audio stage's Music/Narrator adapters and the Composer's mix step.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A narrator voice identifier. Kept as an opaque, provider-scoped string
/// rather than a closed enum since the catalog of available voices is owned
/// by whichever Narrator adapter is configured, not by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Voice(String);

impl Voice {
    pub const DEFAULT: &'static str = "narrator-default";

    pub fn new(id: impl Into<String>) -> Result<Self, VoiceError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(VoiceError::Empty);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("voice identifier cannot be empty")]
    Empty,
}

/// A marker consumed by the Composer to drive an audio-mix decision at a
/// given point on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncPoint {
    /// Narrator playback-rate change at `timestamp_s` (1.0x normal, 1.4x
    /// during the compliance disclosure).
    NarratorSpeed { timestamp_s: f64, value: f64 },
    /// Music gain level from `timestamp_s` onward (0.30 for the duration of
    /// a compliance job, since the music ducks for both narration tracks).
    MusicLevel { timestamp_s: f64, value: f64 },
}

/// Fraction of `duration_s` at which a compliance job's side-effects
/// disclosure begins.
pub const SIDE_EFFECTS_TIMELINE_FRACTION: f64 = 0.8;
/// Narrator playback rate during the side-effects disclosure.
pub const SIDE_EFFECTS_NARRATOR_SPEED: f64 = 1.4;
/// Narrator playback rate everywhere else.
pub const NORMAL_NARRATOR_SPEED: f64 = 1.0;
/// Music gain level in the final mix, narrator at 1.0;
/// a compliance job also emits this as an explicit sync point at `t=0`.
pub const MUSIC_MIX_LEVEL: f64 = 0.30;

/// Everything the audio stage needs to synthesize narration, select/mix a
/// music bed, and place an optional side-effect cue — derived by the script
/// stage from `Job::prompt` + `Job::side_effects_text`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AudioSpec {
    /// Full narration script, concatenated in scene order.
    pub narration_script: String,

    pub voice: Voice,

    /// Short text prompt describing the desired music bed, passed to the
    /// Music adapter.
    pub music_prompt: String,

    /// Copied from `Job::side_effects_text` verbatim; `None` if the brief
    /// didn't request one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects_text: Option<String>,

    /// Where in the final timeline (seconds from the start) the side-effect
    /// cue should be mixed in. Derived by the script stage from scene
    /// boundaries; always `None` when `side_effects_text` is `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects_start_time_s: Option<f64>,

    pub duration_s: u32,

    /// AssetStore key of the synthesized narration track, once produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration_asset_key: Option<String>,
    /// AssetStore key of the synthesized/selected music track, once produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_asset_key: Option<String>,
    /// AssetStore key of the side-effect clip, once produced (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects_asset_key: Option<String>,

    /// Ordered audio-mix markers the Composer consumes.
    /// Always carries at least the `1.0x`-at-`0` narrator baseline; a
    /// compliance job adds the `1.4x` disclosure speed and `0.30` music
    /// level markers.
    #[serde(default)]
    pub sync_points: Vec<SyncPoint>,
}

impl AudioSpec {
    pub fn new(
        narration_script: impl Into<String>,
        voice: Voice,
        music_prompt: impl Into<String>,
        duration_s: u32,
    ) -> Self {
        Self {
            narration_script: narration_script.into(),
            voice,
            music_prompt: music_prompt.into(),
            side_effects_text: None,
            side_effects_start_time_s: None,
            duration_s,
            narration_asset_key: None,
            music_asset_key: None,
            side_effects_asset_key: None,
            sync_points: vec![SyncPoint::NarratorSpeed { timestamp_s: 0.0, value: NORMAL_NARRATOR_SPEED }],
        }
    }

    /// Attach a compliance disclosure at `SIDE_EFFECTS_TIMELINE_FRACTION` of
    /// `self.duration_s`, with its mandated narrator-speed and music-level
    /// sync points.
    pub fn with_side_effect(mut self, text: impl Into<String>) -> Self {
        let start_time_s = self.duration_s as f64 * SIDE_EFFECTS_TIMELINE_FRACTION;
        self.side_effects_text = Some(text.into());
        self.side_effects_start_time_s = Some(start_time_s);
        self.sync_points.push(SyncPoint::NarratorSpeed {
            timestamp_s: start_time_s,
            value: SIDE_EFFECTS_NARRATOR_SPEED,
        });
        self.sync_points.push(SyncPoint::MusicLevel {
            timestamp_s: 0.0,
            value: MUSIC_MIX_LEVEL,
        });
        self
    }

    /// True once narration and music have both been synthesized (the
    /// side-effect track, if requested, is optional for readiness — a
    /// failed side-effect synthesis degrades gracefully rather than
    /// blocking composition).
    pub fn is_ready_for_composition(&self) -> bool {
        self.narration_asset_key.is_some() && self.music_asset_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_rejects_empty() {
        assert!(Voice::new("").is_err());
        assert!(Voice::new("nova").is_ok());
    }

    #[test]
    fn test_audio_spec_side_effect_pairing() {
        let spec = AudioSpec::new("Meet the new stride.", Voice::default(), "upbeat synth", 30)
            .with_side_effect("Side effects include headache.");
        assert_eq!(spec.side_effects_start_time_s, Some(24.0));
        assert!(spec.sync_points.contains(&SyncPoint::NarratorSpeed { timestamp_s: 0.0, value: 1.0 }));
        assert!(spec.sync_points.contains(&SyncPoint::NarratorSpeed { timestamp_s: 24.0, value: 1.4 }));
        assert!(spec.sync_points.contains(&SyncPoint::MusicLevel { timestamp_s: 0.0, value: 0.30 }));
    }

    #[test]
    fn test_audio_spec_readiness_ignores_missing_side_effect() {
        let mut spec = AudioSpec::new("line", Voice::default(), "prompt", 30);
        assert!(!spec.is_ready_for_composition());
        spec.narration_asset_key = Some("k1".into());
        spec.music_asset_key = Some("k2".into());
        assert!(spec.is_ready_for_composition());
    }
}
