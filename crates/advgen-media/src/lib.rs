#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for composing the final ad video.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building (`command`)
//! - Progress parsing from `-progress pipe:2` (`progress`)
//! - Cancellation support via tokio
//! - Input inspection via ffprobe (`probe`)
//! - Scene concatenation, audio mixing, last-frame extraction, and WebM
//!   transcoding for the composition stage (`composer`)

pub mod command;
pub mod composer;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use composer::{
    concat_scenes, extract_last_frame, mix_audio_onto_video, transcode_to_webm, ConcatInput,
    MixTrack,
};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
