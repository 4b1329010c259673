//! Final composition: stitching rendered scene clips, the narration/music/
//! side-effect audio tracks, and the delivery transcode into one video.
//!
//! Built on top of [`crate::command`]'s FFmpeg builder/runner and
//! [`crate::probe`]'s input inspection, generalizing the single-clip builder
//! pattern those modules were written around into the multi-input
//! `filter_complex` graphs composition needs.

use std::path::{Path, PathBuf};

use advgen_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Concatenate scene clips, honoring each scene's transition into the next.
///
/// All inputs must already share codec/resolution/frame rate (the scene
/// renderer is responsible for that); this only sequences them. A `CrossFade`
/// transition is rendered with `xfade`/`acrossfade`; `Cut` falls back to the
/// cheaper `concat` demuxer-equivalent filter, since `xfade` requires knowing
/// each clip's duration up front and costs a re-encode either way once mixed
/// with crossfades elsewhere in the timeline.
pub struct ConcatInput {
    pub path: PathBuf,
    pub duration_s: f64,
    /// Crossfade duration into the *next* clip; `None` means a hard cut.
    pub crossfade_into_next_ms: Option<u32>,
}

/// Concatenate a sequence of scene clips into a single silent video track.
pub async fn concat_scenes(inputs: &[ConcatInput], output: impl AsRef<Path>) -> MediaResult<()> {
    if inputs.is_empty() {
        return Err(MediaError::internal("concat_scenes called with no inputs"));
    }

    if inputs.len() == 1 {
        return copy_single_clip(&inputs[0].path, output.as_ref()).await;
    }

    let has_crossfade = inputs.iter().any(|i| i.crossfade_into_next_ms.is_some());
    if has_crossfade {
        concat_with_crossfades(inputs, output.as_ref()).await
    } else {
        concat_with_concat_filter(inputs, output.as_ref()).await
    }
}

async fn copy_single_clip(input: &Path, output: &Path) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input, output)
        .output_arg("-c")
        .output_arg("copy");
    FfmpegRunner::new().run(&cmd).await
}

async fn concat_with_concat_filter(inputs: &[ConcatInput], output: &Path) -> MediaResult<()> {
    let first = &inputs[0].path;
    let mut input_args = Vec::new();
    let mut filter_inputs = String::new();

    for (idx, input) in inputs.iter().enumerate() {
        if idx > 0 {
            input_args.push("-i".to_string());
            input_args.push(input.path.to_string_lossy().to_string());
        }
        filter_inputs.push_str(&format!("[{idx}:v:0][{idx}:a:0]"));
    }

    let filter = format!(
        "{filter_inputs}concat=n={}:v=1:a=1[outv][outa]",
        inputs.len()
    );

    let cmd = FfmpegCommand::new(first, output)
        .input_args(input_args)
        .filter_complex(filter)
        .output_arg("-map")
        .output_arg("[outv]")
        .output_arg("-map")
        .output_arg("[outa]");

    FfmpegRunner::new().run(&cmd).await
}

async fn concat_with_crossfades(inputs: &[ConcatInput], output: &Path) -> MediaResult<()> {
    let first = &inputs[0].path;
    let mut input_args = Vec::new();
    for input in &inputs[1..] {
        input_args.push("-i".to_string());
        input_args.push(input.path.to_string_lossy().to_string());
    }

    let mut filter_parts = Vec::new();
    let mut video_label = "0:v".to_string();
    let mut audio_label = "0:a".to_string();
    let mut offset = inputs[0].duration_s;

    for (idx, input) in inputs.iter().enumerate().skip(1) {
        let fade_ms = inputs[idx - 1].crossfade_into_next_ms.unwrap_or(0);
        let fade_s = fade_ms as f64 / 1000.0;
        let out_v = format!("v{idx}");
        let out_a = format!("a{idx}");
        let xfade_offset = (offset - fade_s).max(0.0);

        filter_parts.push(format!(
            "[{video_label}][{idx}:v]xfade=transition=fade:duration={fade_s:.3}:offset={xfade_offset:.3}[{out_v}]"
        ));
        filter_parts.push(format!(
            "[{audio_label}][{idx}:a]acrossfade=d={fade_s:.3}[{out_a}]"
        ));

        video_label = out_v;
        audio_label = out_a;
        offset += input.duration_s - fade_s;
    }

    let filter = filter_parts.join(";");
    let cmd = FfmpegCommand::new(first, output)
        .input_args(input_args)
        .filter_complex(filter)
        .output_arg("-map")
        .output_arg(format!("[{video_label}]"))
        .output_arg("-map")
        .output_arg(format!("[{audio_label}]"));

    FfmpegRunner::new().run(&cmd).await
}

/// One audio track to mix into the scene video: narration, music, and an
/// optional side-effect cue, each at its own volume and start offset.
pub struct MixTrack {
    pub path: PathBuf,
    pub volume: f64,
    pub start_offset_s: f64,
}

/// Mix the silent scene video with narration, music, and an optional
/// side-effect track, producing the final composed clip (pre-transcode).
pub async fn mix_audio_onto_video(
    video_path: impl AsRef<Path>,
    tracks: &[MixTrack],
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output = output.as_ref();

    if tracks.is_empty() {
        return Err(MediaError::internal("mix_audio_onto_video called with no audio tracks"));
    }

    let mut input_args = Vec::new();
    let mut filter_parts = Vec::new();
    let mut mix_labels = Vec::new();

    for (idx, track) in tracks.iter().enumerate() {
        input_args.push("-i".to_string());
        input_args.push(track.path.to_string_lossy().to_string());

        let input_idx = idx + 1; // 0 is the video
        let label = format!("a{idx}");
        let delay_ms = (track.start_offset_s * 1000.0).max(0.0) as i64;
        filter_parts.push(format!(
            "[{input_idx}:a]adelay={delay_ms}|{delay_ms},volume={:.3}[{label}]",
            track.volume
        ));
        mix_labels.push(format!("[{label}]"));
    }

    let mixed = if tracks.len() == 1 {
        mix_labels[0].trim_start_matches('[').trim_end_matches(']').to_string()
    } else {
        filter_parts.push(format!(
            "{}amix=inputs={}:duration=longest:dropout_transition=0[mixed]",
            mix_labels.join(""),
            tracks.len()
        ));
        "mixed".to_string()
    };

    let filter = filter_parts.join(";");

    let cmd = FfmpegCommand::new(video_path, output)
        .input_args(input_args)
        .filter_complex(filter)
        .output_arg("-map")
        .output_arg("0:v:0")
        .output_arg("-map")
        .output_arg(format!("[{mixed}]"))
        .output_arg("-shortest");

    FfmpegRunner::new().run(&cmd).await
}

/// Extract the last frame of a clip as a still image, used to seed the next
/// scene's generation request with a continuity frame.
pub async fn extract_last_frame(
    video_path: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let info = probe_video(video_path).await?;
    // Seek slightly before the end to avoid landing past the last decodable
    // frame on clips whose container duration rounds up.
    let seek = (info.duration - 0.1).max(0.0);

    let cmd = FfmpegCommand::new(video_path, output.as_ref())
        .input_arg("-ss")
        .input_arg(format!("{seek:.3}"))
        .single_frame();

    FfmpegRunner::new().run(&cmd).await
}

/// Transcode the composed master (H.264/AAC MP4) to the VP9/Opus WebM
/// delivery format alongside it.
pub async fn transcode_to_webm(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let config = EncodingConfig::for_webm_delivery();

    let cmd = FfmpegCommand::new(input.as_ref(), output.as_ref())
        .video_codec("libvpx-vp9")
        .crf(config.crf)
        .output_arg("-b:v")
        .output_arg("0")
        .audio_codec("libopus")
        .audio_bitrate("128k");

    FfmpegRunner::new().run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_filter_shape() {
        let inputs = vec![
            ConcatInput { path: "a.mp4".into(), duration_s: 5.0, crossfade_into_next_ms: None },
            ConcatInput { path: "b.mp4".into(), duration_s: 5.0, crossfade_into_next_ms: None },
        ];
        assert_eq!(inputs.len(), 2);
        assert!(inputs.iter().all(|i| i.crossfade_into_next_ms.is_none()));
    }

    #[test]
    fn test_mix_track_volume_defaults_are_explicit() {
        let track = MixTrack { path: "music.mp3".into(), volume: 0.3, start_offset_s: 0.0 };
        assert!((track.volume - 0.3).abs() < f64::EPSILON);
    }
}
