//! Per-slide segment encodes: still image plus narration, or animation clip.

use std::path::{Path, PathBuf};

use sr_core::config::RenderProfile;

use super::filters::{
    audio_encode_args, canonical_audio_filter, canonical_video_filter, duration_arg,
    mp4_output_args, silence_source, video_encode_args,
};
use crate::command::ToolCommand;
use crate::tools::Toolchain;

/// Audio source for an animation clip segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipAudio {
    /// Replace the clip's audio with this narration file, padded or cut to the
    /// clip's length.
    Narration(PathBuf),
    /// Keep the clip's own first audio stream.
    Embedded,
    /// The clip has no audio; synthesize silence for its full length.
    Silent,
}

/// Encode a still image held for `duration_secs` over `audio`.
pub fn still_segment_command(
    toolchain: &Toolchain,
    image: &Path,
    audio: &Path,
    duration_secs: f64,
    output: &Path,
    profile: &RenderProfile,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(toolchain.ffmpeg.clone());
    cmd.timeout(toolchain.encode_timeout);
    cmd.arg("-y");
    cmd.args(["-loop", "1", "-framerate", &profile.video.frame_rate.to_string()]);
    cmd.arg("-i").path_arg(image);
    cmd.arg("-i").path_arg(audio);
    cmd.args(["-map", "0:v:0", "-map", "1:a:0"]);
    cmd.args(["-vf", &canonical_video_filter(&profile.video)]);
    cmd.args(["-af", &canonical_audio_filter(&profile.audio)]);
    video_encode_args(&mut cmd, &profile.video);
    cmd.args(["-tune", "stillimage"]);
    audio_encode_args(&mut cmd, &profile.audio);
    cmd.args(["-t", &duration_arg(duration_secs)]);
    mp4_output_args(&mut cmd);
    cmd.path_arg(output);
    cmd
}

/// Encode an animation clip of `duration_secs` with the given audio source.
pub fn clip_segment_command(
    toolchain: &Toolchain,
    clip: &Path,
    audio: &ClipAudio,
    duration_secs: f64,
    output: &Path,
    profile: &RenderProfile,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(toolchain.ffmpeg.clone());
    cmd.timeout(toolchain.encode_timeout);
    cmd.arg("-y");
    cmd.arg("-i").path_arg(clip);

    let audio_filter = canonical_audio_filter(&profile.audio);
    let (audio_map, audio_filter) = match audio {
        ClipAudio::Narration(path) => {
            cmd.arg("-i").path_arg(path);
            ("1:a:0", format!("{audio_filter},apad"))
        }
        ClipAudio::Embedded => ("0:a:0", audio_filter),
        ClipAudio::Silent => {
            cmd.args(["-f", "lavfi", "-i", &silence_source(&profile.audio)]);
            ("1:a:0", audio_filter)
        }
    };

    cmd.args(["-map", "0:v:0", "-map", audio_map]);
    cmd.args(["-vf", &canonical_video_filter(&profile.video)]);
    cmd.args(["-af", &audio_filter]);
    video_encode_args(&mut cmd, &profile.video);
    audio_encode_args(&mut cmd, &profile.audio);
    cmd.args(["-t", &duration_arg(duration_secs)]);
    mp4_output_args(&mut cmd);
    cmd.path_arg(output);
    cmd
}
