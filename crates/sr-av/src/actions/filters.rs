//! Filter strings and encoder flags shared by every canonicalizing command.

use sr_core::config::{AudioProfile, VideoProfile};

use crate::command::ToolCommand;

/// Scale-to-fit, centre-pad, square pixels, fixed rate and pixel format.
///
/// ```
/// use sr_core::config::VideoProfile;
/// let f = sr_av::canonical_video_filter(&VideoProfile::default());
/// assert!(f.starts_with("scale=1920:1080:force_original_aspect_ratio=decrease"));
/// assert!(f.ends_with("fps=30,format=yuv420p"));
/// ```
pub fn canonical_video_filter(video: &VideoProfile) -> String {
    let (w, h) = (video.width, video.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={},format={}",
        video.frame_rate, video.pixel_format
    )
}

/// Resample to the target rate and force sample format and channel layout.
pub fn canonical_audio_filter(audio: &AudioProfile) -> String {
    format!(
        "aresample={sr},aformat=sample_fmts=fltp:sample_rates={sr}:channel_layouts={}",
        audio.channel_layout(),
        sr = audio.sample_rate
    )
}

/// `anullsrc` source description for a silent track in the target layout.
pub(crate) fn silence_source(audio: &AudioProfile) -> String {
    format!(
        "anullsrc=channel_layout={}:sample_rate={}",
        audio.channel_layout(),
        audio.sample_rate
    )
}

/// Video encoder flags for the canonical profile.
pub(crate) fn video_encode_args(cmd: &mut ToolCommand, video: &VideoProfile) {
    cmd.args(["-c:v", video.codec.as_str()]);
    cmd.args(["-preset", video.preset.as_str()]);
    cmd.args(["-crf", &video.crf.to_string()]);
    cmd.args(["-pix_fmt", video.pixel_format.as_str()]);
    cmd.args(["-r", &video.frame_rate.to_string()]);
}

/// Audio encoder flags for the canonical profile.
pub(crate) fn audio_encode_args(cmd: &mut ToolCommand, audio: &AudioProfile) {
    cmd.args(["-c:a", audio.codec.as_str()]);
    cmd.args(["-b:a", &audio.bitrate_arg()]);
    cmd.args(["-ar", &audio.sample_rate.to_string()]);
    cmd.args(["-ac", &audio.channels.to_string()]);
}

/// Container flags for a seekable MP4.
pub(crate) fn mp4_output_args(cmd: &mut ToolCommand) {
    cmd.args(["-movflags", "+faststart"]);
}

/// Seconds formatted for `-t` with millisecond precision.
pub(crate) fn duration_arg(secs: f64) -> String {
    format!("{secs:.3}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn video_filter_uses_profile() {
        let v = VideoProfile {
            width: 1280,
            height: 720,
            frame_rate: 25,
            ..VideoProfile::default()
        };
        assert_eq!(
            canonical_video_filter(&v),
            "scale=1280:720:force_original_aspect_ratio=decrease,\
             pad=1280:720:(ow-iw)/2:(oh-ih)/2,setsar=1,fps=25,format=yuv420p"
        );
    }

    #[test]
    fn audio_filter_uses_profile() {
        let a = AudioProfile {
            sample_rate: 44_100,
            channels: 1,
            ..AudioProfile::default()
        };
        assert_eq!(
            canonical_audio_filter(&a),
            "aresample=44100,aformat=sample_fmts=fltp:sample_rates=44100:channel_layouts=mono"
        );
        assert_eq!(silence_source(&a), "anullsrc=channel_layout=mono:sample_rate=44100");
    }

    #[test]
    fn encode_args_carry_profile() {
        let mut cmd = ToolCommand::new(PathBuf::from("ffmpeg"));
        video_encode_args(&mut cmd, &VideoProfile::default());
        audio_encode_args(&mut cmd, &AudioProfile::default());
        assert_eq!(cmd.flag_value("-c:v"), Some("libx264"));
        assert_eq!(cmd.flag_value("-r"), Some("30"));
        assert_eq!(cmd.flag_value("-b:a"), Some("192k"));
        assert_eq!(cmd.flag_value("-ar"), Some("48000"));
        assert_eq!(cmd.flag_value("-ac"), Some("2"));
    }

    #[test]
    fn duration_is_millisecond_precise() {
        assert_eq!(duration_arg(3.0), "3.000");
        assert_eq!(duration_arg(2.34567), "2.346");
    }
}
