//! Narration audio canonicalization.

use std::path::Path;

use sr_core::config::AudioProfile;

use crate::command::ToolCommand;
use crate::probe::MediaProbe;
use crate::tools::Toolchain;

/// Re-encode `input` to constant-bitrate audio in the target profile.
///
/// Video streams (cover art in MP3s) are dropped and timestamps are rebased
/// so the probed duration of the result is exact.
pub fn cbr_audio_command(
    toolchain: &Toolchain,
    input: &Path,
    output: &Path,
    audio: &AudioProfile,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(toolchain.ffmpeg.clone());
    cmd.timeout(toolchain.encode_timeout);
    cmd.args(["-y", "-i"]).path_arg(input);
    cmd.arg("-vn");
    cmd.args(["-ar", &audio.sample_rate.to_string()]);
    cmd.args(["-ac", &audio.channels.to_string()]);
    cmd.args(["-c:a", audio.codec.as_str()]);
    cmd.args(["-b:a", &audio.bitrate_arg()]);
    cmd.args(["-fflags", "+bitexact", "-avoid_negative_ts", "make_zero"]);
    cmd.path_arg(output);
    cmd
}

/// Whether a probed narration file already matches the target audio profile
/// closely enough to be used without re-encoding.
///
/// Requires the target codec, sample rate and channel count, and a bitrate
/// within `tolerance_kbps` of the target. A file whose bitrate cannot be
/// determined is never compliant.
pub fn audio_is_compliant(probe: &MediaProbe, audio: &AudioProfile, tolerance_kbps: u32) -> bool {
    let Some(stream) = probe.audio.as_ref() else {
        return false;
    };
    if probe.has_video() {
        return false;
    }
    if !stream.codec.eq_ignore_ascii_case(&audio.codec)
        || stream.sample_rate != Some(audio.sample_rate)
        || stream.channels != Some(audio.channels)
    {
        return false;
    }
    let Some(bps) = probe.audio_bit_rate() else {
        return false;
    };
    let target = u64::from(audio.bitrate_kbps) * 1000;
    bps.abs_diff(target) <= u64::from(tolerance_kbps) * 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::AudioStreamInfo;
    use sr_core::config::ToolsConfig;
    use std::path::PathBuf;

    fn narration(codec: &str, sr: u32, ch: u32, bps: Option<u64>) -> MediaProbe {
        MediaProbe {
            format_name: None,
            duration_secs: Some(3.0),
            bit_rate: None,
            video: None,
            audio: Some(AudioStreamInfo {
                codec: codec.into(),
                sample_rate: Some(sr),
                channels: Some(ch),
                bit_rate: bps,
            }),
        }
    }

    #[test]
    fn command_targets_profile() {
        let tc = Toolchain::from_config(&ToolsConfig::default());
        let cmd = cbr_audio_command(
            &tc,
            &PathBuf::from("/a/slide_1.mp3"),
            &PathBuf::from("/t/slide_1.m4a"),
            &AudioProfile::default(),
        );
        assert_eq!(cmd.flag_value("-i"), Some("/a/slide_1.mp3"));
        assert_eq!(cmd.flag_value("-ar"), Some("48000"));
        assert_eq!(cmd.flag_value("-ac"), Some("2"));
        assert_eq!(cmd.flag_value("-b:a"), Some("192k"));
        assert_eq!(cmd.flag_value("-c:a"), Some("aac"));
        assert!(cmd.has_arg("-vn"));
        assert_eq!(cmd.last_arg(), Some("/t/slide_1.m4a"));
        assert_eq!(cmd.time_limit(), tc.encode_timeout);
    }

    #[test]
    fn compliant_when_everything_matches() {
        let p = narration("aac", 48_000, 2, Some(195_000));
        assert!(audio_is_compliant(&p, &AudioProfile::default(), 8));
    }

    #[test]
    fn mp3_is_never_compliant() {
        let p = narration("mp3", 48_000, 2, Some(192_000));
        assert!(!audio_is_compliant(&p, &AudioProfile::default(), 8));
    }

    #[test]
    fn rate_channel_and_bitrate_mismatches() {
        let profile = AudioProfile::default();
        assert!(!audio_is_compliant(&narration("aac", 44_100, 2, Some(192_000)), &profile, 8));
        assert!(!audio_is_compliant(&narration("aac", 48_000, 1, Some(192_000)), &profile, 8));
        assert!(!audio_is_compliant(&narration("aac", 48_000, 2, Some(128_000)), &profile, 8));
        assert!(!audio_is_compliant(&narration("aac", 48_000, 2, None), &profile, 8));
    }

    #[test]
    fn missing_audio_stream_is_not_compliant() {
        let mut p = narration("aac", 48_000, 2, Some(192_000));
        p.audio = None;
        assert!(!audio_is_compliant(&p, &AudioProfile::default(), 8));
    }
}
