//! Intro/outro bumper canonicalization.

use std::path::Path;

use sr_core::config::RenderProfile;

use super::segment::{clip_segment_command, ClipAudio};
use crate::command::ToolCommand;
use crate::tools::Toolchain;

/// Bring a bumper clip to the canonical profile, keeping its own audio or
/// filling silence when it has none.
pub fn bumper_command(
    toolchain: &Toolchain,
    input: &Path,
    has_audio: bool,
    duration_secs: f64,
    output: &Path,
    profile: &RenderProfile,
) -> ToolCommand {
    let audio = if has_audio {
        ClipAudio::Embedded
    } else {
        ClipAudio::Silent
    };
    clip_segment_command(toolchain, input, &audio, duration_secs, output, profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_core::config::ToolsConfig;

    #[test]
    fn silent_bumper_uses_anullsrc() {
        let tc = Toolchain::from_config(&ToolsConfig::default());
        let cmd = bumper_command(
            &tc,
            Path::new("/b/job-bumper1.mp4"),
            false,
            3.0,
            Path::new("/adj/intro.mp4"),
            &RenderProfile::default(),
        );
        assert_eq!(cmd.flag_value("-f"), Some("lavfi"));
        assert_eq!(cmd.flag_value("-t"), Some("3.000"));
    }

    #[test]
    fn bumper_with_audio_keeps_it() {
        let tc = Toolchain::from_config(&ToolsConfig::default());
        let cmd = bumper_command(
            &tc,
            Path::new("/b/job-bumper2.mp4"),
            true,
            3.0,
            Path::new("/adj/outro.mp4"),
            &RenderProfile::default(),
        );
        assert!(!cmd.has_arg("lavfi"));
        assert_eq!(cmd.flag_values("-map"), vec!["0:v:0", "0:a:0"]);
    }
}
