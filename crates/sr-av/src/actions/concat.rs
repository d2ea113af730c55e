//! Filter-graph concatenation of normalized segments.
//!
//! Each input is re-run through the canonical video and audio filters inside
//! the graph before `concat`, so residual per-segment drift in timebase,
//! sample format or SAR cannot break the merge the way a stream-copy concat
//! demuxer does.

use std::path::{Path, PathBuf};

use sr_core::config::RenderProfile;

use super::filters::{
    audio_encode_args, canonical_audio_filter, canonical_video_filter, mp4_output_args,
    video_encode_args,
};
use crate::command::ToolCommand;
use crate::tools::Toolchain;

/// Build the `-filter_complex` graph merging `inputs` video+audio pairs into
/// `[outv][outa]`.
pub fn concat_filter_graph(inputs: usize, profile: &RenderProfile) -> String {
    let video = canonical_video_filter(&profile.video);
    let audio = canonical_audio_filter(&profile.audio);

    let streams: String = (0..inputs)
        .map(|i| format!("[{i}:v:0]{video}[v{i}];[{i}:a:0]{audio}[a{i}];"))
        .collect();
    let pads: String = (0..inputs).map(|i| format!("[v{i}][a{i}]")).collect();
    format!("{streams}{pads}concat=n={inputs}:v=1:a=1[outv][outa]")
}

/// Merge `inputs` in order into `output`, reporting progress on stderr.
pub fn concat_command(
    toolchain: &Toolchain,
    inputs: &[PathBuf],
    output: &Path,
    profile: &RenderProfile,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(toolchain.ffmpeg.clone());
    cmd.timeout(toolchain.concat_timeout);
    cmd.args(["-y", "-nostats", "-progress", "pipe:2"]);
    for input in inputs {
        cmd.arg("-i").path_arg(input);
    }
    cmd.args(["-filter_complex", &concat_filter_graph(inputs.len(), profile)]);
    cmd.args(["-map", "[outv]", "-map", "[outa]"]);
    video_encode_args(&mut cmd, &profile.video);
    audio_encode_args(&mut cmd, &profile.audio);
    mp4_output_args(&mut cmd);
    cmd.path_arg(output);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_core::config::ToolsConfig;

    #[test]
    fn graph_for_two_inputs() {
        let graph = concat_filter_graph(2, &RenderProfile::default());
        assert!(graph.starts_with("[0:v:0]scale=1920:1080:"));
        assert!(graph.contains("[v0];[0:a:0]aresample=48000,"));
        assert!(graph.contains("[1:v:0]"));
        assert!(graph.ends_with("[v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]"));
    }

    #[test]
    fn graph_for_single_input() {
        let profile = RenderProfile::default();
        let video = canonical_video_filter(&profile.video);
        let audio = canonical_audio_filter(&profile.audio);
        assert_eq!(
            concat_filter_graph(1, &profile),
            format!("[0:v:0]{video}[v0];[0:a:0]{audio}[a0];[v0][a0]concat=n=1:v=1:a=1[outv][outa]")
        );
    }

    #[test]
    fn command_lists_inputs_in_order() {
        let tc = Toolchain::from_config(&ToolsConfig::default());
        let inputs = vec![
            PathBuf::from("/adj/intro.mp4"),
            PathBuf::from("/adj/seg_0001.mp4"),
            PathBuf::from("/adj/outro.mp4"),
        ];
        let cmd = concat_command(&tc, &inputs, Path::new("/out/job.mp4"), &RenderProfile::default());
        assert_eq!(
            cmd.flag_values("-i"),
            vec!["/adj/intro.mp4", "/adj/seg_0001.mp4", "/adj/outro.mp4"]
        );
        assert_eq!(cmd.flag_value("-progress"), Some("pipe:2"));
        assert_eq!(cmd.flag_values("-map"), vec!["[outv]", "[outa]"]);
        assert!(cmd
            .flag_value("-filter_complex")
            .unwrap()
            .contains("concat=n=3:v=1:a=1"));
        assert!(!cmd.has_arg("copy"));
        assert_eq!(cmd.time_limit(), tc.concat_timeout);
        assert_eq!(cmd.last_arg(), Some("/out/job.mp4"));
    }
}
