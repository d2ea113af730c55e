//! In-process [`ToolRunner`] for tests.
//!
//! [`FakeRunner`] never spawns anything. ffprobe calls are answered from
//! canned JSON keyed by the probed path. ffmpeg calls write a placeholder at
//! the output path (failing like ffmpeg would when its directory is missing)
//! and register a probe for it derived from the command's own flags, so a
//! later probe of a normalized segment reports exactly what the command asked
//! for.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::command::{ToolCommand, ToolOutput};
use crate::probe::parse_probe_json;
use crate::runner::ToolRunner;

type Matcher = Box<dyn Fn(&ToolCommand) -> bool + Send + Sync>;

#[derive(Default)]
struct FakeState {
    probes: HashMap<PathBuf, String>,
    calls: Vec<ToolCommand>,
    failures: Vec<(Matcher, String)>,
    no_output: Vec<Matcher>,
}

/// Recording fake for the external toolchain.
#[derive(Default)]
pub struct FakeRunner {
    state: Mutex<FakeState>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer ffprobe for `path` with `json`.
    pub fn set_probe(&self, path: impl Into<PathBuf>, json: impl Into<String>) {
        self.state.lock().probes.insert(path.into(), json.into());
    }

    /// Fail every command matching `pred` with a tool error carrying `message`.
    pub fn fail_when(
        &self,
        pred: impl Fn(&ToolCommand) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) {
        self.state
            .lock()
            .failures
            .push((Box::new(pred), message.into()));
    }

    /// Report success for commands matching `pred` without writing output.
    pub fn skip_output_when(&self, pred: impl Fn(&ToolCommand) -> bool + Send + Sync + 'static) {
        self.state.lock().no_output.push(Box::new(pred));
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.state.lock().calls.clone()
    }

    /// Only the ffmpeg commands run so far.
    pub fn ffmpeg_calls(&self) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.tool_name() == "ffmpeg")
            .collect()
    }

    /// The ffmpeg command that wrote `output`, if any.
    pub fn command_for_output(&self, output: &Path) -> Option<ToolCommand> {
        let wanted = output.to_string_lossy();
        self.ffmpeg_calls()
            .into_iter()
            .rev()
            .find(|c| c.last_arg() == Some(wanted.as_ref()))
    }

    fn probe(&self, cmd: &ToolCommand) -> sr_core::Result<ToolOutput> {
        let path = PathBuf::from(cmd.last_arg().unwrap_or_default());
        match self.state.lock().probes.get(&path) {
            Some(json) => Ok(ToolOutput {
                stdout: json.clone(),
                ..ToolOutput::ok()
            }),
            None => Err(sr_core::Error::tool(
                "ffprobe",
                format!("{}: No such file or directory", path.display()),
            )),
        }
    }

    fn encode(&self, cmd: &ToolCommand) -> sr_core::Result<ToolOutput> {
        let output = PathBuf::from(cmd.last_arg().unwrap_or_default());
        let derived = self.derive_probe(cmd);
        let duration = derived["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let skip = self.state.lock().no_output.iter().any(|m| m(cmd));
        if !skip {
            match output.parent() {
                Some(dir) if dir.as_os_str().is_empty() || dir.is_dir() => {}
                _ => {
                    return Err(sr_core::Error::tool(
                        "ffmpeg",
                        format!("{}: No such file or directory", output.display()),
                    ))
                }
            }
            std::fs::write(&output, b"fake media\n")?;
            self.state
                .lock()
                .probes
                .insert(output, derived.to_string());
        }

        let stderr = if cmd.has_arg("-progress") {
            let half = (duration * 500_000.0) as i64;
            let full = (duration * 1_000_000.0) as i64;
            format!(
                "frame=1\nfps=30.00\nout_time_us={half}\nspeed=4.0x\nprogress=continue\n\
                 out_time_us={full}\nspeed=4.0x\nprogress=end\n"
            )
        } else {
            String::new()
        };

        Ok(ToolOutput {
            stderr,
            ..ToolOutput::ok()
        })
    }

    /// Probe JSON describing what `cmd` would have produced.
    fn derive_probe(&self, cmd: &ToolCommand) -> Value {
        let inputs: Vec<PathBuf> = cmd.flag_values("-i").into_iter().map(PathBuf::from).collect();
        let probes: Vec<_> = {
            let state = self.state.lock();
            inputs
                .iter()
                .filter_map(|p| state.probes.get(p))
                .filter_map(|j| parse_probe_json(j).ok())
                .collect()
        };

        let is_concat = cmd
            .flag_value("-filter_complex")
            .is_some_and(|g| g.contains("concat="));
        let duration = match cmd.flag_value("-t").and_then(|t| t.parse::<f64>().ok()) {
            Some(t) => t,
            None if is_concat => probes.iter().filter_map(|p| p.duration_secs).sum(),
            None => probes.first().and_then(|p| p.duration_secs).unwrap_or(0.0),
        };

        let mut streams = Vec::new();
        if !cmd.has_arg("-vn") {
            let source = probes.iter().find_map(|p| p.video.clone());
            let (width, height) = cmd
                .argv()
                .iter()
                .find_map(|a| scale_dims(a))
                .or_else(|| source.as_ref().map(|v| (v.width, v.height)))
                .unwrap_or((0, 0));
            let rate = cmd
                .flag_value("-r")
                .map(|r| format!("{r}/1"))
                .unwrap_or_else(|| "30/1".into());
            let codec = match cmd.flag_value("-c:v") {
                Some("libx264") | None => "h264",
                Some(other) => other,
            };
            streams.push(json!({
                "codec_type": "video",
                "codec_name": codec,
                "width": width,
                "height": height,
                "r_frame_rate": rate,
                "avg_frame_rate": rate,
                "pix_fmt": cmd.flag_value("-pix_fmt").unwrap_or("yuv420p"),
                "duration": format!("{duration:.6}"),
            }));
        }

        let bit_rate = cmd.flag_value("-b:a").and_then(parse_kbps);
        streams.push(json!({
            "codec_type": "audio",
            "codec_name": cmd.flag_value("-c:a").unwrap_or("aac"),
            "sample_rate": cmd.flag_value("-ar").unwrap_or("48000"),
            "channels": cmd.flag_value("-ac").and_then(|c| c.parse::<u32>().ok()).unwrap_or(2),
            "bit_rate": bit_rate.map(|b| b.to_string()),
            "duration": format!("{duration:.6}"),
        }));

        json!({
            "streams": streams,
            "format": {
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": format!("{duration:.6}"),
                "bit_rate": bit_rate.map(|b| b.to_string()),
            }
        })
    }
}

fn scale_dims(arg: &str) -> Option<(u32, u32)> {
    let rest = &arg[arg.find("scale=")? + "scale=".len()..];
    let mut parts = rest.split([':', ',', '[', ';']);
    let w = parts.next()?.parse().ok()?;
    let h = parts.next()?.parse().ok()?;
    Some((w, h))
}

fn parse_kbps(s: &str) -> Option<u64> {
    s.strip_suffix('k')
        .and_then(|k| k.parse::<u64>().ok())
        .map(|k| k * 1000)
        .or_else(|| s.parse().ok())
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, cmd: &ToolCommand) -> sr_core::Result<ToolOutput> {
        let failure = {
            let mut state = self.state.lock();
            state.calls.push(cmd.clone());
            state
                .failures
                .iter()
                .find(|(m, _)| m(cmd))
                .map(|(_, msg)| msg.clone())
        };
        if let Some(message) = failure {
            return Err(sr_core::Error::tool(cmd.tool_name(), message));
        }

        if cmd.tool_name() == "ffprobe" {
            self.probe(cmd)
        } else {
            self.encode(cmd)
        }
    }
}

// ---------------------------------------------------------------------------
// Canned probe builders
// ---------------------------------------------------------------------------

/// ffprobe JSON for a video file, optionally with an audio stream.
pub fn video_probe_json(
    width: u32,
    height: u32,
    fps: u32,
    duration_secs: f64,
    with_audio: bool,
) -> String {
    let mut streams = vec![json!({
        "codec_type": "video",
        "codec_name": "h264",
        "width": width,
        "height": height,
        "r_frame_rate": format!("{fps}/1"),
        "avg_frame_rate": format!("{fps}/1"),
        "pix_fmt": "yuv420p",
    })];
    if with_audio {
        streams.push(json!({
            "codec_type": "audio",
            "codec_name": "aac",
            "sample_rate": "44100",
            "channels": 2,
            "bit_rate": "128000",
        }));
    }
    json!({
        "streams": streams,
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": format!("{duration_secs:.6}")}
    })
    .to_string()
}

/// ffprobe JSON for an audio-only file.
pub fn audio_probe_json(
    codec: &str,
    sample_rate: u32,
    channels: u32,
    bit_rate: u64,
    duration_secs: f64,
) -> String {
    json!({
        "streams": [{
            "codec_type": "audio",
            "codec_name": codec,
            "sample_rate": sample_rate.to_string(),
            "channels": channels,
            "bit_rate": bit_rate.to_string(),
        }],
        "format": {"duration": format!("{duration_secs:.6}"), "bit_rate": bit_rate.to_string()}
    })
    .to_string()
}
