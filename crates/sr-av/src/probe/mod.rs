//! Media probing through ffprobe.
//!
//! [`probe_media`] shells out to `ffprobe -show_format -show_streams` and maps
//! the JSON into a [`MediaProbe`]: container duration and bitrate plus the
//! first video and first audio stream, which is all the engine decides on.

pub mod ffprobe;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;
use crate::runner::ToolRunner;
use crate::tools::Toolchain;

pub use self::ffprobe::parse_probe_json;

/// Properties of the first video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
    pub pixel_format: Option<String>,
}

/// Properties of the first audio stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub codec: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    /// Stream bitrate in bits per second.
    pub bit_rate: Option<u64>,
}

/// Probe result for one media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub format_name: Option<String>,
    pub duration_secs: Option<f64>,
    /// Container bitrate in bits per second.
    pub bit_rate: Option<u64>,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
}

impl MediaProbe {
    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Duration, failing when ffprobe did not report a positive one.
    pub fn require_duration(&self) -> sr_core::Result<f64> {
        match self.duration_secs {
            Some(d) if d.is_finite() && d > 0.0 => Ok(d),
            Some(d) => Err(sr_core::Error::Probe(format!("non-positive duration {d}"))),
            None => Err(sr_core::Error::Probe("duration unavailable".into())),
        }
    }

    /// Audio bitrate, preferring the stream value over the container value.
    pub fn audio_bit_rate(&self) -> Option<u64> {
        self.audio
            .as_ref()
            .and_then(|a| a.bit_rate)
            .or(self.bit_rate)
    }

    /// One-line diagnostic used in logs before merging.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MediaProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.duration_secs {
            Some(d) => write!(f, "duration={d:.3}s")?,
            None => write!(f, "duration=?")?,
        }
        match &self.video {
            Some(v) => {
                write!(f, " video={} {}x{}", v.codec, v.width, v.height)?;
                match v.frame_rate {
                    Some(r) => write!(f, "@{r:.3}")?,
                    None => write!(f, "@?")?,
                }
                write!(f, " {}", v.pixel_format.as_deref().unwrap_or("?"))?;
            }
            None => write!(f, " video=none")?,
        }
        match &self.audio {
            Some(a) => {
                write!(f, " audio={}", a.codec)?;
                match a.sample_rate {
                    Some(sr) => write!(f, " {sr}Hz")?,
                    None => write!(f, " ?Hz")?,
                }
                match a.channels {
                    Some(ch) => write!(f, " {ch}ch")?,
                    None => write!(f, " ?ch")?,
                }
            }
            None => write!(f, " audio=none")?,
        }
        Ok(())
    }
}

/// Build the ffprobe invocation for `path`.
pub fn probe_command(toolchain: &Toolchain, path: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new(toolchain.ffprobe.clone());
    cmd.timeout(toolchain.probe_timeout);
    cmd.args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]);
    cmd.path_arg(path);
    cmd
}

/// Probe `path` with ffprobe.
pub async fn probe_media(
    runner: &dyn ToolRunner,
    toolchain: &Toolchain,
    path: &Path,
) -> sr_core::Result<MediaProbe> {
    let output = runner.run(&probe_command(toolchain, path)).await?;
    parse_probe_json(&output.stdout)
        .map_err(|e| sr_core::Error::Probe(format!("{}: {e}", path.display())))
}
