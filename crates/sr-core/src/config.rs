//! Application configuration types.
//!
//! The top-level [`Config`] struct carries all sub-configs for the target
//! profile, tool locations and timeouts, storage layout, failure policy, the
//! worker pool, and notifications. Every section defaults sensibly so a
//! completely empty file is valid. Components receive the section they need
//! explicitly; nothing here reads process state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: RenderProfile,
    pub tools: ToolsConfig,
    pub storage: StorageConfig,
    pub policy: PolicyConfig,
    pub worker: WorkerConfig,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Reject configurations the engine cannot render with.
    pub fn check(&self) -> Result<()> {
        let v = &self.profile.video;
        let a = &self.profile.audio;

        if v.width == 0 || v.height == 0 {
            return Err(Error::Config("profile.video width/height must be non-zero".into()));
        }
        if v.width % 2 != 0 || v.height % 2 != 0 {
            return Err(Error::Config(format!(
                "profile.video {}x{} must have even dimensions for {}",
                v.width, v.height, v.pixel_format
            )));
        }
        if v.frame_rate == 0 {
            return Err(Error::Config("profile.video frame_rate must be non-zero".into()));
        }
        if a.sample_rate == 0 || a.channels == 0 || a.bitrate_kbps == 0 {
            return Err(Error::Config(
                "profile.audio sample_rate, channels and bitrate_kbps must be non-zero".into(),
            ));
        }
        if self.worker.concurrency == 0 {
            return Err(Error::Config("worker.concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.policy.segment_concurrency == 0 {
            warnings.push("policy.segment_concurrency is 0; segments will be normalized one at a time".into());
        }

        if self.policy.segment_failure == SegmentFailurePolicy::FailJob {
            warnings.push(
                "policy.segment_failure is fail_job; one bad slide will fail the whole job".into(),
            );
        }

        if self.profile.audio.channels > 2 {
            warnings.push(format!(
                "profile.audio.channels is {}; silent fill uses a generic layout",
                self.profile.audio.channels
            ));
        }

        if let Some(ref url) = self.notify.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                warnings.push(format!("notify.webhook_url '{url}' is not an http(s) URL"));
            }
        }

        for (name, secs) in [
            ("probe", self.tools.probe_timeout_secs),
            ("encode", self.tools.encode_timeout_secs),
            ("concat", self.tools.concat_timeout_secs),
        ] {
            if secs == 0 {
                warnings.push(format!("tools.{name}_timeout_secs is 0; every {name} call will time out"));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Render profile
// ---------------------------------------------------------------------------

/// The canonical profile every segment is brought to before concatenation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderProfile {
    pub video: VideoProfile,
    pub audio: AudioProfile,
}

/// Target video stream parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub pixel_format: String,
    /// ffmpeg encoder name (e.g. `libx264`).
    pub codec: String,
    pub preset: String,
    pub crf: u32,
}

impl Default for VideoProfile {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 30,
            pixel_format: "yuv420p".into(),
            codec: "libx264".into(),
            preset: "fast".into(),
            crf: 23,
        }
    }
}

/// Target audio stream parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioProfile {
    /// ffmpeg encoder name (e.g. `aac`).
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub bitrate_kbps: u32,
}

impl AudioProfile {
    /// Bitrate formatted for ffmpeg's `-b:a` flag.
    pub fn bitrate_arg(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }

    /// Channel layout name for `anullsrc`/`aformat`.
    pub fn channel_layout(&self) -> String {
        match self.channels {
            1 => "mono".into(),
            2 => "stereo".into(),
            n => format!("{n}c"),
        }
    }
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            codec: "aac".into(),
            sample_rate: 48_000,
            channels: 2,
            bitrate_kbps: 192,
        }
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// External tool path overrides and per-operation time budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub probe_timeout_secs: u64,
    pub encode_timeout_secs: u64,
    pub concat_timeout_secs: u64,
}

impl ToolsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }

    pub fn concat_timeout(&self) -> Duration {
        Duration::from_secs(self.concat_timeout_secs)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: 60,
            encode_timeout_secs: 1800,
            concat_timeout_secs: 7200,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Roots of the shared artifact tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub slides_root: PathBuf,
    pub audio_root: PathBuf,
    pub bumpers_root: PathBuf,
    pub output_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            slides_root: PathBuf::from("/artifacts/slides"),
            audio_root: PathBuf::from("/artifacts/tts_output"),
            bumpers_root: PathBuf::from("/artifacts/bumpers"),
            output_root: PathBuf::from("/artifacts/video-output"),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What to do when one segment fails to normalize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentFailurePolicy {
    /// Drop the segment, log it, and continue with the rest.
    #[default]
    Skip,
    /// Fail the whole job on the first segment failure.
    FailJob,
}

/// Engine behaviour knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub segment_failure: SegmentFailurePolicy,
    /// Maximum number of segments normalized concurrently within one job.
    pub segment_concurrency: usize,
    /// Window over which the artifact size must stay unchanged.
    pub artifact_settle_ms: u64,
    /// Allowed deviation from the target audio bitrate for a copy instead of a re-encode.
    pub bitrate_tolerance_kbps: u32,
}

impl PolicyConfig {
    pub fn artifact_settle(&self) -> Duration {
        Duration::from_millis(self.artifact_settle_ms)
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            segment_failure: SegmentFailurePolicy::Skip,
            segment_concurrency: 2,
            artifact_settle_ms: 500,
            bitrate_tolerance_kbps: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Job worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of jobs rendered in parallel.
    pub concurrency: usize,
    /// Bounded queue length; `submit` waits when full.
    pub queue_capacity: usize,
    /// Finished (done or failed) job records kept for status queries; the
    /// oldest are evicted beyond this.
    pub retained_jobs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            queue_capacity: 64,
            retained_jobs: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Notify
// ---------------------------------------------------------------------------

/// Downstream completion channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}
