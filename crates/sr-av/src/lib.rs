//! # sr-av
//!
//! External audio/video tool plumbing for the slidereel render engine.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`], [`Toolchain`]) -- find ffmpeg and
//!   ffprobe and pair them with per-operation time budgets.
//! - **Command construction** ([`ToolCommand`]) -- a plain builder whose
//!   program, arguments and timeout can be inspected without spawning.
//! - **Execution** ([`ToolRunner`], [`SystemRunner`]) -- bounded-time process
//!   supervision; tests inject a fake runner instead.
//! - **Probing** ([`probe`]) -- ffprobe JSON mapped into [`MediaProbe`].
//! - **Progress** ([`progress`]) -- parsing of ffmpeg `-progress` blocks.
//! - **Typed builders** ([`actions`]) -- one function per operation: CBR
//!   audio, still-image segment, clip segment, bumper, filter-graph concat.

pub mod actions;
pub mod command;
pub mod probe;
pub mod progress;
pub mod runner;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::{probe_media, AudioStreamInfo, MediaProbe, VideoStreamInfo};
pub use progress::{EncodeProgress, ProgressParser};
pub use runner::{SystemRunner, ToolRunner};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, Toolchain};

pub use actions::{
    audio_is_compliant, bumper_command, canonical_audio_filter, canonical_video_filter,
    cbr_audio_command, clip_segment_command, concat_command, concat_filter_graph,
    still_segment_command, ClipAudio,
};
