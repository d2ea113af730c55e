//! Typed ffmpeg invocations, one builder per render operation.
//!
//! Every builder is a pure function from paths and the target profile to a
//! [`ToolCommand`](crate::ToolCommand); nothing here spawns a process. The
//! pipeline hands the result to a [`ToolRunner`](crate::ToolRunner).

mod audio;
mod bumper;
mod concat;
mod filters;
mod segment;

pub use audio::{audio_is_compliant, cbr_audio_command};
pub use bumper::bumper_command;
pub use concat::{concat_command, concat_filter_graph};
pub use filters::{canonical_audio_filter, canonical_video_filter};
pub use segment::{clip_segment_command, still_segment_command, ClipAudio};
