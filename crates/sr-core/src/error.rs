//! Unified error type for slidereel.
//!
//! All crates funnel their failures into [`Error`]. Pipeline stages decide
//! whether an error is absorbed (a dropped segment, an omitted bumper) or ends
//! the job; [`Error::is_fatal`] and [`Error::kind`] carry that distinction to
//! job status reporting.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::job::BumperPosition;

/// Unified error type covering all failure modes in slidereel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither a visual segment nor a visual/narration pair was found.
    #[error("No matchable content: {0}")]
    NoMatchableContent(String),

    /// Normalizing one slide's segment failed.
    #[error("Segment {index} encode failed: {message}")]
    SegmentEncode {
        /// Slide index of the failed segment (`None` for unindexed files).
        index: SegmentLabel,
        /// Human-readable error description.
        message: String,
    },

    /// Normalizing an intro or outro bumper failed.
    #[error("Bumper ({position}) encode failed: {message}")]
    BumperEncode {
        /// Which bumper failed.
        position: BumperPosition,
        /// Human-readable error description.
        message: String,
    },

    /// The filter-graph merge failed.
    #[error("Concat failed: {0}")]
    Concat(String),

    /// The merge reported success but no usable artifact is on disk.
    #[error("Artifact missing after concat: {}", path.display())]
    ArtifactMissingAfterConcat {
        /// Where the artifact was expected.
        path: PathBuf,
    },

    /// Publishing the completion event failed. The artifact is preserved.
    #[error("Notify failed: {0}")]
    Notify(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An external tool exceeded its time budget and was killed.
    #[error("Tool timeout [{tool}]: exceeded {timeout:?}")]
    ToolTimeout {
        /// Name of the tool that was killed.
        tool: String,
        /// The budget that was exceeded.
        timeout: Duration,
    },

    /// Media probing failed or returned unusable data.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration is unusable.
    #[error("Config error: {0}")]
    Config(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Slide label used in segment errors; renders `#3` or `unindexed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLabel(pub Option<u32>);

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(i) => write!(f, "#{i}"),
            None => f.write_str("unindexed"),
        }
    }
}

/// Stable, serializable discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoMatchableContent,
    SegmentEncodeFailure,
    BumperEncodeFailure,
    ConcatFailure,
    ArtifactMissingAfterConcat,
    NotifyFailure,
    Io,
    Tool,
    ToolTimeout,
    Probe,
    Validation,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoMatchableContent => "no_matchable_content",
            Self::SegmentEncodeFailure => "segment_encode_failure",
            Self::BumperEncodeFailure => "bumper_encode_failure",
            Self::ConcatFailure => "concat_failure",
            Self::ArtifactMissingAfterConcat => "artifact_missing_after_concat",
            Self::NotifyFailure => "notify_failure",
            Self::Io => "io",
            Self::Tool => "tool",
            Self::ToolTimeout => "tool_timeout",
            Self::Probe => "probe",
            Self::Validation => "validation",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Return the stable discriminant for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoMatchableContent(_) => ErrorKind::NoMatchableContent,
            Error::SegmentEncode { .. } => ErrorKind::SegmentEncodeFailure,
            Error::BumperEncode { .. } => ErrorKind::BumperEncodeFailure,
            Error::Concat(_) => ErrorKind::ConcatFailure,
            Error::ArtifactMissingAfterConcat { .. } => ErrorKind::ArtifactMissingAfterConcat,
            Error::Notify(_) => ErrorKind::NotifyFailure,
            Error::Io { .. } => ErrorKind::Io,
            Error::Tool { .. } => ErrorKind::Tool,
            Error::ToolTimeout { .. } => ErrorKind::ToolTimeout,
            Error::Probe(_) => ErrorKind::Probe,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Config(_) => ErrorKind::Config,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error ends the job when it reaches the pipeline level.
    ///
    /// Segment and bumper encode failures are absorbed under the default
    /// best-effort policy; everything else is terminal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::SegmentEncode { .. } | Error::BumperEncode { .. }
        )
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::SegmentEncode`].
    pub fn segment(index: Option<u32>, message: impl fmt::Display) -> Self {
        Error::SegmentEncode {
            index: SegmentLabel(index),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::BumperEncode`].
    pub fn bumper(position: BumperPosition, message: impl fmt::Display) -> Self {
        Error::BumperEncode {
            position,
            message: message.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
