//! # sr-pipeline
//!
//! The render-assembly engine: turns a job's slide visuals and narration
//! into one continuous video.
//!
//! This crate provides:
//!
//! - **[`sequencer`]** -- discovers visuals and narration, extracts slide
//!   indices, pairs and orders them into a [`SequencePlan`].
//! - **[`Normalizer`]** -- brings every entry to the canonical profile with
//!   bounded per-job concurrency.
//! - **[`BumperProcessor`]** -- canonicalizes the intro/outro clips.
//! - **[`ConcatEngine`]** -- filter-graph merge with progress reporting.
//! - **[`CompletionNotifier`]** -- confirms the artifact, publishes the
//!   completion event through a [`Publisher`], reclaims intermediates.
//! - **[`RenderPipeline`]** -- drives one job through all stages.

pub mod bumper;
pub mod concat;
pub mod context;
pub mod normalizer;
pub mod notifier;
pub mod pipeline;
pub mod sequencer;

pub use bumper::{BumperProcessor, BumperSet};
pub use concat::ConcatEngine;
pub use context::{EngineContext, ProgressSender};
pub use normalizer::{DroppedSegment, NormalizeReport, NormalizedSegment, Normalizer};
pub use notifier::{CompletionNotifier, Publisher};
pub use pipeline::{RenderOutcome, RenderPipeline};
pub use sequencer::{parse_slide_index, SegmentAudio, SequenceEntry, SequencePlan, VisualKind};
