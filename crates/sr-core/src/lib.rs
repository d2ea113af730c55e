//! sr-core: shared types, IDs, errors, configuration, job model, and events.
//!
//! This crate is the foundational dependency for all other sr-* crates,
//! providing validated identifiers, a unified error type, the render target
//! profile, the per-job state machine, and a broadcast event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod job;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, ErrorKind, Result};
pub use ids::*;
pub use job::{BumperPosition, Job, JobPaths, JobState};
