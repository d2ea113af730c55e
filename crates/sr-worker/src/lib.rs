//! # sr-worker
//!
//! Runs render jobs pulled from a queue.
//!
//! - **[`JobRequest`]** -- the queue message naming a job and its requester's
//!   download handle.
//! - **[`JobTracker`]** -- concurrent per-job status records answering "is my
//!   video ready".
//! - **[`WorkerPool`]** -- a fixed number of tokio tasks sharing one bounded
//!   queue; each task renders one whole job at a time.
//! - **Publishers** ([`notifications`]) -- in-process broadcast, HTTP webhook
//!   and stdout sinks for completion events.

pub mod notifications;
pub mod processor;
pub mod request;
pub mod tracker;

pub use notifications::{BroadcastPublisher, StdoutPublisher, WebhookPublisher};
pub use processor::WorkerPool;
pub use request::{JobOverrides, JobRequest};
pub use tracker::{JobRecord, JobTracker};
