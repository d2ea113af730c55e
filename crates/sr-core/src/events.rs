//! Job lifecycle events and the in-process event bus.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers can catch up.
//! [`CompletionEvent`] is the wire message announced downstream when an
//! artifact is ready.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::error::ErrorKind;
use crate::ids::{FileId, JobId};
use crate::job::JobState;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

/// Event name carried by every completion message.
pub const ARTIFACT_READY: &str = "artifact-ready";

// ---------------------------------------------------------------------------
// CompletionEvent
// ---------------------------------------------------------------------------

/// Message published downstream once the final artifact is confirmed on disk.
///
/// Serializes as `{ "event": "artifact-ready", "file_path", "job_id", "file_id" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub event: String,
    pub file_path: PathBuf,
    pub job_id: JobId,
    pub file_id: FileId,
}

impl CompletionEvent {
    pub fn artifact_ready(job_id: JobId, file_id: FileId, file_path: PathBuf) -> Self {
        Self {
            event: ARTIFACT_READY.to_string(),
            file_path,
            job_id,
            file_id,
        }
    }
}

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    JobQueued {
        job_id: JobId,
    },
    JobStarted {
        job_id: JobId,
    },
    JobStateChanged {
        job_id: JobId,
        state: JobState,
    },
    JobProgress {
        job_id: JobId,
        progress: f32,
        step: String,
    },
    JobCompleted {
        job_id: JobId,
        file_path: PathBuf,
    },
    JobFailed {
        job_id: JobId,
        kind: ErrorKind,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event stamped with the current time.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_id() -> JobId {
        JobId::parse("deck-7").unwrap()
    }

    #[test]
    fn completion_event_wire_shape() {
        let event = CompletionEvent::artifact_ready(
            job_id(),
            FileId::parse("f-1").unwrap(),
            PathBuf::from("/out/deck-7/outputs/deck-7.mp4"),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "event": "artifact-ready",
                "file_path": "/out/deck-7/outputs/deck-7.mp4",
                "job_id": "deck-7",
                "file_id": "f-1",
            })
        );
    }

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.broadcast(EventPayload::JobQueued { job_id: job_id() });

        let event = rx.try_recv().unwrap();
        match &event.payload {
            EventPayload::JobQueued { job_id: received } => assert_eq!(*received, job_id()),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        for _ in 0..150 {
            bus.broadcast(EventPayload::JobQueued { job_id: job_id() });
        }
        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::default();
        bus.broadcast(EventPayload::JobQueued { job_id: job_id() });
        bus.broadcast(EventPayload::JobStarted { job_id: job_id() });

        let recent = bus.recent_events(2);
        assert!(matches!(recent[0].payload, EventPayload::JobStarted { .. }));
        assert!(matches!(recent[1].payload, EventPayload::JobQueued { .. }));
    }

    #[test]
    fn payload_tagged_serialization() {
        let payload = EventPayload::JobFailed {
            job_id: job_id(),
            kind: ErrorKind::ConcatFailure,
            error: "boom".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "job_failed");
        assert_eq!(json["kind"], "concat_failure");
    }
}
