//! Execution context shared by every stage of a render.

use std::sync::Arc;

use sr_av::{ToolRunner, Toolchain};
use sr_core::config::PolicyConfig;
use sr_core::JobState;

/// Sender for reporting progress from within stages.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) and a
/// human-readable step description, plus an optional callback for job state
/// transitions.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
    on_state: Box<dyn Fn(JobState) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            on_state: Box::new(|_| {}),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    /// Builder: also receive job state transitions.
    pub fn with_state_callback(mut self, on_state: impl Fn(JobState) + Send + Sync + 'static) -> Self {
        self.on_state = Box::new(on_state);
        self
    }

    /// Report progress.
    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress.clamp(0.0, 100.0), step);
    }

    /// Report a state transition.
    pub fn state(&self, state: JobState) {
        (self.on_state)(state);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Tool access and policy injected into every stage.
#[derive(Clone)]
pub struct EngineContext {
    /// Executes ffmpeg/ffprobe; a fake in tests.
    pub runner: Arc<dyn ToolRunner>,
    /// Resolved tool paths and time budgets.
    pub toolchain: Toolchain,
    pub policy: PolicyConfig,
}

impl EngineContext {
    pub fn new(runner: Arc<dyn ToolRunner>, toolchain: Toolchain, policy: PolicyConfig) -> Self {
        Self {
            runner,
            toolchain,
            policy,
        }
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("toolchain", &self.toolchain)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn progress_is_clamped_and_forwarded() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sender = ProgressSender::new(move |p, step| sink.lock().unwrap().push((p, step.to_string())));
        sender.send(150.0, "Concatenating");
        sender.send(-1.0, "Sequencing");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(100.0, "Concatenating".to_string()), (0.0, "Sequencing".to_string())]
        );
    }

    #[test]
    fn state_callback_receives_transitions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sender = ProgressSender::noop().with_state_callback(move |s| sink.lock().unwrap().push(s));
        sender.state(JobState::Sequencing);
        sender.state(JobState::Failed);
        assert_eq!(*seen.lock().unwrap(), vec![JobState::Sequencing, JobState::Failed]);
    }
}
