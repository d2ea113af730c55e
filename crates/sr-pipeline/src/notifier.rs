//! Completion: confirm the artifact, announce it, reclaim intermediates.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sr_core::events::CompletionEvent;
use sr_core::{Error, Job, JobPaths, Result};

/// Number of settle windows to wait for the artifact size to stop changing.
const MAX_SETTLE_ROUNDS: usize = 5;

/// Downstream channel for completion events.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver `event`. Failure leaves the artifact and intermediates in place.
    async fn publish(&self, event: &CompletionEvent) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "publisher"
    }
}

/// Confirm that `path` holds a complete artifact.
///
/// The file must exist, be non-empty, and keep the same size across one
/// `settle` window. Returns the confirmed size.
///
/// # Errors
///
/// [`Error::ArtifactMissingAfterConcat`] when any condition fails.
pub async fn confirm_artifact(path: &Path, settle: Duration) -> Result<u64> {
    let missing = || Error::ArtifactMissingAfterConcat {
        path: path.to_path_buf(),
    };

    let mut size = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
        Ok(meta) => {
            tracing::error!(path = %path.display(), size = meta.len(), "Artifact is empty or not a file");
            return Err(missing());
        }
        Err(e) => {
            tracing::error!(path = %path.display(), "Artifact not found after merge: {e}");
            return Err(missing());
        }
    };

    for _ in 0..MAX_SETTLE_ROUNDS {
        tokio::time::sleep(settle).await;
        let now = tokio::fs::metadata(path).await.map_err(|_| missing())?.len();
        if now == size {
            return Ok(size);
        }
        tracing::debug!(path = %path.display(), before = size, now, "Artifact still growing");
        size = now;
    }

    tracing::error!(path = %path.display(), "Artifact size never settled");
    Err(missing())
}

/// Remove the job's intermediate directories, keeping `outputs/`.
///
/// Missing directories are fine; other failures are logged and ignored since
/// the artifact has already been announced.
pub async fn release_intermediates(paths: &JobPaths) {
    for dir in paths.intermediates() {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => tracing::debug!(dir = %dir.display(), "Removed intermediate directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(dir = %dir.display(), "Failed to remove intermediate directory: {e}"),
        }
    }
}

/// Announces finished artifacts through a [`Publisher`].
pub struct CompletionNotifier<'a> {
    publisher: &'a dyn Publisher,
    settle: Duration,
}

impl<'a> CompletionNotifier<'a> {
    pub fn new(publisher: &'a dyn Publisher, settle: Duration) -> Self {
        Self { publisher, settle }
    }

    /// Confirm the job's artifact, publish the completion event, then clean up.
    ///
    /// # Errors
    ///
    /// - [`Error::ArtifactMissingAfterConcat`]: nothing is published.
    /// - [`Error::Notify`]: the artifact and intermediates are kept.
    pub async fn complete(&self, job: &Job, paths: &JobPaths) -> Result<CompletionEvent> {
        let size = confirm_artifact(&paths.artifact, self.settle).await?;
        tracing::info!(artifact = %paths.artifact.display(), size, "Artifact confirmed");

        let event = CompletionEvent::artifact_ready(
            job.job_id.clone(),
            job.file_id.clone(),
            paths.artifact.clone(),
        );

        self.publisher.publish(&event).await.map_err(|e| match e {
            e @ Error::Notify(_) => e,
            other => Error::Notify(other.to_string()),
        })?;
        tracing::info!(publisher = self.publisher.name(), "Completion event published");

        release_intermediates(paths).await;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use sr_core::config::{RenderProfile, StorageConfig};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<CompletionEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for Recorder {
        async fn publish(&self, event: &CompletionEvent) -> Result<()> {
            if self.fail {
                return Err(Error::Notify("channel closed".into()));
            }
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    fn job(root: &Path) -> Job {
        let storage = StorageConfig {
            output_root: root.to_path_buf(),
            ..StorageConfig::default()
        };
        Job::from_layout(
            "job-7".parse().unwrap(),
            "file-9".parse().unwrap(),
            &storage,
            RenderProfile::default(),
        )
    }

    fn lay_out(paths: &JobPaths, with_artifact: bool) {
        for dir in [&paths.audio_dir, &paths.segment_dir, &paths.output_dir] {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(paths.segment_dir.join("seg_0001.mp4"), b"seg").unwrap();
        if with_artifact {
            std::fs::write(&paths.artifact, b"final video").unwrap();
        }
    }

    #[tokio::test]
    async fn publishes_then_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let job = job(root.path());
        let paths = job.paths();
        lay_out(&paths, true);

        let recorder = Recorder::default();
        let event = CompletionNotifier::new(&recorder, Duration::ZERO)
            .complete(&job, &paths)
            .await
            .unwrap();

        assert_eq!(event.event, "artifact-ready");
        assert_eq!(event.file_path, paths.artifact);
        assert_eq!(event.file_id.as_str(), "file-9");
        assert_eq!(recorder.events.lock().len(), 1);
        assert!(!paths.audio_dir.exists());
        assert!(!paths.segment_dir.exists());
        assert!(paths.artifact.exists());
    }

    #[tokio::test]
    async fn missing_artifact_publishes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let job = job(root.path());
        let paths = job.paths();
        lay_out(&paths, false);

        let recorder = Recorder::default();
        let err = CompletionNotifier::new(&recorder, Duration::ZERO)
            .complete(&job, &paths)
            .await
            .unwrap_err();

        assert_matches!(err, Error::ArtifactMissingAfterConcat { .. });
        assert!(recorder.events.lock().is_empty());
        assert!(paths.segment_dir.exists());
    }

    #[tokio::test]
    async fn empty_artifact_is_missing() {
        let root = tempfile::tempdir().unwrap();
        let job = job(root.path());
        let paths = job.paths();
        lay_out(&paths, false);
        std::fs::write(&paths.artifact, b"").unwrap();

        let err = confirm_artifact(&paths.artifact, Duration::ZERO).await.unwrap_err();
        assert_matches!(err, Error::ArtifactMissingAfterConcat { .. });
    }

    #[tokio::test]
    async fn notify_failure_keeps_everything() {
        let root = tempfile::tempdir().unwrap();
        let job = job(root.path());
        let paths = job.paths();
        lay_out(&paths, true);

        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let err = CompletionNotifier::new(&recorder, Duration::ZERO)
            .complete(&job, &paths)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), sr_core::ErrorKind::NotifyFailure);
        assert!(paths.artifact.exists());
        assert!(paths.segment_dir.exists());
    }

    #[tokio::test]
    async fn release_tolerates_missing_dirs() {
        let root = tempfile::tempdir().unwrap();
        let paths = JobPaths::new(root.path(), &"j".parse().unwrap());
        release_intermediates(&paths).await;
    }
}
