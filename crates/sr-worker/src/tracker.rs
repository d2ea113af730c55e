//! Per-job status records.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sr_core::{Error, ErrorKind, FileId, JobId, JobState};

/// Current status of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub file_id: FileId,
    pub state: JobState,
    /// 0.0 -- 100.0
    pub progress: f32,
    pub step: String,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub artifact: Option<PathBuf>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn queued(job_id: JobId, file_id: FileId) -> Self {
        Self {
            job_id,
            file_id,
            state: JobState::Queued,
            progress: 0.0,
            step: String::new(),
            error_kind: None,
            error: None,
            artifact: None,
            updated_at: Utc::now(),
        }
    }
}

/// Finished records kept by [`JobTracker::new`].
pub const DEFAULT_RETAINED_JOBS: usize = 256;

/// Concurrent map of job records.
///
/// Active jobs are always kept. Once more than `retain_finished` jobs are
/// done or failed, the least recently updated of them are evicted.
#[derive(Debug)]
pub struct JobTracker {
    jobs: DashMap<JobId, JobRecord>,
    retain_finished: usize,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            retain_finished,
        }
    }

    /// Record a newly queued job.
    ///
    /// A job that finished (done or failed) may be queued again; one that is
    /// still queued or running may not.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a duplicate submission of an active job.
    pub fn enqueue(&self, job_id: &JobId, file_id: &FileId) -> sr_core::Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.jobs.entry(job_id.clone()) {
            Entry::Occupied(mut e) => {
                if !e.get().state.is_terminal() {
                    return Err(Error::Validation(format!(
                        "job {job_id} is already {:?}",
                        e.get().state
                    )));
                }
                e.insert(JobRecord::queued(job_id.clone(), file_id.clone()));
            }
            Entry::Vacant(e) => {
                e.insert(JobRecord::queued(job_id.clone(), file_id.clone()));
            }
        }
        Ok(())
    }

    fn update(&self, job_id: &JobId, f: impl FnOnce(&mut JobRecord)) {
        if let Some(mut record) = self.jobs.get_mut(job_id) {
            f(&mut record);
            record.updated_at = Utc::now();
        }
    }

    pub fn set_state(&self, job_id: &JobId, state: JobState) {
        self.update(job_id, |r| r.state = state);
    }

    pub fn set_progress(&self, job_id: &JobId, progress: f32, step: &str) {
        self.update(job_id, |r| {
            r.progress = progress;
            r.step = step.to_string();
        });
    }

    pub fn complete(&self, job_id: &JobId, artifact: PathBuf) {
        self.update(job_id, |r| {
            r.state = JobState::Done;
            r.progress = 100.0;
            r.artifact = Some(artifact);
        });
        self.prune();
    }

    pub fn fail(&self, job_id: &JobId, error: &Error) {
        self.update(job_id, |r| {
            r.state = JobState::Failed;
            r.error_kind = Some(error.kind());
            r.error = Some(error.to_string());
        });
        self.prune();
    }

    /// Evict the oldest finished records beyond the retention limit.
    /// Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut finished: Vec<(DateTime<Utc>, JobId)> = self
            .jobs
            .iter()
            .filter(|r| r.state.is_terminal())
            .map(|r| (r.updated_at, r.job_id.clone()))
            .collect();
        let excess = finished.len().saturating_sub(self.retain_finished);
        if excess == 0 {
            return 0;
        }

        finished.sort_by_key(|(at, _)| *at);
        let removed = finished
            .into_iter()
            .take(excess)
            .filter(|(_, id)| self.jobs.remove_if(id, |_, r| r.state.is_terminal()).is_some())
            .count();
        tracing::debug!(removed, kept = self.retain_finished, "Evicted finished job records");
        removed
    }

    pub fn get(&self, job_id: &JobId) -> Option<JobRecord> {
        self.jobs.get(job_id).map(|r| r.clone())
    }

    /// Whether the job's artifact has been announced. Failed jobs are never
    /// ready.
    pub fn is_ready(&self, job_id: &JobId) -> bool {
        self.jobs
            .get(job_id)
            .is_some_and(|r| r.state == JobState::Done)
    }

    /// All records, oldest update first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.updated_at);
        records
    }

    /// Number of jobs queued or running.
    pub fn active_count(&self) -> usize {
        self.jobs.iter().filter(|r| !r.state.is_terminal()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ids() -> (JobId, FileId) {
        ("job-1".parse().unwrap(), "file-1".parse().unwrap())
    }

    #[test]
    fn lifecycle_to_done() {
        let t = JobTracker::new();
        let (job, file) = ids();
        t.enqueue(&job, &file).unwrap();
        assert!(!t.is_ready(&job));

        t.set_state(&job, JobState::Concatenating);
        t.set_progress(&job, 72.5, "Concatenating");
        let r = t.get(&job).unwrap();
        assert_eq!(r.state, JobState::Concatenating);
        assert_eq!(r.step, "Concatenating");

        t.complete(&job, PathBuf::from("/out/job-1.mp4"));
        assert!(t.is_ready(&job));
        assert_eq!(t.active_count(), 0);
    }

    #[test]
    fn failed_job_is_never_ready() {
        let t = JobTracker::new();
        let (job, file) = ids();
        t.enqueue(&job, &file).unwrap();
        t.fail(&job, &Error::Concat("broken".into()));
        let r = t.get(&job).unwrap();
        assert_eq!(r.error_kind, Some(ErrorKind::ConcatFailure));
        assert!(!t.is_ready(&job));
    }

    #[test]
    fn duplicate_active_submission_is_rejected() {
        let t = JobTracker::new();
        let (job, file) = ids();
        t.enqueue(&job, &file).unwrap();
        assert_matches!(t.enqueue(&job, &file), Err(Error::Validation(_)));

        t.fail(&job, &Error::Internal("x".into()));
        assert!(t.enqueue(&job, &file).is_ok());
        assert_eq!(t.get(&job).unwrap().state, JobState::Queued);
        assert_eq!(t.active_count(), 1);
    }

    #[test]
    fn oldest_finished_records_are_evicted() {
        let t = JobTracker::with_retention(2);
        let ids: Vec<JobId> = ["a", "b", "c"].iter().map(|s| s.parse().unwrap()).collect();
        let file: FileId = "file-1".parse().unwrap();
        let active: JobId = "running".parse().unwrap();
        t.enqueue(&active, &file).unwrap();

        for id in &ids {
            t.enqueue(id, &file).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
            t.complete(id, PathBuf::from("/out/x.mp4"));
        }

        assert!(t.get(&ids[0]).is_none());
        assert!(t.is_ready(&ids[1]));
        assert!(t.is_ready(&ids[2]));
        assert_eq!(t.get(&active).unwrap().state, JobState::Queued);
        assert_eq!(t.list().len(), 3);

        t.fail(&active, &Error::Internal("x".into()));
        assert!(t.get(&ids[1]).is_none());
        assert_eq!(t.prune(), 0);
        assert_eq!(t.list().len(), 2);
    }

    #[test]
    fn unknown_job_is_not_ready() {
        let t = JobTracker::new();
        assert!(!t.is_ready(&"nope".parse().unwrap()));
        assert!(t.list().is_empty());
    }
}
