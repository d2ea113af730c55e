//! Queue message for one render job.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sr_core::config::{RenderProfile, StorageConfig};
use sr_core::{FileId, Job, JobId};

/// Optional per-job path overrides; unset fields follow the storage layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOverrides {
    pub visual_dir: Option<PathBuf>,
    pub audio_dir: Option<PathBuf>,
    pub intro: Option<PathBuf>,
    pub outro: Option<PathBuf>,
    pub job_dir: Option<PathBuf>,
}

/// A request to render one job.
///
/// ```
/// let req: sr_worker::JobRequest =
///     serde_json::from_str(r#"{"job_id":"deck-1","file_id":"f-1"}"#).unwrap();
/// assert_eq!(req.job_id.as_str(), "deck-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: JobId,
    pub file_id: FileId,
    #[serde(default, skip_serializing_if = "is_default")]
    pub overrides: JobOverrides,
}

fn is_default(o: &JobOverrides) -> bool {
    *o == JobOverrides::default()
}

impl JobRequest {
    pub fn new(job_id: JobId, file_id: FileId) -> Self {
        Self {
            job_id,
            file_id,
            overrides: JobOverrides::default(),
        }
    }

    /// Resolve into a [`Job`] using the storage layout and any overrides.
    pub fn into_job(self, storage: &StorageConfig, profile: &RenderProfile) -> Job {
        let overrides = self.overrides;
        let mut job = Job::from_layout(self.job_id, self.file_id, storage, profile.clone());
        if let Some(dir) = overrides.visual_dir {
            job.visual_dir = dir;
        }
        if let Some(dir) = overrides.audio_dir {
            job.audio_dir = dir;
        }
        if overrides.intro.is_some() {
            job.intro = overrides.intro;
        }
        if overrides.outro.is_some() {
            job.outro = overrides.outro;
        }
        if let Some(dir) = overrides.job_dir {
            job.job_dir = dir;
        }
        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_without_overrides() {
        let req = JobRequest::new("deck-1".parse().unwrap(), "f-1".parse().unwrap());
        let job = req.into_job(&StorageConfig::default(), &RenderProfile::default());
        assert_eq!(job.visual_dir, PathBuf::from("/artifacts/slides/deck-1"));
        assert_eq!(job.audio_dir, PathBuf::from("/artifacts/tts_output/deck-1"));
        assert_eq!(job.intro, Some(PathBuf::from("/artifacts/bumpers/deck-1-bumper1.mp4")));
        assert_eq!(
            job.paths().artifact,
            PathBuf::from("/artifacts/video-output/deck-1/outputs/deck-1.mp4")
        );
    }

    #[test]
    fn overrides_replace_layout() {
        let json = r#"{"job_id":"d","file_id":"f","overrides":{"visual_dir":"/x/v","outro":"/x/o.mp4"}}"#;
        let req: JobRequest = serde_json::from_str(json).unwrap();
        let job = req.into_job(&StorageConfig::default(), &RenderProfile::default());
        assert_eq!(job.visual_dir, PathBuf::from("/x/v"));
        assert_eq!(job.outro, Some(PathBuf::from("/x/o.mp4")));
        assert_eq!(job.audio_dir, PathBuf::from("/artifacts/tts_output/d"));
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let json = r#"{"job_id":"../etc","file_id":"f"}"#;
        assert!(serde_json::from_str::<JobRequest>(json).is_err());
    }

    #[test]
    fn default_overrides_are_not_serialized() {
        let req = JobRequest::new("a".parse().unwrap(), "b".parse().unwrap());
        assert_eq!(serde_json::to_string(&req).unwrap(), r#"{"job_id":"a","file_id":"b"}"#);
    }
}
