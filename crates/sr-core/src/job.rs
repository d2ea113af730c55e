//! The render job model and its per-job state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{RenderProfile, StorageConfig};
use crate::ids::{FileId, JobId};

/// Name of the directory holding canonical narration audio.
const AUDIO_WORK_DIR: &str = "temp";
/// Name of the directory holding normalized segments and bumpers.
const SEGMENT_WORK_DIR: &str = "temp_adj";
/// Name of the directory holding the final artifact.
const OUTPUT_DIR: &str = "outputs";

/// One end-to-end slide-deck-to-video conversion, as seen by the render stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    /// The requester's download handle, echoed in the completion event.
    pub file_id: FileId,
    /// Directory of rendered slide images and animation clips.
    pub visual_dir: PathBuf,
    /// Directory of synthesized narration files.
    pub audio_dir: PathBuf,
    /// Intro bumper; omitted from the sequence when absent on disk.
    pub intro: Option<PathBuf>,
    /// Outro bumper; omitted from the sequence when absent on disk.
    pub outro: Option<PathBuf>,
    /// Directory exclusively owned by this job for its lifetime.
    pub job_dir: PathBuf,
    /// Canonical profile every segment is normalized to.
    pub profile: RenderProfile,
}

impl Job {
    /// Build a job whose inputs and outputs follow the shared artifact layout.
    ///
    /// - visuals: `<slides_root>/<job_id>`
    /// - narration: `<audio_root>/<job_id>`
    /// - bumpers: `<bumpers_root>/<job_id>-bumper1.mp4` / `-bumper2.mp4`
    /// - job directory: `<output_root>/<job_id>`
    pub fn from_layout(
        job_id: JobId,
        file_id: FileId,
        storage: &StorageConfig,
        profile: RenderProfile,
    ) -> Self {
        let id = job_id.as_str();
        Self {
            visual_dir: storage.slides_root.join(id),
            audio_dir: storage.audio_root.join(id),
            intro: Some(storage.bumpers_root.join(format!("{id}-bumper1.mp4"))),
            outro: Some(storage.bumpers_root.join(format!("{id}-bumper2.mp4"))),
            job_dir: storage.output_root.join(id),
            job_id,
            file_id,
            profile,
        }
    }

    /// Derived working and output paths for this job.
    pub fn paths(&self) -> JobPaths {
        JobPaths::new(&self.job_dir, &self.job_id)
    }
}

/// Working directories and the artifact location derived from a job directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub job_dir: PathBuf,
    /// Canonical (CBR) narration audio.
    pub audio_dir: PathBuf,
    /// Normalized segments and bumpers.
    pub segment_dir: PathBuf,
    /// Holds the final artifact; survives cleanup.
    pub output_dir: PathBuf,
    /// `<job_dir>/outputs/<job_id>.mp4`
    pub artifact: PathBuf,
}

impl JobPaths {
    pub fn new(job_dir: &Path, job_id: &JobId) -> Self {
        let output_dir = job_dir.join(OUTPUT_DIR);
        Self {
            job_dir: job_dir.to_path_buf(),
            audio_dir: job_dir.join(AUDIO_WORK_DIR),
            segment_dir: job_dir.join(SEGMENT_WORK_DIR),
            artifact: output_dir.join(format!("{job_id}.mp4")),
            output_dir,
        }
    }

    /// Intermediate directories removed once the artifact is announced.
    pub fn intermediates(&self) -> [&Path; 2] {
        [&self.audio_dir, &self.segment_dir]
    }
}

// ---------------------------------------------------------------------------
// BumperPosition
// ---------------------------------------------------------------------------

/// Which end of the sequence a bumper occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumperPosition {
    Intro,
    Outro,
}

impl fmt::Display for BumperPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intro => write!(f, "intro"),
            Self::Outro => write!(f, "outro"),
        }
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Lifecycle of one job inside the render stage.
///
/// `Queued → Sequencing → Normalizing → Concatenating → Notifying → Done`,
/// with `Failed` reachable from `Sequencing`, `Normalizing` (only under the
/// fail-job segment policy), `Concatenating` and `Notifying`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Sequencing,
    Normalizing,
    Concatenating,
    Notifying,
    Done,
    Failed,
}

impl JobState {
    /// Whether the job has stopped moving.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Queued, Sequencing)
                | (Sequencing, Normalizing)
                | (Normalizing, Concatenating)
                | (Concatenating, Notifying)
                | (Notifying, Done)
                | (Queued, Failed)
                | (Sequencing, Failed)
                | (Normalizing, Failed)
                | (Concatenating, Failed)
                | (Notifying, Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Sequencing => "sequencing",
            Self::Normalizing => "normalizing",
            Self::Concatenating => "concatenating",
            Self::Notifying => "notifying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::from_layout(
            JobId::parse("job1").unwrap(),
            FileId::parse("file1").unwrap(),
            &StorageConfig::default(),
            RenderProfile::default(),
        )
    }

    #[test]
    fn layout_matches_artifact_tree() {
        let job = job();
        assert_eq!(job.visual_dir, PathBuf::from("/artifacts/slides/job1"));
        assert_eq!(job.audio_dir, PathBuf::from("/artifacts/tts_output/job1"));
        assert_eq!(
            job.intro.as_deref(),
            Some(Path::new("/artifacts/bumpers/job1-bumper1.mp4"))
        );
        assert_eq!(
            job.outro.as_deref(),
            Some(Path::new("/artifacts/bumpers/job1-bumper2.mp4"))
        );
    }

    #[test]
    fn artifact_path_is_keyed_by_job_id() {
        let paths = job().paths();
        assert_eq!(
            paths.artifact,
            PathBuf::from("/artifacts/video-output/job1/outputs/job1.mp4")
        );
        assert!(paths.intermediates().iter().all(|p| p.starts_with(&paths.job_dir)));
        assert!(!paths.intermediates().contains(&paths.output_dir.as_path()));
    }

    #[test]
    fn happy_path_transitions() {
        use JobState::*;
        let path = [Queued, Sequencing, Normalizing, Concatenating, Notifying, Done];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn illegal_transitions() {
        use JobState::*;
        assert!(!Sequencing.can_transition_to(Concatenating));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Sequencing));
        assert!(!Notifying.can_transition_to(Normalizing));
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Notifying.is_terminal());
    }
}
