//! Drives one job through sequencing, normalization, concat and completion.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use sr_av::EncodeProgress;
use sr_core::events::CompletionEvent;
use sr_core::{Error, Job, JobId, JobState, Result};
use tracing::Instrument;

use crate::bumper::{BumperProcessor, BumperSet};
use crate::concat::ConcatEngine;
use crate::context::{EngineContext, ProgressSender};
use crate::normalizer::{DroppedSegment, Normalizer};
use crate::notifier::{CompletionNotifier, Publisher};
use crate::sequencer::{self, SequencePlan, SkippedVisual};

// Progress bands per stage, in percent.
const SEQUENCED: f32 = 5.0;
const NORMALIZED: f32 = 60.0;
const MERGED: f32 = 95.0;

/// What a successful render produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutcome {
    pub job_id: JobId,
    pub artifact: PathBuf,
    /// Sequenced segments present in the artifact.
    pub segments: usize,
    pub skipped: Vec<SkippedVisual>,
    pub dropped: Vec<DroppedSegment>,
    pub bumpers: BumperSet,
    pub event: CompletionEvent,
}

/// The render-assembly engine.
#[derive(Clone)]
pub struct RenderPipeline {
    ctx: EngineContext,
    publisher: Arc<dyn Publisher>,
}

/// Tracks the job state and reports each transition.
struct StateTracker<'a> {
    state: JobState,
    progress: &'a ProgressSender,
}

impl StateTracker<'_> {
    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "Job state");
        self.state = next;
        self.progress.state(next);
    }
}

impl RenderPipeline {
    pub fn new(ctx: EngineContext, publisher: Arc<dyn Publisher>) -> Self {
        Self { ctx, publisher }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Sequence a job's inputs without encoding anything.
    pub async fn plan(&self, job: &Job) -> Result<SequencePlan> {
        sequencer::scan(&job.visual_dir, &job.audio_dir).await
    }

    /// Render `job` end to end.
    ///
    /// On failure the job's intermediates are left in place and nothing is
    /// published.
    pub async fn run(&self, job: &Job, progress: &ProgressSender) -> Result<RenderOutcome> {
        let span = tracing::info_span!("job", job_id = %job.job_id);
        let mut tracker = StateTracker {
            state: JobState::Queued,
            progress,
        };

        let result = self.run_stages(job, &mut tracker).instrument(span.clone()).await;

        span.in_scope(|| match result {
            Ok(outcome) => {
                tracker.advance(JobState::Done);
                progress.send(100.0, "Done");
                tracing::info!(
                    artifact = %outcome.artifact.display(),
                    segments = outcome.segments,
                    bumpers = outcome.bumpers.count(),
                    "Render complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracker.advance(JobState::Failed);
                tracing::error!(kind = %e.kind(), "Render failed: {e}");
                Err(e)
            }
        })
    }

    async fn run_stages(&self, job: &Job, tracker: &mut StateTracker<'_>) -> Result<RenderOutcome> {
        let progress = tracker.progress;
        let paths = job.paths();

        tracker.advance(JobState::Sequencing);
        let plan = self.plan(job).await?;
        tracing::info!(
            entries = plan.entries.len(),
            skipped = plan.skipped.len(),
            "Sequenced"
        );
        progress.send(SEQUENCED, "Sequenced");

        tracker.advance(JobState::Normalizing);
        let normalizer = Normalizer::new(&self.ctx, &job.profile, &paths);
        let bumpers = BumperProcessor::new(&self.ctx, &job.profile, &paths);
        let (report, bumper_set) = tokio::join!(
            normalizer.normalize_all(&plan.entries, progress, (SEQUENCED, NORMALIZED)),
            bumpers.prepare(job.intro.as_deref(), job.outro.as_deref()),
        );
        let report = report?;
        if report.segments.is_empty() {
            return Err(Error::NoMatchableContent(format!(
                "all {} sequenced segments failed to normalize",
                plan.entries.len()
            )));
        }

        tracker.advance(JobState::Concatenating);
        let segments = report.segments.len();
        let inputs = bumper_set.wrap(report.segments.into_iter().map(|s| s.path));
        let on_progress = |p: &EncodeProgress| {
            progress.send(
                NORMALIZED + (MERGED - NORMALIZED) * p.fraction as f32,
                "Concatenating",
            )
        };
        ConcatEngine::new(&self.ctx, &job.profile)
            .merge(&inputs, &paths.artifact, &on_progress)
            .await?;

        tracker.advance(JobState::Notifying);
        let event = CompletionNotifier::new(self.publisher.as_ref(), self.ctx.policy.artifact_settle())
            .complete(job, &paths)
            .await?;

        Ok(RenderOutcome {
            job_id: job.job_id.clone(),
            artifact: paths.artifact,
            segments,
            skipped: plan.skipped,
            dropped: report.dropped,
            bumpers: bumper_set,
            event,
        })
    }
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("ctx", &self.ctx)
            .field("publisher", &self.publisher.name())
            .finish()
    }
}
