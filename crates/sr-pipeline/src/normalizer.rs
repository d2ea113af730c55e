//! Segment normalization.
//!
//! Every sequenced entry becomes one self-contained MP4 in the canonical
//! profile with a guaranteed audio stream:
//!
//! 1. narration is copied when already compliant, otherwise re-encoded to
//!    constant-bitrate audio under `temp/`;
//! 2. duration comes from the narration (still images) or the clip itself;
//! 3. video is scaled, padded, rate- and format-converted;
//! 4. clips with no audio at all get a synthesized silent track;
//! 5. output lands at `temp_adj/seg_NNNN.mp4`, overwritten on re-run.
//!
//! Segments are normalized concurrently up to `policy.segment_concurrency`,
//! and results keep sequence order.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use sr_av::{
    audio_is_compliant, cbr_audio_command, clip_segment_command, probe_media,
    still_segment_command, ClipAudio,
};
use sr_core::config::{RenderProfile, SegmentFailurePolicy};
use sr_core::{Error, JobPaths, Result};

use crate::context::{EngineContext, ProgressSender};
use crate::sequencer::{SegmentAudio, SequenceEntry, VisualKind};

/// A segment ready for concatenation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSegment {
    pub index: Option<u32>,
    pub path: PathBuf,
    pub duration_secs: f64,
    /// Whether the clip kept its own audio (or silence) instead of narration.
    pub embedded_audio: bool,
}

/// A segment dropped under the skip policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedSegment {
    pub index: Option<u32>,
    pub visual: PathBuf,
    pub error: String,
}

/// Outcome of normalizing a whole sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    /// Normalized segments in sequence order.
    pub segments: Vec<NormalizedSegment>,
    pub dropped: Vec<DroppedSegment>,
}

/// Brings sequenced entries to the canonical profile.
pub struct Normalizer<'a> {
    ctx: &'a EngineContext,
    profile: &'a RenderProfile,
    paths: &'a JobPaths,
}

impl<'a> Normalizer<'a> {
    pub fn new(ctx: &'a EngineContext, profile: &'a RenderProfile, paths: &'a JobPaths) -> Self {
        Self {
            ctx,
            profile,
            paths,
        }
    }

    /// Output path of the segment at `position` in the sequence.
    pub fn segment_path(&self, position: usize) -> PathBuf {
        self.paths
            .segment_dir
            .join(format!("seg_{:04}.mp4", position + 1))
    }

    /// Normalize every entry.
    ///
    /// Progress is reported between `range.0` and `range.1` percent as
    /// segments finish.
    ///
    /// # Errors
    ///
    /// Under [`SegmentFailurePolicy::FailJob`] the first failure in sequence
    /// order is returned as [`Error::SegmentEncode`]. Under `Skip` failures
    /// are collected in [`NormalizeReport::dropped`] and this never fails.
    pub async fn normalize_all(
        &self,
        entries: &[SequenceEntry],
        progress: &ProgressSender,
        range: (f32, f32),
    ) -> Result<NormalizeReport> {
        let limit = self.ctx.policy.segment_concurrency.max(1);
        let total = entries.len().max(1) as f32;
        let jobs: Vec<_> = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| async move { (entry, self.normalize(position, entry).await) })
            .collect();
        let mut results = stream::iter(jobs).buffered(limit);

        let mut report = NormalizeReport::default();
        let mut done = 0usize;
        while let Some((entry, result)) = results.next().await {
            done += 1;
            progress.send(
                range.0 + (range.1 - range.0) * (done as f32 / total),
                "Normalizing",
            );
            match result {
                Ok(segment) => report.segments.push(segment),
                Err(e) => match self.ctx.policy.segment_failure {
                    SegmentFailurePolicy::FailJob => return Err(e),
                    SegmentFailurePolicy::Skip => {
                        tracing::warn!(segment = %entry.label(), "{e}; segment dropped");
                        report.dropped.push(DroppedSegment {
                            index: entry.index,
                            visual: entry.visual.clone(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        tracing::info!(
            normalized = report.segments.len(),
            dropped = report.dropped.len(),
            "Normalization finished"
        );
        Ok(report)
    }

    /// Normalize one entry; every failure is reported as [`Error::SegmentEncode`].
    pub async fn normalize(&self, position: usize, entry: &SequenceEntry) -> Result<NormalizedSegment> {
        self.normalize_inner(position, entry)
            .await
            .map_err(|e| match e {
                e @ Error::SegmentEncode { .. } => e,
                other => Error::segment(entry.index, other),
            })
    }

    async fn normalize_inner(&self, position: usize, entry: &SequenceEntry) -> Result<NormalizedSegment> {
        tokio::fs::create_dir_all(&self.paths.audio_dir).await?;
        tokio::fs::create_dir_all(&self.paths.segment_dir).await?;

        let output = self.segment_path(position);
        let runner = self.ctx.runner.as_ref();
        let toolchain = &self.ctx.toolchain;

        let narration = match &entry.audio {
            SegmentAudio::Narration(path) => Some(self.canonical_audio(path).await?),
            SegmentAudio::Embedded => None,
        };

        let (cmd, duration_secs) = match (entry.kind, narration) {
            (VisualKind::Image, Some((audio, duration))) => (
                still_segment_command(toolchain, &entry.visual, &audio, duration, &output, self.profile),
                duration,
            ),
            (VisualKind::Image, None) => {
                return Err(Error::segment(entry.index, "static image has no narration"));
            }
            (VisualKind::Clip, narration) => {
                let clip = probe_media(runner, toolchain, &entry.visual).await?;
                let duration = clip.require_duration()?;
                let audio = match narration {
                    Some((audio, _)) => ClipAudio::Narration(audio),
                    None if clip.has_audio() => ClipAudio::Embedded,
                    None => {
                        tracing::debug!(segment = %entry.label(), "Clip has no audio stream; filling silence");
                        ClipAudio::Silent
                    }
                };
                (
                    clip_segment_command(toolchain, &entry.visual, &audio, duration, &output, self.profile),
                    duration,
                )
            }
        };

        tracing::debug!(segment = %entry.label(), output = %output.display(), "Encoding segment");
        runner.run(&cmd).await?;

        Ok(NormalizedSegment {
            index: entry.index,
            path: output,
            duration_secs,
            embedded_audio: entry.uses_embedded_audio(),
        })
    }

    /// Bring narration to the canonical audio profile, returning the path to
    /// use and its probed duration.
    async fn canonical_audio(&self, source: &Path) -> Result<(PathBuf, f64)> {
        let runner = self.ctx.runner.as_ref();
        let toolchain = &self.ctx.toolchain;
        let probe = probe_media(runner, toolchain, source).await?;

        if audio_is_compliant(&probe, &self.profile.audio, self.ctx.policy.bitrate_tolerance_kbps) {
            let name = source
                .file_name()
                .ok_or_else(|| Error::Validation(format!("{} has no file name", source.display())))?;
            let target = self.paths.audio_dir.join(name);
            tokio::fs::copy(source, &target).await?;
            tracing::debug!(audio = %source.display(), "Narration already compliant; copied");
            return Ok((target, probe.require_duration()?));
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "narration".into());
        let target = self.paths.audio_dir.join(format!("{stem}.m4a"));
        runner
            .run(&cbr_audio_command(toolchain, source, &target, &self.profile.audio))
            .await?;
        let encoded = probe_media(runner, toolchain, &target).await?;
        Ok((target, encoded.require_duration()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sr_av::testing::{audio_probe_json, video_probe_json, FakeRunner};
    use sr_av::Toolchain;
    use sr_core::config::{PolicyConfig, ToolsConfig};
    use std::sync::Arc;

    struct Fixture {
        _root: tempfile::TempDir,
        fake: Arc<FakeRunner>,
        ctx: EngineContext,
        paths: JobPaths,
        inputs: PathBuf,
    }

    fn fixture(policy: PolicyConfig) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let inputs = root.path().join("in");
        std::fs::create_dir_all(&inputs).unwrap();
        let fake = Arc::new(FakeRunner::new());
        let ctx = EngineContext::new(
            fake.clone(),
            Toolchain::from_config(&ToolsConfig::default()),
            policy,
        );
        let paths = JobPaths::new(&root.path().join("job"), &"job-1".parse().unwrap());
        Fixture {
            _root: root,
            fake,
            ctx,
            paths,
            inputs,
        }
    }

    fn image_entry(f: &Fixture, index: u32) -> SequenceEntry {
        let audio = f.inputs.join(format!("slide_{index}.mp3"));
        f.fake
            .set_probe(&audio, audio_probe_json("mp3", 24_000, 1, 64_000, 2.0 + index as f64));
        SequenceEntry {
            index: Some(index),
            visual: f.inputs.join(format!("slide_{index}.png")),
            kind: VisualKind::Image,
            audio: SegmentAudio::Narration(audio),
        }
    }

    #[tokio::test]
    async fn still_segment_uses_reencoded_audio_duration() {
        let f = fixture(PolicyConfig::default());
        let entry = image_entry(&f, 1);
        let profile = RenderProfile::default();
        let seg = Normalizer::new(&f.ctx, &profile, &f.paths)
            .normalize_all(&[entry], &ProgressSender::noop(), (0.0, 100.0))
            .await
            .unwrap()
            .segments
            .remove(0);

        assert_eq!(seg.duration_secs, 3.0);
        assert_eq!(seg.path, f.paths.segment_dir.join("seg_0001.mp4"));
        assert!(seg.path.exists());

        let cbr = f
            .fake
            .command_for_output(&f.paths.audio_dir.join("slide_1.m4a"))
            .expect("narration re-encoded");
        assert_eq!(cbr.flag_value("-b:a"), Some("192k"));
        let still = f.fake.command_for_output(&seg.path).unwrap();
        assert_eq!(still.flag_value("-t"), Some("3.000"));
    }

    #[tokio::test]
    async fn compliant_narration_is_copied() {
        let f = fixture(PolicyConfig::default());
        let audio = f.inputs.join("slide_1.m4a");
        std::fs::write(&audio, b"aac").unwrap();
        f.fake
            .set_probe(&audio, audio_probe_json("aac", 48_000, 2, 192_000, 4.0));
        let entry = SequenceEntry {
            index: Some(1),
            visual: f.inputs.join("slide_1.png"),
            kind: VisualKind::Image,
            audio: SegmentAudio::Narration(audio),
        };
        let profile = RenderProfile::default();
        let seg = Normalizer::new(&f.ctx, &profile, &f.paths)
            .normalize(0, &entry)
            .await
            .unwrap();

        assert_eq!(seg.duration_secs, 4.0);
        assert!(f.paths.audio_dir.join("slide_1.m4a").exists());
        // Only the still encode ran; no audio re-encode.
        assert_eq!(f.fake.ffmpeg_calls().len(), 1);
    }

    #[tokio::test]
    async fn silent_clip_gets_silence() {
        let f = fixture(PolicyConfig::default());
        let clip = f.inputs.join("slide_2.mp4");
        f.fake.set_probe(&clip, video_probe_json(1280, 720, 25, 5.0, false));
        let entry = SequenceEntry {
            index: Some(2),
            visual: clip,
            kind: VisualKind::Clip,
            audio: SegmentAudio::Embedded,
        };
        let profile = RenderProfile::default();
        let seg = Normalizer::new(&f.ctx, &profile, &f.paths)
            .normalize(0, &entry)
            .await
            .unwrap();
        assert!(seg.embedded_audio);
        assert_eq!(seg.duration_secs, 5.0);
        let cmd = f.fake.command_for_output(&seg.path).unwrap();
        assert_eq!(cmd.flag_value("-f"), Some("lavfi"));
    }

    #[tokio::test]
    async fn failing_segment_is_dropped_under_skip() {
        let f = fixture(PolicyConfig::default());
        let entries = vec![image_entry(&f, 1), image_entry(&f, 2), image_entry(&f, 3)];
        f.fake.fail_when(
            |c| c.argv().iter().any(|a| a.ends_with("slide_2.png")),
            "Invalid data found when processing input",
        );
        let profile = RenderProfile::default();
        let report = Normalizer::new(&f.ctx, &profile, &f.paths)
            .normalize_all(&entries, &ProgressSender::noop(), (0.0, 100.0))
            .await
            .unwrap();

        let kept: Vec<_> = report.segments.iter().map(|s| s.index).collect();
        assert_eq!(kept, vec![Some(1), Some(3)]);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].index, Some(2));
        assert!(report.dropped[0].error.contains("Segment #2"));
    }

    #[tokio::test]
    async fn failing_segment_fails_job_under_fail_job() {
        let f = fixture(PolicyConfig {
            segment_failure: SegmentFailurePolicy::FailJob,
            ..PolicyConfig::default()
        });
        let entries = vec![image_entry(&f, 1), image_entry(&f, 2)];
        f.fake
            .fail_when(|c| c.argv().iter().any(|a| a.ends_with("slide_2.png")), "boom");
        let profile = RenderProfile::default();
        let err = Normalizer::new(&f.ctx, &profile, &f.paths)
            .normalize_all(&entries, &ProgressSender::noop(), (0.0, 100.0))
            .await
            .unwrap_err();
        assert_matches!(err, Error::SegmentEncode { .. });
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn order_is_preserved_with_concurrency() {
        let f = fixture(PolicyConfig {
            segment_concurrency: 4,
            ..PolicyConfig::default()
        });
        let entries: Vec<_> = (1..=6).map(|i| image_entry(&f, i)).collect();
        let profile = RenderProfile::default();
        let report = Normalizer::new(&f.ctx, &profile, &f.paths)
            .normalize_all(&entries, &ProgressSender::noop(), (0.0, 100.0))
            .await
            .unwrap();
        let paths: Vec<_> = report.segments.iter().map(|s| s.path.clone()).collect();
        let expected: Vec<_> = (1..=6)
            .map(|i| f.paths.segment_dir.join(format!("seg_{i:04}.mp4")))
            .collect();
        assert_eq!(paths, expected);
    }
}
