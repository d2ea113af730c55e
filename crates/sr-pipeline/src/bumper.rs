//! Intro/outro bumper preparation.
//!
//! Bumpers get the same canonicalization as clip segments. A bumper missing
//! from storage is left out quietly; one that fails to encode is logged and
//! left out as well.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sr_av::{bumper_command, probe_media};
use sr_core::config::RenderProfile;
use sr_core::{BumperPosition, Error, JobPaths, Result};

use crate::context::EngineContext;

/// Normalized bumpers available for this job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BumperSet {
    pub intro: Option<PathBuf>,
    pub outro: Option<PathBuf>,
}

impl BumperSet {
    /// Place the bumpers around `segments`: intro first, outro last.
    pub fn wrap(&self, segments: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
        self.intro
            .iter()
            .cloned()
            .chain(segments)
            .chain(self.outro.iter().cloned())
            .collect()
    }

    pub fn count(&self) -> usize {
        usize::from(self.intro.is_some()) + usize::from(self.outro.is_some())
    }
}

/// Canonicalizes the fixed intro and outro clips.
pub struct BumperProcessor<'a> {
    ctx: &'a EngineContext,
    profile: &'a RenderProfile,
    paths: &'a JobPaths,
}

impl<'a> BumperProcessor<'a> {
    pub fn new(ctx: &'a EngineContext, profile: &'a RenderProfile, paths: &'a JobPaths) -> Self {
        Self {
            ctx,
            profile,
            paths,
        }
    }

    /// Normalize whichever bumpers exist. Never fails.
    pub async fn prepare(&self, intro: Option<&Path>, outro: Option<&Path>) -> BumperSet {
        let (intro, outro) = tokio::join!(
            self.prepare_one(BumperPosition::Intro, intro),
            self.prepare_one(BumperPosition::Outro, outro),
        );
        BumperSet { intro, outro }
    }

    async fn prepare_one(&self, position: BumperPosition, source: Option<&Path>) -> Option<PathBuf> {
        let source = source?;
        match tokio::fs::try_exists(source).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(%position, path = %source.display(), "Bumper not present; omitted");
                return None;
            }
            Err(e) => {
                tracing::warn!(%position, path = %source.display(), "Cannot check bumper: {e}; omitted");
                return None;
            }
        }

        match self.normalize(position, source).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(%position, "{e}; bumper omitted");
                None
            }
        }
    }

    /// Normalize one bumper into `temp_adj/<position>.mp4`.
    ///
    /// # Errors
    ///
    /// Any failure is reported as [`Error::BumperEncode`].
    pub async fn normalize(&self, position: BumperPosition, source: &Path) -> Result<PathBuf> {
        self.normalize_inner(position, source)
            .await
            .map_err(|e| Error::bumper(position, e))
    }

    async fn normalize_inner(&self, position: BumperPosition, source: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.paths.segment_dir).await?;
        let output = self.paths.segment_dir.join(format!("{position}.mp4"));

        let runner = self.ctx.runner.as_ref();
        let toolchain = &self.ctx.toolchain;
        let probe = probe_media(runner, toolchain, source).await?;
        if !probe.has_video() {
            return Err(Error::Validation(format!(
                "{} has no video stream",
                source.display()
            )));
        }
        let duration = probe.require_duration()?;

        let cmd = bumper_command(
            toolchain,
            source,
            probe.has_audio(),
            duration,
            &output,
            self.profile,
        );
        runner.run(&cmd).await?;
        tracing::debug!(%position, output = %output.display(), "Bumper normalized");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_av::testing::{video_probe_json, FakeRunner};
    use sr_av::Toolchain;
    use sr_core::config::{PolicyConfig, ToolsConfig};
    use std::sync::Arc;

    fn setup() -> (tempfile::TempDir, Arc<FakeRunner>, EngineContext, JobPaths) {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeRunner::new());
        let ctx = EngineContext::new(
            fake.clone(),
            Toolchain::from_config(&ToolsConfig::default()),
            PolicyConfig::default(),
        );
        let paths = JobPaths::new(&root.path().join("job"), &"j".parse().unwrap());
        (root, fake, ctx, paths)
    }

    #[test]
    fn wrap_places_bumpers_at_ends() {
        let set = BumperSet {
            intro: Some(PathBuf::from("intro.mp4")),
            outro: None,
        };
        let seq = set.wrap(vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")]);
        assert_eq!(
            seq,
            vec![
                PathBuf::from("intro.mp4"),
                PathBuf::from("a.mp4"),
                PathBuf::from("b.mp4")
            ]
        );
        assert_eq!(set.count(), 1);
    }

    #[tokio::test]
    async fn absent_bumpers_are_omitted() {
        let (root, fake, ctx, paths) = setup();
        let profile = RenderProfile::default();
        let set = BumperProcessor::new(&ctx, &profile, &paths)
            .prepare(Some(root.path().join("missing-bumper1.mp4").as_path()), None)
            .await;
        assert_eq!(set, BumperSet::default());
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn present_bumpers_are_normalized() {
        let (root, fake, ctx, paths) = setup();
        let intro = root.path().join("j-bumper1.mp4");
        let outro = root.path().join("j-bumper2.mp4");
        std::fs::write(&intro, b"x").unwrap();
        std::fs::write(&outro, b"x").unwrap();
        fake.set_probe(&intro, video_probe_json(1280, 720, 24, 3.0, true));
        fake.set_probe(&outro, video_probe_json(1920, 1080, 30, 2.0, false));

        let profile = RenderProfile::default();
        let set = BumperProcessor::new(&ctx, &profile, &paths)
            .prepare(Some(intro.as_path()), Some(outro.as_path()))
            .await;
        assert_eq!(set.intro, Some(paths.segment_dir.join("intro.mp4")));
        assert_eq!(set.outro, Some(paths.segment_dir.join("outro.mp4")));

        let silent = fake.command_for_output(&paths.segment_dir.join("outro.mp4")).unwrap();
        assert_eq!(silent.flag_value("-f"), Some("lavfi"));
    }

    #[tokio::test]
    async fn failing_bumper_is_omitted() {
        let (root, fake, ctx, paths) = setup();
        let intro = root.path().join("j-bumper1.mp4");
        std::fs::write(&intro, b"x").unwrap();
        fake.set_probe(&intro, video_probe_json(1280, 720, 24, 3.0, true));
        fake.fail_when(|c| c.tool_name() == "ffmpeg", "Conversion failed!");

        let profile = RenderProfile::default();
        let processor = BumperProcessor::new(&ctx, &profile, &paths);
        let err = processor
            .normalize(BumperPosition::Intro, &intro)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), sr_core::ErrorKind::BumperEncodeFailure);

        let set = processor.prepare(Some(intro.as_path()), None).await;
        assert_eq!(set.count(), 0);
    }
}
