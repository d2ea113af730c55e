//! Concatenation of normalized segments into the final artifact.

use std::path::{Path, PathBuf};

use sr_av::{concat_command, probe_media, EncodeProgress, ProgressParser};
use sr_core::config::RenderProfile;
use sr_core::{Error, Result};

use crate::context::EngineContext;

/// Merges the ordered segment list with a filter-graph concat.
pub struct ConcatEngine<'a> {
    ctx: &'a EngineContext,
    profile: &'a RenderProfile,
}

impl<'a> ConcatEngine<'a> {
    pub fn new(ctx: &'a EngineContext, profile: &'a RenderProfile) -> Self {
        Self { ctx, profile }
    }

    /// Merge `inputs` in order into `output`.
    ///
    /// Every input is probed and its stream layout logged first. Any file
    /// already at `output` is removed before ffmpeg starts. Progress blocks
    /// from ffmpeg are parsed and handed to `on_progress`.
    ///
    /// # Errors
    ///
    /// [`Error::Concat`] when there is nothing to merge or ffmpeg fails;
    /// [`Error::ToolTimeout`] when the merge exceeds its time budget.
    pub async fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        on_progress: &(dyn Fn(&EncodeProgress) + Send + Sync),
    ) -> Result<PathBuf> {
        if inputs.is_empty() {
            return Err(Error::Concat("no segments to merge".into()));
        }

        let total_secs = self.inspect_inputs(inputs).await;

        if let Some(dir) = output.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        match tokio::fs::remove_file(output).await {
            Ok(()) => tracing::debug!(path = %output.display(), "Removed previous artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let cmd = concat_command(&self.ctx.toolchain, inputs, output, self.profile);
        tracing::info!(
            inputs = inputs.len(),
            output = %output.display(),
            "Merging segments ({total_secs:.1}s expected)"
        );

        let mut parser = ProgressParser::new(total_secs);
        let mut on_line = |line: &str| {
            if let Some(report) = parser.feed(line) {
                on_progress(&report);
            }
        };

        match self.ctx.runner.run_streaming(&cmd, &mut on_line).await {
            Ok(_) => Ok(output.to_path_buf()),
            Err(e @ Error::ToolTimeout { .. }) => Err(e),
            Err(e) => Err(Error::Concat(e.to_string())),
        }
    }

    /// Probe every input for diagnostics; returns the summed duration.
    async fn inspect_inputs(&self, inputs: &[PathBuf]) -> f64 {
        let runner = self.ctx.runner.as_ref();
        let mut total = 0.0;
        for (i, input) in inputs.iter().enumerate() {
            match probe_media(runner, &self.ctx.toolchain, input).await {
                Ok(probe) => {
                    tracing::info!(input = i, path = %input.display(), "{}", probe.summary());
                    if !probe.has_video() || !probe.has_audio() {
                        tracing::warn!(input = i, path = %input.display(), "Input lacks a video or audio stream");
                    }
                    total += probe.duration_secs.unwrap_or(0.0);
                }
                Err(e) => {
                    tracing::warn!(input = i, path = %input.display(), "Cannot probe merge input: {e}");
                }
            }
        }
        total
    }
}
