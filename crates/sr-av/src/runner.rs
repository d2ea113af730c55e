//! Bounded-time execution of [`ToolCommand`]s.
//!
//! [`ToolRunner`] is the seam between the engine and the external toolchain.
//! [`SystemRunner`] spawns real processes; every invocation runs under
//! `tokio::time::timeout` and the child is killed when the budget expires.

use std::collections::VecDeque;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::command::{ToolCommand, ToolOutput};

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Executes external tool commands.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `cmd` to completion, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`sr_core::Error::ToolTimeout`] if the time budget is exceeded.
    /// - [`sr_core::Error::Tool`] if spawning fails or the exit status is
    ///   non-zero (message includes stderr).
    async fn run(&self, cmd: &ToolCommand) -> sr_core::Result<ToolOutput>;

    /// Like [`run`](ToolRunner::run) but hands each stderr line to
    /// `on_stderr_line` as it arrives.
    ///
    /// The default implementation replays stderr after completion.
    async fn run_streaming(
        &self,
        cmd: &ToolCommand,
        on_stderr_line: &mut (dyn for<'s> FnMut(&'s str) + Send),
    ) -> sr_core::Result<ToolOutput> {
        let output = self.run(cmd).await?;
        for line in output.stderr.lines() {
            on_stderr_line(line);
        }
        Ok(output)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn spawn(cmd: &ToolCommand, tool: &str) -> sr_core::Result<Child> {
        let mut command = Command::new(cmd.program());
        command
            .args(cmd.argv())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(tool, "exec: {}", cmd.display_line());

        command
            .spawn()
            .map_err(|e| sr_core::Error::tool(tool, format!("failed to spawn: {e}")))
    }

    fn timeout_error(cmd: &ToolCommand, tool: String) -> sr_core::Error {
        tracing::warn!(tool = %tool, timeout = ?cmd.time_limit(), "Tool exceeded its time budget; killed");
        sr_core::Error::ToolTimeout {
            tool,
            timeout: cmd.time_limit(),
        }
    }
}

/// The last [`STDERR_TAIL_LINES`] non-empty lines of `stderr`.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

fn check_status(tool: String, output: ToolOutput) -> sr_core::Result<ToolOutput> {
    if output.success() {
        return Ok(output);
    }
    let status = output
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    Err(sr_core::Error::tool(
        tool,
        format!("exited with status {status}: {}", stderr_tail(&output.stderr)),
    ))
}

#[async_trait]
impl ToolRunner for SystemRunner {
    async fn run(&self, cmd: &ToolCommand) -> sr_core::Result<ToolOutput> {
        let tool = cmd.tool_name();
        let child = Self::spawn(cmd, &tool)?;

        // `wait_with_output` owns the child; on timeout the future is dropped
        // and `kill_on_drop` reaps the process.
        match tokio::time::timeout(cmd.time_limit(), child.wait_with_output()).await {
            Ok(Ok(output)) => check_status(
                tool,
                ToolOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                },
            ),
            Ok(Err(e)) => Err(sr_core::Error::tool(
                tool,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => Err(Self::timeout_error(cmd, tool)),
        }
    }

    async fn run_streaming(
        &self,
        cmd: &ToolCommand,
        on_stderr_line: &mut (dyn for<'s> FnMut(&'s str) + Send),
    ) -> sr_core::Result<ToolOutput> {
        let tool = cmd.tool_name();
        let mut child = Self::spawn(cmd, &tool)?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| sr_core::Error::tool(&tool, "stderr was not captured"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| sr_core::Error::tool(&tool, "stdout was not captured"))?;

        let work = async {
            let read_stdout = async {
                let mut buf = Vec::new();
                stdout.read_to_end(&mut buf).await.map(|_| buf)
            };
            let read_stderr = async {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                while let Some(line) = lines.next_line().await? {
                    on_stderr_line(&line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Ok::<_, std::io::Error>(tail)
            };
            let (out, tail) = tokio::try_join!(read_stdout, read_stderr)?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, tail))
        };

        let result = tokio::time::timeout(cmd.time_limit(), work).await;

        match result {
            Ok(Ok((status, out, tail))) => check_status(
                tool,
                ToolOutput {
                    exit_code: status.code(),
                    stdout: String::from_utf8_lossy(&out).to_string(),
                    stderr: tail.into_iter().collect::<Vec<_>>().join("\n"),
                },
            ),
            Ok(Err(e)) => Err(sr_core::Error::tool(
                tool,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => {
                let _ = child.start_kill();
                Err(Self::timeout_error(cmd, tool))
            }
        }
    }
}
