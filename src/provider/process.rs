use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::{ProviderError, ProviderResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// One line of a streamed process, without its trailing newline.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

#[mockall::automock]
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Runs a shell command line to completion. A non-zero exit is not an error.
    async fn run(&self, command: &str, cwd: &Path) -> ProviderResult<ProcessOutput>;

    /// Starts `program` directly and forwards every output line over `lines`
    /// while it runs.
    async fn spawn(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        lines: UnboundedSender<OutputLine>,
    ) -> ProviderResult<ProcessOutput>;
}

#[derive(Debug, Clone, Default)]
pub struct LocalProcessLauncher;

#[async_trait]
impl ProcessLauncher for LocalProcessLauncher {
    async fn run(&self, command: &str, cwd: &Path) -> ProviderResult<ProcessOutput> {
        debug!(command, cwd = %cwd.display(), "running shell command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| ProviderError::Process(format!("failed to run '{}': {}", command, e)))?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        })
    }

    async fn spawn(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        lines: UnboundedSender<OutputLine>,
    ) -> ProviderResult<ProcessOutput> {
        debug!(program, ?args, "spawning process");
        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProviderError::Process(format!("failed to spawn '{}': {}", program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::Process("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProviderError::Process("stderr was not captured".to_string()))?;

        let (stdout, stderr) = tokio::try_join!(
            forward_lines(stdout, lines.clone(), OutputLine::Stdout),
            forward_lines(stderr, lines, OutputLine::Stderr),
        )?;
        let status = child.wait().await?;

        Ok(ProcessOutput {
            stdout,
            stderr,
            code: status.code().unwrap_or(-1),
        })
    }
}

async fn forward_lines<R>(
    reader: R,
    lines: UnboundedSender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) -> ProviderResult<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Some(line) = reader.next_line().await? {
        collected.push_str(&line);
        collected.push('\n');
        // the receiver may have gone away; the output is still collected
        let _ = lines.send(wrap(line));
    }
    Ok(collected)
}
