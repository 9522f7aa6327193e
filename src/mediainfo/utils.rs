// Subprocess helper shared by the probe runner and tool discovery

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use super::errors::{MediaInfoError, Result};

/// Run command with timeout, capturing stdout and stderr.
///
/// A missing binary maps to `ToolNotFound`, an expired budget to `Timeout`
/// (the child is killed). Exit status is left for the caller to judge.
pub async fn run_output_with_timeout<I, S>(
    program: &OsStr,
    args: I,
    limit: Duration,
) -> Result<std::process::Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let label = program.to_string_lossy().to_string();
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => MediaInfoError::ToolNotFound(label.clone()),
            _ => MediaInfoError::Io(e),
        })?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| MediaInfoError::Parse(format!("Failed to capture stdout from {}", label)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| MediaInfoError::Parse(format!("Failed to capture stderr from {}", label)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await?;
        Ok::<Vec<u8>, std::io::Error>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await?;
        Ok::<Vec<u8>, std::io::Error>(buf)
    });

    match timeout(limit, child.wait()).await {
        Ok(status_res) => {
            let status = status_res?;
            let stdout = join_pipe(stdout_task).await?;
            let stderr = join_pipe(stderr_task).await?;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(MediaInfoError::Timeout {
                stage: "ffprobe",
                after: limit,
            })
        }
    }
}

async fn join_pipe(task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    task.await
        .map_err(|e| MediaInfoError::Io(std::io::Error::new(ErrorKind::Other, e)))?
        .map_err(MediaInfoError::Io)
}
