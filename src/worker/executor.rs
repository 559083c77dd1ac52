use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use uuid::Uuid;

use crate::config::EndpointConfig;
use crate::error::RexecError;
use crate::jobs::JobStatus;

/// Stderr is collected only as failure diagnostics; a small cap is enough.
const STDERR_CAP: usize = 64 * 1024;

/// Outcome of one command invocation.
#[derive(Debug)]
pub struct ExecutionResult {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub output: String,
    pub truncated: bool,
    pub error: Option<String>,
}

/// Spawns an endpoint's command and supervises it to completion.
///
/// Stdout is drained fully and buffered up to the configured cap; bytes past
/// the cap are read and discarded so the child never blocks on a full pipe.
/// A launch failure (missing binary, permission denied) is an error; a
/// nonzero exit code is a normal `Completed` outcome.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    max_output_bytes: usize,
}

impl CommandRunner {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    pub async fn run(&self, job_id: Uuid, endpoint: &EndpointConfig) -> ExecutionResult {
        tracing::info!(
            job_id = %job_id,
            path = %endpoint.path,
            command = %endpoint.command,
            args = ?endpoint.args,
            "executing command"
        );

        let mut child = match Command::new(&endpoint.command)
            .args(&endpoint.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    job_id = %job_id,
                    command = %endpoint.command,
                    error = %e,
                    "failed to spawn process"
                );
                return ExecutionResult {
                    job_id,
                    status: JobStatus::Failed,
                    pid: None,
                    exit_code: None,
                    output: String::new(),
                    truncated: false,
                    error: Some(RexecError::Spawn(e).to_string()),
                };
            }
        };

        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let ((out, truncated), (err_out, _)) = tokio::join!(
            read_capped(stdout, self.max_output_bytes),
            read_capped(stderr, STDERR_CAP),
        );
        let output = String::from_utf8_lossy(&out).into_owned();
        if truncated {
            tracing::warn!(
                job_id = %job_id,
                cap = self.max_output_bytes,
                "stdout exceeded cap, output truncated"
            );
        }

        match child.wait().await {
            Ok(exit_status) => {
                let exit_code = exit_status.code();
                if !exit_status.success() {
                    tracing::warn!(
                        job_id = %job_id,
                        exit_code = ?exit_code,
                        stderr = %String::from_utf8_lossy(&err_out).trim_end(),
                        "command exited unsuccessfully"
                    );
                }
                ExecutionResult {
                    job_id,
                    status: JobStatus::Completed,
                    pid,
                    exit_code,
                    output,
                    truncated,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "failed waiting for process");
                ExecutionResult {
                    job_id,
                    status: JobStatus::Failed,
                    pid,
                    exit_code: None,
                    output,
                    truncated,
                    error: Some(RexecError::Execution(e).to_string()),
                }
            }
        }
    }
}

/// Drain a child stream to EOF, keeping at most `cap` bytes. The boolean is
/// true when bytes were dropped.
async fn read_capped<R>(stream: Option<R>, cap: usize) -> (Vec<u8>, bool)
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return (Vec::new(), false);
    };
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buf.len());
                let take = n.min(room);
                buf.extend_from_slice(&chunk[..take]);
                if take < n {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }
    (buf, truncated)
}
