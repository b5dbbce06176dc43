//! Running one client tool with its stdio wired to caller streams.
//!
//! Copying and pipe draining run concurrently so a chatty child can never
//! block on a full pipe. Only stderr (and restore stdout) is collected in
//! memory; backup data passes straight through to the sink.

use super::commands::CommandInvocation;
use crate::{Result, error::PgStashError};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;

const FEED_BUFFER_SIZE: usize = 64 * 1024;

/// What an external tool did.
///
/// A non-zero exit is reported here, not as an error; see
/// [`into_checked`](Self::into_checked).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    /// Program that ran
    pub program: String,
    /// Exit code; `None` if the child was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output (restore only; backup output goes to the sink)
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
    /// Bytes moved between the caller's stream and the child
    pub bytes_streamed: u64,
}

impl OperationResult {
    /// True when the tool exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Standard error as text, with invalid UTF-8 replaced.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Standard output as text, with invalid UTF-8 replaced.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Converts an unsuccessful exit into an `ExternalCommand` error.
    ///
    /// # Errors
    /// Returns `ExternalCommand` when the exit code is not 0.
    pub fn into_checked(self) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(PgStashError::ExternalCommand {
            stderr: self.stderr_lossy().trim().to_string(),
            program: self.program,
            exit_code: self.exit_code,
        })
    }
}

fn spawn(invocation: &CommandInvocation, stdin: Stdio) -> Result<Child> {
    tracing::info!("Running {}", invocation.program_name());
    tracing::debug!("{:?}", invocation);

    invocation
        .to_command(stdin)
        .spawn()
        .map_err(|e| {
            tracing::error!("Failed to start {}: {}", invocation.program.display(), e);
            PgStashError::Spawn {
                program: invocation.program.display().to_string(),
                source: e,
            }
        })
}

fn missing_pipe(name: &str) -> PgStashError {
    PgStashError::io(
        format!("Child {} was not captured", name),
        std::io::Error::other("pipe unavailable"),
    )
}

async fn drain<R>(mut pipe: R, name: &'static str) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    pipe.read_to_end(&mut buffer)
        .await
        .map_err(|e| PgStashError::io(format!("Failed to read child {}", name), e))?;
    Ok(buffer)
}

async fn finish(
    invocation: &CommandInvocation,
    mut child: Child,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    bytes_streamed: u64,
) -> Result<OperationResult> {
    let status = child
        .wait()
        .await
        .map_err(|e| PgStashError::io(format!("Failed to wait for {}", invocation.program_name()), e))?;

    let result = OperationResult {
        program: invocation.program_name(),
        exit_code: status.code(),
        stdout,
        stderr,
        bytes_streamed,
    };

    if result.success() {
        tracing::info!("{} finished, {} bytes streamed", result.program, bytes_streamed);
    } else {
        tracing::warn!(
            "{} exited with {:?}: {}",
            result.program,
            result.exit_code,
            result.stderr_lossy().trim()
        );
    }
    Ok(result)
}

/// Runs a backup tool, streaming its standard output into `sink`.
///
/// # Errors
/// Returns `Spawn` if the program cannot start and `Io` if the sink or a pipe
/// fails. A non-zero exit is not an error.
pub async fn run_backup<W>(invocation: &CommandInvocation, sink: &mut W) -> Result<OperationResult>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let mut child = spawn(invocation, Stdio::null())?;
    let mut stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    let copy = async {
        let bytes = tokio::io::copy(&mut stdout, &mut *sink)
            .await
            .map_err(|e| PgStashError::io("Failed to stream backup output", e))?;
        sink.flush()
            .await
            .map_err(|e| PgStashError::io("Failed to flush backup output", e))?;
        Ok::<_, PgStashError>(bytes)
    };

    let (bytes, stderr) = tokio::try_join!(copy, drain(stderr, "stderr"))?;
    finish(invocation, child, Vec::new(), stderr, bytes).await
}

/// Runs a restore tool, feeding `source` to its standard input.
///
/// Standard input is closed once `source` is exhausted. If the child exits
/// before reading everything, the remaining input is discarded and the exit
/// status decides the outcome.
///
/// # Errors
/// Returns `Spawn` if the program cannot start and `Io` if reading `source`
/// or a pipe fails. A non-zero exit is not an error.
pub async fn run_restore<R>(
    invocation: &CommandInvocation,
    source: &mut R,
) -> Result<OperationResult>
where
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let mut child = spawn(invocation, Stdio::piped())?;
    let mut stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    let feed = async move {
        let mut buffer = vec![0u8; FEED_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let read = source
                .read(&mut buffer)
                .await
                .map_err(|e| PgStashError::io("Failed to read restore input", e))?;
            if read == 0 {
                break;
            }
            match stdin.write_all(&buffer[..read]).await {
                Ok(()) => total += read as u64,
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!("Child closed its input after {} bytes", total);
                    break;
                }
                Err(e) => return Err(PgStashError::io("Failed to write restore input", e)),
            }
        }
        // Dropping stdin sends EOF
        drop(stdin);
        Ok::<_, PgStashError>(total)
    };

    let (bytes, stdout, stderr) =
        tokio::try_join!(feed, drain(stdout, "stdout"), drain(stderr, "stderr"))?;
    finish(invocation, child, stdout, stderr, bytes).await
}
