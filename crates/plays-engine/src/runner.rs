//! Child-process invocation for the execution tool.
//!
//! The engine talks to a [`ProcessRunner`] instead of spawning directly, so
//! tests can swap in a scripted runner while production uses
//! [`TokioRunner`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::{EngineError, Result};

// ─── Invocation / ProcessOutput ───────────────────────────────────────────

/// A program and its argument vector. Arguments are passed verbatim, never
/// through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// Complete output of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

// ─── ProcessRunner ────────────────────────────────────────────────────────

pub trait ProcessRunner: Send + Sync {
    /// Run `invocation` to completion. Resolves once the child has exited,
    /// been killed on timeout, or been killed because `cancel` fired.
    fn run<'a>(
        &'a self,
        invocation: &'a Invocation,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutput>> + Send + 'a>>;
}

// ─── TokioRunner ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TokioRunner {
    timeout: Option<Duration>,
}

impl TokioRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    async fn run_inner(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| EngineError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
        let pid = child.id();

        tracing::debug!(
            program = %invocation.program,
            args = ?invocation.args,
            pid,
            "spawned process"
        );

        // Drain both pipes concurrently so a chatty child never blocks on a
        // full buffer.
        let stdout_task = tokio::spawn(read_all(child.stdout.take()));
        let stderr_task = tokio::spawn(read_all(child.stderr.take()));
        let readers = [stdout_task.abort_handle(), stderr_task.abort_handle()];

        let deadline = async {
            match self.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                tracing::info!(program = %invocation.program, "cancellation requested; killing process");
                terminate(&mut child, pid, &readers).await;
                return Err(EngineError::Cancelled);
            }
            _ = &mut deadline => {
                let limit = self.timeout.unwrap_or_default();
                tracing::warn!(
                    program = %invocation.program,
                    timeout_secs = limit.as_secs_f64(),
                    "process timed out; killing"
                );
                terminate(&mut child, pid, &readers).await;
                return Err(EngineError::Timeout(limit));
            }
        };

        // Whatever the tool left running in its group would hold the pipes
        // open.
        kill_group(pid);

        let drained = async { tokio::join!(stdout_task, stderr_task) };
        let (stdout, stderr) = tokio::select! {
            (stdout, stderr) = drained => (stdout.unwrap_or_default(), stderr.unwrap_or_default()),
            _ = cancel.cancelled() => {
                abort_all(&readers);
                return Err(EngineError::Cancelled);
            }
            _ = &mut deadline => {
                tracing::warn!(program = %invocation.program, "process output still open at timeout");
                abort_all(&readers);
                return Err(EngineError::Timeout(self.timeout.unwrap_or_default()));
            }
        };

        tracing::debug!(
            program = %invocation.program,
            exit_code = ?status.code(),
            "process exited"
        );
        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Kill the child with its whole process group and stop reading its output.
async fn terminate(child: &mut Child, pid: Option<u32>, readers: &[AbortHandle]) {
    kill_group(pid);
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill process");
    }
    abort_all(readers);
}

fn abort_all(readers: &[AbortHandle]) {
    for reader in readers {
        reader.abort();
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid = pid, error = %e, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

impl ProcessRunner for TokioRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a Invocation,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutput>> + Send + 'a>> {
        Box::pin(self.run_inner(invocation, cancel))
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            tracing::warn!(error = %e, "failed to read process output");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
