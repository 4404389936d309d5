//! Running external commands with captured output.

use std::ffi::OsStr;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use mkfsvol_shared::{ProcessError, ProcessFailure};
use tokio::process::{Child, Command};
use tokio::task::{JoinError, JoinHandle};

use super::log_stream::{OutputObserver, OutputStream, spawn_drain};

type DrainHandle = JoinHandle<io::Result<()>>;
type DrainOutcome = Result<io::Result<()>, JoinError>;

/// Run `program` with `args` and wait for it to finish.
///
/// Stdout and stderr are drained concurrently, line by line, into `observer`
/// while the process runs. The call returns once both streams are closed and
/// the process has exited. It succeeds only if the exit status is zero and
/// neither stream hit a read error; otherwise every observed failure is
/// reported together in one [`ProcessError`].
///
/// `partition` labels the error. With a `timeout`, a process still running
/// when it expires is killed and reaped, and the run fails with
/// [`ProcessFailure::TimedOut`].
pub async fn run_command<I, S>(
    program: &str,
    args: I,
    partition: &str,
    observer: Arc<dyn OutputObserver>,
    timeout: Option<Duration>,
) -> Result<(), ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut error = ProcessError::new(program, partition);

    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return Err(error.with_failure(ProcessFailure::Spawn(e.to_string()))),
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(error.with_failure(ProcessFailure::Spawn(
            "output streams were not captured".to_string(),
        )));
    };

    let mut stdout = spawn_drain(stdout, OutputStream::Stdout, observer.clone());
    let mut stderr = spawn_drain(stderr, OutputStream::Stderr, observer);

    let outcome = match timeout {
        None => Ok(wait_all(&mut child, &mut stdout, &mut stderr).await),
        Some(limit) => {
            tokio::time::timeout(limit, wait_all(&mut child, &mut stdout, &mut stderr))
                .await
                .map_err(|_| limit)
        }
    };

    let (stdout, stderr, status) = match outcome {
        Ok(outcome) => outcome,
        Err(limit) => {
            tracing::warn!(
                command = program,
                partition,
                "Command still running after {:?}, killing it",
                limit
            );
            if let Err(e) = child.kill().await {
                tracing::warn!(command = program, partition, "Failed to kill command: {}", e);
            }
            // Descendants of the child may still hold the pipes open
            stdout.abort();
            stderr.abort();
            error.push(ProcessFailure::TimedOut { after: limit });
            return Err(error);
        }
    };

    record_stream(&mut error, OutputStream::Stdout, stdout);
    record_stream(&mut error, OutputStream::Stderr, stderr);
    record_exit(&mut error, status);

    if error.is_empty() { Ok(()) } else { Err(error) }
}

async fn wait_all(
    child: &mut Child,
    stdout: &mut DrainHandle,
    stderr: &mut DrainHandle,
) -> (DrainOutcome, DrainOutcome, io::Result<ExitStatus>) {
    tokio::join!(stdout, stderr, child.wait())
}

fn record_exit(error: &mut ProcessError, status: io::Result<ExitStatus>) {
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => error.push(ProcessFailure::Exit {
            code: status.code(),
            signal: status.signal(),
        }),
        Err(e) => error.push(ProcessFailure::Wait(e.to_string())),
    }
}

fn record_stream(error: &mut ProcessError, stream: OutputStream, outcome: DrainOutcome) {
    let message = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("reader task failed: {}", e),
    };

    tracing::warn!(
        command = %error.command,
        partition = %error.partition,
        "error reading {}: {}",
        stream.as_str(),
        message
    );
    error.push(ProcessFailure::Stream {
        stream: stream.as_str(),
        message,
    });
}
