//! Log streaming from subprocess stdout/stderr to an output observer.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

/// Which subprocess stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Receives subprocess output one line at a time.
///
/// Lines arrive with trailing whitespace removed and are never empty. Both
/// streams are drained concurrently, so implementations must tolerate calls
/// from two tasks at once.
pub trait OutputObserver: Send + Sync {
    fn line(&self, stream: OutputStream, line: &str);
}

/// Forwards subprocess output to `tracing`.
///
/// Stdout is informational; stderr is logged at error level, since formatting
/// tools only write there when something is wrong.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    command: String,
    partition: String,
}

impl TracingObserver {
    pub fn new(command: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            partition: partition.into(),
        }
    }
}

impl OutputObserver for TracingObserver {
    fn line(&self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => {
                tracing::info!(command = %self.command, partition = %self.partition, "{}", line);
            }
            OutputStream::Stderr => {
                tracing::error!(command = %self.command, partition = %self.partition, "{}", line);
            }
        }
    }
}

/// Spawn a task that reads `reader` to the end, forwarding each line.
///
/// The task resolves to the first unexpected read error, if any. A pipe that
/// was already closed when we read it counts as end of stream.
pub(crate) fn spawn_drain<R>(
    reader: R,
    stream: OutputStream,
    observer: Arc<dyn OutputObserver>,
) -> JoinHandle<io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move { drain(reader, stream, observer.as_ref()).await })
}

async fn drain<R>(reader: R, stream: OutputStream, observer: &dyn OutputObserver) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e),
        }

        // Formatting tools are not guaranteed to emit UTF-8
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end();
        if !line.is_empty() {
            observer.line(stream, line);
        }
    }
}
