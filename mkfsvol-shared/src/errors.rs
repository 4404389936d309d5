//! Error types shared by the driver and the plugin server.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result alias used across mkfsvol.
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Errors returned by volume operations.
///
/// The `Display` text of each variant is what the container runtime sees in
/// the plugin response, so keep messages short and operator-readable.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("invalid volume name: {0:?}")]
    InvalidName(String),

    #[error("volume already exists: {0}")]
    AlreadyExists(String),

    #[error("volume does not exist: {0}")]
    NotFound(String),

    #[error("mount {id} does not exist for volume {volume}")]
    ReferenceNotFound { volume: String, id: String },

    #[error("volume {volume} is still mounted by {mounts} reference(s)")]
    VolumeInUse { volume: String, mounts: usize },

    #[error("no unused partitions left")]
    NoCapacity,

    #[error("unsupported file system: {kind} (supported: {supported})")]
    UnsupportedFilesystem { kind: String, supported: String },

    #[error("failed to provision volume {volume}: {source}")]
    ProvisioningFailed {
        volume: String,
        #[source]
        source: ProcessError,
    },

    #[error("failed to mount {partition} at {mountpoint}: {message}")]
    MountFailed {
        partition: String,
        mountpoint: String,
        message: String,
    },

    #[error("failed to unmount {mountpoint}: {message}")]
    UnmountFailed { mountpoint: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// A single thing that went wrong while running an external command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessFailure {
    #[error("failed to start: {0}")]
    Spawn(String),

    #[error("error reading {stream}: {message}")]
    Stream {
        stream: &'static str,
        message: String,
    },

    #[error("failed to wait for exit: {0}")]
    Wait(String),

    #[error("{}", describe_exit(.code, .signal))]
    Exit {
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("timed out after {after:?}")]
    TimedOut { after: Duration },
}

fn describe_exit(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (*code, *signal) {
        (Some(code), _) => format!("exit status {}", code),
        (None, Some(signal)) => format!("killed by signal {}", signal),
        (None, None) => "exited abnormally".to_string(),
    }
}

/// Combined outcome of a failed command run.
///
/// Holds every failure observed during the run (stream reads, wait, exit
/// status) rather than only the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessError {
    pub command: String,
    pub partition: String,
    pub failures: Vec<ProcessFailure>,
}

impl ProcessError {
    pub fn new(command: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            partition: partition.into(),
            failures: Vec::new(),
        }
    }

    pub fn with_failure(mut self, failure: ProcessFailure) -> Self {
        self.failures.push(failure);
        self
    }

    pub fn push(&mut self, failure: ProcessFailure) {
        self.failures.push(failure);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Exit code of the command, if it ran to completion with one.
    pub fn exit_code(&self) -> Option<i32> {
        self.failures.iter().find_map(|f| match f {
            ProcessFailure::Exit { code, .. } => *code,
            _ => None,
        })
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.command, self.partition)?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProcessError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_lists_every_failure() {
        let err = ProcessError::new("mkfs.ext4", "/dev/sdb1")
            .with_failure(ProcessFailure::Stream {
                stream: "stderr",
                message: "bad fd".into(),
            })
            .with_failure(ProcessFailure::Exit {
                code: Some(1),
                signal: None,
            });

        let msg = err.to_string();
        assert_eq!(
            msg,
            "mkfs.ext4 on /dev/sdb1: error reading stderr: bad fd; exit status 1"
        );
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_exit_by_signal() {
        let failure = ProcessFailure::Exit {
            code: None,
            signal: Some(9),
        };
        assert_eq!(failure.to_string(), "killed by signal 9");
    }

    #[test]
    fn test_provisioning_error_keeps_source() {
        use std::error::Error as _;

        let err = VolumeError::ProvisioningFailed {
            volume: "data".into(),
            source: ProcessError::new("mkfs.xfs", "/dev/sdc1").with_failure(
                ProcessFailure::Exit {
                    code: Some(2),
                    signal: None,
                },
            ),
        };

        assert!(err.to_string().contains("exit status 2"));
        assert!(err.source().is_some());
    }
}
