//! Partition provisioning (formatting before first use).

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mkfsvol_shared::ProcessError;

use crate::catalog::FilesystemSpec;
use crate::util::{TracingObserver, run_command};

/// Formats a partition with a filesystem.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn format(
        &self,
        partition: &Path,
        filesystem: &'static FilesystemSpec,
    ) -> Result<(), ProcessError>;
}

/// Formats by running the catalog's mkfs command against the partition.
///
/// Tool output goes to `tracing` as it is produced.
#[derive(Debug, Clone, Default)]
pub struct CommandProvisioner {
    timeout: Option<Duration>,
}

impl CommandProvisioner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Provisioner for CommandProvisioner {
    async fn format(
        &self,
        partition: &Path,
        filesystem: &'static FilesystemSpec,
    ) -> Result<(), ProcessError> {
        let label = partition.display().to_string();
        tracing::info!(
            command = filesystem.command,
            partition = %label,
            "Formatting partition with {}",
            filesystem.kind
        );

        let args = filesystem
            .args
            .iter()
            .map(OsStr::new)
            .chain(std::iter::once(partition.as_os_str()));
        let observer = Arc::new(TracingObserver::new(filesystem.command, label.as_str()));

        let start = Instant::now();
        run_command(filesystem.command, args, &label, observer, self.timeout).await?;

        tracing::info!(
            command = filesystem.command,
            partition = %label,
            "Formatted partition in {:?}",
            start.elapsed()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mkfsvol_shared::ProcessFailure;

    static ECHO_FS: FilesystemSpec = FilesystemSpec {
        kind: "echo",
        command: "sh",
        args: &["-c", "echo \"formatting $0\""],
        mount_type: "echo",
    };

    static BROKEN_FS: FilesystemSpec = FilesystemSpec {
        kind: "broken",
        command: "sh",
        args: &["-c", "echo \"cannot open $0\" >&2; exit 1"],
        mount_type: "broken",
    };

    static SLOW_FS: FilesystemSpec = FilesystemSpec {
        kind: "slow",
        command: "sh",
        args: &["-c", "sleep 30"],
        mount_type: "slow",
    };

    #[tokio::test]
    async fn test_format_success() {
        CommandProvisioner::default()
            .format(Path::new("/dev/sdb1"), &ECHO_FS)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_format_failure_names_partition() {
        let err = CommandProvisioner::default()
            .format(Path::new("/dev/sdb1"), &BROKEN_FS)
            .await
            .unwrap_err();

        assert_eq!(err.command, "sh");
        assert_eq!(err.partition, "/dev/sdb1");
        assert_eq!(err.exit_code(), Some(1));
    }

    #[tokio::test]
    async fn test_format_timeout() {
        let err = CommandProvisioner::new(Some(Duration::from_millis(100)))
            .format(Path::new("/dev/sdb1"), &SLOW_FS)
            .await
            .unwrap_err();

        assert!(matches!(
            err.failures.as_slice(),
            [ProcessFailure::TimedOut { .. }]
        ));
    }
}
