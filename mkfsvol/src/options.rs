//! Configuration for the volume driver.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use mkfsvol_shared::constants::volume as const_volume;
use mkfsvol_shared::{VolumeError, VolumeResult};

use crate::catalog;

/// Startup configuration, fixed for the lifetime of the driver.
#[derive(Clone, Debug)]
pub struct DriverOptions {
    /// Partition pool, in allocation order.
    pub partitions: Vec<PathBuf>,

    /// Directory under which each volume is mounted at `<mount_dir>/<name>`.
    ///
    /// Default: /mnt
    pub mount_dir: PathBuf,

    /// Filesystem kind used when a create request does not pick one.
    ///
    /// Default: ext4
    pub default_filesystem: String,

    /// Give up on a formatting command after this long.
    ///
    /// Default: None (wait indefinitely)
    pub format_timeout: Option<Duration>,
}

impl DriverOptions {
    pub fn new(partitions: Vec<PathBuf>) -> Self {
        Self {
            partitions,
            ..Default::default()
        }
    }

    /// Reject configurations the driver cannot run with.
    pub fn validate(&self) -> VolumeResult<()> {
        if self.partitions.is_empty() {
            return Err(VolumeError::Config(
                "at least one partition is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for partition in &self.partitions {
            if !seen.insert(partition) {
                return Err(VolumeError::Config(format!(
                    "partition listed more than once: {}",
                    partition.display()
                )));
            }
        }

        if !self.mount_dir.is_absolute() {
            return Err(VolumeError::Config(format!(
                "mount directory must be absolute: {}",
                self.mount_dir.display()
            )));
        }

        catalog::lookup(&self.default_filesystem)?;

        if self.format_timeout == Some(Duration::ZERO) {
            return Err(VolumeError::Config(
                "format timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            partitions: Vec::new(),
            mount_dir: PathBuf::from(const_volume::DEFAULT_MOUNT_DIR),
            default_filesystem: const_volume::DEFAULT_FILESYSTEM.to_string(),
            format_timeout: None,
        }
    }
}
