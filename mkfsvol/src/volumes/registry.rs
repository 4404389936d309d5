//! Volume registry.
//!
//! Owns every volume's partition assignment and mount references. All access
//! goes through [`crate::VolumeDriver`], which serializes operations behind a
//! single lock, so nothing here is synchronized on its own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use mkfsvol_shared::{VolumeError, VolumeResult};
use regex::Regex;

use super::allocator::PartitionPool;
use super::provision::Provisioner;
use crate::catalog::{self, FilesystemSpec};

/// Volume names: an alphanumeric first character followed by at least one
/// alphanumeric or `_.-` character. Single-character names are rejected.
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]+$").expect("volume name pattern is valid")
});

/// Check a volume name against the allowed pattern.
pub fn validate_name(name: &str) -> VolumeResult<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(VolumeError::InvalidName(name.to_string()))
    }
}

/// A registered volume.
#[derive(Debug, Clone)]
pub(crate) struct Volume {
    /// Partition assigned at creation, fixed for the volume's lifetime.
    pub partition: PathBuf,
    pub filesystem: &'static FilesystemSpec,
    /// Mount directory (`<mount dir>/<name>`).
    pub mountpoint: PathBuf,
    /// Active mount reference ids, in mount order. May contain duplicates.
    pub mounts: Vec<String>,
}

/// Snapshot of a volume as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub name: String,
    pub mountpoint: PathBuf,
    pub partition: PathBuf,
    pub filesystem: &'static str,
    /// Number of active mount references.
    pub mounts: usize,
}

impl VolumeInfo {
    fn new(name: &str, volume: &Volume) -> Self {
        Self {
            name: name.to_string(),
            mountpoint: volume.mountpoint.clone(),
            partition: volume.partition.clone(),
            filesystem: volume.filesystem.kind,
            mounts: volume.mounts.len(),
        }
    }
}

pub(crate) struct VolumeRegistry {
    volumes: HashMap<String, Volume>,
    pool: PartitionPool,
    mount_dir: PathBuf,
}

impl VolumeRegistry {
    pub fn new(pool: PartitionPool, mount_dir: PathBuf) -> Self {
        Self {
            volumes: HashMap::new(),
            pool,
            mount_dir,
        }
    }

    /// Register a new volume on the first free partition.
    ///
    /// The partition is formatted before the volume is recorded. If formatting
    /// fails nothing is recorded, so the partition stays free for the next
    /// create.
    pub async fn create(
        &mut self,
        name: &str,
        filesystem: &str,
        provisioner: &dyn Provisioner,
    ) -> VolumeResult<VolumeInfo> {
        validate_name(name)?;
        if self.volumes.contains_key(name) {
            return Err(VolumeError::AlreadyExists(name.to_string()));
        }

        let filesystem = catalog::lookup(filesystem)?;
        let partition = self
            .pool
            .next_free(self.volumes.values().map(|v| v.partition.as_path()))?
            .to_path_buf();

        tracing::debug!(
            name,
            partition = %partition.display(),
            filesystem = filesystem.kind,
            "Allocated partition"
        );

        provisioner
            .format(&partition, filesystem)
            .await
            .map_err(|source| VolumeError::ProvisioningFailed {
                volume: name.to_string(),
                source,
            })?;

        let volume = Volume {
            partition,
            filesystem,
            mountpoint: self.mount_dir.join(name),
            mounts: Vec::new(),
        };
        let info = VolumeInfo::new(name, &volume);
        self.volumes.insert(name.to_string(), volume);

        Ok(info)
    }

    pub fn get(&self, name: &str) -> VolumeResult<VolumeInfo> {
        validate_name(name)?;
        self.volumes
            .get(name)
            .map(|volume| VolumeInfo::new(name, volume))
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))
    }

    pub(crate) fn volume_mut(&mut self, name: &str) -> VolumeResult<&mut Volume> {
        validate_name(name)?;
        self.volumes
            .get_mut(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))
    }

    /// All volumes, ordered by name.
    pub fn list(&self) -> Vec<VolumeInfo> {
        let mut volumes: Vec<_> = self
            .volumes
            .iter()
            .map(|(name, volume)| VolumeInfo::new(name, volume))
            .collect();
        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        volumes
    }

    /// Forget a volume and release its partition.
    ///
    /// A volume with active mount references is refused: dropping it would
    /// leave a kernel mount nobody tracks.
    pub fn remove(&mut self, name: &str) -> VolumeResult<VolumeInfo> {
        let volume = self.volume_mut(name)?;
        if !volume.mounts.is_empty() {
            return Err(VolumeError::VolumeInUse {
                volume: name.to_string(),
                mounts: volume.mounts.len(),
            });
        }

        let volume = self
            .volumes
            .remove(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;
        Ok(VolumeInfo::new(name, &volume))
    }

    /// Partitions currently assigned to a volume, in pool order.
    pub fn assigned_partitions(&self) -> Vec<&Path> {
        self.pool
            .partitions()
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| self.volumes.values().any(|v| v.partition == *p))
            .collect()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }
}
