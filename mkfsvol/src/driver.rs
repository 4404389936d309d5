//! Volume driver.
//!
//! [`VolumeDriver`] is the entry point for every volume operation. Each call
//! holds one driver-wide lock for its whole duration, including formatting
//! on create, so operations are applied strictly one at a time. A slow
//! format therefore blocks unrelated mounts, but no two creates can ever race
//! for the same partition.

use std::path::PathBuf;
use std::sync::Arc;

use mkfsvol_shared::VolumeResult;
use mkfsvol_shared::constants::volume as const_volume;
use tokio::sync::Mutex;

use crate::options::DriverOptions;
use crate::volumes::{
    CommandProvisioner, MountManager, Mounter, NixMounter, PartitionPool, Provisioner,
    VolumeInfo, VolumeRegistry,
};

/// What the driver reports about itself to the container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub scope: &'static str,
}

/// Volume driver over a fixed partition pool.
pub struct VolumeDriver {
    registry: Mutex<VolumeRegistry>,
    mounts: MountManager,
    provisioner: Arc<dyn Provisioner>,
    default_filesystem: String,
}

impl VolumeDriver {
    /// Create a driver that formats with the catalog's mkfs tools and mounts
    /// through mount(2).
    pub fn new(options: DriverOptions) -> VolumeResult<Self> {
        let provisioner = Arc::new(CommandProvisioner::new(options.format_timeout));
        Self::with_backends(options, provisioner, Arc::new(NixMounter))
    }

    /// Create a driver with explicit provisioning and mount backends.
    pub fn with_backends(
        options: DriverOptions,
        provisioner: Arc<dyn Provisioner>,
        mounter: Arc<dyn Mounter>,
    ) -> VolumeResult<Self> {
        options.validate()?;

        tracing::info!(
            partitions = options.partitions.len(),
            mount_dir = %options.mount_dir.display(),
            default_filesystem = %options.default_filesystem,
            "Volume driver initialized"
        );

        let pool = PartitionPool::new(options.partitions);
        Ok(Self {
            registry: Mutex::new(VolumeRegistry::new(pool, options.mount_dir)),
            mounts: MountManager::new(mounter),
            provisioner,
            default_filesystem: options.default_filesystem,
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            scope: const_volume::SCOPE,
        }
    }

    /// Create a volume on the next free partition and format it.
    ///
    /// `filesystem` falls back to the configured default.
    pub async fn create(&self, name: &str, filesystem: Option<&str>) -> VolumeResult<VolumeInfo> {
        let mut registry = self.registry.lock().await;
        tracing::debug!(name, filesystem = ?filesystem, "create");

        let filesystem = filesystem.unwrap_or(self.default_filesystem.as_str());
        registry
            .create(name, filesystem, self.provisioner.as_ref())
            .await
            .inspect(|info| {
                tracing::info!(
                    name,
                    partition = %info.partition.display(),
                    filesystem = info.filesystem,
                    "Created volume"
                );
            })
            .inspect_err(|e| tracing::error!(name, filesystem, error = %e, "create failed"))
    }

    pub async fn get(&self, name: &str) -> VolumeResult<VolumeInfo> {
        let registry = self.registry.lock().await;
        tracing::debug!(name, "get");

        registry
            .get(name)
            .inspect_err(|e| tracing::error!(name, error = %e, "get failed"))
    }

    /// All registered volumes, ordered by name.
    pub async fn list(&self) -> Vec<VolumeInfo> {
        let registry = self.registry.lock().await;
        tracing::debug!("list");

        registry.list()
    }

    /// Mount point of a volume, whether or not it is currently mounted.
    pub async fn path(&self, name: &str) -> VolumeResult<PathBuf> {
        let registry = self.registry.lock().await;
        tracing::debug!(name, "path");

        registry
            .get(name)
            .map(|info| info.mountpoint)
            .inspect_err(|e| tracing::error!(name, error = %e, "path failed"))
    }

    /// Add mount reference `id` to a volume, mounting it on first use.
    pub async fn mount(&self, name: &str, id: &str) -> VolumeResult<PathBuf> {
        let mut registry = self.registry.lock().await;
        tracing::debug!(name, id, "mount");

        let result = registry.volume_mut(name).and_then(|volume| {
            self.mounts.acquire(volume, id)?;
            Ok(volume.mountpoint.clone())
        });
        result.inspect_err(|e| tracing::error!(name, id, error = %e, "mount failed"))
    }

    /// Release mount reference `id`, unmounting the volume when it was the
    /// last one.
    pub async fn unmount(&self, name: &str, id: &str) -> VolumeResult<()> {
        let mut registry = self.registry.lock().await;
        tracing::debug!(name, id, "unmount");

        registry
            .volume_mut(name)
            .and_then(|volume| self.mounts.release(name, volume, id))
            .inspect_err(|e| tracing::error!(name, id, error = %e, "unmount failed"))
    }

    /// Forget a volume, returning its partition to the pool.
    ///
    /// Fails while the volume still has mount references.
    pub async fn remove(&self, name: &str) -> VolumeResult<()> {
        let mut registry = self.registry.lock().await;
        tracing::debug!(name, "remove");

        registry
            .remove(name)
            .map(|info| {
                tracing::info!(
                    name,
                    partition = %info.partition.display(),
                    "Removed volume"
                );
            })
            .inspect_err(|e| tracing::error!(name, error = %e, "remove failed"))
    }

    /// Partitions currently backing a volume, in pool order.
    pub async fn assigned_partitions(&self) -> Vec<PathBuf> {
        let registry = self.registry.lock().await;
        registry
            .assigned_partitions()
            .into_iter()
            .map(PathBuf::from)
            .collect()
    }

    /// Number of partitions in the pool.
    pub async fn pool_size(&self) -> usize {
        self.registry.lock().await.pool_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FilesystemSpec;
    use async_trait::async_trait;
    use mkfsvol_shared::{ProcessError, VolumeError};
    use std::io;
    use std::path::Path;
    use tempfile::TempDir;

    struct NoopProvisioner;

    #[async_trait]
    impl Provisioner for NoopProvisioner {
        async fn format(&self, _: &Path, _: &'static FilesystemSpec) -> Result<(), ProcessError> {
            Ok(())
        }
    }

    struct NoopMounter;

    impl Mounter for NoopMounter {
        fn mount(&self, _: &Path, _: &Path, _: &str) -> io::Result<()> {
            Ok(())
        }

        fn unmount(&self, _: &Path) -> io::Result<()> {
            Ok(())
        }
    }

    fn driver(dir: &TempDir) -> VolumeDriver {
        let options = DriverOptions {
            mount_dir: dir.path().to_path_buf(),
            ..DriverOptions::new(vec![PathBuf::from("/dev/sdb1")])
        };
        VolumeDriver::with_backends(options, Arc::new(NoopProvisioner), Arc::new(NoopMounter))
            .unwrap()
    }

    #[test]
    fn test_invalid_options_rejected() {
        let result = VolumeDriver::with_backends(
            DriverOptions::default(),
            Arc::new(NoopProvisioner),
            Arc::new(NoopMounter),
        );
        assert!(matches!(result, Err(VolumeError::Config(_))));
    }

    #[test]
    fn test_capabilities_scope_is_local() {
        let dir = TempDir::new().unwrap();
        assert_eq!(driver(&dir).capabilities().scope, "local");
    }

    #[tokio::test]
    async fn test_create_uses_default_filesystem() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir);

        let info = driver.create("data", None).await.unwrap();
        assert_eq!(info.filesystem, "ext4");
        assert_eq!(driver.path("data").await.unwrap(), dir.path().join("data"));
    }

    #[tokio::test]
    async fn test_mount_returns_mountpoint() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir);
        driver.create("data", Some("xfs")).await.unwrap();

        let mountpoint = driver.mount("data", "c1").await.unwrap();
        assert_eq!(mountpoint, dir.path().join("data"));
        assert_eq!(driver.get("data").await.unwrap().mounts, 1);
    }

    #[tokio::test]
    async fn test_operations_validate_names() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir);

        assert!(matches!(
            driver.mount("../etc", "c1").await,
            Err(VolumeError::InvalidName(_))
        ));
        assert!(matches!(
            driver.unmount("a", "c1").await,
            Err(VolumeError::InvalidName(_))
        ));
        assert!(matches!(
            driver.remove("").await,
            Err(VolumeError::InvalidName(_))
        ));
    }
}
