//! Reference-counted volume mounting.
//!
//! A volume is mounted at its mount point while it has at least one mount
//! reference. The first reference performs the OS mount; releasing the last
//! one performs the OS unmount.

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use std::sync::Arc;

use mkfsvol_shared::constants::volume::MOUNT_DIR_MODE;
use mkfsvol_shared::{VolumeError, VolumeResult};
use nix::mount::{MsFlags, mount, umount};

use super::registry::Volume;

/// OS mount primitives.
pub trait Mounter: Send + Sync {
    /// Mount `device` at `target` as `fstype`.
    fn mount(&self, device: &Path, target: &Path, fstype: &str) -> io::Result<()>;

    /// Unmount whatever is mounted at `target`.
    fn unmount(&self, target: &Path) -> io::Result<()>;
}

/// Mounts through mount(2)/umount(2). Requires CAP_SYS_ADMIN.
#[derive(Debug, Clone, Copy, Default)]
pub struct NixMounter;

impl Mounter for NixMounter {
    fn mount(&self, device: &Path, target: &Path, fstype: &str) -> io::Result<()> {
        mount(
            Some(device),
            target,
            Some(fstype),
            MsFlags::empty(),
            None::<&str>,
        )
        .map_err(io::Error::from)
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        umount(target).map_err(io::Error::from)
    }
}

/// Drives the Unmounted/Mounted state of volumes.
#[derive(Clone)]
pub(crate) struct MountManager {
    mounter: Arc<dyn Mounter>,
}

impl MountManager {
    pub fn new(mounter: Arc<dyn Mounter>) -> Self {
        Self { mounter }
    }

    /// Add mount reference `id`, mounting the volume if it had none.
    ///
    /// If the mount fails the reference is not added. Ids are not
    /// de-duplicated: mounting the same id twice needs two releases.
    pub fn acquire(&self, volume: &mut Volume, id: &str) -> VolumeResult<()> {
        if volume.mounts.is_empty() {
            self.attach(volume)?;
        }
        volume.mounts.push(id.to_string());
        Ok(())
    }

    /// Drop one occurrence of mount reference `id`, unmounting the volume if
    /// it was the last one.
    ///
    /// If the unmount fails the reference is put back, so the volume still
    /// reads as mounted, which is what the kernel thinks too.
    pub fn release(&self, name: &str, volume: &mut Volume, id: &str) -> VolumeResult<()> {
        let index = volume.mounts.iter().position(|m| m == id).ok_or_else(|| {
            VolumeError::ReferenceNotFound {
                volume: name.to_string(),
                id: id.to_string(),
            }
        })?;

        let removed = volume.mounts.remove(index);
        if volume.mounts.is_empty()
            && let Err(e) = self.detach(volume)
        {
            volume.mounts.insert(index, removed);
            return Err(e);
        }
        Ok(())
    }

    fn attach(&self, volume: &Volume) -> VolumeResult<()> {
        let mount_failed = |e: io::Error| VolumeError::MountFailed {
            partition: volume.partition.display().to_string(),
            mountpoint: volume.mountpoint.display().to_string(),
            message: e.to_string(),
        };

        tracing::info!(
            "Mounting partition: {} → {} (filesystem={})",
            volume.partition.display(),
            volume.mountpoint.display(),
            volume.filesystem.mount_type
        );

        DirBuilder::new()
            .recursive(true)
            .mode(MOUNT_DIR_MODE)
            .create(&volume.mountpoint)
            .map_err(mount_failed)?;

        self.mounter
            .mount(
                &volume.partition,
                &volume.mountpoint,
                volume.filesystem.mount_type,
            )
            .map_err(mount_failed)?;

        tracing::info!(
            "Mounted partition: {} → {}",
            volume.partition.display(),
            volume.mountpoint.display()
        );
        Ok(())
    }

    fn detach(&self, volume: &Volume) -> VolumeResult<()> {
        tracing::info!("Unmounting {}", volume.mountpoint.display());

        self.mounter.unmount(&volume.mountpoint).map_err(|e| {
            tracing::error!(
                partition = %volume.partition.display(),
                "Unmount of {} failed, keeping volume marked as mounted: {}",
                volume.mountpoint.display(),
                e
            );
            VolumeError::UnmountFailed {
                mountpoint: volume.mountpoint.display().to_string(),
                message: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Calls {
        log: Mutex<Vec<String>>,
        fail_mount: bool,
        fail_unmount: bool,
    }

    impl Mounter for Calls {
        fn mount(&self, device: &Path, target: &Path, fstype: &str) -> io::Result<()> {
            if self.fail_mount {
                return Err(io::Error::from_raw_os_error(nix::libc::EBUSY));
            }
            self.log.lock().unwrap().push(format!(
                "mount {} {} {}",
                device.display(),
                target.display(),
                fstype
            ));
            Ok(())
        }

        fn unmount(&self, target: &Path) -> io::Result<()> {
            if self.fail_unmount {
                return Err(io::Error::from_raw_os_error(nix::libc::EBUSY));
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("unmount {}", target.display()));
            Ok(())
        }
    }

    fn volume(dir: &TempDir) -> Volume {
        Volume {
            partition: PathBuf::from("/dev/sdb1"),
            filesystem: catalog::lookup("ext4").unwrap(),
            mountpoint: dir.path().join("vols").join("data"),
            mounts: Vec::new(),
        }
    }

    fn manager(calls: Calls) -> (MountManager, Arc<Calls>) {
        let calls = Arc::new(calls);
        (MountManager::new(calls.clone()), calls)
    }

    #[test]
    fn test_first_reference_mounts_once() {
        let dir = TempDir::new().unwrap();
        let mut vol = volume(&dir);
        let (manager, calls) = manager(Calls::default());

        manager.acquire(&mut vol, "a").unwrap();
        manager.acquire(&mut vol, "b").unwrap();

        assert_eq!(vol.mounts, vec!["a", "b"]);
        let log = calls.log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].starts_with("mount /dev/sdb1 "));
        assert!(log[0].ends_with(" ext4"));
    }

    #[test]
    fn test_mount_creates_owner_only_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mut vol = volume(&dir);
        let (manager, _) = manager(Calls::default());

        manager.acquire(&mut vol, "a").unwrap();

        let meta = std::fs::metadata(&vol.mountpoint).unwrap();
        assert!(meta.is_dir());
        assert_eq!(meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn test_failed_mount_adds_no_reference() {
        let dir = TempDir::new().unwrap();
        let mut vol = volume(&dir);
        let (manager, _) = manager(Calls {
            fail_mount: true,
            ..Default::default()
        });

        let err = manager.acquire(&mut vol, "a").unwrap_err();
        assert!(matches!(err, VolumeError::MountFailed { .. }));
        assert!(vol.mounts.is_empty());
    }

    #[test]
    fn test_last_release_unmounts() {
        let dir = TempDir::new().unwrap();
        let mut vol = volume(&dir);
        let (manager, calls) = manager(Calls::default());
        manager.acquire(&mut vol, "a").unwrap();
        manager.acquire(&mut vol, "b").unwrap();

        manager.release("data", &mut vol, "a").unwrap();
        assert_eq!(calls.log.lock().unwrap().len(), 1);

        manager.release("data", &mut vol, "b").unwrap();
        let log = calls.log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[1].starts_with("unmount "));
        assert!(vol.mounts.is_empty());
    }

    #[test]
    fn test_release_unknown_reference() {
        let dir = TempDir::new().unwrap();
        let mut vol = volume(&dir);
        let (manager, calls) = manager(Calls::default());
        manager.acquire(&mut vol, "a").unwrap();

        let err = manager.release("data", &mut vol, "zzz").unwrap_err();
        assert!(matches!(err, VolumeError::ReferenceNotFound { .. }));
        assert_eq!(vol.mounts, vec!["a"]);
        assert_eq!(calls.log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_reference_needs_two_releases() {
        let dir = TempDir::new().unwrap();
        let mut vol = volume(&dir);
        let (manager, calls) = manager(Calls::default());
        manager.acquire(&mut vol, "a").unwrap();
        manager.acquire(&mut vol, "a").unwrap();

        manager.release("data", &mut vol, "a").unwrap();
        assert_eq!(vol.mounts, vec!["a"]);

        manager.release("data", &mut vol, "a").unwrap();
        assert!(vol.mounts.is_empty());
        assert_eq!(calls.log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_unmount_restores_reference() {
        let dir = TempDir::new().unwrap();
        let mut vol = volume(&dir);
        vol.mounts = vec!["a".to_string()];
        let (manager, _) = manager(Calls {
            fail_unmount: true,
            ..Default::default()
        });

        let err = manager.release("data", &mut vol, "a").unwrap_err();
        assert!(matches!(err, VolumeError::UnmountFailed { .. }));
        assert_eq!(vol.mounts, vec!["a"]);
    }
}
