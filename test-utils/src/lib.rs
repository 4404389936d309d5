//! Test fixtures shared by the mkfsvol crates.
//!
//! Provides recording stand-ins for the two OS-facing seams of the driver
//! (formatting and mounting) so volume lifecycles can be exercised without
//! root, real partitions, or mkfs tools.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mkfsvol::catalog::FilesystemSpec;
use mkfsvol::{DriverOptions, Mounter, ProcessError, ProcessFailure, Provisioner, VolumeDriver};
use parking_lot::Mutex;
use tempfile::TempDir;

/// One call made against a [`RecordingMounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    Mount {
        device: PathBuf,
        target: PathBuf,
        fstype: String,
    },
    Unmount {
        target: PathBuf,
    },
}

/// Mounter that records calls instead of touching the kernel.
#[derive(Debug, Default)]
pub struct RecordingMounter {
    calls: Mutex<Vec<MountCall>>,
    fail_mount: AtomicBool,
    fail_unmount: AtomicBool,
}

impl RecordingMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent mounts fail with EBUSY.
    pub fn fail_mounts(&self, fail: bool) {
        self.fail_mount.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent unmounts fail with EBUSY.
    pub fn fail_unmounts(&self, fail: bool) {
        self.fail_unmount.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<MountCall> {
        self.calls.lock().clone()
    }

    pub fn mount_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, MountCall::Mount { .. }))
            .count()
    }

    pub fn unmount_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, MountCall::Unmount { .. }))
            .count()
    }
}

impl Mounter for RecordingMounter {
    fn mount(&self, device: &Path, target: &Path, fstype: &str) -> io::Result<()> {
        if self.fail_mount.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::ResourceBusy, "device busy"));
        }
        self.calls.lock().push(MountCall::Mount {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.to_string(),
        });
        Ok(())
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        if self.fail_unmount.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::ResourceBusy, "target busy"));
        }
        self.calls.lock().push(MountCall::Unmount {
            target: target.to_path_buf(),
        });
        Ok(())
    }
}

/// Provisioner that records which partitions were formatted with what.
#[derive(Debug, Default)]
pub struct RecordingProvisioner {
    formatted: Mutex<Vec<(PathBuf, &'static str)>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent formats fail with exit status 1.
    pub fn fail_formats(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make each format take `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Successful and failed format attempts, in order.
    pub fn formatted(&self) -> Vec<(PathBuf, &'static str)> {
        self.formatted.lock().clone()
    }

    /// Highest number of formats that were ever running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn format(
        &self,
        partition: &Path,
        filesystem: &'static FilesystemSpec,
    ) -> Result<(), ProcessError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        self.formatted
            .lock()
            .push((partition.to_path_buf(), filesystem.kind));

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(
                ProcessError::new(filesystem.command, partition.display().to_string())
                    .with_failure(ProcessFailure::Exit {
                        code: Some(1),
                        signal: None,
                    }),
            );
        }
        Ok(())
    }
}

/// A driver wired to recording backends, mounting under a temp directory.
pub struct TestDriver {
    pub driver: Arc<VolumeDriver>,
    pub mounter: Arc<RecordingMounter>,
    pub provisioner: Arc<RecordingProvisioner>,
    pub partitions: Vec<PathBuf>,
    pub dir: TempDir,
}

impl TestDriver {
    /// Driver over `pool_size` partitions named `/dev/test1`, `/dev/test2`, ...
    pub fn new(pool_size: usize) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let partitions: Vec<PathBuf> = (1..=pool_size)
            .map(|i| PathBuf::from(format!("/dev/test{}", i)))
            .collect();

        let options = DriverOptions {
            mount_dir: dir.path().to_path_buf(),
            ..DriverOptions::new(partitions.clone())
        };

        let mounter = Arc::new(RecordingMounter::new());
        let provisioner = Arc::new(RecordingProvisioner::new());
        let driver = VolumeDriver::with_backends(options, provisioner.clone(), mounter.clone())
            .expect("Failed to create driver");

        Self {
            driver: Arc::new(driver),
            mounter,
            provisioner,
            partitions,
            dir,
        }
    }

    /// Where a volume named `name` is mounted.
    pub fn mountpoint(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
