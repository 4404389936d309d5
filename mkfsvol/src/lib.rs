//! mkfsvol - volume driver over a fixed pool of raw partitions.
//!
//! Each volume is backed by one partition from an operator-supplied pool.
//! Creating a volume formats its partition with an external mkfs tool;
//! mounting is reference counted, so the partition is mounted while at least
//! one consumer holds a mount reference and unmounted when the last one lets
//! go. State lives in memory only and is lost on restart.
//!
//! ```rust,no_run
//! use mkfsvol::{DriverOptions, VolumeDriver};
//! use std::path::PathBuf;
//!
//! # async fn run() -> mkfsvol::VolumeResult<()> {
//! let driver = VolumeDriver::new(DriverOptions::new(vec![PathBuf::from("/dev/sdb1")]))?;
//! driver.create("scratch", Some("xfs")).await?;
//! let mountpoint = driver.mount("scratch", "container-1").await?;
//! # let _ = mountpoint;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod driver;
pub mod options;
pub mod util;
pub mod volumes;

pub use driver::{Capabilities, VolumeDriver};
pub use mkfsvol_shared::{ProcessError, ProcessFailure, VolumeError, VolumeResult};
pub use options::DriverOptions;
pub use volumes::{Mounter, Provisioner, VolumeInfo};
