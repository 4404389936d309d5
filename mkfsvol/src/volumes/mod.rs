//! Volume management.
//!
//! - `PartitionPool` - picks the next free partition from the configured pool
//! - `Provisioner` - formats a partition before first use
//! - `Mounter` - OS mount/unmount primitives behind reference-counted mounts
//! - `VolumeInfo` - what callers see of a registered volume

mod allocator;
mod mount;
mod provision;
mod registry;

pub use allocator::PartitionPool;
pub use mount::{Mounter, NixMounter};
pub use provision::{CommandProvisioner, Provisioner};
pub use registry::{VolumeInfo, validate_name};

pub(crate) use mount::MountManager;
pub(crate) use registry::VolumeRegistry;
