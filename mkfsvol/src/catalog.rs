//! Filesystem catalog.
//!
//! Maps a filesystem kind to the command that formats a partition with it and
//! the type string passed to mount(2). Entries are compile-time constants: a
//! wrong flag here reformats data, so nothing about them is configurable at
//! runtime.

use mkfsvol_shared::{VolumeError, VolumeResult};

/// How to format and mount one filesystem kind.
#[derive(Debug, PartialEq, Eq)]
pub struct FilesystemSpec {
    /// Kind identifier used in create options (e.g. "ext4").
    pub kind: &'static str,
    /// Formatting program, resolved through PATH.
    pub command: &'static str,
    /// Flags placed before the partition argument.
    pub args: &'static [&'static str],
    /// Filesystem type passed to mount(2).
    pub mount_type: &'static str,
}

// -F / -f: never prompt, the partition is ours to overwrite
static FILESYSTEMS: &[FilesystemSpec] = &[
    FilesystemSpec {
        kind: "ext4",
        command: "mkfs.ext4",
        args: &["-F"],
        mount_type: "ext4",
    },
    FilesystemSpec {
        kind: "ext3",
        command: "mkfs.ext3",
        args: &["-F"],
        mount_type: "ext3",
    },
    FilesystemSpec {
        kind: "xfs",
        command: "mkfs.xfs",
        args: &["-f"],
        mount_type: "xfs",
    },
    FilesystemSpec {
        kind: "btrfs",
        command: "mkfs.btrfs",
        args: &["-f"],
        mount_type: "btrfs",
    },
];

/// Look up a filesystem kind. Matching is exact and case-sensitive.
pub fn lookup(kind: &str) -> VolumeResult<&'static FilesystemSpec> {
    FILESYSTEMS
        .iter()
        .find(|fs| fs.kind == kind)
        .ok_or_else(|| VolumeError::UnsupportedFilesystem {
            kind: kind.to_string(),
            supported: supported_list(),
        })
}

/// All supported kinds, in catalog order.
pub fn supported() -> impl Iterator<Item = &'static str> {
    FILESYSTEMS.iter().map(|fs| fs.kind)
}

/// Supported kinds as a comma-separated list, for help and error text.
pub fn supported_list() -> String {
    supported().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ext4() {
        let fs = lookup("ext4").unwrap();
        assert_eq!(fs.command, "mkfs.ext4");
        assert_eq!(fs.args, &["-F"]);
        assert_eq!(fs.mount_type, "ext4");
    }

    #[test]
    fn test_lookup_xfs_uses_lowercase_force() {
        let fs = lookup("xfs").unwrap();
        assert_eq!(fs.command, "mkfs.xfs");
        assert_eq!(fs.args, &["-f"]);
    }

    #[test]
    fn test_lookup_unknown() {
        let err = lookup("ntfs").unwrap_err();
        assert!(matches!(err, VolumeError::UnsupportedFilesystem { ref kind, .. } if kind == "ntfs"));
        assert_eq!(
            err.to_string(),
            "unsupported file system: ntfs (supported: ext4, ext3, xfs, btrfs)"
        );
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert!(lookup("EXT4").is_err());
    }

    #[test]
    fn test_kinds_are_unique() {
        let mut kinds: Vec<_> = supported().collect();
        let total = kinds.len();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), total);
    }
}
