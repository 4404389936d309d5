//! Partition pool allocation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mkfsvol_shared::{VolumeError, VolumeResult};

/// The fixed, ordered set of partitions volumes are carved from.
///
/// The pool never changes after startup. Which partitions are in use is owned
/// by the registry, so allocation is a pure function of the pool and the
/// current assignments and is re-evaluated on every create.
#[derive(Debug, Clone)]
pub struct PartitionPool {
    partitions: Vec<PathBuf>,
}

impl PartitionPool {
    pub fn new(partitions: Vec<PathBuf>) -> Self {
        Self { partitions }
    }

    /// First partition, in configured order, that is not in `assigned`.
    pub fn next_free<'a, I>(&self, assigned: I) -> VolumeResult<&Path>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let assigned: HashSet<&Path> = assigned.into_iter().collect();

        self.partitions
            .iter()
            .map(PathBuf::as_path)
            .find(|p| !assigned.contains(p))
            .ok_or(VolumeError::NoCapacity)
    }

    /// Number of partitions in the pool.
    pub fn size(&self) -> usize {
        self.partitions.len()
    }

    pub fn partitions(&self) -> &[PathBuf] {
        &self.partitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(names: &[&str]) -> PartitionPool {
        PartitionPool::new(names.iter().map(PathBuf::from).collect())
    }

    #[test]
    fn test_first_partition_when_nothing_assigned() {
        let pool = pool(&["/dev/sdb1", "/dev/sdb2"]);
        assert_eq!(pool.next_free(Vec::<&Path>::new()).unwrap(), Path::new("/dev/sdb1"));
    }

    #[test]
    fn test_skips_assigned_in_configured_order() {
        let pool = pool(&["/dev/sdb1", "/dev/sdb2", "/dev/sdb3"]);
        let assigned = [Path::new("/dev/sdb1"), Path::new("/dev/sdb3")];

        assert_eq!(pool.next_free(assigned).unwrap(), Path::new("/dev/sdb2"));
    }

    #[test]
    fn test_lowest_index_wins_after_release() {
        let pool = pool(&["/dev/sdb1", "/dev/sdb2", "/dev/sdb3"]);

        // sdb1 was released while sdb2 and sdb3 stay assigned
        let assigned = [Path::new("/dev/sdb3"), Path::new("/dev/sdb2")];
        assert_eq!(pool.next_free(assigned).unwrap(), Path::new("/dev/sdb1"));
    }

    #[test]
    fn test_exhausted_pool() {
        let pool = pool(&["/dev/sdb1"]);
        let err = pool.next_free([Path::new("/dev/sdb1")]).unwrap_err();
        assert!(matches!(err, VolumeError::NoCapacity));
    }

    #[test]
    fn test_empty_pool() {
        let pool = pool(&[]);
        assert_eq!(pool.size(), 0);
        assert!(matches!(pool.next_free(Vec::<&Path>::new()), Err(VolumeError::NoCapacity)));
    }

    #[test]
    fn test_unknown_assignments_are_ignored() {
        let pool = pool(&["/dev/sdb1"]);
        let assigned = [Path::new("/dev/other")];
        assert_eq!(pool.next_free(assigned).unwrap(), Path::new("/dev/sdb1"));
    }
}
