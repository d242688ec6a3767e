//! Work partitioning
//!
//! A [`Partition`] deterministically selects one disjoint shard of an
//! ordered work list (e.g. the test projects handled by one CI job).
//! Shards across all indices reconstruct the original list exactly.

/// Error constructing a partition
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// Index/count pair does not describe a valid partition
    #[error("Invalid partition {index} of {total} (index must be < total, total must be > 0)")]
    InvalidPartition { index: usize, total: usize },
}

/// One shard of a partitioned work list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    index: usize,
    total: usize,
}

impl Partition {
    /// Create a partition, validating the index/count pair
    pub fn new(index: usize, total: usize) -> Result<Self, PartitionError> {
        if total == 0 || index >= total {
            return Err(PartitionError::InvalidPartition { index, total });
        }
        Ok(Self { index, total })
    }

    /// The single partition covering everything
    pub fn single() -> Self {
        Self { index: 0, total: 1 }
    }

    /// Zero-based index of this shard
    pub fn index(&self) -> usize {
        self.index
    }

    /// Total number of shards
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether this partition covers the whole list
    pub fn is_single(&self) -> bool {
        self.total == 1
    }

    /// Select this shard's elements.
    ///
    /// Assignment is round-robin: the element at position `i` belongs to
    /// partition `i % total`. Relative order within the shard is
    /// preserved, and the shards over all indices partition the input
    /// exactly.
    pub fn select<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .enumerate()
            .filter(|(i, _)| i % self.total == self.index)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.index + 1, self.total)
    }
}
