use crate::error::{LaminaError, LaminaResult};

use std::ops::Range;

/// Row-block decomposition of an NxN matrix over `num_pes` ranks.
///
/// Rank `r` owns the contiguous rows `[r * rows_per_pe, (r + 1) *
/// rows_per_pe)`; the blocks taken in rank order partition the matrix
/// exactly, which is what lets the gather be the inverse of the scatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPartition {
    dim: usize,
    num_pes: usize,
    rows_per_pe: usize,
}

impl RowPartition {
    /// Validate that `dim` rows divide evenly over `num_pes` ranks.
    ///
    /// Every PE performs this check independently from the same inputs, so a
    /// failure is detected group-wide before any communication happens.
    pub fn new(dim: usize, num_pes: usize) -> LaminaResult<RowPartition> {
        if num_pes == 0 {
            return Err(LaminaError::Config(
                "number of processes must be nonzero".to_owned(),
            ));
        }
        if dim % num_pes != 0 {
            return Err(LaminaError::Config(
                "Matrix size must be divisible by number of processes.".to_owned(),
            ));
        }
        Ok(RowPartition {
            dim,
            num_pes,
            rows_per_pe: dim / num_pes,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_pes(&self) -> usize {
        self.num_pes
    }

    /// Rows owned by each rank.
    pub fn rows_per_pe(&self) -> usize {
        self.rows_per_pe
    }

    /// Elements in one rank's block.
    pub fn block_len(&self) -> usize {
        self.rows_per_pe * self.dim
    }

    /// Map a local row index within `pe`'s block to its global row.
    pub fn global_row(&self, pe: usize, local_row: usize) -> usize {
        debug_assert!(pe < self.num_pes && local_row < self.rows_per_pe);
        pe * self.rows_per_pe + local_row
    }

    /// Flat element range of `pe`'s block within the full matrix buffer.
    pub fn block_range(&self, pe: usize) -> Range<usize> {
        debug_assert!(pe < self.num_pes);
        pe * self.block_len()..(pe + 1) * self.block_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisibility_is_enforced() {
        assert!(RowPartition::new(3, 2).is_err());
        assert!(RowPartition::new(0, 3).is_ok()); // 0 % 3 == 0
        assert!(RowPartition::new(8, 0).is_err());
        let p = RowPartition::new(8, 4).unwrap();
        assert_eq!(p.rows_per_pe(), 2);
        assert_eq!(p.block_len(), 16);
    }

    #[test]
    fn blocks_partition_the_matrix() {
        let p = RowPartition::new(12, 4).unwrap();
        let mut covered = vec![false; 12 * 12];
        for pe in 0..4 {
            for i in p.block_range(pe) {
                assert!(!covered[i], "element {} covered twice", i);
                covered[i] = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn global_rows_are_rank_ordered() {
        let p = RowPartition::new(6, 3).unwrap();
        let rows: Vec<usize> = (0..3)
            .flat_map(|pe| (0..p.rows_per_pe()).map(move |i| (pe, i)))
            .map(|(pe, i)| p.global_row(pe, i))
            .collect();
        assert_eq!(rows, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn one_row_per_pe() {
        let p = RowPartition::new(4, 4).unwrap();
        assert_eq!(p.rows_per_pe(), 1);
        assert_eq!(p.block_range(3), 12..16);
    }
}
