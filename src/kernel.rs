//! The local multiply kernel: each PE computes its row block of C from its
//! row block of A and the replicated B. Purely local, no communication, no
//! shared mutable state between PEs.

use crate::matrix::{Matrix, RowBlock};

/// Compute `c = a * b` for one PE's rows.
///
/// Plain triple loop; f32 accumulation in ascending k, matching the
/// conventional definition of the matrix product (no compensated summation).
pub fn multiply_row_block(a: &RowBlock, b: &Matrix, c: &mut RowBlock) {
    debug_assert_eq!(a.dim(), b.dim());
    debug_assert_eq!(a.rows(), c.rows());
    debug_assert_eq!(a.dim(), c.dim());
    let dim = a.dim();
    for i in 0..a.rows() {
        for j in 0..dim {
            let mut sum = 0.0f32;
            for k in 0..dim {
                sum += a.get(i, k) * b.get(k, j);
            }
            c.set(i, j, sum);
        }
    }
}
