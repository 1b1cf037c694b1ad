// src/rearrange/goals.rs
//! Goal slot assignment: a sparse, evenly spaced walk over the lattice.
//!
//! The cursor moves down a column `stride_y` rows at a time. When the next
//! block of `stride_y` rows no longer fits in the column, it jumps `stride_x`
//! columns to the right of where the column block started and resets to row 0.
//! Trailing rows that cannot hold a full stride block are never used. A column
//! block only needs its first column inside the lattice.

use super::error::PlacementError;
use super::lattice::CandidateLattice;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GoalSlotAssigner {
    n_x: usize,
    n_y: usize,
    stride_x: usize,
    stride_y: usize,
}

impl GoalSlotAssigner {
    pub fn new((n_x, n_y): (usize, usize), (stride_x, stride_y): (usize, usize)) -> Self {
        Self { n_x, n_y, stride_x: stride_x.max(1), stride_y: stride_y.max(1) }
    }

    pub fn for_lattice(lattice: &CandidateLattice, stride: (usize, usize)) -> Self {
        Self::new(lattice.dims(), stride)
    }

    /// Column blocks starting inside the lattice x full row blocks per column.
    pub fn capacity(&self) -> usize {
        self.n_x.div_ceil(self.stride_x) * (self.n_y / self.stride_y)
    }

    /// Rows at the bottom of each column that never receive a goal.
    pub fn skipped_rows_per_column(&self) -> usize {
        self.n_y % self.stride_y
    }

    /// Goal slot index for objects `0..n`, in object order.
    pub fn assign(&self, n: usize) -> Result<Vec<usize>, PlacementError> {
        let capacity = self.capacity();
        if n > capacity {
            return Err(PlacementError::InsufficientCapacity { requested: n, capacity });
        }

        let mut goals = Vec::with_capacity(n);
        let mut block_start = 0;
        let mut cursor = 0;
        while goals.len() < n {
            goals.push(cursor);
            cursor += self.stride_y;
            if cursor + self.stride_y > block_start + self.n_y {
                block_start += self.stride_x * self.n_y;
                cursor = block_start;
            }
        }
        Ok(goals)
    }
}
