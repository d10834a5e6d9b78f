use crate::error::{LaminaError, LaminaResult};

/// Allocate a zeroed f32 buffer, surfacing allocation failure as a
/// [`LaminaError::Resource`] instead of aborting the process. The runtime
/// turns that into a group-wide abort.
fn try_zeroed(len: usize) -> LaminaResult<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| LaminaError::Resource(format!("{} f32 elements: {}", len, e)))?;
    buf.resize(len, 0.0);
    Ok(buf)
}

/// A dense NxN matrix of f32 values in a row-major flat buffer.
///
/// `element(i, j)` lives at flat offset `i * dim + j`; the stride arithmetic
/// stays behind these accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    dim: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(dim: usize) -> LaminaResult<Matrix> {
        Ok(Matrix {
            dim,
            data: try_zeroed(dim * dim)?,
        })
    }

    pub fn from_vec(dim: usize, data: Vec<f32>) -> Matrix {
        assert_eq!(data.len(), dim * dim, "buffer length must be dim * dim");
        Matrix { dim, data }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.dim + j]
    }

    pub fn set(&mut self, i: usize, j: usize, val: f32) {
        self.data[i * self.dim + j] = val;
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

/// A contiguous block of `rows` rows of an NxN matrix, owned exclusively by
/// one PE. Local row `i` of rank `r`'s block corresponds to global row
/// `r * rows + i` (see [`RowPartition::global_row`](crate::RowPartition)).
#[derive(Debug, Clone, PartialEq)]
pub struct RowBlock {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl RowBlock {
    pub fn zeros(rows: usize, dim: usize) -> LaminaResult<RowBlock> {
        Ok(RowBlock {
            rows,
            dim,
            data: try_zeroed(rows * dim)?,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.dim + j]
    }

    pub fn set(&mut self, i: usize, j: usize, val: f32) {
        self.data[i * self.dim + j] = val;
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}
