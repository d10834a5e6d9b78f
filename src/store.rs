//! The external matrix store: plain-text CSV, one row per line.
//!
//! Two trailing conventions exist in the wild for this format, with and
//! without a delimiter after the last value of a row. The reader accepts
//! both; the writer always emits the canonical form: values separated by
//! commas, no trailing comma, newline after every row. Values are written in
//! Rust's shortest round-trip f32 form, so reading a written file reproduces
//! the matrix bit-exactly.

use crate::error::{LaminaError, LaminaResult};
use crate::matrix::Matrix;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Read an NxN matrix from a CSV file.
pub fn read_matrix(path: &Path, dim: usize) -> LaminaResult<Matrix> {
    let file = File::open(path).map_err(|source| LaminaError::Io {
        path: path.to_owned(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut matrix = Matrix::zeros(dim)?;
    let mut rows = 0;
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| LaminaError::Io {
            path: path.to_owned(),
            source,
        })?;
        if i >= dim {
            if line.trim().is_empty() {
                continue;
            }
            return Err(format_err(path, format!("expected {} rows, found more", dim)));
        }
        let mut cols = 0;
        for field in line.split(',') {
            let field = field.trim();
            if field.is_empty() {
                // trailing-comma variant of the format
                continue;
            }
            if cols >= dim {
                return Err(format_err(
                    path,
                    format!("row {}: expected {} values, found more", i + 1, dim),
                ));
            }
            let val: f32 = field.parse().map_err(|_| {
                format_err(path, format!("row {}: invalid value {:?}", i + 1, field))
            })?;
            matrix.set(i, cols, val);
            cols += 1;
        }
        if cols != dim {
            return Err(format_err(
                path,
                format!("row {}: expected {} values, found {}", i + 1, dim, cols),
            ));
        }
        rows += 1;
    }
    if rows != dim {
        return Err(format_err(
            path,
            format!("expected {} rows, found {}", dim, rows),
        ));
    }
    Ok(matrix)
}

/// Write an NxN matrix to a CSV file in the canonical form.
pub fn write_matrix(path: &Path, matrix: &Matrix) -> LaminaResult<()> {
    let file = File::create(path).map_err(|source| LaminaError::Io {
        path: path.to_owned(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    let io_err = |source| LaminaError::Io {
        path: path.to_owned(),
        source,
    };
    for i in 0..matrix.dim() {
        let row = matrix.row(i);
        for (j, val) in row.iter().enumerate() {
            if j > 0 {
                write!(writer, ",").map_err(io_err)?;
            }
            write!(writer, "{}", val).map_err(io_err)?;
        }
        writeln!(writer).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;
    Ok(())
}

fn format_err(path: &Path, reason: String) -> LaminaError {
    LaminaError::Format {
        path: path.to_owned(),
        reason,
    }
}
