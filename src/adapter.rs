//! Adapter between the labeled table model and the flat numeric-matrix
//! model the model routines consume.
//!
//! `from_matrix(to_matrix(t, cols), ...)` round-trips labels and row keys
//! exactly; missingness handling happens upstream, in the nodes' NaN
//! policy, never here.

use crate::error::{DataflowError, Result};
use crate::frame::{ColLabel, Table};
use serde::{Deserialize, Serialize};

/// Dense row-major `f64` matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self { nrows, ncols, data: vec![0.0; nrows * ncols] }
    }

    pub fn from_rows(nrows: usize, ncols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != nrows * ncols {
            return Err(DataflowError::ShapeMismatch {
                expected: format!("{} values ({nrows}x{ncols})", nrows * ncols),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self { nrows, ncols, data })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.ncols + col]
    }

    #[inline(always)]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.ncols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.ncols..(row + 1) * self.ncols]
    }

    pub fn column_iter(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.nrows).map(move |r| self.get(r, col))
    }

    /// Elementwise difference; shapes must agree.
    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        if self.nrows != other.nrows || self.ncols != other.ncols {
            return Err(DataflowError::ShapeMismatch {
                expected: format!("{}x{}", self.nrows, self.ncols),
                actual: format!("{}x{}", other.nrows, other.ncols),
            });
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a - b)
            .collect();
        Ok(Matrix { nrows: self.nrows, ncols: self.ncols, data })
    }
}

/// Converts the given columns of `table` into a matrix, one table row per
/// matrix row, columns in the order given.
pub fn to_matrix(table: &Table, columns: &[ColLabel]) -> Result<Matrix> {
    let selected = table.select(columns)?;
    let nrows = selected.num_rows();
    let ncols = columns.len();
    let mut m = Matrix::zeros(nrows, ncols);
    for (c, label) in columns.iter().enumerate() {
        let col = selected.column(label).expect("selected above");
        for (r, &v) in col.iter().enumerate() {
            m.set(r, c, v);
        }
    }
    Ok(m)
}

/// Converts a matrix back into a table, labeling rows with `index` and
/// columns with `columns`.
pub fn from_matrix(index: &[i64], columns: &[ColLabel], matrix: &Matrix) -> Result<Table> {
    if matrix.nrows() != index.len() || matrix.ncols() != columns.len() {
        return Err(DataflowError::ShapeMismatch {
            expected: format!("{}x{}", index.len(), columns.len()),
            actual: format!("{}x{}", matrix.nrows(), matrix.ncols()),
        });
    }
    let cols = columns
        .iter()
        .enumerate()
        .map(|(c, label)| (label.clone(), matrix.column_iter(c).collect()))
        .collect();
    Table::from_columns(index.to_vec(), cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cols = vec![ColLabel::flat("a"), ColLabel::flat("b")];
        let table = Table::from_columns(
            vec![10, 20, 30],
            vec![
                (cols[0].clone(), vec![1.0, 2.0, 3.0]),
                (cols[1].clone(), vec![4.0, 5.0, 6.0]),
            ],
        )
        .unwrap();
        let m = to_matrix(&table, &cols).unwrap();
        assert_eq!(m.row(1), &[2.0, 5.0]);
        let back = from_matrix(table.index(), &cols, &m).unwrap();
        assert!(back.almost_equals(&table, 0.0));
    }

    #[test]
    fn test_from_matrix_rejects_shape_mismatch() {
        let m = Matrix::zeros(2, 2);
        let err = from_matrix(&[1, 2, 3], &[ColLabel::flat("a"), ColLabel::flat("b")], &m)
            .unwrap_err();
        assert!(matches!(err, DataflowError::ShapeMismatch { .. }));
    }
}
