//! A two-dimensional labeled table: rows keyed by a strictly increasing
//! time-like `i64`, columns keyed by [`ColLabel`]s of uniform depth.
//!
//! Storage is column-major `f64`, with `NaN` encoding missingness. Tables
//! are value types; every node operation works on its own copy and never
//! mutates an input in place.

use super::ColLabel;
use crate::error::{DataflowError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    index: Vec<i64>,
    columns: Vec<ColLabel>,
    // values[c].len() == index.len() for every column c.
    values: Vec<Vec<f64>>,
}

impl Table {
    /// Builds a table from a row-key index and `(label, values)` pairs.
    ///
    /// Fails with `InvalidConfig` if the index is not strictly increasing,
    /// a column length disagrees with the index, or column depths are not
    /// uniform; fails with `DuplicateColumn` on a repeated label.
    pub fn from_columns(
        index: Vec<i64>,
        columns: Vec<(ColLabel, Vec<f64>)>,
    ) -> Result<Self> {
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DataflowError::InvalidConfig(
                "row keys must be strictly increasing".to_string(),
            ));
        }
        let mut labels = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (label, vals) in columns {
            if vals.len() != index.len() {
                return Err(DataflowError::ShapeMismatch {
                    expected: format!("{} rows in column `{}`", index.len(), label),
                    actual: format!("{} rows", vals.len()),
                });
            }
            if labels.contains(&label) {
                return Err(DataflowError::DuplicateColumn { column: label });
            }
            labels.push(label);
            values.push(vals);
        }
        if let Some(first) = labels.first() {
            if labels.iter().any(|l| l.depth() != first.depth()) {
                return Err(DataflowError::InvalidConfig(
                    "column labels must have uniform depth".to_string(),
                ));
            }
        }
        Ok(Self { index, columns: labels, values })
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn columns(&self) -> &[ColLabel] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    /// Depth of the column hierarchy (0 for a table with no columns).
    pub fn column_depth(&self) -> usize {
        self.columns.first().map_or(0, ColLabel::depth)
    }

    pub fn contains_column(&self, label: &ColLabel) -> bool {
        self.columns.contains(label)
    }

    pub fn column(&self, label: &ColLabel) -> Option<&[f64]> {
        let pos = self.columns.iter().position(|c| c == label)?;
        Some(&self.values[pos])
    }

    /// Value at `(row key, column)`, if both exist.
    pub fn value_at(&self, key: i64, label: &ColLabel) -> Option<f64> {
        let row = self.row_position(key)?;
        self.column(label).map(|col| col[row])
    }

    fn row_position(&self, key: i64) -> Option<usize> {
        self.index.binary_search(&key).ok()
    }

    /// Restricts to the given columns, in the given order.
    ///
    /// Fails with `InvalidConfig` if a requested column is absent.
    pub fn select(&self, labels: &[ColLabel]) -> Result<Table> {
        let mut values = Vec::with_capacity(labels.len());
        for label in labels {
            match self.column(label) {
                Some(col) => values.push(col.to_vec()),
                None => {
                    return Err(DataflowError::InvalidConfig(format!(
                        "column `{label}` not present in table"
                    )))
                }
            }
        }
        Ok(Table {
            index: self.index.clone(),
            columns: labels.to_vec(),
            values,
        })
    }

    /// All column labels under the given group prefix, in table order.
    pub fn columns_with_prefix(&self, prefix: &ColLabel) -> Vec<ColLabel> {
        self.columns
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Restricts to the sub-hierarchy under `prefix`, stripping the prefix
    /// so the result has leaf labels.
    ///
    /// Fails with `InvalidConfig` if no column lives under the prefix.
    pub fn select_group(&self, prefix: &ColLabel) -> Result<Table> {
        let full = self.columns_with_prefix(prefix);
        if full.is_empty() {
            return Err(DataflowError::InvalidConfig(format!(
                "no columns found under group `{prefix}`"
            )));
        }
        let selected = self.select(&full)?;
        let leaves: Vec<ColLabel> = full
            .iter()
            .map(|c| c.strip_prefix(prefix).expect("prefix matched above"))
            .collect();
        Ok(Table {
            index: selected.index,
            columns: leaves,
            values: selected.values,
        })
    }

    /// Row keys at which none of the given columns is missing.
    pub fn non_nan_index(&self, labels: &[ColLabel]) -> Result<Vec<i64>> {
        let selected = self.select(labels)?;
        let keep = selected
            .index
            .iter()
            .enumerate()
            .filter(|&(row, _)| selected.values.iter().all(|col| !col[row].is_nan()))
            .map(|(_, &key)| key)
            .collect();
        Ok(keep)
    }

    /// Restricts to the rows whose keys appear in `keys` (keys absent from
    /// the table are ignored). The relative row order is preserved.
    pub fn take_rows(&self, keys: &[i64]) -> Table {
        let rows: Vec<usize> = keys.iter().filter_map(|&k| self.row_position(k)).collect();
        Table {
            index: rows.iter().map(|&r| self.index[r]).collect(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|col| rows.iter().map(|&r| col[r]).collect())
                .collect(),
        }
    }

    /// Reindexes onto `keys`: rows absent from the table become missing.
    pub fn reindex(&self, keys: &[i64]) -> Table {
        Table {
            index: keys.to_vec(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|col| {
                    keys.iter()
                        .map(|&k| self.row_position(k).map_or(f64::NAN, |r| col[r]))
                        .collect()
                })
                .collect(),
        }
    }

    /// Outer join on row key: the result covers the union of both key sets
    /// and carries all columns of both tables.
    ///
    /// Fails with `DuplicateColumn` on a label collision.
    pub fn outer_merge(&self, other: &Table) -> Result<Table> {
        if let Some(dup) = self.columns.iter().find(|c| other.contains_column(c)) {
            return Err(DataflowError::DuplicateColumn { column: dup.clone() });
        }
        let mut keys: Vec<i64> = self.index.iter().chain(other.index.iter()).copied().collect();
        keys.sort_unstable();
        keys.dedup();
        let left = self.reindex(&keys);
        let right = other.reindex(&keys);
        let columns = left
            .columns
            .into_iter()
            .zip(left.values)
            .chain(right.columns.into_iter().zip(right.values))
            .collect();
        Table::from_columns(keys, columns)
    }

    /// Prepends `prefix` to every column label, deepening the hierarchy.
    pub fn with_prefix(&self, prefix: &ColLabel) -> Table {
        Table {
            index: self.index.clone(),
            columns: self.columns.iter().map(|c| c.with_prefix(prefix)).collect(),
            values: self.values.clone(),
        }
    }

    /// Human-readable structural summary (shape, key range, per-column
    /// non-missing counts). Diagnostic only.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let range = match (self.index.first(), self.index.last()) {
            (Some(first), Some(last)) => format!("[{first}..{last}]"),
            _ => "[]".to_string(),
        };
        out.push_str(&format!(
            "rows: {} {}, cols: {}\n",
            self.num_rows(),
            range,
            self.num_cols()
        ));
        for (label, col) in self.columns.iter().zip(&self.values) {
            let non_nan = col.iter().filter(|v| !v.is_nan()).count();
            out.push_str(&format!("  {label}: {non_nan} non-null\n"));
        }
        out
    }

    /// Elementwise comparison within `tol`, treating missing values at the
    /// same position as equal. Index and column labels must match exactly.
    pub fn almost_equals(&self, other: &Table, tol: f64) -> bool {
        self.index == other.index
            && self.columns == other.columns
            && self.values.iter().zip(&other.values).all(|(a, b)| {
                a.iter()
                    .zip(b)
                    .all(|(x, y)| (x.is_nan() && y.is_nan()) || (x - y).abs() <= tol)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::from_columns(
            vec![1, 2, 3, 4],
            vec![
                (ColLabel::flat("a"), vec![1.0, 2.0, f64::NAN, 4.0]),
                (ColLabel::flat("b"), vec![0.5, f64::NAN, 1.5, 2.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_non_monotonic_index() {
        let err = Table::from_columns(
            vec![2, 1],
            vec![(ColLabel::flat("a"), vec![0.0, 0.0])],
        )
        .unwrap_err();
        assert!(matches!(err, DataflowError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let err = Table::from_columns(
            vec![1, 2],
            vec![
                (ColLabel::flat("a"), vec![0.0, 0.0]),
                (ColLabel::flat("a"), vec![1.0, 1.0]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, DataflowError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_non_nan_index() {
        let t = table();
        assert_eq!(t.non_nan_index(&[ColLabel::flat("a")]).unwrap(), vec![1, 2, 4]);
        assert_eq!(
            t.non_nan_index(&[ColLabel::flat("a"), ColLabel::flat("b")]).unwrap(),
            vec![1, 4]
        );
    }

    #[test]
    fn test_take_rows_then_reindex_restores_key_set() {
        let t = table();
        let sub = t.take_rows(&[1, 4]);
        assert_eq!(sub.index(), &[1, 4]);
        let back = sub.reindex(t.index());
        assert_eq!(back.index(), t.index());
        assert!(back.value_at(2, &ColLabel::flat("a")).unwrap().is_nan());
        assert_eq!(back.value_at(4, &ColLabel::flat("a")), Some(4.0));
    }

    #[test]
    fn test_outer_merge_disjoint_columns() {
        let left = Table::from_columns(
            vec![1, 2],
            vec![(ColLabel::flat("a"), vec![1.0, 2.0])],
        )
        .unwrap();
        let right = Table::from_columns(
            vec![2, 3],
            vec![(ColLabel::flat("b"), vec![5.0, 6.0])],
        )
        .unwrap();
        let merged = left.outer_merge(&right).unwrap();
        assert_eq!(merged.index(), &[1, 2, 3]);
        assert_eq!(merged.value_at(2, &ColLabel::flat("b")), Some(5.0));
        assert!(merged.value_at(3, &ColLabel::flat("a")).unwrap().is_nan());
    }

    #[test]
    fn test_outer_merge_rejects_collision() {
        let t = table();
        let err = t.outer_merge(&t).unwrap_err();
        assert!(matches!(err, DataflowError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_select_group_strips_prefix() {
        let t = Table::from_columns(
            vec![1, 2],
            vec![
                (ColLabel::new(["raw", "grp1", "x"]), vec![1.0, 2.0]),
                (ColLabel::new(["raw", "grp1", "y"]), vec![3.0, 4.0]),
                (ColLabel::new(["raw", "grp2", "x"]), vec![5.0, 6.0]),
            ],
        )
        .unwrap();
        let group = t.select_group(&ColLabel::new(["raw", "grp1"])).unwrap();
        assert_eq!(group.columns(), &[ColLabel::flat("x"), ColLabel::flat("y")]);
        assert_eq!(group.column_depth(), 1);
    }
}
