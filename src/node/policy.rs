//! Composable policy pieces shared across node types: column selection,
//! NaN handling, and column-merge behavior.
//!
//! These are free-standing so each node composes exactly the policies it
//! supports, rather than inheriting them wholesale.

use crate::adapter::Matrix;
use crate::error::{DataflowError, Result};
use crate::frame::{ColLabel, Table};
use crate::model::{Model, ModelFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How transformed columns are combined with the node's input columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColMode {
    /// Output contains only the transformed columns.
    #[default]
    ReplaceAll,
    /// Transformed columns merged (by row key) with all columns of the
    /// original input table.
    MergeAll,
}

impl FromStr for ColMode {
    type Err = DataflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "replace_all" => Ok(ColMode::ReplaceAll),
            "merge_all" => Ok(ColMode::MergeAll),
            other => Err(DataflowError::InvalidConfig(format!(
                "unrecognized col_mode `{other}`"
            ))),
        }
    }
}

/// How missing values among the selected input columns are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NanMode {
    /// Fail if any selected row has a missing value.
    #[default]
    Raise,
    /// Restrict computation to the non-missing rows; the output is
    /// reindexed back onto the full input row-key set.
    Drop,
}

impl FromStr for NanMode {
    type Err = DataflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raise" => Ok(NanMode::Raise),
            "drop" => Ok(NanMode::Drop),
            other => Err(DataflowError::InvalidConfig(format!(
                "unrecognized nan_mode `{other}`"
            ))),
        }
    }
}

/// Selects the columns a node models on.
#[derive(Clone, Default)]
pub enum ColumnSelector {
    /// Use all columns of the input table.
    #[default]
    All,
    /// An explicit column list.
    Fixed(Vec<ColLabel>),
    /// A callable producing the list at resolution time.
    Dynamic(Arc<dyn Fn() -> Vec<ColLabel> + Send + Sync>),
}

impl ColumnSelector {
    pub fn fixed<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<ColLabel>,
    {
        Self::Fixed(labels.into_iter().map(Into::into).collect())
    }

    /// Resolves against a table, validating that every selected column
    /// exists and that the selection is non-empty.
    pub fn resolve(&self, table: &Table) -> Result<Vec<ColLabel>> {
        let cols = match self {
            ColumnSelector::All => table.columns().to_vec(),
            ColumnSelector::Fixed(cols) => cols.clone(),
            ColumnSelector::Dynamic(f) => f(),
        };
        if cols.is_empty() {
            return Err(DataflowError::InvalidConfig(
                "column selection resolved to no columns".to_string(),
            ));
        }
        for col in &cols {
            if !table.contains_column(col) {
                return Err(DataflowError::InvalidConfig(format!(
                    "selected column `{col}` not present in table"
                )));
            }
        }
        Ok(cols)
    }
}

impl fmt::Debug for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSelector::All => write!(f, "All"),
            ColumnSelector::Fixed(cols) => f.debug_tuple("Fixed").field(cols).finish(),
            ColumnSelector::Dynamic(_) => write!(f, "Dynamic(..)"),
        }
    }
}

/// Applies the NaN policy given the full row-key set and the non-missing
/// subset. `Raise` reports exactly the offending row keys.
pub(crate) fn handle_nans(mode: NanMode, full: &[i64], keep: &[i64]) -> Result<()> {
    match mode {
        NanMode::Raise => {
            if keep.len() == full.len() {
                return Ok(());
            }
            // Both slices are sorted; walk them in lockstep.
            let mut rows = Vec::with_capacity(full.len() - keep.len());
            let mut kept = keep.iter().peekable();
            for &key in full {
                if kept.peek() == Some(&&key) {
                    kept.next();
                } else {
                    rows.push(key);
                }
            }
            Err(DataflowError::NaNDetected { rows })
        }
        NanMode::Drop => Ok(()),
    }
}

/// Resolves the non-missing row subset over `cols` and applies the NaN
/// policy. An empty subset is always an error: there is nothing to model.
pub(crate) fn non_nan_subset(df: &Table, cols: &[ColLabel], mode: NanMode) -> Result<Vec<i64>> {
    let keep = df.non_nan_index(cols)?;
    handle_nans(mode, df.index(), &keep)?;
    if keep.is_empty() {
        return Err(DataflowError::NaNDetected {
            rows: df.index().to_vec(),
        });
    }
    Ok(keep)
}

/// Combines the transformed output with the input table per `col_mode`.
///
/// Under `MergeAll`, a transformed column may shadow a *selected* input
/// column (the transformed version wins); a collision with any other input
/// column fails with `DuplicateColumn`.
pub(crate) fn apply_col_mode(
    df_in: &Table,
    df_out: Table,
    selected: &[ColLabel],
    mode: ColMode,
) -> Result<Table> {
    match mode {
        ColMode::ReplaceAll => Ok(df_out),
        ColMode::MergeAll => {
            let mut keep = Vec::with_capacity(df_in.num_cols());
            for col in df_in.columns() {
                if df_out.contains_column(col) {
                    if selected.contains(col) {
                        continue;
                    }
                    return Err(DataflowError::DuplicateColumn { column: col.clone() });
                }
                keep.push(col.clone());
            }
            df_in.select(&keep)?.outer_merge(&df_out)
        }
    }
}

/// Trains a fresh model from `factory` when `fit` is set, then hands back
/// the owned model; fails with `NotFitted` when predicting before any fit.
pub(crate) fn ensure_model<'a>(
    slot: &'a mut Option<Box<dyn Model>>,
    factory: &dyn ModelFactory,
    x: &Matrix,
    fit: bool,
) -> Result<&'a dyn Model> {
    if fit {
        let mut model = factory.build();
        model.fit(x)?;
        *slot = Some(model);
    }
    match slot {
        Some(model) => Ok(&**model),
        None => Err(DataflowError::NotFitted),
    }
}
