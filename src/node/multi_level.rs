//! Unsupervised transform over a multi-level column hierarchy.

use super::policy::{ensure_model, non_nan_subset, NanMode};
use super::{FitPredictNode, FitState, NodeCore, NodeInfo, Phase};
use crate::adapter::{from_matrix, to_matrix};
use crate::error::{DataflowError, Result};
use crate::frame::{ColLabel, Table};
use crate::model::ModelFactory;
use tracing::debug;

/// Fits an unsupervised model on the sub-hierarchy under `in_col_group` and
/// writes the transformed block under `out_col_group`, outer-joined with
/// the full original table.
///
/// The non-missing row subset is computed over the selected sub-hierarchy
/// only, not over the whole input table.
#[derive(Debug)]
pub struct MultiLevelTransformNode {
    factory: Box<dyn ModelFactory>,
    in_col_group: ColLabel,
    out_col_group: ColLabel,
    nan_mode: NanMode,
    core: NodeCore,
}

impl MultiLevelTransformNode {
    /// Fails with `InvalidConfig` if the input and output prefixes differ
    /// in depth: the column hierarchy depth must be preserved.
    pub fn new(
        factory: Box<dyn ModelFactory>,
        in_col_group: ColLabel,
        out_col_group: ColLabel,
        nan_mode: NanMode,
    ) -> Result<Self> {
        if in_col_group.depth() != out_col_group.depth() {
            return Err(DataflowError::InvalidConfig(format!(
                "column group depth mismatch: `{in_col_group}` is depth {} but `{out_col_group}` is depth {}",
                in_col_group.depth(),
                out_col_group.depth()
            )));
        }
        Ok(Self {
            factory,
            in_col_group,
            out_col_group,
            nan_mode,
            core: NodeCore::default(),
        })
    }

    fn run(&mut self, df_in: &Table, fit: bool) -> Result<Table> {
        if !fit && self.core.model.is_none() {
            return Err(DataflowError::NotFitted);
        }
        let df = df_in.clone();
        if df.column_depth() != self.in_col_group.depth() + 1 {
            return Err(DataflowError::InvalidConfig(format!(
                "column hierarchy depth {} incompatible with group `{}`",
                df.column_depth(),
                self.in_col_group
            )));
        }
        // No implicit overwrite of an existing group.
        if !df.columns_with_prefix(&self.out_col_group).is_empty() {
            return Err(DataflowError::InvalidConfig(format!(
                "output group `{}` already present in table",
                self.out_col_group
            )));
        }
        let group = df.select_group(&self.in_col_group)?;
        let leaf_vars = group.columns().to_vec();
        let non_nan_idx = non_nan_subset(&group, &leaf_vars, self.nan_mode)?;
        debug!(
            fit,
            group = %self.in_col_group,
            cols = leaf_vars.len(),
            rows = non_nan_idx.len(),
            "multi-level transform"
        );
        let x_fit = to_matrix(&group.take_rows(&non_nan_idx), &leaf_vars)?;
        let model = ensure_model(&mut self.core.model, self.factory.as_ref(), &x_fit, fit)?;
        let x_transform = model.transform(&x_fit)?;
        let out_cols: Vec<ColLabel> = (0..x_transform.ncols())
            .map(ColLabel::from_position)
            .collect();
        let x_hat = from_matrix(&non_nan_idx, &out_cols, &x_transform)?;
        let transformed = x_hat
            .reindex(df_in.index())
            .with_prefix(&self.out_col_group);
        let df_out = transformed.outer_merge(&df)?;
        let x_vars = df.columns_with_prefix(&self.in_col_group);
        let info = NodeInfo::record(model, x_vars, &df_out);
        self.core
            .set_info(if fit { Phase::Fit } else { Phase::Predict }, info);
        Ok(df_out)
    }
}

impl FitPredictNode for MultiLevelTransformNode {
    fn fit(&mut self, table: &Table) -> Result<Table> {
        self.run(table, true)
    }

    fn predict(&mut self, table: &Table) -> Result<Table> {
        self.run(table, false)
    }

    fn get_info(&self, phase: Phase) -> Result<&NodeInfo> {
        self.core.get_info(phase)
    }

    fn get_fit_state(&self) -> Result<FitState> {
        self.core.get_fit_state()
    }

    fn set_fit_state(&mut self, state: FitState) -> Result<()> {
        self.core.set_fit_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StandardizeSpec;

    fn table() -> Table {
        Table::from_columns(
            (1..=4).collect(),
            vec![
                (ColLabel::new(["raw", "grp1", "x"]), vec![1.0, 2.0, 3.0, 4.0]),
                (ColLabel::new(["raw", "grp1", "y"]), vec![4.0, 3.0, 2.0, 1.0]),
                (
                    ColLabel::new(["raw", "grp2", "x"]),
                    vec![9.0, f64::NAN, 7.0, 6.0],
                ),
            ],
        )
        .unwrap()
    }

    fn node(out_group: ColLabel) -> MultiLevelTransformNode {
        MultiLevelTransformNode::new(
            Box::new(StandardizeSpec),
            ColLabel::new(["raw", "grp1"]),
            out_group,
            NanMode::Raise,
        )
        .unwrap()
    }

    #[test]
    fn test_depth_mismatch_rejected_at_construction() {
        let err = MultiLevelTransformNode::new(
            Box::new(StandardizeSpec),
            ColLabel::new(["raw", "grp1"]),
            ColLabel::flat("feat"),
            NanMode::Raise,
        )
        .unwrap_err();
        assert!(matches!(err, DataflowError::InvalidConfig(_)));
    }

    #[test]
    fn test_transformed_block_tagged_and_merged() {
        let table = table();
        let mut node = node(ColLabel::new(["feat", "grp1"]));
        let out = node.fit(&table).unwrap();
        // Transformed block first, then all original columns.
        assert_eq!(
            out.columns(),
            &[
                ColLabel::new(["feat", "grp1", "0"]),
                ColLabel::new(["feat", "grp1", "1"]),
                ColLabel::new(["raw", "grp1", "x"]),
                ColLabel::new(["raw", "grp1", "y"]),
                ColLabel::new(["raw", "grp2", "x"]),
            ]
        );
        assert_eq!(out.index(), table.index());
        // Original values survive unchanged, including the NaN outside the
        // selected group.
        assert!(out
            .value_at(2, &ColLabel::new(["raw", "grp2", "x"]))
            .unwrap()
            .is_nan());
    }

    #[test]
    fn test_nan_outside_selected_group_does_not_shrink_input() {
        // grp2 has a NaN at row 2; grp1 (the selection) is complete, so
        // Raise must not trigger.
        let table = table();
        let mut node = node(ColLabel::new(["feat", "grp1"]));
        let out = node.fit(&table).unwrap();
        assert!(!out
            .value_at(2, &ColLabel::new(["feat", "grp1", "0"]))
            .unwrap()
            .is_nan());
    }

    #[test]
    fn test_existing_output_group_rejected() {
        let table = table();
        let mut node = node(ColLabel::new(["raw", "grp2"]));
        let err = node.fit(&table).unwrap_err();
        assert!(matches!(err, DataflowError::InvalidConfig(_)));
    }

    #[test]
    fn test_incompatible_table_depth_rejected() {
        let flat = Table::from_columns(
            vec![1, 2],
            vec![(ColLabel::flat("a"), vec![1.0, 2.0])],
        )
        .unwrap();
        let mut node = node(ColLabel::new(["feat", "grp1"]));
        let err = node.fit(&flat).unwrap_err();
        assert!(matches!(err, DataflowError::InvalidConfig(_)));
    }

    #[test]
    fn test_fit_predict_symmetry_and_state_round_trip() {
        let table = table();
        let mut fitted = node(ColLabel::new(["feat", "grp1"]));
        let fit_out = fitted.fit(&table).unwrap();
        let predict_out = fitted.predict(&table).unwrap();
        assert!(fit_out.almost_equals(&predict_out, 1e-12));

        let mut fresh = node(ColLabel::new(["feat", "grp1"]));
        fresh.set_fit_state(fitted.get_fit_state().unwrap()).unwrap();
        let restored_out = fresh.predict(&table).unwrap();
        assert!(restored_out.almost_equals(&predict_out, 0.0));
    }

    #[test]
    fn test_info_records_full_input_labels() {
        let table = table();
        let mut node = node(ColLabel::new(["feat", "grp1"]));
        node.fit(&table).unwrap();
        let info = node.get_info(Phase::Fit).unwrap();
        assert_eq!(
            info.model_x_vars,
            vec![
                ColLabel::new(["raw", "grp1", "x"]),
                ColLabel::new(["raw", "grp1", "y"]),
            ]
        );
    }
}
