//! Residualizer node: strips a learned low-dimensional structure from the
//! selected columns while keeping their names.

use super::policy::{ensure_model, non_nan_subset, ColumnSelector, NanMode};
use super::{FitPredictNode, FitState, NodeCore, NodeInfo, Phase};
use crate::adapter::{from_matrix, to_matrix};
use crate::error::{DataflowError, Result};
use crate::frame::Table;
use crate::model::ModelFactory;
use tracing::debug;

/// Outputs `original - reconstruction`, where the reconstruction is the
/// model's inverse transform of its own forward transform. The output
/// always replaces the selected columns under their original names; there
/// is no column-merge policy.
#[derive(Debug)]
pub struct ResidualizerNode {
    factory: Box<dyn ModelFactory>,
    x_vars: ColumnSelector,
    nan_mode: NanMode,
    core: NodeCore,
}

impl ResidualizerNode {
    /// Fails with `InvalidConfig` if the factory's models do not support
    /// `inverse_transform`.
    pub fn new(
        factory: Box<dyn ModelFactory>,
        x_vars: ColumnSelector,
        nan_mode: NanMode,
    ) -> Result<Self> {
        if !factory.supports_inverse() {
            return Err(DataflowError::InvalidConfig(
                "residualization requires a model with inverse_transform".to_string(),
            ));
        }
        Ok(Self {
            factory,
            x_vars,
            nan_mode,
            core: NodeCore::default(),
        })
    }

    fn run(&mut self, df_in: &Table, fit: bool) -> Result<Table> {
        if !fit && self.core.model.is_none() {
            return Err(DataflowError::NotFitted);
        }
        let df = df_in.clone();
        let x_vars = self.x_vars.resolve(&df)?;
        let non_nan_idx = non_nan_subset(&df, &x_vars, self.nan_mode)?;
        debug!(
            fit,
            x_vars = x_vars.len(),
            rows = non_nan_idx.len(),
            "residualizing"
        );
        let x_fit = to_matrix(&df.take_rows(&non_nan_idx), &x_vars)?;
        let model = ensure_model(&mut self.core.model, self.factory.as_ref(), &x_fit, fit)?;
        let x_transform = model.transform(&x_fit)?;
        let x_hat = model.inverse_transform(&x_transform)?;
        let residual = x_fit.sub(&x_hat)?;
        let out = from_matrix(&non_nan_idx, &x_vars, &residual)?;
        let df_out = out.reindex(df_in.index());
        let info = NodeInfo::record(model, x_vars, &df_out);
        self.core
            .set_info(if fit { Phase::Fit } else { Phase::Predict }, info);
        Ok(df_out)
    }
}

impl FitPredictNode for ResidualizerNode {
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
    use crate::frame::ColLabel;
    use crate::model::{Model, PrincipalFactorsSpec, StandardizeSpec};

    fn flat(name: &str) -> ColLabel {
        ColLabel::flat(name)
    }

    /// Advertises no inverse capability; used to exercise the
    /// construction-time check.
    #[derive(Debug)]
    struct ForwardOnlySpec;

    impl ModelFactory for ForwardOnlySpec {
        fn build(&self) -> Box<dyn Model> {
            StandardizeSpec.build()
        }

        fn supports_inverse(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_forward_only_model_rejected_at_construction() {
        let err = ResidualizerNode::new(
            Box::new(ForwardOnlySpec),
            ColumnSelector::All,
            NanMode::Raise,
        )
        .unwrap_err();
        assert!(matches!(err, DataflowError::InvalidConfig(_)));
    }

    #[test]
    fn test_residual_keeps_original_column_names() {
        let table = Table::from_columns(
            (1..=5).collect(),
            vec![
                (flat("a"), vec![1.0, 2.0, 3.0, 4.0, 5.0]),
                (flat("b"), vec![1.5, 2.5, 2.0, 4.5, 4.0]),
            ],
        )
        .unwrap();
        let mut node = ResidualizerNode::new(
            Box::new(PrincipalFactorsSpec::default()),
            ColumnSelector::fixed(["a", "b"]),
            NanMode::Raise,
        )
        .unwrap();
        let out = node.fit(&table).unwrap();
        assert_eq!(out.columns(), table.columns());
        assert_eq!(out.index(), table.index());
    }

    #[test]
    fn test_rank_one_data_residualizes_to_zero() {
        // Both columns are multiples of the same series; one principal
        // factor reconstructs them exactly, so the residual vanishes.
        let base = [1.0, -2.0, 3.0, 0.5, -1.5];
        let table = Table::from_columns(
            (1..=5).collect(),
            vec![
                (flat("a"), base.to_vec()),
                (flat("b"), base.iter().map(|v| v * 3.0).collect()),
            ],
        )
        .unwrap();
        let mut node = ResidualizerNode::new(
            Box::new(PrincipalFactorsSpec::default()),
            ColumnSelector::All,
            NanMode::Raise,
        )
        .unwrap();
        let out = node.fit(&table).unwrap();
        for key in 1..=5i64 {
            for col in ["a", "b"] {
                assert!(out.value_at(key, &flat(col)).unwrap().abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_nan_drop_restricts_then_reindexes() {
        let table = Table::from_columns(
            (1..=5).collect(),
            vec![
                (flat("a"), vec![1.0, f64::NAN, 3.0, 4.0, 5.0]),
                (flat("b"), vec![2.0, 4.0, 6.0, 8.0, 10.0]),
            ],
        )
        .unwrap();
        let mut node = ResidualizerNode::new(
            Box::new(PrincipalFactorsSpec::default()),
            ColumnSelector::All,
            NanMode::Drop,
        )
        .unwrap();
        let out = node.fit(&table).unwrap();
        assert_eq!(out.index(), table.index());
        assert!(out.value_at(2, &flat("a")).unwrap().is_nan());
        assert!(!out.value_at(3, &flat("a")).unwrap().is_nan());
    }

    #[test]
    fn test_state_round_trip() {
        let table = Table::from_columns(
            (1..=5).collect(),
            vec![
                (flat("a"), vec![1.0, 2.0, 3.0, 4.0, 5.0]),
                (flat("b"), vec![0.9, 2.2, 2.8, 4.1, 5.3]),
            ],
        )
        .unwrap();
        let mut fitted = ResidualizerNode::new(
            Box::new(PrincipalFactorsSpec::default()),
            ColumnSelector::All,
            NanMode::Raise,
        )
        .unwrap();
        fitted.fit(&table).unwrap();
        let expected = fitted.predict(&table).unwrap();

        let mut fresh = ResidualizerNode::new(
            Box::new(PrincipalFactorsSpec::default()),
            ColumnSelector::All,
            NanMode::Raise,
        )
        .unwrap();
        fresh.set_fit_state(fitted.get_fit_state().unwrap()).unwrap();
        assert!(fresh.predict(&table).unwrap().almost_equals(&expected, 0.0));
    }
}
