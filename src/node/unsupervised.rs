//! Single-group unsupervised transform node.

use super::policy::{
    apply_col_mode, ensure_model, non_nan_subset, ColMode, ColumnSelector, NanMode,
};
use super::{FitPredictNode, FitState, NodeCore, NodeInfo, Phase};
use crate::adapter::{from_matrix, to_matrix};
use crate::error::{DataflowError, Result};
use crate::frame::{ColLabel, Table};
use crate::model::ModelFactory;
use tracing::debug;

/// Fits an unsupervised model on the selected columns and replaces (or
/// merges) them with the transformed columns, named positionally.
#[derive(Debug)]
pub struct UnsupervisedTransformNode {
    factory: Box<dyn ModelFactory>,
    x_vars: ColumnSelector,
    col_mode: ColMode,
    nan_mode: NanMode,
    core: NodeCore,
}

impl UnsupervisedTransformNode {
    pub fn new(
        factory: Box<dyn ModelFactory>,
        x_vars: ColumnSelector,
        col_mode: ColMode,
        nan_mode: NanMode,
    ) -> Self {
        Self {
            factory,
            x_vars,
            col_mode,
            nan_mode,
            core: NodeCore::default(),
        }
    }

    /// Common flow for fit/predict; the model is (re)trained iff `fit`.
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
            "unsupervised transform"
        );
        let x_fit = to_matrix(&df.take_rows(&non_nan_idx), &x_vars)?;
        let model = ensure_model(&mut self.core.model, self.factory.as_ref(), &x_fit, fit)?;
        let x_transform = model.transform(&x_fit)?;
        let out_cols: Vec<ColLabel> = (0..x_transform.ncols())
            .map(ColLabel::from_position)
            .collect();
        let x_hat = from_matrix(&non_nan_idx, &out_cols, &x_transform)?;
        let df_out = x_hat.reindex(df_in.index());
        let df_out = apply_col_mode(&df, df_out, &x_vars, self.col_mode)?;
        let info = NodeInfo::record(model, x_vars, &df_out);
        self.core
            .set_info(if fit { Phase::Fit } else { Phase::Predict }, info);
        Ok(df_out)
    }
}

impl FitPredictNode for UnsupervisedTransformNode {
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
