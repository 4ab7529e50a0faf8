//! Inverse-transform applier node: learns a model on one column group and
//! applies the learned inverse transform to a different, disjoint group.

use super::policy::{
    apply_col_mode, ensure_model, non_nan_subset, ColMode, NanMode,
};
use super::{FitPredictNode, FitState, NodeCore, NodeInfo, Phase};
use crate::adapter::{from_matrix, to_matrix};
use crate::error::{DataflowError, Result};
use crate::frame::{ColLabel, Table};
use crate::model::ModelFactory;
use tracing::debug;

/// Projects a factor structure learned on `x_vars` onto `trans_x_vars`,
/// which must share the model's latent representation. The output carries
/// the `x_vars` labels (the inverse transform lands in their column space).
#[derive(Debug)]
pub struct InverseTransformNode {
    factory: Box<dyn ModelFactory>,
    x_vars: Vec<ColLabel>,
    trans_x_vars: Vec<ColLabel>,
    col_mode: ColMode,
    nan_mode: NanMode,
    core: NodeCore,
}

impl InverseTransformNode {
    /// Fails with `InvalidConfig` if the factory has no inverse capability
    /// or the two column groups overlap.
    pub fn new(
        factory: Box<dyn ModelFactory>,
        x_vars: Vec<ColLabel>,
        trans_x_vars: Vec<ColLabel>,
        col_mode: ColMode,
        nan_mode: NanMode,
    ) -> Result<Self> {
        if !factory.supports_inverse() {
            return Err(DataflowError::InvalidConfig(
                "inverse transform requires a model with inverse_transform".to_string(),
            ));
        }
        if let Some(shared) = x_vars.iter().find(|c| trans_x_vars.contains(c)) {
            return Err(DataflowError::InvalidConfig(format!(
                "x_vars and trans_x_vars must be disjoint; both contain `{shared}`"
            )));
        }
        Ok(Self {
            factory,
            x_vars,
            trans_x_vars,
            col_mode,
            nan_mode,
            core: NodeCore::default(),
        })
    }

    fn run(&mut self, df_in: &Table, fit: bool) -> Result<Table> {
        if !fit && self.core.model.is_none() {
            return Err(DataflowError::NotFitted);
        }
        let df = df_in.clone();
        // Train (or reuse) the model on x_vars; no forward-transform output
        // is materialized.
        let non_nan_idx = non_nan_subset(&df, &self.x_vars, self.nan_mode)?;
        let x_fit = to_matrix(&df.take_rows(&non_nan_idx), &self.x_vars)?;
        let model = ensure_model(&mut self.core.model, self.factory.as_ref(), &x_fit, fit)?;
        // Independently resolve the rows the inverse transform applies to.
        let trans_non_nan_idx = non_nan_subset(&df, &self.trans_x_vars, self.nan_mode)?;
        debug!(
            fit,
            fit_rows = non_nan_idx.len(),
            trans_rows = trans_non_nan_idx.len(),
            "applying learned inverse transform"
        );
        let trans_x = to_matrix(&df.take_rows(&trans_non_nan_idx), &self.trans_x_vars)?;
        let inverted = model.inverse_transform(&trans_x)?;
        let out = from_matrix(&trans_non_nan_idx, &self.x_vars, &inverted)?;
        let df_out = out.reindex(df_in.index());
        let df_out = apply_col_mode(&df, df_out, &self.trans_x_vars, self.col_mode)?;
        let info = NodeInfo::record(model, self.x_vars.clone(), &df_out);
        self.core
            .set_info(if fit { Phase::Fit } else { Phase::Predict }, info);
        Ok(df_out)
    }
}

impl FitPredictNode for InverseTransformNode {
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
