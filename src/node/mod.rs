//! The fit/predict node contract shared by every concrete node.
//!
//! Every node funnels `fit` and `predict` into one shared helper gated by a
//! `fit: bool` flag, so the two phases apply identical shaping logic; the
//! only divergence is whether the owned model is (re)trained. Nodes never
//! mutate the tables they receive.
pub mod policy;

mod inverse;
mod multi_level;
mod residualize;
mod unsupervised;

pub use inverse::InverseTransformNode;
pub use multi_level::MultiLevelTransformNode;
pub use residualize::ResidualizerNode;
pub use unsupervised::UnsupervisedTransformNode;

use crate::error::{DataflowError, Result};
use crate::frame::{ColLabel, Table};
use crate::model::{Model, ParamMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two phases a node can run in. Info records are keyed by phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Fit,
    Predict,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Fit => write!(f, "fit"),
            Phase::Predict => write!(f, "predict"),
        }
    }
}

/// Per-invocation diagnostic record. Recreated on every `fit`/`predict`
/// call and retained on the node keyed by phase.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    /// Columns used as model input.
    pub model_x_vars: Vec<ColLabel>,
    /// Hyperparameters of the owned model.
    pub model_params: ParamMap,
    /// Snapshot of the model's learned attributes. Diagnostic only; never
    /// consulted when restoring state.
    pub model_attributes: ParamMap,
    /// Textual summary of the output table's shape and structure.
    pub output_summary: String,
}

impl NodeInfo {
    pub(crate) fn record(model: &dyn Model, x_vars: Vec<ColLabel>, df_out: &Table) -> Self {
        Self {
            model_x_vars: x_vars,
            model_params: model.params(),
            model_attributes: model.describe(),
            output_summary: df_out.summary(),
        }
    }
}

/// The minimal state needed to resume a node without retraining: the owned
/// model plus the most recent fit-phase info.
///
/// `set_fit_state(get_fit_state())` leaves a node behaviorally identical
/// for subsequent `predict` calls.
#[derive(Debug, Clone)]
pub struct FitState {
    model: Box<dyn Model>,
    fit_info: Option<NodeInfo>,
}

impl FitState {
    pub fn new(model: Box<dyn Model>, fit_info: NodeInfo) -> Self {
        Self { model, fit_info: Some(fit_info) }
    }

    /// A snapshot carrying a model but no fit-phase info. Rejected by
    /// `set_fit_state`, which requires evidence of an actual prior fit.
    pub fn from_model(model: Box<dyn Model>) -> Self {
        Self { model, fit_info: None }
    }

    pub fn fit_info(&self) -> Option<&NodeInfo> {
        self.fit_info.as_ref()
    }

    /// Splits into model and fit info, validating that the snapshot carries
    /// info from an actual prior fit.
    pub(crate) fn into_parts(self) -> Result<(Box<dyn Model>, NodeInfo)> {
        match self.fit_info {
            Some(info) => Ok((self.model, info)),
            None => Err(DataflowError::KeyMissing { phase: Phase::Fit }),
        }
    }
}

/// The node interface exposed to the DAG driver and the state-snapshot
/// component.
pub trait FitPredictNode: fmt::Debug + Send {
    /// Trains the owned model on `table` and returns the transformed table.
    /// Re-fitting is allowed and simply retrains.
    fn fit(&mut self, table: &Table) -> Result<Table>;

    /// Applies the fitted model to `table`. Fails with `NotFitted` if no
    /// successful `fit` has run.
    fn predict(&mut self, table: &Table) -> Result<Table>;

    /// The info recorded by the most recent call in `phase`. Fails with
    /// `KeyMissing` if that phase never ran.
    fn get_info(&self, phase: Phase) -> Result<&NodeInfo>;

    /// Snapshots the learned state. Fails with `KeyMissing` before `fit`.
    fn get_fit_state(&self) -> Result<FitState>;

    /// Restores previously learned state, skipping retraining.
    fn set_fit_state(&mut self, state: FitState) -> Result<()>;
}

/// Owned model slot plus phase-keyed info storage, embedded by every node.
///
/// Centralizes the state-lifecycle plumbing so the concrete nodes only
/// differ in their shaping logic.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeCore {
    pub(crate) model: Option<Box<dyn Model>>,
    fit_info: Option<NodeInfo>,
    predict_info: Option<NodeInfo>,
}

impl NodeCore {
    pub(crate) fn get_info(&self, phase: Phase) -> Result<&NodeInfo> {
        let slot = match phase {
            Phase::Fit => &self.fit_info,
            Phase::Predict => &self.predict_info,
        };
        slot.as_ref().ok_or(DataflowError::KeyMissing { phase })
    }

    pub(crate) fn set_info(&mut self, phase: Phase, info: NodeInfo) {
        match phase {
            Phase::Fit => self.fit_info = Some(info),
            Phase::Predict => self.predict_info = Some(info),
        }
    }

    pub(crate) fn get_fit_state(&self) -> Result<FitState> {
        let missing = DataflowError::KeyMissing { phase: Phase::Fit };
        let model = self.model.as_ref().ok_or(missing.clone())?;
        let fit_info = self.fit_info.as_ref().ok_or(missing)?;
        Ok(FitState::new(model.clone(), fit_info.clone()))
    }

    pub(crate) fn set_fit_state(&mut self, state: FitState) -> Result<()> {
        let (model, fit_info) = state.into_parts()?;
        self.model = Some(model);
        self.fit_info = Some(fit_info);
        Ok(())
    }
}
