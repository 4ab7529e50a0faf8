//! The model capability interface consumed by fit/predict nodes, plus the
//! reference models shipped with the crate.
//!
//! A node owns exactly one [`Model`], built lazily on first fit from the
//! [`ModelFactory`] it was configured with. Whether a factory's models
//! support `inverse_transform` is advertised up front so nodes that need
//! the inverse can reject an unsuitable factory at construction time.
pub mod stats;

pub use stats::{PrincipalFactors, PrincipalFactorsSpec, Standardize, StandardizeSpec};

use crate::adapter::Matrix;
use crate::error::Result;
use indexmap::IndexMap;
use std::fmt;

/// Ordered mapping used for hyperparameters and diagnostics.
pub type ParamMap = IndexMap<String, serde_json::Value>;

/// A stateful fit/transform capability, exclusively owned by one node.
pub trait Model: fmt::Debug + Send {
    /// Learns parameters from the matrix, replacing any prior state.
    fn fit(&mut self, x: &Matrix) -> Result<()>;

    /// Applies the learned transform. Fails with `NotFitted` before `fit`.
    fn transform(&self, x: &Matrix) -> Result<Matrix>;

    /// Maps transformed rows back to the original column space. Optional
    /// capability; see [`ModelFactory::supports_inverse`].
    fn inverse_transform(&self, x: &Matrix) -> Result<Matrix>;

    /// The hyperparameters the model was constructed with.
    fn params(&self) -> ParamMap;

    /// Snapshot of learned internal attributes. Diagnostic only, never
    /// load-bearing, and must not fail.
    fn describe(&self) -> ParamMap;

    fn clone_box(&self) -> Box<dyn Model>;
}

impl Clone for Box<dyn Model> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Builds fresh model instances for a node.
pub trait ModelFactory: fmt::Debug + Send {
    fn build(&self) -> Box<dyn Model>;

    /// Whether models from this factory implement `inverse_transform`.
    fn supports_inverse(&self) -> bool;
}
