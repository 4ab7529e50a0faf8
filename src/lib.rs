//! Node-based dataflow engine for quantitative time-series research.
//!
//! A pipeline is a DAG of fit/predict nodes, each wrapping a statistical
//! transform behind the [`model::Model`] capability. Nodes are trained once
//! on historical data, then applied causally to new data while preserving
//! learned state; [`state`] snapshots and restores that state across a
//! whole DAG without re-fitting.
//!
//! The crate is single-threaded and synchronous by design: the DAG driver
//! sequences calls, tables are treated as immutable inputs, and every
//! failure propagates eagerly to the caller.

pub mod adapter;
pub mod error;
pub mod frame;
pub mod graph;
pub mod model;
pub mod node;
pub mod state;

// Re-export key types for convenient access
pub use adapter::{from_matrix, to_matrix, Matrix};
pub use error::{DataflowError, Result};
pub use frame::{ColLabel, Table};
pub use graph::Dag;
pub use model::{Model, ModelFactory, ParamMap};
pub use node::policy::{ColMode, ColumnSelector, NanMode};
pub use node::{
    FitPredictNode, FitState, InverseTransformNode, MultiLevelTransformNode, NodeInfo, Phase,
    ResidualizerNode, UnsupervisedTransformNode,
};
pub use state::{extract_fit_state, extract_info, inject_fit_state};
