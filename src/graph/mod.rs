//! Defines the DAG container the state-snapshot component walks.
pub mod dag;

pub use dag::Dag;
