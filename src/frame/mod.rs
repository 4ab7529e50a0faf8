//! Defines the labeled, row-keyed data model the nodes consume.
pub mod label;
pub mod table;

pub use label::ColLabel;
pub use table::Table;
