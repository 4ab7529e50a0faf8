//! A minimal DAG of fit/predict nodes.
//!
//! Wraps a petgraph `DiGraph`, keyed by caller-supplied string node ids and
//! iterated in insertion order. Topological execution is the driver's
//! concern; this container only guarantees acyclic structure and lookup.

use crate::error::{DataflowError, Result};
use crate::node::FitPredictNode;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Dag {
    graph: DiGraph<Box<dyn FitPredictNode>, ()>,
    // Insertion order of node ids; drives iteration and snapshot ordering.
    order: Vec<String>,
    ids: HashMap<String, NodeIndex>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn has_node(&self, nid: &str) -> bool {
        self.ids.contains_key(nid)
    }

    /// Registers a node under `nid`. Fails with `InvalidConfig` on a
    /// duplicate id.
    pub fn add_node(&mut self, nid: impl Into<String>, node: Box<dyn FitPredictNode>) -> Result<()> {
        let nid = nid.into();
        if self.ids.contains_key(&nid) {
            return Err(DataflowError::InvalidConfig(format!(
                "node id `{nid}` already registered"
            )));
        }
        let idx = self.graph.add_node(node);
        self.ids.insert(nid.clone(), idx);
        self.order.push(nid);
        Ok(())
    }

    /// Adds an edge from `src` to `dst`, rejecting unknown ids and edges
    /// that would introduce a cycle.
    pub fn connect(&mut self, src: &str, dst: &str) -> Result<()> {
        let src_idx = self.index_of(src)?;
        let dst_idx = self.index_of(dst)?;
        let edge = self.graph.add_edge(src_idx, dst_idx, ());
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(DataflowError::InvalidConfig(format!(
                "edge `{src}` -> `{dst}` would create a cycle"
            )));
        }
        Ok(())
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// `(nid, node)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn FitPredictNode)> {
        self.order.iter().map(move |nid| {
            let idx = self.ids[nid];
            (nid.as_str(), self.graph[idx].as_ref())
        })
    }

    pub fn get_node(&self, nid: &str) -> Result<&dyn FitPredictNode> {
        let idx = self.index_of(nid)?;
        Ok(self.graph[idx].as_ref())
    }

    pub fn get_node_mut(&mut self, nid: &str) -> Result<&mut dyn FitPredictNode> {
        let idx = self.index_of(nid)?;
        Ok(self.graph[idx].as_mut())
    }

    fn index_of(&self, nid: &str) -> Result<NodeIndex> {
        self.ids.get(nid).copied().ok_or_else(|| {
            DataflowError::InvalidConfig(format!("unknown node id `{nid}`"))
        })
    }
}
