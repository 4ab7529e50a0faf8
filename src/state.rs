//! DAG-wide snapshot and restore of learned node state.
//!
//! Extraction and injection walk every node of the DAG in insertion order.
//! Injection validates the whole request up front (key-set equality, every
//! snapshot backed by an actual fit) and only then mutates nodes, so a
//! failed restore never leaves the DAG half-applied.

use crate::error::{DataflowError, Result};
use crate::graph::Dag;
use crate::node::{FitState, NodeInfo, Phase};
use indexmap::IndexMap;
use tracing::debug;

/// Collects the per-node, per-phase diagnostic info recorded so far.
///
/// Best-effort by contract: phases a node never ran are simply absent,
/// never an error.
pub fn extract_info(dag: &Dag, phases: &[Phase]) -> IndexMap<String, IndexMap<Phase, NodeInfo>> {
    let mut info = IndexMap::new();
    for (nid, node) in dag.iter() {
        let mut node_info = IndexMap::new();
        for &phase in phases {
            if let Ok(phase_info) = node.get_info(phase) {
                node_info.insert(phase, phase_info.clone());
            }
        }
        info.insert(nid.to_string(), node_info);
    }
    info
}

/// Snapshots the learned state of every node, keyed by node id in DAG
/// iteration order.
///
/// Fails with `KeyMissing` if any node has not been fitted.
pub fn extract_fit_state(dag: &Dag) -> Result<IndexMap<String, FitState>> {
    let mut fit_state = IndexMap::new();
    for (nid, node) in dag.iter() {
        let node_state = node.get_fit_state()?;
        fit_state.insert(nid.to_string(), node_state);
    }
    debug!(nodes = fit_state.len(), "extracted DAG fit state");
    Ok(fit_state)
}

/// Restores previously learned state into every node of the DAG.
///
/// The mapping's key set must equal the DAG's node-id set exactly, else
/// fails with `NodeSetMismatch`; every snapshot must carry fit-phase info,
/// else fails with `KeyMissing`. Both checks run before any node is
/// touched.
pub fn inject_fit_state(dag: &mut Dag, mut fit_state: IndexMap<String, FitState>) -> Result<()> {
    let missing: Vec<String> = dag
        .node_ids()
        .filter(|nid| !fit_state.contains_key(*nid))
        .map(str::to_string)
        .collect();
    let unexpected: Vec<String> = fit_state
        .keys()
        .filter(|nid| !dag.has_node(nid))
        .cloned()
        .collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(DataflowError::NodeSetMismatch { missing, unexpected });
    }
    if fit_state.values().any(|state| state.fit_info().is_none()) {
        return Err(DataflowError::KeyMissing { phase: Phase::Fit });
    }
    let nids: Vec<String> = dag.node_ids().map(str::to_string).collect();
    for nid in nids {
        let node_state = fit_state.shift_remove(&nid).expect("key set validated");
        dag.get_node_mut(&nid)?.set_fit_state(node_state)?;
    }
    debug!("injected DAG fit state");
    Ok(())
}
