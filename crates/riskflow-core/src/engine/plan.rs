//! Graph validation and execution ordering.
//!
//! Uses `petgraph` to model node edges as a directed graph. Topological sort
//! detects cycles; depth-based grouping yields waves, and the runner walks
//! the waves in order with declaration order breaking ties inside a wave.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use riskflow_types::workflow::{WorkflowGraph, WorkflowNode};

// ---------------------------------------------------------------------------
// GraphError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph '{0}' has no nodes")]
    EmptyGraph(String),

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("edge {from} -> {to} references unknown node '{missing}'")]
    UnknownEdgeEndpoint {
        from: String,
        to: String,
        missing: String,
    },

    #[error("cycle detected involving node '{0}'")]
    CycleDetected(String),
}

// ---------------------------------------------------------------------------
// Waves
// ---------------------------------------------------------------------------

/// Group nodes into dependency waves. Index 0 holds the nodes with no
/// predecessors; every node sits one wave after its deepest predecessor.
pub fn execution_waves(graph: &WorkflowGraph) -> Result<Vec<Vec<&WorkflowNode>>, GraphError> {
    if graph.nodes.is_empty() {
        return Err(GraphError::EmptyGraph(graph.id.clone()));
    }

    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(GraphError::DuplicateNode(node.id.clone()));
        }
    }

    let id_to_idx: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    // edge from predecessor -> successor
    let mut dag = DiGraph::<&str, ()>::new();
    let indices: Vec<_> = graph.nodes.iter().map(|n| dag.add_node(n.id.as_str())).collect();
    for edge in &graph.edges {
        let endpoint = |id: &str| {
            id_to_idx.get(id).copied().ok_or_else(|| GraphError::UnknownEdgeEndpoint {
                from: edge.from.clone(),
                to: edge.to.clone(),
                missing: id.to_string(),
            })
        };
        let from = endpoint(&edge.from)?;
        let to = endpoint(&edge.to)?;
        dag.add_edge(indices[from], indices[to], ());
    }

    let sorted = toposort(&dag, None)
        .map_err(|cycle| GraphError::CycleDetected(dag[cycle.node_id()].to_string()))?;

    // depth: roots are 0, others one past their deepest predecessor
    let mut depths: HashMap<&str, usize> = HashMap::new();
    for idx in sorted {
        let id = dag[idx];
        let depth = graph
            .predecessors(id)
            .iter()
            .map(|p| depths.get(p).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        depths.insert(id, depth);
    }

    let max_depth = depths.values().copied().max().unwrap_or(0);
    let mut waves: Vec<Vec<&WorkflowNode>> = vec![Vec::new(); max_depth + 1];
    for node in &graph.nodes {
        waves[depths[node.id.as_str()]].push(node);
    }
    Ok(waves)
}

/// Flattened sequential order: wave by wave, declaration order within a wave.
pub fn execution_order(graph: &WorkflowGraph) -> Result<Vec<&WorkflowNode>, GraphError> {
    Ok(execution_waves(graph)?.into_iter().flatten().collect())
}
