//! Read-only queries over a built [`CodeGraph`].
//!
//! Every operation takes the graph, the engine configuration (for bounds
//! and rank tables), a typed parameter struct, and a [`CancelToken`].
//! Parameter structs deserialize straight from tool-call arguments; any
//! bound left unset falls back to its configured default, and any bound
//! outside its configured range is rejected.

mod context;
mod directories;
mod neighbors;
mod paths;
mod relatives;
mod subgraph;

pub use context::{
    call_context, graph_stats, node_details, CallContext, CallContextParams, ContextEntry,
    GraphStats, NodeDetail, NodeDetailsParams,
};
pub use directories::{
    list_directory_components, DirectoryComponent, DirectoryListing, DirectoryParams, ScoredNode,
};
pub use neighbors::{
    evaluate_neighbors, get_neighbors, GetNeighborsParams, NeighborEntry, NeighborGroup,
    NeighborScore, ScoringParams,
};
pub use paths::{find_paths, FoundPath, PathParams, PathsFromStart};
pub use relatives::{find_relatives, Evidence, Lineage, Relative, RelativeParams, RelativesOf};
pub use subgraph::{extract_subgraph, Subgraph, SubgraphEdge, SubgraphNode, SubgraphParams};

use crate::error::{GraphError, Result};
use crate::graph::CodeGraph;
use crate::types::{Category, EdgeType, GraphNode, NodeKind};
use serde::Serialize;
use std::collections::BTreeSet;

/// Flat view of a node as returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

impl NodeSnapshot {
    pub fn of(node: &GraphNode) -> Self {
        NodeSnapshot {
            id: node.id.clone(),
            label: node.label.clone(),
            kind: node.kind,
            category: node.category,
            file_path: node.file_path.clone(),
            start_line: node.start_line,
            end_line: node.end_line,
        }
    }
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// Which side of a node's edges to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    All,
}

impl Direction {
    pub fn parse(value: Option<&str>, default: Direction) -> Result<Self> {
        let Some(raw) = value else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "in" | "incoming" => Ok(Direction::In),
            "out" | "outgoing" => Ok(Direction::Out),
            "all" | "both" => Ok(Direction::All),
            other => Err(GraphError::invalid(format!(
                "unsupported direction '{other}', expected 'in', 'out' or 'all'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared argument handling
// ---------------------------------------------------------------------------

/// Parse edge type names. `None` or an empty list selects `default`; an
/// unknown name is an error rather than being ignored.
pub fn parse_edge_types(values: Option<&[String]>, default: &[EdgeType]) -> Result<BTreeSet<EdgeType>> {
    let names: Vec<&str> = values
        .unwrap_or_default()
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if names.is_empty() {
        return Ok(default.iter().copied().collect());
    }
    names
        .into_iter()
        .map(|name| {
            EdgeType::parse(name).ok_or_else(|| {
                GraphError::invalid(format!(
                    "unknown edge type '{name}', expected one of {}",
                    EdgeType::ALL.map(|t| t.label()).join(", ")
                ))
            })
        })
        .collect()
}

/// Trim ids, drop blanks and repeats, keep first-seen order. An empty
/// result, or more than `max` ids, is an error naming `field`.
pub fn clean_ids(values: &[String], field: &str, max: usize) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    let ids: Vec<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && seen.insert(*v))
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(GraphError::invalid(format!("{field} cannot be empty")));
    }
    if ids.len() > max {
        return Err(GraphError::invalid(format!("{field} accepts at most {max} ids, got {}", ids.len())));
    }
    Ok(ids)
}

/// Fail with `NotFound` on the first id absent from the graph.
pub fn require_all(graph: &CodeGraph, ids: &[String]) -> Result<()> {
    for id in ids {
        graph.require(id)?;
    }
    Ok(())
}

pub(crate) fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::graph::CodeGraph;
    use crate::types::{Category, Edge, EdgeType, GraphNode, NodeKind};

    pub fn node(id: &str, category: Category, file_path: Option<&str>) -> GraphNode {
        let mut n = GraphNode::external(id);
        n.id = id.to_string();
        n.label = id.to_string();
        n.kind = if file_path.is_some_and(|p| p == id) { NodeKind::File } else { NodeKind::Function };
        n.category = category;
        n.file_path = file_path.map(str::to_string);
        n
    }

    pub fn edge(source: &str, target: &str, edge_type: EdgeType, weight: f64) -> Edge {
        let mut e = Edge::new(source, target, edge_type);
        e.weight = weight;
        e.call_expression = if edge_type == EdgeType::Calls { target.to_string() } else { String::new() };
        e
    }

    /// Small graph of bare functions joined by CALLS edges of weight 1.
    pub fn chain(ids: &[&str], calls: &[(&str, &str)]) -> CodeGraph {
        let nodes = ids.iter().map(|id| node(id, Category::Implementation, None)).collect();
        let edges = calls.iter().map(|(s, t)| edge(s, t, EdgeType::Calls, 1.0)).collect();
        CodeGraph::from_parts(nodes, edges, Vec::new()).unwrap()
    }
}
