//! Per-node context: callers and callees, node details with degree
//! breakdowns, and whole-graph statistics.

use super::{clean_ids, require_all, round6, NodeSnapshot};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::graph::CodeGraph;
use crate::types::{Category, Edge, EdgeType, GraphNode, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Call context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallContextParams {
    #[serde(alias = "node_id")]
    pub node: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    #[serde(flatten)]
    pub node: NodeSnapshot,
    pub weight: f64,
    /// File members that carry the call, when a file's context is aggregated.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub via: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallContext {
    #[serde(flatten)]
    pub node: NodeSnapshot,
    pub calls: Vec<ContextEntry>,
    pub called_by: Vec<ContextEntry>,
}

#[derive(Clone, Copy)]
enum Side {
    Callees,
    Callers,
}

impl Side {
    fn edges<'g>(self, graph: &'g CodeGraph, id: &str) -> Vec<&'g Edge> {
        match self {
            Side::Callees => graph.edges_from(id, Some(EdgeType::Calls)),
            Side::Callers => graph.edges_to(id, Some(EdgeType::Calls)),
        }
    }

    fn other_end(self, edge: &Edge) -> &str {
        match self {
            Side::Callees => &edge.target,
            Side::Callers => &edge.source,
        }
    }
}

/// Strongest CALLS edge per neighbour of one node.
fn direct<'g>(graph: &'g CodeGraph, id: &str, side: Side) -> BTreeMap<&'g str, f64> {
    let mut best: BTreeMap<&str, f64> = BTreeMap::new();
    for edge in side.edges(graph, id) {
        let w = edge.weight.max(0.0);
        let slot = best.entry(side.other_end(edge)).or_insert(w);
        *slot = slot.max(w);
    }
    best
}

fn collect(
    graph: &CodeGraph,
    node: &GraphNode,
    side: Side,
    limit: usize,
    cancel: &CancelToken,
) -> Result<Vec<ContextEntry>> {
    let mut aggregated: BTreeMap<&str, (f64, BTreeSet<String>)> = direct(graph, &node.id, side)
        .into_iter()
        .map(|(id, w)| (id, (w, BTreeSet::new())))
        .collect();

    // A file has no calls of its own; speak for its members instead.
    if aggregated.is_empty() && node.kind == NodeKind::File {
        for member in graph.file_members(&node.id) {
            cancel.check()?;
            for (neighbor, w) in direct(graph, &member.id, side) {
                let entry = aggregated.entry(neighbor).or_insert((0.0, BTreeSet::new()));
                entry.0 += w;
                entry.1.insert(member.id.clone());
            }
        }
    }

    let mut entries: Vec<ContextEntry> = aggregated
        .into_iter()
        .filter_map(|(id, (weight, via))| {
            Some(ContextEntry { node: NodeSnapshot::of(graph.node(id)?), weight: round6(weight), via })
        })
        .collect();
    entries.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.node.id.cmp(&b.node.id)));
    entries.truncate(limit);
    Ok(entries)
}

pub fn call_context(
    graph: &CodeGraph,
    config: &EngineConfig,
    params: &CallContextParams,
    cancel: &CancelToken,
) -> Result<CallContext> {
    let id = params.node.trim();
    if id.is_empty() {
        return Err(GraphError::invalid("node cannot be empty"));
    }
    let limit = config.limits.context_limit.resolve("limit", params.limit)?;
    let node = graph.require(id)?;
    Ok(CallContext {
        node: NodeSnapshot::of(node),
        calls: collect(graph, node, Side::Callees, limit, cancel)?,
        called_by: collect(graph, node, Side::Callers, limit, cancel)?,
    })
}

// ---------------------------------------------------------------------------
// Node details
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeDetailsParams {
    #[serde(alias = "node_ids")]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDetail {
    #[serde(flatten)]
    pub node: NodeSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub in_degree: BTreeMap<EdgeType, usize>,
    pub out_degree: BTreeMap<EdgeType, usize>,
    pub weighted_in_degree: f64,
}

fn degree(edges: Vec<&Edge>) -> BTreeMap<EdgeType, usize> {
    let mut counts = BTreeMap::new();
    for edge in edges {
        *counts.entry(edge.edge_type).or_insert(0) += 1;
    }
    counts
}

pub fn node_details(
    graph: &CodeGraph,
    config: &EngineConfig,
    params: &NodeDetailsParams,
    cancel: &CancelToken,
) -> Result<Vec<NodeDetail>> {
    let ids = clean_ids(&params.nodes, "nodes", config.limits.ids_per_call.max)?;
    let bound = config.limits.detail_nodes;
    if ids.len() > bound.max {
        return Err(GraphError::invalid(format!(
            "at most {} nodes can be inspected at once, got {}",
            bound.max,
            ids.len()
        )));
    }
    require_all(graph, &ids)?;

    ids.iter()
        .map(|id| {
            cancel.check()?;
            let node = graph.require(id)?;
            Ok(NodeDetail {
                node: NodeSnapshot::of(node),
                function_name: node.function_name.clone(),
                class_name: node.class_name.clone(),
                docstring: node.docstring.clone(),
                parent_id: node.parent_id.clone(),
                in_degree: degree(graph.edges_to(id, None)),
                out_degree: degree(graph.edges_from(id, None)),
                weighted_in_degree: round6(graph.weighted_in_degree(id)),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Whole-graph statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub by_kind: BTreeMap<NodeKind, usize>,
    pub by_category: BTreeMap<Category, usize>,
    pub by_edge_type: BTreeMap<EdgeType, usize>,
    pub unresolved_calls: usize,
}

pub fn graph_stats(graph: &CodeGraph) -> GraphStats {
    let mut stats = GraphStats {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        unresolved_calls: graph.unresolved_calls().len(),
        ..GraphStats::default()
    };
    for node in graph.nodes() {
        *stats.by_kind.entry(node.kind).or_insert(0) += 1;
        *stats.by_category.entry(node.category).or_insert(0) += 1;
    }
    for edge in graph.edges() {
        *stats.by_edge_type.entry(edge.edge_type).or_insert(0) += 1;
    }
    stats
}
