//! Directed multi-graph of profiles and synthetic external targets.
//!
//! Nodes are kept in id order, edges in insertion order with forward and
//! reverse indices. Parallel edges of the same type between the same pair
//! are preserved and told apart by an ordinal (see [`EdgeKey`]).

use crate::error::{GraphError, Result};
use crate::types::{display_label, Category, Edge, EdgeType, GraphNode, NodeKind};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Identity of one edge in the multi-graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub ordinal: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CodeGraph {
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<Edge>,
    ordinals: Vec<u32>,
    /// source id -> edge indices
    by_source: HashMap<String, Vec<usize>>,
    /// target id -> edge indices
    by_target: HashMap<String, Vec<usize>>,
    unresolved_calls: BTreeSet<String>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node unless one with the same id exists. Returns whether it
    /// was inserted; existing nodes are never overwritten.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Append an edge. Both endpoints must already exist.
    pub fn push_edge(&mut self, edge: Edge) -> Result<()> {
        for end in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(end) {
                return Err(GraphError::node_not_found(end.clone()));
            }
        }
        let ordinal = self
            .edges_from(&edge.source, Some(edge.edge_type))
            .iter()
            .filter(|e| e.target == edge.target)
            .count() as u32;
        let idx = self.edges.len();
        self.by_source.entry(edge.source.clone()).or_default().push(idx);
        self.by_target.entry(edge.target.clone()).or_default().push(idx);
        self.edges.push(edge);
        self.ordinals.push(ordinal);
        Ok(())
    }

    pub fn record_unresolved(&mut self, call: &str) {
        self.unresolved_calls.insert(call.to_string());
    }

    /// Assemble a graph from deserialized parts, validating that ids are
    /// unique and every edge endpoint exists.
    pub fn from_parts(
        nodes: Vec<GraphNode>,
        edges: Vec<Edge>,
        unresolved_calls: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let mut graph = CodeGraph::new();
        for mut node in nodes {
            if node.id.is_empty() {
                return Err(GraphError::Serialization("node with empty id".to_string()));
            }
            if node.label.is_empty() {
                node.label = display_label(
                    &node.id,
                    node.file_path.as_deref(),
                    node.function_name.as_deref(),
                    node.class_name.as_deref(),
                );
            }
            let id = node.id.clone();
            if !graph.add_node(node) {
                return Err(GraphError::Serialization(format!("duplicate node id '{id}'")));
            }
        }
        for edge in edges {
            if !edge.weight.is_finite() || edge.weight < 0.0 {
                return Err(GraphError::Serialization(format!(
                    "edge {} -> {} has invalid weight {}",
                    edge.source, edge.target, edge.weight
                )));
            }
            let (source, target) = (edge.source.clone(), edge.target.clone());
            graph.push_edge(edge).map_err(|_| {
                GraphError::Serialization(format!(
                    "edge {source} -> {target} references a missing node"
                ))
            })?;
        }
        graph.unresolved_calls.extend(unresolved_calls);
        Ok(graph)
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Like [`node`](Self::node), but a missing id is a `NotFound` error.
    pub fn require(&self, id: &str) -> Result<&GraphNode> {
        self.nodes.get(id).ok_or_else(|| GraphError::node_not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Distinct unresolved call strings, sorted.
    pub fn unresolved_calls(&self) -> &BTreeSet<String> {
        &self.unresolved_calls
    }

    pub fn category(&self, id: &str) -> Category {
        self.nodes.get(id).map(|n| n.category).unwrap_or_default()
    }

    pub fn edge_key(&self, idx: usize) -> Option<EdgeKey> {
        let edge = self.edges.get(idx)?;
        Some(EdgeKey {
            source: edge.source.clone(),
            target: edge.target.clone(),
            edge_type: edge.edge_type,
            ordinal: self.ordinals[idx],
        })
    }

    pub fn edge_keys(&self) -> Vec<EdgeKey> {
        (0..self.edges.len()).filter_map(|i| self.edge_key(i)).collect()
    }

    fn collect(&self, indices: Option<&Vec<usize>>, edge_type: Option<EdgeType>) -> Vec<&Edge> {
        indices
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| &self.edges[i])
                    .filter(|e| edge_type.is_none() || Some(e.edge_type) == edge_type)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Outgoing edges of a node, optionally filtered by type.
    pub fn edges_from(&self, id: &str, edge_type: Option<EdgeType>) -> Vec<&Edge> {
        self.collect(self.by_source.get(id), edge_type)
    }

    /// Incoming edges of a node, optionally filtered by type.
    pub fn edges_to(&self, id: &str, edge_type: Option<EdgeType>) -> Vec<&Edge> {
        self.collect(self.by_target.get(id), edge_type)
    }

    /// Outgoing edges whose type is in `allowed`, ordered by (target, type).
    pub fn sorted_out_edges(&self, id: &str, allowed: &BTreeSet<EdgeType>) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .edges_from(id, None)
            .into_iter()
            .filter(|e| allowed.contains(&e.edge_type))
            .collect();
        edges.sort_by(|a, b| (&a.target, a.edge_type).cmp(&(&b.target, b.edge_type)));
        edges
    }

    /// Incoming edges whose type is in `allowed`, ordered by (source, type).
    pub fn sorted_in_edges(&self, id: &str, allowed: &BTreeSet<EdgeType>) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .edges_to(id, None)
            .into_iter()
            .filter(|e| allowed.contains(&e.edge_type))
            .collect();
        edges.sort_by(|a, b| (&a.source, a.edge_type).cmp(&(&b.source, b.edge_type)));
        edges
    }

    /// Sum of incoming CALLS weights.
    pub fn weighted_in_degree(&self, id: &str) -> f64 {
        self.edges_to(id, Some(EdgeType::Calls)).iter().map(|e| e.weight).sum()
    }

    /// Members of a file node (via CONTAINS), falling back to nodes that
    /// share its path when no containment edges exist.
    pub fn file_members(&self, file_id: &str) -> Vec<&GraphNode> {
        let contained: Vec<&GraphNode> = self
            .edges_from(file_id, Some(EdgeType::Contains))
            .iter()
            .filter_map(|e| self.nodes.get(&e.target))
            .collect();
        if !contained.is_empty() {
            return contained;
        }
        let Some(path) = self.nodes.get(file_id).and_then(|n| n.file_path.as_deref()) else {
            return Vec::new();
        };
        self.nodes
            .values()
            .filter(|n| n.id != file_id && n.kind != NodeKind::File)
            .filter(|n| n.file_path.as_deref() == Some(path))
            .collect()
    }
}
