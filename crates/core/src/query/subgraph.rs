//! Bounded neighbourhood around one anchor node, following edges in both
//! directions.

use super::NodeSnapshot;
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::graph::CodeGraph;
use crate::types::EdgeType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubgraphParams {
    #[serde(alias = "node_id")]
    pub anchor: String,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub max_nodes: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubgraphNode {
    #[serde(flatten)]
    pub node: NodeSnapshot,
    pub is_anchor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SubgraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subgraph {
    pub anchor: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes: Vec<SubgraphNode>,
    pub edges: Vec<SubgraphEdge>,
}

pub fn extract_subgraph(
    graph: &CodeGraph,
    config: &EngineConfig,
    params: &SubgraphParams,
    cancel: &CancelToken,
) -> Result<Subgraph> {
    let anchor = params.anchor.trim();
    if anchor.is_empty() {
        return Err(GraphError::invalid("anchor cannot be empty"));
    }
    let max_depth = config.limits.subgraph_depth.resolve("max_depth", params.max_depth)?;
    let max_nodes = config.limits.subgraph_nodes.resolve("max_nodes", params.max_nodes)?;
    graph.require(anchor)?;

    // Visit order is kept so the node list reads outward from the anchor.
    let mut order: Vec<&str> = vec![anchor];
    let mut visited: HashSet<&str> = HashSet::from([anchor]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(anchor, 0)]);

    while let Some((current, depth)) = queue.pop_front() {
        cancel.check()?;
        if depth >= max_depth || visited.len() >= max_nodes {
            continue;
        }
        let mut neighbors: BTreeSet<&str> = BTreeSet::new();
        neighbors.extend(graph.edges_from(current, None).iter().map(|e| e.target.as_str()));
        neighbors.extend(graph.edges_to(current, None).iter().map(|e| e.source.as_str()));
        for next in neighbors {
            if visited.len() >= max_nodes {
                break;
            }
            if visited.insert(next) {
                order.push(next);
                queue.push_back((next, depth + 1));
            }
        }
    }

    let mut edges: BTreeSet<SubgraphEdge> = BTreeSet::new();
    for id in &order {
        for edge in graph.edges_from(id, None) {
            if visited.contains(edge.target.as_str()) {
                edges.insert(SubgraphEdge {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    edge_type: edge.edge_type,
                });
            }
        }
    }

    let nodes: Vec<SubgraphNode> = order
        .iter()
        .filter_map(|id| graph.node(id))
        .map(|n| SubgraphNode { node: NodeSnapshot::of(n), is_anchor: n.id == anchor })
        .collect();
    let edges: Vec<SubgraphEdge> = edges.into_iter().collect();

    Ok(Subgraph {
        anchor: anchor.to_string(),
        node_count: nodes.len(),
        edge_count: edges.len(),
        nodes,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::{chain, edge};
    use crate::types::Category;

    fn params(anchor: &str, depth: Option<usize>, nodes: Option<usize>) -> SubgraphParams {
        SubgraphParams { anchor: anchor.to_string(), max_depth: depth, max_nodes: nodes }
    }

    #[test]
    fn test_subgraph_follows_both_directions() {
        let g = chain(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]);
        let sub = extract_subgraph(&g, &EngineConfig::default(), &params("b", Some(1), None), &CancelToken::new())
            .unwrap();
        let ids: Vec<&str> = sub.nodes.iter().map(|n| n.node.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert!(sub.nodes[0].is_anchor);
        assert_eq!(sub.edge_count, 2);
    }

    #[test]
    fn test_subgraph_respects_node_cap() {
        let g = chain(
            &["hub", "a", "b", "c", "d", "e"],
            &[("hub", "a"), ("hub", "b"), ("hub", "c"), ("hub", "d"), ("hub", "e")],
        );
        let sub = extract_subgraph(&g, &EngineConfig::default(), &params("hub", Some(3), Some(3)), &CancelToken::new())
            .unwrap();
        assert_eq!(sub.node_count, 3);
        // Only edges between visited nodes are reported
        for e in &sub.edges {
            assert!(sub.nodes.iter().any(|n| n.node.id == e.target));
        }
    }

    #[test]
    fn test_subgraph_dedupes_parallel_edges() {
        let nodes = vec![
            crate::query::fixtures::node("a", Category::Service, None),
            crate::query::fixtures::node("b", Category::Service, None),
        ];
        let edges = vec![
            edge("a", "b", EdgeType::Calls, 1.0),
            edge("a", "b", EdgeType::Calls, 1.0),
            edge("a", "b", EdgeType::Uses, 0.0),
        ];
        let g = CodeGraph::from_parts(nodes, edges, Vec::new()).unwrap();
        let sub = extract_subgraph(&g, &EngineConfig::default(), &params("a", None, None), &CancelToken::new())
            .unwrap();
        assert_eq!(sub.edge_count, 2);
    }

    #[test]
    fn test_subgraph_rejects_bad_input() {
        let g = chain(&["a"], &[]);
        let config = EngineConfig::default();
        let cancel = CancelToken::new();
        assert!(matches!(
            extract_subgraph(&g, &config, &params("ghost", None, None), &cancel),
            Err(GraphError::NotFound { .. })
        ));
        assert!(matches!(
            extract_subgraph(&g, &config, &params("a", Some(0), None), &cancel),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            extract_subgraph(&g, &config, &params("a", None, Some(101)), &cancel),
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_subgraph_cancelled() {
        let g = chain(&["a", "b"], &[("a", "b")]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = extract_subgraph(&g, &EngineConfig::default(), &params("a", None, None), &cancel);
        assert!(matches!(result, Err(GraphError::Cancelled)));
    }
}
