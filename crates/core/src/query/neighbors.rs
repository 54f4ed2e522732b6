//! Direct neighbours: advisory scoring for "where next" decisions, and a
//! filtered listing with per-neighbour edge bundles.

use super::{clean_ids, parse_edge_types, require_all, round6, Direction, NodeSnapshot};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::graph::CodeGraph;
use crate::types::{Category, Edge, EdgeType, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const WEIGHTED_TRAFFIC: &str = "weighted_traffic";

// ---------------------------------------------------------------------------
// Neighbour scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringParams {
    #[serde(alias = "node_id")]
    pub node: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub scoring_method: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborScore {
    pub id: String,
    pub score: f64,
    pub label: String,
    pub kind: NodeKind,
    pub category: Category,
}

/// Rank the CALLS neighbours of a node by their weighted in-degree.
/// Neighbours that score zero are left out entirely.
pub fn evaluate_neighbors(
    graph: &CodeGraph,
    config: &EngineConfig,
    params: &ScoringParams,
    cancel: &CancelToken,
) -> Result<Vec<NeighborScore>> {
    let node = params.node.trim();
    if node.is_empty() {
        return Err(GraphError::invalid("node cannot be empty"));
    }
    let direction = Direction::parse(params.direction.as_deref(), Direction::Out)?;
    if direction == Direction::All {
        return Err(GraphError::invalid("direction must be 'in' or 'out' for neighbor scoring"));
    }
    let method = params
        .scoring_method
        .as_deref()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| WEIGHTED_TRAFFIC.to_string());
    if method != WEIGHTED_TRAFFIC {
        return Err(GraphError::invalid(format!(
            "unsupported scoring_method '{method}', supported: {WEIGHTED_TRAFFIC}"
        )));
    }
    let limit = config.limits.neighbor_limit.resolve("limit", params.limit)?;
    graph.require(node)?;

    let candidates: BTreeSet<&str> = match direction {
        Direction::In => graph.edges_to(node, Some(EdgeType::Calls)).into_iter().map(|e| e.source.as_str()).collect(),
        _ => graph.edges_from(node, Some(EdgeType::Calls)).into_iter().map(|e| e.target.as_str()).collect(),
    };

    let mut scored = Vec::with_capacity(candidates.len());
    for id in candidates {
        cancel.check()?;
        let score = graph.weighted_in_degree(id);
        if !score.is_finite() || score <= 0.0 {
            continue;
        }
        let Some(n) = graph.node(id) else { continue };
        scored.push(NeighborScore {
            id: id.to_string(),
            score,
            label: n.label.clone(),
            kind: n.kind,
            category: n.category,
        });
    }
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    scored.truncate(limit);
    Ok(scored)
}

// ---------------------------------------------------------------------------
// Neighbour listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetNeighborsParams {
    #[serde(alias = "node_ids")]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub edge_types: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub kinds: Option<Vec<String>>,
    #[serde(default)]
    pub max_neighbors: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborEntry {
    #[serde(flatten)]
    pub node: NodeSnapshot,
    pub direction: &'static str,
    pub edge_types: BTreeSet<EdgeType>,
    pub edge_count: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborGroup {
    pub node_id: String,
    pub neighbors: Vec<NeighborEntry>,
}

struct NodeFilter {
    categories: Option<BTreeSet<Category>>,
    kinds: Option<BTreeSet<NodeKind>>,
}

impl NodeFilter {
    fn parse(categories: Option<&[String]>, kinds: Option<&[String]>) -> Result<Self> {
        let categories = match categories.filter(|c| !c.is_empty()) {
            None => None,
            Some(values) => Some(
                values
                    .iter()
                    .map(|v| Category::parse(v).ok_or_else(|| GraphError::invalid(format!("unknown category '{v}'"))))
                    .collect::<Result<BTreeSet<_>>>()?,
            ),
        };
        let kinds = match kinds.filter(|k| !k.is_empty()) {
            None => None,
            Some(values) => Some(
                values
                    .iter()
                    .map(|v| {
                        NodeKind::parse(&v.trim().to_ascii_lowercase())
                            .ok_or_else(|| GraphError::invalid(format!("unknown node kind '{v}'")))
                    })
                    .collect::<Result<BTreeSet<_>>>()?,
            ),
        };
        Ok(NodeFilter { categories, kinds })
    }

    fn matches(&self, category: Category, kind: NodeKind) -> bool {
        self.categories.as_ref().map_or(true, |c| c.contains(&category))
            && self.kinds.as_ref().map_or(true, |k| k.contains(&kind))
    }
}

/// Neighbours of each requested node, bundling parallel edges per
/// (neighbour, side). Ordered by (weight desc, id asc).
pub fn get_neighbors(
    graph: &CodeGraph,
    config: &EngineConfig,
    params: &GetNeighborsParams,
    cancel: &CancelToken,
) -> Result<Vec<NeighborGroup>> {
    let nodes = clean_ids(&params.nodes, "nodes", config.limits.ids_per_call.max)?;
    let direction = Direction::parse(params.direction.as_deref(), Direction::Out)?;
    let allowed = parse_edge_types(params.edge_types.as_deref(), &EdgeType::ALL)?;
    let filter = NodeFilter::parse(params.categories.as_deref(), params.kinds.as_deref())?;
    let max_neighbors = config.limits.neighbor_limit.resolve("max_neighbors", params.max_neighbors)?;
    require_all(graph, &nodes)?;

    let mut groups = Vec::with_capacity(nodes.len());
    for node_id in nodes {
        cancel.check()?;
        let mut entries = Vec::new();
        if matches!(direction, Direction::Out | Direction::All) {
            let bundles = bundle(graph.sorted_out_edges(&node_id, &allowed), |e| &e.target);
            entries.extend(describe(graph, bundles, "outgoing", &filter));
        }
        if matches!(direction, Direction::In | Direction::All) {
            let bundles = bundle(graph.sorted_in_edges(&node_id, &allowed), |e| &e.source);
            entries.extend(describe(graph, bundles, "incoming", &filter));
        }
        entries.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.node.id.cmp(&b.node.id)));
        entries.truncate(max_neighbors);
        groups.push(NeighborGroup { node_id, neighbors: entries });
    }
    Ok(groups)
}

fn bundle<'g>(edges: Vec<&'g Edge>, key: impl Fn(&'g Edge) -> &'g String) -> BTreeMap<&'g str, Vec<&'g Edge>> {
    let mut out: BTreeMap<&str, Vec<&Edge>> = BTreeMap::new();
    for edge in edges {
        out.entry(key(edge).as_str()).or_default().push(edge);
    }
    out
}

fn describe(
    graph: &CodeGraph,
    bundles: BTreeMap<&str, Vec<&Edge>>,
    side: &'static str,
    filter: &NodeFilter,
) -> Vec<NeighborEntry> {
    bundles
        .into_iter()
        .filter_map(|(id, edges)| {
            let node = graph.node(id)?;
            if !filter.matches(node.category, node.kind) {
                return None;
            }
            let weight: f64 = edges.iter().map(|e| e.weight.max(0.0)).sum();
            Some(NeighborEntry {
                node: NodeSnapshot::of(node),
                direction: side,
                edge_types: edges.iter().map(|e| e.edge_type).collect(),
                edge_count: edges.len(),
                weight: round6(weight),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::{edge, node};

    /// caller -> hub -> {svc, util}, other -> svc
    fn sample() -> CodeGraph {
        let nodes = vec![
            node("caller", Category::Controller, None),
            node("hub", Category::Service, None),
            node("svc", Category::Service, None),
            node("util", Category::Utility, None),
            node("other", Category::Model, None),
            node("silent", Category::Test, None),
        ];
        let edges = vec![
            edge("caller", "hub", EdgeType::Calls, 1.2),
            edge("hub", "svc", EdgeType::Calls, 1.1),
            edge("hub", "util", EdgeType::Calls, 0.2),
            edge("other", "svc", EdgeType::Calls, 1.0),
            edge("hub", "silent", EdgeType::Calls, 0.0),
            edge("hub", "util", EdgeType::Uses, 0.0),
        ];
        CodeGraph::from_parts(nodes, edges, Vec::new()).unwrap()
    }

    fn scoring(node: &str) -> ScoringParams {
        ScoringParams { node: node.to_string(), ..Default::default() }
    }

    #[test]
    fn test_scores_by_weighted_in_degree() {
        let g = sample();
        let out = evaluate_neighbors(&g, &EngineConfig::default(), &scoring("hub"), &CancelToken::new()).unwrap();
        let ids: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        // silent has zero in-weight and is dropped
        assert_eq!(ids, vec!["svc", "util"]);
        assert!((out[0].score - 2.1).abs() < 1e-9);
    }

    #[test]
    fn test_scoring_inbound_direction() {
        let g = sample();
        let mut p = scoring("svc");
        p.direction = Some("in".to_string());
        let out = evaluate_neighbors(&g, &EngineConfig::default(), &p, &CancelToken::new()).unwrap();
        let ids: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        // other has no incoming weight at all
        assert_eq!(ids, vec!["hub"]);
    }

    #[test]
    fn test_scoring_rejects_bad_arguments() {
        let g = sample();
        let config = EngineConfig::default();
        let cancel = CancelToken::new();
        let mut p = scoring("hub");
        p.scoring_method = Some("pagerank".to_string());
        assert!(matches!(evaluate_neighbors(&g, &config, &p, &cancel), Err(GraphError::InvalidArgument(_))));

        let mut p = scoring("hub");
        p.direction = Some("all".to_string());
        assert!(matches!(evaluate_neighbors(&g, &config, &p, &cancel), Err(GraphError::InvalidArgument(_))));

        assert!(matches!(
            evaluate_neighbors(&g, &config, &scoring("ghost"), &cancel),
            Err(GraphError::NotFound { .. })
        ));
    }

    #[test]
    fn test_scoring_ties_break_on_id() {
        let nodes = vec![
            node("root", Category::Service, None),
            node("b", Category::Service, None),
            node("a", Category::Service, None),
        ];
        let edges = vec![edge("root", "b", EdgeType::Calls, 1.0), edge("root", "a", EdgeType::Calls, 1.0)];
        let g = CodeGraph::from_parts(nodes, edges, Vec::new()).unwrap();
        let out = evaluate_neighbors(&g, &EngineConfig::default(), &scoring("root"), &CancelToken::new()).unwrap();
        assert_eq!(out[0].id, "a");
        assert_eq!(out[1].id, "b");
    }

    #[test]
    fn test_get_neighbors_bundles_parallel_edges() {
        let g = sample();
        let p = GetNeighborsParams { nodes: vec!["hub".to_string()], ..Default::default() };
        let out = get_neighbors(&g, &EngineConfig::default(), &p, &CancelToken::new()).unwrap();
        let util = out[0].neighbors.iter().find(|n| n.node.id == "util").unwrap();
        assert_eq!(util.edge_count, 2);
        assert_eq!(util.edge_types, BTreeSet::from([EdgeType::Calls, EdgeType::Uses]));
        assert_eq!(out[0].neighbors[0].node.id, "svc");
        assert!(out[0].neighbors.iter().all(|n| n.direction == "outgoing"));
    }

    #[test]
    fn test_get_neighbors_filters() {
        let g = sample();
        let p = GetNeighborsParams {
            nodes: vec!["hub".to_string()],
            direction: Some("all".to_string()),
            edge_types: Some(vec!["CALLS".to_string()]),
            categories: Some(vec!["controller".to_string(), "utility".to_string()]),
            ..Default::default()
        };
        let out = get_neighbors(&g, &EngineConfig::default(), &p, &CancelToken::new()).unwrap();
        let ids: Vec<(&str, &str)> =
            out[0].neighbors.iter().map(|n| (n.node.id.as_str(), n.direction)).collect();
        assert_eq!(ids, vec![("caller", "incoming"), ("util", "outgoing")]);

        let bad = GetNeighborsParams {
            nodes: vec!["hub".to_string()],
            kinds: Some(vec!["module".to_string()]),
            ..Default::default()
        };
        assert!(matches!(
            get_neighbors(&g, &EngineConfig::default(), &bad, &CancelToken::new()),
            Err(GraphError::InvalidArgument(_))
        ));
    }
}
