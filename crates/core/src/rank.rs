//! Weighted PageRank over the CALLS projection of a [`CodeGraph`], followed by
//! a category-multiplier re-weighting pass.

use crate::config::RankConfig;
use crate::graph::CodeGraph;
use crate::types::{Category, EdgeType, NodeKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Simple weighted digraph: parallel CALLS edges summed per ordered pair.
struct Projection<'g> {
    ids: Vec<&'g str>,
    /// target index -> [(source index, summed weight)]
    incoming: Vec<Vec<(usize, f64)>>,
    out_weight: Vec<f64>,
}

impl<'g> Projection<'g> {
    fn new(graph: &'g CodeGraph) -> Self {
        let ids: Vec<&str> = graph.nodes().map(|n| n.id.as_str()).collect();
        let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut pair_weight: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for edge in graph.edges().iter().filter(|e| e.edge_type == EdgeType::Calls) {
            let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
            else {
                continue;
            };
            let w = if edge.weight.is_finite() { edge.weight.max(0.0) } else { 0.0 };
            *pair_weight.entry((s, t)).or_insert(0.0) += w;
        }

        let mut incoming = vec![Vec::new(); ids.len()];
        let mut out_weight = vec![0.0; ids.len()];
        for ((s, t), w) in pair_weight {
            if w > 0.0 {
                out_weight[s] += w;
                incoming[t].push((s, w));
            }
        }
        Projection { ids, incoming, out_weight }
    }
}

/// Power-iteration PageRank, normalized to sum to 1. Empty when the graph
/// has no nodes.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn base_rank(graph: &CodeGraph, config: &RankConfig) -> BTreeMap<String, f64> {
    let proj = Projection::new(graph);
    let n = proj.ids.len();
    if n == 0 {
        return BTreeMap::new();
    }

    let d = config.damping;
    let nf = n as f64;
    let dangling: Vec<usize> = (0..n).filter(|&i| proj.out_weight[i] <= 0.0).collect();
    let mut ranks = vec![1.0 / nf; n];

    for _ in 0..config.max_iterations {
        let previous = ranks.clone();
        let dangling_mass = d * dangling.iter().map(|&i| previous[i]).sum::<f64>() / nf;

        for (node, rank) in ranks.iter_mut().enumerate() {
            let rank_sum: f64 = proj.incoming[node]
                .iter()
                .map(|&(pred, w)| previous[pred] * (w / proj.out_weight[pred]))
                .sum();
            *rank = (1.0 - d) / nf + d * rank_sum + dangling_mass;
        }

        let delta: f64 = ranks.iter().zip(&previous).map(|(a, b)| (a - b).abs()).sum();
        if delta < config.tolerance {
            break;
        }
    }

    let total: f64 = ranks.iter().sum();
    proj.ids
        .iter()
        .zip(ranks)
        .map(|(id, r)| (id.to_string(), if total > 0.0 { r / total } else { r }))
        .collect()
}

/// Base PageRank re-weighted by category multipliers. Nodes whose adjusted
/// score is not positive are dropped; if that drops everything, the base
/// scores are returned unchanged.
#[must_use]
pub fn rank(graph: &CodeGraph, config: &RankConfig) -> BTreeMap<String, f64> {
    let base = base_rank(graph, config);
    let adjusted: BTreeMap<String, f64> = base
        .iter()
        .filter_map(|(id, score)| {
            let v = score * config.multiplier(graph.category(id));
            (v > 0.0 && v.is_finite()).then(|| (id.clone(), v))
        })
        .collect();
    if adjusted.is_empty() {
        return base;
    }
    let total: f64 = adjusted.values().sum();
    adjusted.into_iter().map(|(id, v)| (id, v / total)).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedNode {
    pub id: String,
    pub score: f64,
    pub label: String,
    pub kind: NodeKind,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Order scores by (score desc, id asc).
pub fn sorted_scores(scores: &BTreeMap<String, f64>) -> Vec<(&str, f64)> {
    let mut ordered: Vec<(&str, f64)> = scores.iter().map(|(id, s)| (id.as_str(), *s)).collect();
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ordered
}

/// Top `limit` nodes by adjusted rank.
pub fn top_ranked(graph: &CodeGraph, config: &RankConfig, limit: usize) -> Vec<RankedNode> {
    let scores = rank(graph, config);
    sorted_scores(&scores)
        .into_iter()
        .take(limit)
        .filter_map(|(id, score)| {
            let node = graph.node(id)?;
            Some(RankedNode {
                id: id.to_string(),
                score,
                label: node.label.clone(),
                kind: node.kind,
                category: node.category,
                file_path: node.file_path.clone(),
            })
        })
        .collect()
}
