//! Ancestors or descendants reachable through selected relation types.

use super::{clean_ids, parse_edge_types, require_all, NodeSnapshot};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::graph::CodeGraph;
use crate::types::{Edge, EdgeType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Evidence items kept per relative.
const MAX_EVIDENCE: usize = 3;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelativeParams {
    #[serde(alias = "nodes")]
    pub origins: Vec<String>,
    #[serde(default)]
    pub relation_types: Option<Vec<String>>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub depth: Option<usize>,
    #[serde(default)]
    pub max_relatives: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lineage {
    Descendants,
    Ancestors,
}

impl Lineage {
    fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("descendants") => Ok(Lineage::Descendants),
            Some("ancestors") => Ok(Lineage::Ancestors),
            Some(other) => Err(GraphError::invalid(format!(
                "direction must be 'descendants' or 'ancestors', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub call_expression: String,
}

impl Evidence {
    fn of(edge: &Edge) -> Self {
        Evidence {
            from: edge.source.clone(),
            to: edge.target.clone(),
            edge_type: edge.edge_type,
            call_expression: edge.call_expression.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Relative {
    #[serde(flatten)]
    pub node: NodeSnapshot,
    pub distance: usize,
    pub edge_types: BTreeSet<EdgeType>,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelativesOf {
    pub node_id: String,
    pub direction: Lineage,
    pub relatives: Vec<Relative>,
}

pub fn find_relatives(
    graph: &CodeGraph,
    config: &EngineConfig,
    params: &RelativeParams,
    cancel: &CancelToken,
) -> Result<Vec<RelativesOf>> {
    let origins = clean_ids(&params.origins, "origins", config.limits.ids_per_call.max)?;
    let relation_types = parse_edge_types(params.relation_types.as_deref(), &[EdgeType::Calls])?;
    let direction = Lineage::parse(params.direction.as_deref())?;
    let depth = config.limits.relative_depth.resolve("depth", params.depth)?;
    let max_relatives = config.limits.max_relatives.resolve("max_relatives", params.max_relatives)?;
    require_all(graph, &origins)?;

    origins
        .iter()
        .map(|origin| {
            let relatives = walk(graph, origin, direction, &relation_types, depth, max_relatives, cancel)?;
            Ok(RelativesOf { node_id: origin.clone(), direction, relatives })
        })
        .collect()
}

fn walk(
    graph: &CodeGraph,
    origin: &str,
    direction: Lineage,
    relation_types: &BTreeSet<EdgeType>,
    depth: usize,
    max_relatives: usize,
    cancel: &CancelToken,
) -> Result<Vec<Relative>> {
    let mut best: HashMap<&str, usize> = HashMap::from([(origin, 0)]);
    let mut found: BTreeMap<&str, Relative> = BTreeMap::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(origin, 0)]);

    'bfs: while let Some((current, distance)) = queue.pop_front() {
        cancel.check()?;
        if distance >= depth || best.get(current).is_some_and(|&d| d < distance) {
            continue;
        }
        let edges = match direction {
            Lineage::Descendants => graph.sorted_out_edges(current, relation_types),
            Lineage::Ancestors => graph.sorted_in_edges(current, relation_types),
        };
        let next_distance = distance + 1;

        for edge in edges {
            let neighbor = match direction {
                Lineage::Descendants => edge.target.as_str(),
                Lineage::Ancestors => edge.source.as_str(),
            };
            if neighbor == origin {
                continue;
            }
            let improved = best.get(neighbor).map_or(true, |&d| next_distance < d);
            if improved {
                best.insert(neighbor, next_distance);
                queue.push_back((neighbor, next_distance));
            }
            if !found.contains_key(neighbor) {
                if found.len() >= max_relatives {
                    break 'bfs;
                }
                let Some(node) = graph.node(neighbor) else { continue };
                found.insert(
                    neighbor,
                    Relative {
                        node: NodeSnapshot::of(node),
                        distance: next_distance,
                        edge_types: BTreeSet::new(),
                        evidence: Vec::new(),
                    },
                );
            }
            if let Some(entry) = found.get_mut(neighbor) {
                entry.distance = entry.distance.min(next_distance);
                entry.edge_types.insert(edge.edge_type);
                if entry.evidence.len() < MAX_EVIDENCE {
                    entry.evidence.push(Evidence::of(edge));
                }
            }
        }
    }

    let mut relatives: Vec<Relative> = found.into_values().collect();
    relatives.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.node.id.cmp(&b.node.id)));
    relatives.truncate(max_relatives);
    Ok(relatives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::chain;

    fn params(origins: &[&str]) -> RelativeParams {
        RelativeParams { origins: origins.iter().map(|s| s.to_string()).collect(), ..Default::default() }
    }

    fn ids(r: &RelativesOf) -> Vec<(&str, usize)> {
        r.relatives.iter().map(|x| (x.node.id.as_str(), x.distance)).collect()
    }

    #[test]
    fn test_descendants_with_shortest_distance() {
        // a -> b -> c -> d and a shortcut a -> d
        let g = chain(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d")]);
        let out = find_relatives(&g, &EngineConfig::default(), &params(&["a"]), &CancelToken::new()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(ids(&out[0]), vec![("b", 1), ("d", 1), ("c", 2)]);
        let d = out[0].relatives.iter().find(|r| r.node.id == "d").unwrap();
        assert_eq!(d.evidence.len(), 2, "Both routes into d are recorded");
        assert!(d.evidence.len() <= MAX_EVIDENCE);
    }

    #[test]
    fn test_ancestors_direction() {
        let g = chain(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let mut p = params(&["c"]);
        p.direction = Some("ancestors".to_string());
        let out = find_relatives(&g, &EngineConfig::default(), &p, &CancelToken::new()).unwrap();
        assert_eq!(ids(&out[0]), vec![("b", 1), ("a", 2)]);
        assert_eq!(out[0].direction, Lineage::Ancestors);
    }

    #[test]
    fn test_depth_and_count_limits() {
        let g = chain(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]);
        let mut p = params(&["a"]);
        p.depth = Some(2);
        let out = find_relatives(&g, &EngineConfig::default(), &p, &CancelToken::new()).unwrap();
        assert_eq!(ids(&out[0]), vec![("b", 1), ("c", 2)]);

        let mut p = params(&["a"]);
        p.max_relatives = Some(1);
        let out = find_relatives(&g, &EngineConfig::default(), &p, &CancelToken::new()).unwrap();
        assert_eq!(ids(&out[0]), vec![("b", 1)]);
    }

    #[test]
    fn test_cycle_back_to_origin_is_skipped() {
        let g = chain(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let out = find_relatives(&g, &EngineConfig::default(), &params(&["a"]), &CancelToken::new()).unwrap();
        assert_eq!(ids(&out[0]), vec![("b", 1)]);
    }

    #[test]
    fn test_invalid_arguments() {
        let g = chain(&["a"], &[]);
        let config = EngineConfig::default();
        let cancel = CancelToken::new();
        let mut p = params(&["a"]);
        p.direction = Some("sideways".to_string());
        assert!(matches!(find_relatives(&g, &config, &p, &cancel), Err(GraphError::InvalidArgument(_))));

        let mut p = params(&["a"]);
        p.depth = Some(16);
        assert!(matches!(find_relatives(&g, &config, &p, &cancel), Err(GraphError::InvalidArgument(_))));

        assert!(matches!(
            find_relatives(&g, &config, &params(&["ghost"]), &cancel),
            Err(GraphError::NotFound { .. })
        ));
    }
}
