//! Simple paths between node sets, found by depth-first search.

use super::{clean_ids, parse_edge_types, require_all, NodeSnapshot};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::CodeGraph;
use crate::types::EdgeType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub const DEFAULT_PATH_EDGE_TYPES: [EdgeType; 3] = [EdgeType::Calls, EdgeType::Uses, EdgeType::DataAccess];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathParams {
    #[serde(alias = "start_nodes")]
    pub starts: Vec<String>,
    #[serde(alias = "end_nodes")]
    pub ends: Vec<String>,
    #[serde(default)]
    pub edge_types: Option<Vec<String>>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub max_paths: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoundPath {
    pub length: usize,
    pub nodes: Vec<NodeSnapshot>,
    pub edge_types: Vec<EdgeType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathsFromStart {
    pub start: String,
    pub paths: Vec<FoundPath>,
}

struct Frame<'g> {
    node: &'g str,
    nodes: Vec<&'g str>,
    hops: Vec<EdgeType>,
}

pub fn find_paths(
    graph: &CodeGraph,
    config: &EngineConfig,
    params: &PathParams,
    cancel: &CancelToken,
) -> Result<Vec<PathsFromStart>> {
    let max_ids = config.limits.ids_per_call.max;
    let starts = clean_ids(&params.starts, "starts", max_ids)?;
    let ends = clean_ids(&params.ends, "ends", max_ids)?;
    let allowed = parse_edge_types(params.edge_types.as_deref(), &DEFAULT_PATH_EDGE_TYPES)?;
    let max_depth = config.limits.path_depth.resolve("max_depth", params.max_depth)?;
    let max_paths = config.limits.paths_per_start.resolve("max_paths", params.max_paths)?;
    require_all(graph, &starts)?;
    require_all(graph, &ends)?;

    let targets: BTreeSet<&str> = ends.iter().map(String::as_str).collect();
    let mut snapshots: HashMap<&str, NodeSnapshot> = HashMap::new();
    let mut results = Vec::with_capacity(starts.len());

    for start in &starts {
        let raw = search(graph, start, &targets, &allowed, max_depth, max_paths, cancel)?;
        let paths = raw
            .into_iter()
            .map(|(nodes, hops)| FoundPath {
                length: hops.len(),
                nodes: nodes
                    .iter()
                    .filter_map(|&id| {
                        if !snapshots.contains_key(id) {
                            snapshots.insert(id, NodeSnapshot::of(graph.node(id)?));
                        }
                        snapshots.get(id).cloned()
                    })
                    .collect(),
                edge_types: hops,
            })
            .collect();
        results.push(PathsFromStart { start: start.clone(), paths });
    }
    Ok(results)
}

#[allow(clippy::type_complexity)]
fn search<'g>(
    graph: &'g CodeGraph,
    start: &'g str,
    targets: &BTreeSet<&str>,
    allowed: &BTreeSet<EdgeType>,
    max_depth: usize,
    max_paths: usize,
    cancel: &CancelToken,
) -> Result<Vec<(Vec<&'g str>, Vec<EdgeType>)>> {
    let mut found = Vec::new();
    if targets.contains(start) {
        found.push((vec![start], Vec::new()));
        if found.len() >= max_paths {
            return Ok(found);
        }
    }

    let mut stack = vec![Frame { node: start, nodes: vec![start], hops: Vec::new() }];
    while let Some(frame) = stack.pop() {
        cancel.check()?;
        if frame.hops.len() >= max_depth {
            continue;
        }
        // Parallel edges of one type would only repeat the same path.
        let mut hops: Vec<(&str, EdgeType)> = graph
            .sorted_out_edges(frame.node, allowed)
            .into_iter()
            .map(|e| (e.target.as_str(), e.edge_type))
            .collect();
        hops.dedup();

        for (next, edge_type) in hops {
            if frame.nodes.contains(&next) {
                continue;
            }
            let mut nodes = frame.nodes.clone();
            nodes.push(next);
            let mut path_hops = frame.hops.clone();
            path_hops.push(edge_type);

            if targets.contains(next) {
                found.push((nodes.clone(), path_hops.clone()));
                if found.len() >= max_paths {
                    return Ok(found);
                }
            }
            if path_hops.len() < max_depth {
                stack.push(Frame { node: next, nodes, hops: path_hops });
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::query::fixtures::{chain, edge, node};
    use crate::types::Category;

    fn params(starts: &[&str], ends: &[&str]) -> PathParams {
        PathParams {
            starts: starts.iter().map(|s| s.to_string()).collect(),
            ends: ends.iter().map(|s| s.to_string()).collect(),
            ..PathParams::default()
        }
    }

    #[test]
    fn test_finds_all_simple_paths() {
        let g = chain(&["a", "b", "c", "d"], &[("a", "b"), ("b", "d"), ("a", "c"), ("c", "d")]);
        let out = find_paths(&g, &EngineConfig::default(), &params(&["a"], &["d"]), &CancelToken::new()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start, "a");
        let mut routes: Vec<Vec<&str>> =
            out[0].paths.iter().map(|p| p.nodes.iter().map(|n| n.id.as_str()).collect()).collect();
        routes.sort();
        assert_eq!(routes, vec![vec!["a", "b", "d"], vec!["a", "c", "d"]]);
        assert!(out[0].paths.iter().all(|p| p.length == 2 && p.edge_types == vec![EdgeType::Calls; 2]));
    }

    #[test]
    fn test_default_edge_types_follow_instantiations() {
        use crate::build::{build_call_graph, ProfileBatch};
        use crate::types::{NodeKind, ProfileInput};

        let mut handler = ProfileInput::new("api/orders.py::create", NodeKind::Function, "api/orders.py");
        handler.function_name = Some("create".to_string());
        handler.calls = vec!["OrderForm".to_string()];
        let mut form = ProfileInput::new("forms/order.py::OrderForm", NodeKind::Class, "forms/order.py");
        form.class_name = Some("OrderForm".to_string());
        let batch = ProfileBatch::from_profiles(vec![handler, form]);
        let g = build_call_graph("w", &batch, &EngineConfig::default()).unwrap().graph;

        let p = params(&["api/orders.py::create"], &["forms/order.py::OrderForm"]);
        let out = find_paths(&g, &EngineConfig::default(), &p, &CancelToken::new()).unwrap();
        assert_eq!(out[0].paths.len(), 1);
        assert_eq!(out[0].paths[0].edge_types, vec![EdgeType::Uses]);

        let calls_only = PathParams { edge_types: Some(vec!["CALLS".to_string()]), ..p };
        let out = find_paths(&g, &EngineConfig::default(), &calls_only, &CancelToken::new()).unwrap();
        assert!(out[0].paths.is_empty());
    }

    #[test]
    fn test_start_in_end_set_is_zero_length_path() {
        let g = chain(&["a", "b"], &[("a", "b")]);
        let out = find_paths(&g, &EngineConfig::default(), &params(&["a"], &["a", "b"]), &CancelToken::new()).unwrap();
        assert_eq!(out[0].paths[0].length, 0);
        assert_eq!(out[0].paths[0].nodes.len(), 1);
        assert_eq!(out[0].paths.len(), 2);
    }

    #[test]
    fn test_cycles_do_not_repeat_nodes() {
        let g = chain(&["a", "b", "c"], &[("a", "b"), ("b", "a"), ("b", "c")]);
        let out = find_paths(&g, &EngineConfig::default(), &params(&["a"], &["c"]), &CancelToken::new()).unwrap();
        assert_eq!(out[0].paths.len(), 1);
        assert_eq!(out[0].paths[0].length, 2);
    }

    #[test]
    fn test_depth_and_path_caps() {
        let g = chain(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]);
        let mut p = params(&["a"], &["d"]);
        p.max_depth = Some(2);
        let out = find_paths(&g, &EngineConfig::default(), &p, &CancelToken::new()).unwrap();
        assert!(out[0].paths.is_empty());

        let wide = chain(&["s", "x", "y", "z", "t"], &[("s", "x"), ("s", "y"), ("s", "z"), ("x", "t"), ("y", "t"), ("z", "t")]);
        let mut p = params(&["s"], &["t"]);
        p.max_paths = Some(2);
        let out = find_paths(&wide, &EngineConfig::default(), &p, &CancelToken::new()).unwrap();
        assert_eq!(out[0].paths.len(), 2);
    }

    #[test]
    fn test_edge_type_filter() {
        let nodes = vec![node("a", Category::Service, None), node("b", Category::Service, None)];
        let g = CodeGraph::from_parts(nodes, vec![edge("a", "b", EdgeType::Contains, 0.0)], Vec::new()).unwrap();
        let config = EngineConfig::default();
        let out = find_paths(&g, &config, &params(&["a"], &["b"]), &CancelToken::new()).unwrap();
        assert!(out[0].paths.is_empty(), "CONTAINS is not followed by default");

        let mut p = params(&["a"], &["b"]);
        p.edge_types = Some(vec!["contains".to_string()]);
        let out = find_paths(&g, &config, &p, &CancelToken::new()).unwrap();
        assert_eq!(out[0].paths[0].edge_types, vec![EdgeType::Contains]);
    }

    #[test]
    fn test_too_many_starts_rejected() {
        let g = chain(&["a", "b"], &[("a", "b")]);
        let mut config = EngineConfig::default();
        config.limits.ids_per_call.max = 3;
        let starts: Vec<String> = (0..4).map(|i| format!("s{i}")).collect();
        let p = PathParams { starts, ends: vec!["b".to_string()], ..PathParams::default() };
        let err = find_paths(&g, &config, &p, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)), "Got: {err}");
    }

    #[test]
    fn test_missing_endpoint_not_found() {
        let g = chain(&["a"], &[]);
        let config = EngineConfig::default();
        let err = find_paths(&g, &config, &params(&["a"], &["ghost"]), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, GraphError::NotFound { .. }), "Got: {err}");
        let err = find_paths(&g, &config, &params(&["ghost"], &["a"]), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, GraphError::NotFound { .. }), "Got: {err}");
    }

    #[test]
    fn test_cancelled_search() {
        let g = chain(&["a", "b"], &[("a", "b")]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = find_paths(&g, &EngineConfig::default(), &params(&["a"], &["b"]), &cancel).unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
    }
}
