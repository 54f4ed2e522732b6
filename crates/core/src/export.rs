//! JSON export format for built graphs.
//!
//! The document is `{nodes, edges, unresolved_calls}`. Node objects are flat
//! (`id` plus attributes); edges carry `source`, `target`, `type`, `weight`,
//! `resolved` and, when present, `call_expression`, `child_kind`, `line` and
//! `use_kind`.
//! Loading is strict: anything that would produce an inconsistent graph is a
//! [`GraphError::Serialization`].

use crate::error::{GraphError, Result};
use crate::graph::CodeGraph;
use crate::store::write_atomic;
use crate::types::{Edge, GraphNode};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub unresolved_calls: Vec<String>,
}

impl GraphExport {
    pub fn from_graph(graph: &CodeGraph) -> Self {
        GraphExport {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().to_vec(),
            unresolved_calls: graph.unresolved_calls().iter().cloned().collect(),
        }
    }

    pub fn into_graph(self) -> Result<CodeGraph> {
        CodeGraph::from_parts(self.nodes, self.edges, self.unresolved_calls)
    }
}

pub fn to_json(graph: &CodeGraph) -> Result<String> {
    Ok(serde_json::to_string_pretty(&GraphExport::from_graph(graph))?)
}

pub fn from_json(text: &str) -> Result<CodeGraph> {
    let export: GraphExport = serde_json::from_str(text)?;
    export.into_graph()
}

/// Write the export to `path` atomically.
pub fn save(graph: &CodeGraph, path: &Path) -> Result<()> {
    write_atomic(path, to_json(graph)?.as_bytes())
}

pub fn load(path: &Path) -> Result<CodeGraph> {
    let text = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
    from_json(&text).map_err(|e| match e {
        GraphError::Serialization(msg) => {
            GraphError::Serialization(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{build_call_graph, ProfileBatch};
    use crate::config::{EngineConfig, WeightTables};
    use crate::types::{Category, EdgeType, NodeKind, ProfileInput};
    use crate::weight::EdgeWeightModel;
    use serde_json::json;

    fn built() -> CodeGraph {
        let mut svc = ProfileInput::new("app/services/billing.py::charge", NodeKind::Function, "app/services/billing.py");
        svc.function_name = Some("charge".to_string());
        let mut ctrl = ProfileInput::new("app/controllers/pay.py::pay", NodeKind::Function, "app/controllers/pay.py");
        ctrl.function_name = Some("pay".to_string());
        ctrl.calls = vec!["charge".to_string(), "json.dumps".to_string()];
        let batch = ProfileBatch::from_profiles(vec![svc, ctrl]);
        build_call_graph("demo", &batch, &EngineConfig::default()).unwrap().graph
    }

    #[test]
    fn test_export_round_trip_preserves_graph() {
        let graph = built();
        let text = to_json(&graph).unwrap();
        let loaded = from_json(&text).unwrap();

        assert_eq!(loaded.node_count(), graph.node_count());
        assert_eq!(loaded.edge_keys(), graph.edge_keys());
        for (a, b) in graph.edges().iter().zip(loaded.edges()) {
            assert_eq!(a.weight, b.weight);
        }
        for node in graph.nodes() {
            assert_eq!(loaded.node(&node.id).map(|n| n.category), Some(node.category));
        }
        assert_eq!(loaded.unresolved_calls(), graph.unresolved_calls());
    }

    #[test]
    fn test_table_weights_reload_bit_exact() {
        let tables = WeightTables::default();
        let model = EdgeWeightModel::new(&tables);
        let node_for = |cat: Category| {
            let mut n = GraphNode::external(cat.label());
            n.id = format!("n/{}", cat.label());
            n.kind = NodeKind::Function;
            n.category = cat;
            n
        };
        let nodes: Vec<GraphNode> = Category::ALL.iter().map(|c| node_for(*c)).collect();
        let mut edges = Vec::new();
        for source in &nodes {
            for target in &nodes {
                let mut edge = Edge::new(&source.id, &target.id, EdgeType::Calls);
                edge.call_expression = target.label.clone();
                edge.weight = model.weight(source, target, &edge);
                edges.push(edge);
            }
        }
        // Products like 0.45 * 1.1 need all 17 significant digits to reload
        assert!(edges.iter().any(|e| e.weight == 0.45 * 1.1));
        let graph = CodeGraph::from_parts(nodes, edges, Vec::new()).unwrap();

        let loaded = from_json(&to_json(&graph).unwrap()).unwrap();
        assert_eq!(loaded.edge_count(), graph.edge_count());
        let mismatches: Vec<String> = graph
            .edges()
            .iter()
            .zip(loaded.edges())
            .filter(|(a, b)| a.weight.to_bits() != b.weight.to_bits())
            .map(|(a, b)| format!("{} -> {}: {} vs {}", a.source, a.target, a.weight, b.weight))
            .collect();
        assert!(mismatches.is_empty(), "Weights changed on reload: {mismatches:?}");
    }

    #[test]
    fn test_missing_category_loads_as_unknown() {
        let text = json!({
            "nodes": [{"id": "a", "kind": "function"}, {"id": "b", "kind": "function", "category": "service"}],
            "edges": [{"source": "a", "target": "b", "type": "CALLS", "weight": 0.5}]
        })
        .to_string();
        let graph = from_json(&text).unwrap();
        assert_eq!(graph.category("a"), Category::Unknown);
        assert_eq!(graph.node("a").map(|n| n.label.as_str()), Some("a"));
        let edge = &graph.edges()[0];
        assert!(edge.resolved);
        assert_eq!(edge.edge_type, EdgeType::Calls);
    }

    #[test]
    fn test_strict_loading() {
        let cases = [
            "not json".to_string(),
            json!({"nodes": [{"id": "a", "kind": "module"}], "edges": []}).to_string(),
            json!({"nodes": [{"id": "a", "kind": "file"}], "edges": [
                {"source": "a", "target": "zzz", "type": "CALLS", "weight": 1.0}
            ]})
            .to_string(),
            json!({"nodes": [{"id": "a", "kind": "file"}, {"id": "a", "kind": "file"}], "edges": []}).to_string(),
            json!({"nodes": [{"id": "a", "kind": "file"}], "edges": [
                {"source": "a", "target": "a", "type": "CALLS", "weight": -0.5}
            ]})
            .to_string(),
            json!({"nodes": [{"id": "a", "kind": "file"}], "edges": [
                {"source": "a", "target": "a", "type": "FRIENDS_WITH", "weight": 0.5}
            ]})
            .to_string(),
        ];
        for text in cases {
            let err = from_json(&text).unwrap_err();
            assert!(matches!(err, GraphError::Serialization(_)), "Expected serialization error for {text}: {err}");
        }
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call_graph.json");
        let graph = built();
        save(&graph, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.edge_keys(), graph.edge_keys());

        let missing = load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, GraphError::Io { .. }));
    }
}
