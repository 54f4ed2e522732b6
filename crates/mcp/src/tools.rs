use crate::ServerState;
use archgraph_core::query::{
    call_context, evaluate_neighbors, extract_subgraph, find_paths, find_relatives, get_neighbors,
    graph_stats, list_directory_components, node_details, CallContextParams, DirectoryParams,
    GetNeighborsParams, NodeDetailsParams, PathParams, RelativeParams, ScoringParams, SubgraphParams,
};
use archgraph_core::rank::top_ranked;
use archgraph_core::store::validate_workspace_id;
use archgraph_core::watch::rebuild_workspace;
use archgraph_core::{BuildReport, CancelToken, GraphError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const TOOL_NAMES: [&str; 11] = [
    "ag_rank_nodes",
    "ag_extract_subgraph",
    "ag_find_paths",
    "ag_find_relatives",
    "ag_evaluate_neighbors",
    "ag_list_directory_components",
    "ag_get_neighbors",
    "ag_call_context",
    "ag_node_details",
    "ag_graph_stats",
    "ag_build_graph",
];

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

fn workspace_property() -> Value {
    json!({
        "type": "string",
        "description": "Workspace id. Optional when the server was started with a single or default workspace."
    })
}

fn id_list(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

const EDGE_TYPE_NAMES: [&str; 6] = ["CALLS", "CONTAINS", "USES", "DATA_ACCESS", "IMPORTS", "INHERITS_FROM"];

pub fn tool_definitions() -> Value {
    json!([
        {
            "name": "ag_rank_nodes",
            "description": "Most architecturally central nodes by category-weighted PageRank. Start here to find the core services and controllers of a workspace.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "limit": { "type": "integer", "description": "Number of nodes to return. Default: 10" }
                }
            }
        },
        {
            "name": "ag_extract_subgraph",
            "description": "Neighbourhood of one node, following edges in both directions up to max_depth hops. Returns the visited nodes and every edge between them.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "anchor": { "type": "string", "description": "Node id to centre the subgraph on" },
                    "max_depth": { "type": "integer", "description": "Hops from the anchor. Default: 2" },
                    "max_nodes": { "type": "integer", "description": "Stop after this many nodes. Default: 30" }
                },
                "required": ["anchor"]
            }
        },
        {
            "name": "ag_find_paths",
            "description": "Simple directed paths from each start node to any end node. Useful for tracing how a request reaches the data layer.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "starts": id_list("Start node ids"),
                    "ends": id_list("End node ids"),
                    "edge_types": { "type": "array", "items": { "type": "string", "enum": EDGE_TYPE_NAMES }, "description": "Edge types to follow. Default: CALLS, USES, DATA_ACCESS" },
                    "max_depth": { "type": "integer", "description": "Maximum path length in edges. Default: 8" },
                    "max_paths": { "type": "integer", "description": "Paths to collect per start node. Default: 25" }
                },
                "required": ["starts", "ends"]
            }
        },
        {
            "name": "ag_find_relatives",
            "description": "Descendants or ancestors of each origin node, with hop distance and the edges that connect them.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "origins": id_list("Origin node ids"),
                    "relation_types": { "type": "array", "items": { "type": "string", "enum": EDGE_TYPE_NAMES }, "description": "Edge types to follow. Default: CALLS" },
                    "direction": { "type": "string", "enum": ["descendants", "ancestors"], "description": "Default: descendants" },
                    "depth": { "type": "integer", "description": "Maximum hop distance. Default: 5" },
                    "max_relatives": { "type": "integer", "description": "Relatives per origin. Default: 50" }
                },
                "required": ["origins"]
            }
        },
        {
            "name": "ag_evaluate_neighbors",
            "description": "Score a node's direct CALLS neighbours by how much weighted traffic they receive.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "node": { "type": "string", "description": "Node id" },
                    "direction": { "type": "string", "enum": ["out", "in"], "description": "Default: out" },
                    "scoring_method": { "type": "string", "enum": ["weighted_traffic"], "description": "Default: weighted_traffic" },
                    "limit": { "type": "integer", "description": "Neighbours to return. Default: 25" }
                },
                "required": ["node"]
            }
        },
        {
            "name": "ag_list_directory_components",
            "description": "Directories ranked by the average score of the nodes they contain, with their top nodes and category mix.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "limit": { "type": "integer", "description": "Directories to return. Default: 20" },
                    "nodes_per_dir": { "type": "integer", "description": "Top nodes listed per directory. Default: 5" },
                    "depth": { "type": "integer", "description": "Directory depth below the shared prefix. Default: 1" }
                }
            }
        },
        {
            "name": "ag_get_neighbors",
            "description": "Direct neighbours of one or more nodes, grouped per neighbour with edge types, edge count and weight. Filter by edge type, category or kind.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "nodes": id_list("Node ids"),
                    "direction": { "type": "string", "enum": ["out", "in", "all"], "description": "Default: out" },
                    "edge_types": { "type": "array", "items": { "type": "string", "enum": EDGE_TYPE_NAMES } },
                    "categories": id_list("Keep neighbours in these categories"),
                    "kinds": id_list("Keep neighbours of these kinds"),
                    "max_neighbors": { "type": "integer", "description": "Neighbours per node. Default: 25" }
                },
                "required": ["nodes"]
            }
        },
        {
            "name": "ag_call_context",
            "description": "What a node calls and what calls it, strongest edges first. File nodes aggregate the calls of their members.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "node": { "type": "string", "description": "Node id" },
                    "limit": { "type": "integer", "description": "Entries per side. Default: 20" }
                },
                "required": ["node"]
            }
        },
        {
            "name": "ag_node_details",
            "description": "Full attributes of the given nodes plus their degree per edge type.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "nodes": id_list("Node ids")
                },
                "required": ["nodes"]
            }
        },
        {
            "name": "ag_graph_stats",
            "description": "Node and edge counts by kind, category and edge type.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property()
                }
            }
        },
        {
            "name": "ag_build_graph",
            "description": "Rebuild a workspace graph from its stored profiles and replace the cached copy. Pass 'profiles' to import a new extractor output first.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workspace": workspace_property(),
                    "profiles": { "type": "string", "description": "Path to a profile JSON file to import before building" }
                }
            }
        }
    ])
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Pick the workspace named in `args`, else the server default, else the
/// only workspace in the store.
fn resolve_workspace(state: &ServerState, args: &Value) -> Result<String> {
    match args.get("workspace") {
        Some(Value::String(name)) => {
            validate_workspace_id(name)?;
            Ok(name.clone())
        }
        Some(Value::Null) | None => {
            if let Some(name) = &state.default_workspace {
                return Ok(name.clone());
            }
            let available = state.store.list_workspaces()?;
            match available.as_slice() {
                [only] => Ok(only.clone()),
                [] => Err(GraphError::invalid("no workspaces in the store; build one first")),
                _ => Err(GraphError::invalid(format!(
                    "multiple workspaces available, specify 'workspace': {}",
                    available.join(", ")
                ))),
            }
        }
        Some(_) => Err(GraphError::invalid("'workspace' must be a string")),
    }
}

fn params<T: DeserializeOwned>(args: &Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).map_err(|e| GraphError::invalid(e.to_string()))
}

fn render<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[derive(Debug, Default, Deserialize)]
struct RankParams {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct BuildParams {
    #[serde(default)]
    profiles: Option<PathBuf>,
}

#[derive(Serialize)]
struct BuildSummary<'a> {
    workspace: &'a str,
    report: BuildReport,
}

// ---------------------------------------------------------------------------
// Tool call handler
// ---------------------------------------------------------------------------

fn run_tool(state: &ServerState, name: &str, args: &Value) -> Result<String> {
    let workspace = resolve_workspace(state, args)?;

    if name == "ag_build_graph" {
        let p: BuildParams = params(args)?;
        if let Some(source) = &p.profiles {
            state.store.import_profiles(&workspace, source)?;
        }
        let report = rebuild_workspace(&state.watch_context(), &workspace)?;
        return render(&BuildSummary { workspace: &workspace, report });
    }

    let graph = state.cache.get(&workspace)?;
    let config = &*state.config;
    let cancel = CancelToken::with_timeout(Duration::from_millis(config.query_timeout_ms));

    match name {
        "ag_rank_nodes" => {
            let p: RankParams = params(args)?;
            let limit = config.limits.rank_limit.resolve("limit", p.limit)?;
            render(&top_ranked(&graph, &config.rank, limit))
        }
        "ag_extract_subgraph" => {
            let p: SubgraphParams = params(args)?;
            render(&extract_subgraph(&graph, config, &p, &cancel)?)
        }
        "ag_find_paths" => {
            let p: PathParams = params(args)?;
            render(&find_paths(&graph, config, &p, &cancel)?)
        }
        "ag_find_relatives" => {
            let p: RelativeParams = params(args)?;
            render(&find_relatives(&graph, config, &p, &cancel)?)
        }
        "ag_evaluate_neighbors" => {
            let p: ScoringParams = params(args)?;
            render(&evaluate_neighbors(&graph, config, &p, &cancel)?)
        }
        "ag_list_directory_components" => {
            let p: DirectoryParams = params(args)?;
            render(&list_directory_components(&graph, config, &p, &cancel)?)
        }
        "ag_get_neighbors" => {
            let p: GetNeighborsParams = params(args)?;
            render(&get_neighbors(&graph, config, &p, &cancel)?)
        }
        "ag_call_context" => {
            let p: CallContextParams = params(args)?;
            render(&call_context(&graph, config, &p, &cancel)?)
        }
        "ag_node_details" => {
            let p: NodeDetailsParams = params(args)?;
            render(&node_details(&graph, config, &p, &cancel)?)
        }
        "ag_graph_stats" => render(&graph_stats(&graph)),
        _ => Err(GraphError::invalid(format!("unknown tool '{name}'"))),
    }
}

/// Run one tool. Returns the response text and whether it is an error.
pub fn handle_tool_call(state: &ServerState, name: &str, args: &Value) -> (String, bool) {
    if !TOOL_NAMES.contains(&name) {
        return (format!("Unknown tool: {name}"), true);
    }
    let start = Instant::now();
    let outcome = run_tool(state, name, args);
    let time_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(text) => {
            debug!(tool = name, time_ms, "Tool call finished");
            (text, false)
        }
        Err(e) if e.is_caller_error() => {
            debug!(tool = name, time_ms, code = e.code(), error = %e, "Tool call rejected");
            (format!("Error: {e}"), true)
        }
        Err(e) => {
            warn!(tool = name, time_ms, code = e.code(), error = %e, "Tool call failed");
            (format!("Error: {e}\n{}", recovery_hint(&e)), true)
        }
    }
}

/// What the client can do about an error that is not in its arguments.
fn recovery_hint(err: &GraphError) -> &'static str {
    match err {
        GraphError::Cancelled => "The query ran past its deadline; lower max_depth or the result limits.",
        _ => "The workspace graph is unavailable; fix its profiles and run ag_build_graph.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tool_has_a_definition() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, TOOL_NAMES.to_vec());
        for tool in defs.as_array().unwrap() {
            assert_eq!(tool["inputSchema"]["type"], "object");
            assert!(tool["inputSchema"]["properties"]["workspace"].is_object());
        }
    }

    #[test]
    fn test_recovery_hint_only_for_workspace_errors() {
        let hint = recovery_hint(&GraphError::Serialization("bad graph".to_string()));
        assert!(hint.contains("ag_build_graph"));
        assert!(recovery_hint(&GraphError::Cancelled).contains("deadline"));
    }

    #[test]
    fn test_params_rejects_wrong_types() {
        let err = params::<RankParams>(&json!({ "limit": "ten" })).unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)));
        let ok: RankParams = params(&Value::Null).unwrap();
        assert!(ok.limit.is_none());
    }
}
