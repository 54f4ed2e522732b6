//! archgraph tool surface.
//!
//! Newline-delimited JSON-RPC 2.0 over stdio in the MCP style. Each tool maps
//! onto one query in `archgraph_core::query`, run against the workspace's
//! cached graph with a per-call deadline.

pub mod tools;

use archgraph_core::watch::WatchContext;
use archgraph_core::{EngineConfig, GraphCache, GraphStore, StoreSource};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write as IoWrite};
use std::sync::Arc;
use tracing::{info, warn};

pub use tools::{handle_tool_call, tool_definitions, TOOL_NAMES};

/// Protocol version reported when the client does not request one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";

const INSTRUCTIONS: &str = "archgraph: ranked call graphs of code workspaces. \
Start with ag_rank_nodes or ag_list_directory_components to find the central parts, \
then ag_call_context and ag_get_neighbors to see how they connect. \
Use ag_find_paths to trace a flow between two nodes and ag_extract_subgraph for a local neighbourhood.";

pub struct ServerState {
    pub store: GraphStore,
    pub config: Arc<EngineConfig>,
    pub cache: Arc<GraphCache>,
    /// Used when a tool call omits `workspace`.
    pub default_workspace: Option<String>,
}

impl ServerState {
    pub fn new(store: GraphStore, config: Arc<EngineConfig>, default_workspace: Option<String>) -> Self {
        let source = Arc::new(StoreSource::new(store.clone(), Arc::clone(&config)));
        ServerState { cache: Arc::new(GraphCache::new(source)), store, config, default_workspace }
    }

    pub fn watch_context(&self) -> WatchContext {
        WatchContext {
            store: self.store.clone(),
            config: Arc::clone(&self.config),
            cache: Arc::clone(&self.cache),
        }
    }
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}

/// Handle one decoded JSON-RPC message. Notifications get no response.
pub fn dispatch_jsonrpc(state: &ServerState, msg: &Value) -> Option<Value> {
    let method = msg["method"].as_str().unwrap_or("");
    if method.starts_with("notifications/") {
        return None;
    }
    let id = msg.get("id").cloned().unwrap_or(Value::Null);

    let response = match method {
        "initialize" => {
            let version = msg["params"]["protocolVersion"].as_str().unwrap_or(DEFAULT_PROTOCOL_VERSION);
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": version,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": "archgraph",
                        "version": env!("CARGO_PKG_VERSION")
                    },
                    "instructions": INSTRUCTIONS
                }
            })
        }
        "tools/list" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "tools": tool_definitions() }
        }),
        "tools/call" => {
            let tool_name = msg["params"]["name"].as_str().unwrap_or("");
            let arguments = msg["params"].get("arguments").cloned().unwrap_or_else(|| json!({}));
            let (text, is_error) = handle_tool_call(state, tool_name, &arguments);
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "content": [{ "type": "text", "text": text }],
                    "isError": is_error
                }
            })
        }
        "ping" => json!({ "jsonrpc": "2.0", "id": id, "result": {} }),
        _ => error_response(id, -32601, "Method not found"),
    };
    Some(response)
}

/// Serve JSON-RPC on stdin/stdout until stdin closes.
pub fn run_mcp(state: &ServerState) {
    let stdin = io::stdin();
    let stdout = io::stdout();

    let workspaces = state.store.list_workspaces().unwrap_or_default();
    info!(
        workspaces = workspaces.len(),
        cached = state.cache.cached_workspaces().len(),
        default = state.default_workspace.as_deref().unwrap_or("-"),
        "MCP server ready"
    );

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Ok(msg) => dispatch_jsonrpc(state, &msg),
            Err(_) => Some(error_response(Value::Null, -32700, "Parse error")),
        };
        let Some(response) = response else { continue };

        let mut out = stdout.lock();
        let _ = writeln!(out, "{response}");
        let _ = out.flush();
    }
}
