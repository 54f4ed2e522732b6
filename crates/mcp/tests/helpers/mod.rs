//! Test harness for MCP tool integration tests.
//!
//! Writes fixture profiles into a temp-dir store, builds a `ServerState` over
//! it, and dispatches JSON-RPC requests via `dispatch_jsonrpc()` directly (no
//! subprocess).

use archgraph_core::{EngineConfig, GraphStore};
use archgraph_mcp::{dispatch_jsonrpc, ServerState};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub fn fixture_path(name: &str) -> PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(format!("{name}.json"))
}

pub struct TestHarness {
    pub state: ServerState,
    temp_dir: TempDir,
}

impl TestHarness {
    /// One workspace named after the fixture, set as the default.
    pub fn from_fixture(name: &str) -> Self {
        let mut h = Self::with_workspaces(&[(name, name)]);
        h.state.default_workspace = Some(name.to_string());
        h
    }

    /// Several `(workspace, fixture)` pairs and no default workspace.
    pub fn with_workspaces(pairs: &[(&str, &str)]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = GraphStore::new(temp_dir.path());
        for (workspace, fixture) in pairs {
            let src = fixture_path(fixture);
            assert!(src.exists(), "Fixture '{fixture}' not found at {}", src.display());
            store.import_profiles(workspace, &src).expect("Failed to import fixture");
        }
        let state = ServerState::new(store, Arc::new(EngineConfig::default()), None);
        TestHarness { state, temp_dir }
    }

    pub fn root(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Send a JSON-RPC request and return the response.
    pub fn dispatch(&self, msg: Value) -> Option<Value> {
        dispatch_jsonrpc(&self.state, &msg)
    }

    /// Call an MCP tool by name with the given arguments. Returns (text, is_error).
    pub fn call_tool(&self, tool: &str, args: Value) -> (String, bool) {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": tool,
                "arguments": args
            }
        });
        let resp = self.dispatch(msg).expect("Expected response for tools/call");
        let result = &resp["result"];
        let text = result["content"][0]["text"].as_str().unwrap_or("").to_string();
        let is_error = result["isError"].as_bool().unwrap_or(false);
        (text, is_error)
    }

    /// Call a tool that must succeed and parse its JSON output.
    pub fn call_json(&self, tool: &str, args: Value) -> Value {
        let (text, is_err) = self.call_tool(tool, args);
        assert!(!is_err, "{tool} returned error: {text}");
        serde_json::from_str(&text).unwrap_or_else(|e| panic!("{tool} output is not JSON ({e}): {text}"))
    }

    /// Send an initialize request and return the response.
    pub fn initialize(&self) -> Value {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-11-25",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "0.1.0" }
            }
        });
        self.dispatch(msg).expect("Expected initialize response")
    }
}
