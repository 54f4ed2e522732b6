//! On-disk workspace store.
//!
//! Layout: `<root>/<workspace>/profiles.json` holds the extractor output and
//! `<root>/<workspace>/call_graph.json` the built graph. Writes go to a
//! sibling temp file first and are renamed into place.

use crate::build::{build_call_graph, BuildOutput, ProfileBatch};
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::export;
use crate::graph::CodeGraph;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

pub const PROFILES_FILE: &str = "profiles.json";
pub const GRAPH_FILE: &str = "call_graph.json";

static WORKSPACE_ID: OnceLock<Option<Regex>> = OnceLock::new();

/// Workspace ids double as directory names, so they are restricted to a
/// conservative character set and may not start with a dot or dash.
pub fn validate_workspace_id(id: &str) -> Result<()> {
    let valid = WORKSPACE_ID
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(id));
    if valid {
        Ok(())
    } else {
        Err(GraphError::invalid(format!(
            "invalid workspace id '{id}': use letters, digits, '.', '_' or '-', starting with a letter or digit"
        )))
    }
}

/// Write `bytes` to `path` via a temp file in the same directory. Every
/// writer gets its own temp file, so concurrent writers never interleave;
/// the last rename wins.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| GraphError::io(parent, e))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".archgraph-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| GraphError::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| GraphError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| GraphError::io(path, e.error))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct GraphStore {
    root: PathBuf,
}

impl GraphStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        GraphStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn workspace_dir(&self, workspace: &str) -> Result<PathBuf> {
        validate_workspace_id(workspace)?;
        Ok(self.root.join(workspace))
    }

    pub fn profiles_path(&self, workspace: &str) -> Result<PathBuf> {
        Ok(self.workspace_dir(workspace)?.join(PROFILES_FILE))
    }

    pub fn graph_path(&self, workspace: &str) -> Result<PathBuf> {
        Ok(self.workspace_dir(workspace)?.join(GRAPH_FILE))
    }

    /// Workspaces that have a profiles file or a built graph, sorted.
    pub fn list_workspaces(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GraphError::io(&self.root, e)),
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(PROFILES_FILE).exists() || entry.path().join(GRAPH_FILE).exists())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| validate_workspace_id(name).is_ok())
            .collect();
        names.sort();
        Ok(names)
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    /// Copy an extractor output file into the workspace after checking that
    /// it decodes.
    pub fn import_profiles(&self, workspace: &str, source: &Path) -> Result<ProfileBatch> {
        let text = std::fs::read_to_string(source).map_err(|e| GraphError::io(source, e))?;
        let batch = ProfileBatch::from_json_str(&text)?;
        write_atomic(&self.profiles_path(workspace)?, text.as_bytes())?;
        debug!(workspace, records = batch.total, "Profiles imported");
        Ok(batch)
    }

    pub fn load_profiles(&self, workspace: &str) -> Result<ProfileBatch> {
        let path = self.profiles_path(workspace)?;
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GraphError::workspace_not_found(workspace))
            }
            Err(e) => return Err(GraphError::io(&path, e)),
        };
        ProfileBatch::from_json_str(&text)
    }

    // -----------------------------------------------------------------------
    // Graphs
    // -----------------------------------------------------------------------

    /// The persisted graph, or `None` when the workspace has not been built.
    pub fn load_graph(&self, workspace: &str) -> Result<Option<CodeGraph>> {
        let path = self.graph_path(workspace)?;
        if !path.exists() {
            return Ok(None);
        }
        export::load(&path).map(Some)
    }

    pub fn save_graph(&self, workspace: &str, graph: &CodeGraph) -> Result<()> {
        export::save(graph, &self.graph_path(workspace)?)
    }

    /// Build from the stored profiles and persist the result.
    pub fn rebuild(&self, workspace: &str, config: &EngineConfig) -> Result<BuildOutput> {
        let batch = self.load_profiles(workspace)?;
        let output = build_call_graph(workspace, &batch, config)?;
        self.save_graph(workspace, &output.graph)?;
        info!(
            workspace,
            nodes = output.report.nodes,
            edges = output.report.edges,
            "Graph persisted"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_profiles(store: &GraphStore, workspace: &str) {
        let profiles = json!([
            {"id": "app/services/orders.py", "kind": "file", "file_path": "app/services/orders.py",
             "children": ["app/services/orders.py::place"]},
            {"id": "app/services/orders.py::place", "kind": "function", "file_path": "app/services/orders.py",
             "function_name": "place", "calls": ["save"]},
            {"id": "app/models/order.py::save", "kind": "function", "file_path": "app/models/order.py",
             "function_name": "save"}
        ]);
        write_atomic(&store.profiles_path(workspace).unwrap(), profiles.to_string().as_bytes()).unwrap();
    }

    #[test]
    fn test_workspace_id_validation() {
        for ok in ["demo", "my-repo", "a.b_c", "9lives"] {
            assert!(validate_workspace_id(ok).is_ok(), "{ok} should be valid");
        }
        for bad in ["", ".hidden", "-x", "a/b", "../up", "sp ace"] {
            assert!(
                matches!(validate_workspace_id(bad), Err(GraphError::InvalidArgument(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rebuild_persists_graph() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::new(dir.path());
        write_profiles(&store, "shop");
        assert!(store.load_graph("shop").unwrap().is_none());

        let output = store.rebuild("shop", &EngineConfig::default()).unwrap();
        let loaded = store.load_graph("shop").unwrap().unwrap();
        assert_eq!(loaded.edge_keys(), output.graph.edge_keys());
        assert_eq!(store.list_workspaces().unwrap(), vec!["shop".to_string()]);

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("shop"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_concurrent_writers_leave_one_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w").join(PROFILES_FILE);
        let bodies: Vec<String> = (0..8).map(|i| format!("[{}]", i.to_string().repeat(4096))).collect();
        std::thread::scope(|s| {
            for body in &bodies {
                let path = &path;
                s.spawn(move || write_atomic(path, body.as_bytes()).unwrap());
            }
        });
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(bodies.contains(&written), "File is a mix of writers");
        let entries = std::fs::read_dir(dir.path().join("w")).unwrap().count();
        assert_eq!(entries, 1, "Temp files left behind");
    }

    #[test]
    fn test_missing_workspace_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::new(dir.path());
        let err = store.rebuild("ghost", &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, GraphError::NotFound { what: "workspace", .. }), "Got: {err}");
        assert!(store.list_workspaces().unwrap().is_empty());
    }

    #[test]
    fn test_import_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::new(dir.path());
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ nope").unwrap();
        assert!(matches!(store.import_profiles("w", &bad), Err(GraphError::Serialization(_))));
        assert!(!store.profiles_path("w").unwrap().exists());
    }
}
