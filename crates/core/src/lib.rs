//! archgraph: architectural call graph engine.
//!
//! Turns per-symbol structural profiles (files, classes, functions, methods
//! and the calls they make) into a weighted, category-annotated call graph,
//! ranks it, and answers bounded structural queries over it.
//!
//! # Modules
//!
//! - [`types`]: Profile records, node/edge entities, kinds, categories, edge types
//! - [`config`]: Classifier, noise, weight, rank and query-bound tables; `archgraph.toml`
//! - [`classify`]: Architectural category classifier
//! - [`alias`]: Alias index used to resolve call expressions to profiles
//! - [`weight`]: CALLS edge weight model
//! - [`build`]: Call graph builder
//! - [`graph`]: The directed multi-graph and its indices
//! - [`rank`]: Weighted PageRank with category re-weighting
//! - [`query`]: Subgraphs, paths, relatives, neighbour scoring, directory view
//! - [`cancel`]: Cooperative cancellation for traversals
//! - [`export`]: JSON export and strict loading
//! - [`store`]: On-disk workspace store
//! - [`cache`]: Single-flight per-workspace graph cache
//! - [`watch`]: Profile watcher for live rebuilds
//! - [`error`]: Error taxonomy

pub mod alias;
pub mod build;
pub mod cache;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod query;
pub mod rank;
pub mod store;
pub mod types;
pub mod watch;
pub mod weight;

pub use build::{build_call_graph, BuildOutput, ProfileBatch};
pub use cache::{GraphCache, GraphSource, StoreSource};
pub use cancel::CancelToken;
pub use config::{load_engine_config, EngineConfig};
pub use error::{BuildReport, GraphError, Result};
pub use graph::CodeGraph;
pub use store::GraphStore;

use std::path::{Path, PathBuf};
use tracing::debug;

// ---------------------------------------------------------------------------
// Cross-platform path helpers
// ---------------------------------------------------------------------------

/// Environment variable that overrides the store location.
pub const HOME_ENV: &str = "ARCHGRAPH_HOME";

/// The first of `vars` that is set and non-empty, as a path.
fn env_path(vars: &[&str]) -> Option<PathBuf> {
    vars.iter().find_map(|var| std::env::var_os(var).filter(|v| !v.is_empty())).map(PathBuf::from)
}

/// Default store root: `$ARCHGRAPH_HOME`, else `~/.local/share/archgraph` on
/// Unix and `%LOCALAPPDATA%/archgraph` on Windows.
pub fn data_dir() -> Option<PathBuf> {
    if let Some(root) = env_path(&[HOME_ENV]) {
        return Some(root);
    }
    if cfg!(target_os = "windows") {
        env_path(&["LOCALAPPDATA", "APPDATA"]).map(|base| base.join("archgraph"))
    } else {
        env_path(&["HOME", "USERPROFILE"]).map(|home| home.join(".local/share/archgraph"))
    }
}

// ---------------------------------------------------------------------------
// workspaces.toml
// ---------------------------------------------------------------------------

/// Parse a workspaces file:
///
/// ```toml
/// [workspaces.backend]
/// profiles = "out/backend_profiles.json"
/// ```
///
/// Relative profile paths resolve against the file's directory. Returns
/// `(workspace, profiles_path)` pairs in name order.
pub fn parse_workspaces_toml(path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let content = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
    let table: toml::Table = content
        .parse()
        .map_err(|e| GraphError::invalid(format!("could not parse {}: {e}", path.display())))?;

    let workspaces = table
        .get("workspaces")
        .and_then(|v| v.as_table())
        .ok_or_else(|| GraphError::invalid(format!("{} is missing a [workspaces] section", path.display())))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut out = Vec::with_capacity(workspaces.len());
    for (name, value) in workspaces {
        store::validate_workspace_id(name)?;
        let profiles = value.get("profiles").and_then(|v| v.as_str()).ok_or_else(|| {
            GraphError::invalid(format!("workspace '{name}' is missing a 'profiles' path"))
        })?;
        let profiles = PathBuf::from(profiles);
        let profiles = if profiles.is_absolute() { profiles } else { base.join(profiles) };
        debug!(workspace = name.as_str(), profiles = %profiles.display(), "Workspace declared");
        out.push((name.clone(), profiles));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
