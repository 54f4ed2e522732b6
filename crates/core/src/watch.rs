//! Profile watcher for live rebuilds.
//!
//! Watches each workspace directory for changes to its profiles file and,
//! once events have been quiet for the debounce window, rebuilds that
//! workspace and swaps the new graph into the cache. A rebuild that fails
//! leaves the previously cached graph in service.

use crate::cache::GraphCache;
use crate::config::EngineConfig;
use crate::error::{BuildReport, Result};
use crate::store::{GraphStore, PROFILES_FILE};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Debounce window: wait this long after the last event before rebuilding.
const DEBOUNCE_MS: u64 = 500;

/// Shared handles the watcher thread needs.
#[derive(Clone)]
pub struct WatchContext {
    pub store: GraphStore,
    pub config: Arc<EngineConfig>,
    pub cache: Arc<GraphCache>,
}

/// Rebuild one workspace from its stored profiles, persist it and replace
/// the cached graph. Builds of the same workspace never overlap: this goes
/// through [`GraphCache::rebuild_with`]. On failure the cache is left
/// untouched.
pub fn rebuild_workspace(ctx: &WatchContext, workspace: &str) -> Result<BuildReport> {
    let start = Instant::now();
    match ctx.cache.rebuild_with(workspace, || ctx.store.rebuild(workspace, &ctx.config)) {
        Ok(report) => {
            info!(
                workspace,
                nodes = report.nodes,
                edges = report.edges,
                time_ms = start.elapsed().as_millis() as u64,
                "Workspace rebuilt"
            );
            Ok(report)
        }
        Err(e) => {
            warn!(workspace, error = %e, "Rebuild failed, keeping previous graph");
            Err(e)
        }
    }
}

/// The workspace whose profiles file `path` is, if any.
fn workspace_of(path: &Path, roots: &[PathBuf]) -> Option<String> {
    if path.file_name()?.to_str()? != PROFILES_FILE {
        return None;
    }
    let dir = path.parent()?;
    let parent = dir.parent()?;
    if !roots.iter().any(|root| root == parent) {
        return None;
    }
    dir.file_name()?.to_str().map(str::to_string)
}

/// Start watching the given workspaces. Returns the watcher handle, which
/// must be kept alive; dropping it stops the watcher.
pub fn start_watcher(ctx: WatchContext, workspaces: &[String]) -> Option<RecommendedWatcher> {
    let (tx, rx) = mpsc::channel::<Event>();

    let mut watcher = match RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "Failed to create file watcher");
            return None;
        }
    };

    for workspace in workspaces {
        let dir = match ctx.store.workspace_dir(workspace) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(workspace = workspace.as_str(), error = %e, "Not watching workspace");
                continue;
            }
        };
        // Watch the directory, not the file: atomic replaces swap the inode.
        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            warn!(path = %dir.display(), error = %e, "Failed to watch");
        } else {
            info!(workspace = workspace.as_str(), path = %dir.display(), "Watching profiles");
        }
    }

    std::thread::spawn(move || debounce_loop(rx, ctx));
    Some(watcher)
}

/// Collect events per workspace and rebuild after a quiet period.
fn debounce_loop(rx: mpsc::Receiver<Event>, ctx: WatchContext) {
    let mut pending: HashMap<String, Instant> = HashMap::new();
    // Workspaces whose last rebuild failed and still serve an older graph.
    let mut failing: HashSet<String> = HashSet::new();
    // Events arrive with resolved paths; match either spelling of the root.
    let mut roots = vec![ctx.store.root().to_path_buf()];
    if let Ok(canonical) = ctx.store.root().canonicalize() {
        roots.push(canonical);
    }

    loop {
        match rx.recv_timeout(Duration::from_millis(DEBOUNCE_MS)) {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                let now = Instant::now();
                for path in &event.paths {
                    if let Some(ws) = workspace_of(path, &roots) {
                        debug!(workspace = ws.as_str(), "Profiles changed");
                        pending.insert(ws, now);
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if pending.is_empty() {
                    continue;
                }
                let cutoff = Instant::now() - Duration::from_millis(DEBOUNCE_MS);
                let ready: Vec<String> =
                    pending.iter().filter(|(_, t)| **t <= cutoff).map(|(w, _)| w.clone()).collect();
                for ws in &ready {
                    pending.remove(ws);
                    if rebuild_workspace(&ctx, ws).is_err() {
                        failing.insert(ws.clone());
                    } else if failing.remove(ws) {
                        info!(workspace = ws.as_str(), "Workspace recovered after failed rebuilds");
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
