//! Per-workspace graph cache with single-flight loading and building.
//!
//! Each workspace owns a slot guarded by its own mutex. The first caller to
//! find a slot empty loads the graph while holding that slot's lock, so
//! concurrent callers for the same workspace wait for one load instead of
//! starting their own. Rebuilds go through the same lock: a caller that
//! asked for a rebuild while another build was queued or running takes that
//! build's result instead of starting a second one. Slots for different
//! workspaces never contend.

use crate::build::BuildOutput;
use crate::config::EngineConfig;
use crate::error::{BuildReport, GraphError, Result};
use crate::graph::CodeGraph;
use crate::store::GraphStore;
use dashmap::DashMap;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where the cache gets graphs from on a miss.
pub trait GraphSource: Send + Sync {
    fn load(&self, workspace: &str) -> Result<CodeGraph>;
}

/// Loads the persisted graph if there is one, otherwise builds it from the
/// workspace's profiles and persists the result.
pub struct StoreSource {
    store: GraphStore,
    config: Arc<EngineConfig>,
}

impl StoreSource {
    pub fn new(store: GraphStore, config: Arc<EngineConfig>) -> Self {
        StoreSource { store, config }
    }
}

impl GraphSource for StoreSource {
    fn load(&self, workspace: &str) -> Result<CodeGraph> {
        if let Some(graph) = self.store.load_graph(workspace)? {
            return Ok(graph);
        }
        Ok(self.store.rebuild(workspace, &self.config)?.graph)
    }
}

#[derive(Default)]
struct SlotState {
    graph: Option<Arc<CodeGraph>>,
    /// Highest rebuild ticket answered by `last_build`.
    answered: u64,
    last_build: Option<BuildReport>,
}

#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
    /// Rebuild tickets handed out so far.
    tickets: AtomicU64,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // A panic while loading leaves the slot empty, which is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct GraphCache {
    source: Arc<dyn GraphSource>,
    slots: DashMap<String, Arc<Slot>>,
}

impl GraphCache {
    pub fn new(source: Arc<dyn GraphSource>) -> Self {
        GraphCache { source, slots: DashMap::new() }
    }

    fn slot(&self, workspace: &str) -> Arc<Slot> {
        // Clone the Arc out so the map shard lock is released before the
        // slot lock is taken.
        self.slots.entry(workspace.to_string()).or_default().value().clone()
    }

    /// The cached graph, loading it on first use. A failed load leaves the
    /// slot empty so the next caller retries.
    pub fn get(&self, workspace: &str) -> Result<Arc<CodeGraph>> {
        let slot = self.slot(workspace);
        let mut state = slot.lock();
        if let Some(graph) = state.graph.as_ref() {
            return Ok(Arc::clone(graph));
        }
        let start = Instant::now();
        let graph = Arc::new(self.source.load(workspace)?);
        info!(
            workspace,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            time_ms = start.elapsed().as_millis() as u64,
            "Graph loaded"
        );
        state.graph = Some(Arc::clone(&graph));
        Ok(graph)
    }

    /// Run `build` for `workspace` with the slot locked and swap its graph
    /// in. Callers that arrive while a build is queued or running wait for
    /// it; if that build started after they asked, they share its report
    /// instead of building again. A failed build leaves the cached graph in
    /// place and answers no waiter, so the next one builds for itself.
    pub fn rebuild_with<F>(&self, workspace: &str, build: F) -> Result<BuildReport>
    where
        F: FnOnce() -> Result<BuildOutput>,
    {
        let slot = self.slot(workspace);
        let ticket = slot.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = slot.lock();
        if state.answered >= ticket {
            if let Some(report) = state.last_build.clone() {
                debug!(workspace, ticket, "Joined a build that was already running");
                return Ok(report);
            }
        }
        // Everyone holding a ticket up to here asked before this build
        // read its input.
        let covers = slot.tickets.load(Ordering::SeqCst);
        let output = build()?;
        state.graph = Some(Arc::new(output.graph));
        state.answered = covers;
        state.last_build = Some(output.report.clone());
        Ok(output.report)
    }

    /// Swap in a freshly built graph. Readers holding the old `Arc` keep it.
    pub fn replace(&self, workspace: &str, graph: CodeGraph) -> Arc<CodeGraph> {
        let graph = Arc::new(graph);
        let slot = self.slot(workspace);
        slot.lock().graph = Some(Arc::clone(&graph));
        graph
    }

    /// Drop the cached graph. Waits for a load or build in progress, so the
    /// slot is empty when this returns.
    pub fn invalidate(&self, workspace: &str) {
        if let Some(slot) = self.slots.get(workspace).map(|s| s.value().clone()) {
            slot.lock().graph = None;
        }
    }

    pub fn cached_workspaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| entry.value().lock().graph.is_some())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Load several workspaces in parallel. Returns the workspaces that
    /// failed, with their errors; the others are cached.
    pub fn warm(&self, workspaces: &[String]) -> Vec<(String, GraphError)> {
        let failures: Vec<_> = workspaces
            .par_iter()
            .filter_map(|ws| self.get(ws).err().map(|e| (ws.clone(), e)))
            .collect();
        for (ws, err) in &failures {
            warn!(workspace = ws.as_str(), error = %err, "Failed to warm workspace");
        }
        failures
    }
}
