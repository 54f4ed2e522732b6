//! archgraph CLI: build, rank, query and serve code graphs.
//!
//! Calls `archgraph-core` directly; `query` and `serve` go through the same
//! tool handlers as the MCP surface.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use archgraph_core::query::graph_stats;
use archgraph_core::rank::top_ranked;
use archgraph_core::watch::{rebuild_workspace, start_watcher, WatchContext};
use archgraph_core::{
    data_dir, load_engine_config, parse_workspaces_toml, BuildReport, GraphError, GraphStore, Result,
};
use archgraph_mcp::{handle_tool_call, run_mcp, ServerState};

// ---------------------------------------------------------------------------
// CLI definition (clap derive)
// ---------------------------------------------------------------------------

/// Ranked architectural call graphs from structural code profiles.
#[derive(Parser)]
#[command(name = "archgraph", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store root (default: $ARCHGRAPH_HOME or the platform data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or rebuild) workspace graphs from profile files
    Build {
        /// Workspace id
        #[arg(long)]
        workspace: Option<String>,

        /// Profile JSON to import before building (default: the stored profiles)
        #[arg(long, requires = "workspace")]
        profiles: Option<PathBuf>,

        /// Build every workspace declared in a workspaces TOML file
        #[arg(long, conflicts_with = "workspace")]
        config: Option<PathBuf>,
    },
    /// Most central nodes by category-weighted PageRank
    Rank {
        #[arg(long)]
        workspace: Option<String>,

        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Node and edge counts by kind, category and edge type
    Stats {
        #[arg(long)]
        workspace: Option<String>,
    },
    /// Run one graph query; prints JSON
    Query {
        #[arg(value_enum)]
        op: QueryOp,

        #[arg(long)]
        workspace: Option<String>,

        /// Query arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Serve the MCP tool surface on stdio
    Serve {
        /// Workspace to serve (repeatable; default: every stored workspace)
        #[arg(long = "workspace")]
        workspaces: Vec<String>,

        /// Import and serve the workspaces declared in a TOML file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Rebuild a workspace when its stored profiles change
        #[arg(long)]
        watch: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum QueryOp {
    Subgraph,
    Paths,
    Relatives,
    Neighbors,
    Score,
    Directories,
    Context,
    Details,
}

impl QueryOp {
    fn tool(self) -> &'static str {
        match self {
            QueryOp::Subgraph => "ag_extract_subgraph",
            QueryOp::Paths => "ag_find_paths",
            QueryOp::Relatives => "ag_find_relatives",
            QueryOp::Neighbors => "ag_get_neighbors",
            QueryOp::Score => "ag_evaluate_neighbors",
            QueryOp::Directories => "ag_list_directory_components",
            QueryOp::Context => "ag_call_context",
            QueryOp::Details => "ag_node_details",
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn store_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    flag.or_else(data_dir).ok_or_else(|| {
        GraphError::invalid("could not determine the store directory; pass --store or set ARCHGRAPH_HOME")
    })
}

/// The named workspace, or the only one in the store.
fn pick_workspace(store: &GraphStore, workspace: Option<String>) -> Result<String> {
    if let Some(ws) = workspace {
        return Ok(ws);
    }
    let available = store.list_workspaces()?;
    match available.as_slice() {
        [only] => Ok(only.clone()),
        [] => Err(GraphError::invalid(format!("no workspaces in {}", store.root().display()))),
        _ => Err(GraphError::invalid(format!(
            "several workspaces in the store, pass --workspace: {}",
            available.join(", ")
        ))),
    }
}

/// Import `profiles` if given, then rebuild through the cache so builds of
/// one workspace never overlap.
fn build_one(ctx: &WatchContext, workspace: &str, profiles: Option<&Path>) -> Result<BuildReport> {
    if let Some(source) = profiles {
        ctx.store.import_profiles(workspace, source)?;
    }
    rebuild_workspace(ctx, workspace)
}

/// Build every job in parallel, keeping job order in the result.
fn build_all(ctx: &WatchContext, jobs: &[(String, Option<PathBuf>)]) -> Vec<(String, Result<BuildReport>)> {
    jobs.par_iter()
        .map(|(ws, profiles)| (ws.clone(), build_one(ctx, ws, profiles.as_deref())))
        .collect()
}

/// Import and build the workspaces a manifest declares. Returns the ones
/// that built; failures are logged and left out. Fails only when nothing
/// built.
fn build_manifest(ctx: &WatchContext, path: &Path) -> Result<Vec<String>> {
    let jobs: Vec<(String, Option<PathBuf>)> =
        parse_workspaces_toml(path)?.into_iter().map(|(ws, p)| (ws, Some(p))).collect();
    let mut built = Vec::with_capacity(jobs.len());
    let mut failed = Vec::new();
    for (ws, outcome) in build_all(ctx, &jobs) {
        match outcome {
            Ok(_) => built.push(ws),
            Err(e) => {
                error!(workspace = ws.as_str(), error = %e, "Build failed, not serving workspace");
                failed.push(ws);
            }
        }
    }
    if built.is_empty() && !failed.is_empty() {
        return Err(GraphError::invalid(format!(
            "no workspace in {} could be built: {}",
            path.display(),
            failed.join(", ")
        )));
    }
    Ok(built)
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn cmd_build(ctx: &WatchContext, jobs: Vec<(String, Option<PathBuf>)>, as_json: bool) -> Result<()> {
    let results = build_all(ctx, &jobs);

    let mut failed = 0usize;
    let mut out = Vec::with_capacity(results.len());
    for (ws, outcome) in results {
        match outcome {
            Ok(report) => {
                if !as_json {
                    println!(
                        "{ws}: {} nodes, {} edges, {} unresolved ({} of {} records skipped, {} filtered)",
                        report.nodes, report.edges, report.unresolved, report.skipped, report.total, report.filtered
                    );
                }
                out.push(json!({ "workspace": ws, "report": serde_json::to_value(&report)? }));
            }
            Err(e) => {
                failed += 1;
                error!(workspace = ws.as_str(), error = %e, "Build failed");
                out.push(json!({ "workspace": ws, "error": e.to_string(), "code": e.code() }));
            }
        }
    }
    if as_json {
        println!("{:#}", Value::Array(out));
    }
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_rank(state: &ServerState, workspace: &str, limit: usize, as_json: bool) -> Result<()> {
    let graph = state.cache.get(workspace)?;
    let limit = state.config.limits.rank_limit.resolve("limit", Some(limit))?;
    let ranked = top_ranked(&graph, &state.config.rank, limit);
    if as_json {
        println!("{:#}", serde_json::to_value(&ranked)?);
        return Ok(());
    }
    for (i, node) in ranked.iter().enumerate() {
        println!("{:>3}. {:<70} {:>10.6}  {}", i + 1, node.id, node.score, node.category.label());
    }
    Ok(())
}

fn cmd_stats(state: &ServerState, workspace: &str, as_json: bool) -> Result<()> {
    let graph = state.cache.get(workspace)?;
    let stats = graph_stats(&graph);
    if as_json {
        println!("{:#}", serde_json::to_value(&stats)?);
        return Ok(());
    }
    println!("Workspace:  {workspace}");
    println!("Nodes:      {}", stats.node_count);
    println!("Edges:      {}", stats.edge_count);
    println!("Unresolved: {}", stats.unresolved_calls);
    println!("\nBy kind:");
    for (kind, n) in &stats.by_kind {
        println!("  {:<16} {n}", kind.label());
    }
    println!("\nBy category:");
    for (category, n) in &stats.by_category {
        println!("  {:<16} {n}", category.label());
    }
    println!("\nBy edge type:");
    for (edge_type, n) in &stats.by_edge_type {
        println!("  {:<16} {n}", edge_type.label());
    }
    Ok(())
}

fn cmd_query(state: &ServerState, op: QueryOp, workspace: String, args: &str) -> Result<()> {
    let mut args: Value = serde_json::from_str(args)
        .map_err(|e| GraphError::invalid(format!("--args is not valid JSON: {e}")))?;
    let Some(map) = args.as_object_mut() else {
        return Err(GraphError::invalid("--args must be a JSON object"));
    };
    map.insert("workspace".to_string(), Value::String(workspace));

    let (text, is_error) = handle_tool_call(state, op.tool(), &args);
    if is_error {
        error!(tool = op.tool(), "{text}");
        std::process::exit(1);
    }
    println!("{text}");
    Ok(())
}

fn cmd_serve(mut state: ServerState, mut workspaces: Vec<String>, manifest: Option<PathBuf>, watch: bool) -> Result<()> {
    let ctx = state.watch_context();

    // Workspaces from a manifest get fresh profiles, so their persisted graphs
    // are stale and are rebuilt rather than loaded.
    if let Some(path) = manifest {
        workspaces.extend(build_manifest(&ctx, &path)?);
    }
    if workspaces.is_empty() {
        workspaces = state.store.list_workspaces()?;
    }
    workspaces.sort();
    workspaces.dedup();

    if workspaces.len() == 1 {
        state.default_workspace = workspaces.first().cloned();
    }
    let failures = state.cache.warm(&workspaces);
    info!(
        workspaces = workspaces.len(),
        failed = failures.len(),
        store = %state.store.root().display(),
        "Workspaces loaded"
    );

    let _watcher = if watch { start_watcher(ctx, &workspaces) } else { None };
    run_mcp(&state);
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn init_tracing() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "archgraph=info".parse() {
        filter = filter.add_directive(directive);
    }
    // Logs go to stderr; stdout carries command output and JSON-RPC.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let root = store_root(cli.store)?;
    let store = GraphStore::new(&root);
    let config = Arc::new(load_engine_config(&root));

    match cli.command {
        Commands::Build { workspace, profiles, config: manifest } => {
            let jobs = match (manifest, workspace) {
                (Some(path), _) => parse_workspaces_toml(&path)?
                    .into_iter()
                    .map(|(ws, p)| (ws, Some(p)))
                    .collect(),
                (None, Some(ws)) => vec![(ws, profiles)],
                (None, None) => return Err(GraphError::invalid("pass --workspace or --config")),
            };
            let state = ServerState::new(store, config, None);
            cmd_build(&state.watch_context(), jobs, cli.json)
        }
        Commands::Rank { workspace, limit } => {
            let workspace = pick_workspace(&store, workspace)?;
            cmd_rank(&ServerState::new(store, config, None), &workspace, limit, cli.json)
        }
        Commands::Stats { workspace } => {
            let workspace = pick_workspace(&store, workspace)?;
            cmd_stats(&ServerState::new(store, config, None), &workspace, cli.json)
        }
        Commands::Query { op, workspace, args } => {
            let workspace = pick_workspace(&store, workspace)?;
            cmd_query(&ServerState::new(store, config, None), op, workspace, &args)
        }
        Commands::Serve { workspaces, config: manifest, watch } => {
            cmd_serve(ServerState::new(store, config, None), workspaces, manifest, watch)
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "archgraph", &mut std::io::stdout());
        return;
    }

    if let Err(e) = run(cli) {
        error!(code = e.code(), "{e}");
        std::process::exit(1);
    }
}
