//! Call graph builder: turns a batch of structural profiles into a weighted
//! multi-graph of CALLS, USES and CONTAINS edges.
//!
//! Pipeline: decode and validate records, drop noisy profiles, index aliases,
//! classify nodes, add containment edges, then resolve every raw call. A call
//! matching several aliases fans out to every candidate; a call matching none
//! becomes an edge to a synthetic `external::<call>` node. A call whose
//! target is a class becomes a USES edge marked as an instantiation.

use crate::alias::{sanitize_call, AliasIndex};
use crate::classify::{path_segments, ClassifyInput, Classifier};
use crate::config::{EngineConfig, NoiseRules};
use crate::error::{BuildReport, GraphError, Result};
use crate::graph::CodeGraph;
use crate::types::{display_label, Category, Edge, EdgeType, GraphNode, NodeKind, ProfileInput, UseKind};
use crate::weight::EdgeWeightModel;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Profile decoding
// ---------------------------------------------------------------------------

/// Validated profiles plus counts of what was dropped on the way in.
#[derive(Debug, Clone, Default)]
pub struct ProfileBatch {
    pub profiles: Vec<ProfileInput>,
    pub total: usize,
    pub skipped: usize,
}

fn validate_profile(profile: &ProfileInput) -> std::result::Result<(), &'static str> {
    if profile.id.trim().is_empty() {
        return Err("empty id");
    }
    if profile.file_path.trim().is_empty() {
        return Err("empty file_path");
    }
    if profile.kind == NodeKind::ExternalCall {
        return Err("external_call is not a profile kind");
    }
    Ok(())
}

impl ProfileBatch {
    /// Keep only well-formed profiles with unique ids; count the rest.
    pub fn from_profiles(profiles: Vec<ProfileInput>) -> Self {
        let total = profiles.len();
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(total);
        for (index, profile) in profiles.into_iter().enumerate() {
            if let Err(reason) = validate_profile(&profile) {
                debug!(index, reason, "Skipping malformed profile");
                continue;
            }
            if !seen.insert(profile.id.clone()) {
                debug!(index, id = profile.id.as_str(), "Skipping duplicate profile id");
                continue;
            }
            kept.push(profile);
        }
        let skipped = total - kept.len();
        ProfileBatch { profiles: kept, total, skipped }
    }

    /// Decode a JSON array of profile records (or `{"profiles": [...]}`).
    /// Individual records that fail to decode are skipped, not fatal.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let records = match value {
            serde_json::Value::Array(records) => records,
            serde_json::Value::Object(mut map) => match map.remove("profiles") {
                Some(serde_json::Value::Array(records)) => records,
                _ => {
                    return Err(GraphError::Serialization(
                        "expected a 'profiles' array".to_string(),
                    ))
                }
            },
            _ => {
                return Err(GraphError::Serialization(
                    "expected a JSON array of profiles".to_string(),
                ))
            }
        };
        let total = records.len();
        let mut decoded = Vec::with_capacity(total);
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<ProfileInput>(record) {
                Ok(p) => decoded.push(p),
                Err(e) => debug!(index, error = %e, "Skipping undecodable profile"),
            }
        }
        let undecodable = total - decoded.len();
        let mut batch = ProfileBatch::from_profiles(decoded);
        batch.total = total;
        batch.skipped += undecodable;
        Ok(batch)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_json(serde_json::from_str(text)?)
    }
}

impl From<Vec<ProfileInput>> for ProfileBatch {
    fn from(profiles: Vec<ProfileInput>) -> Self {
        ProfileBatch::from_profiles(profiles)
    }
}

// ---------------------------------------------------------------------------
// Noise heuristics
// ---------------------------------------------------------------------------

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn tokens_of(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(['_', '-', '.', '/'])
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn has_noise_token(value: &str, rules: &NoiseRules) -> bool {
    tokens_of(value).any(|t| rules.noise_keywords.iter().any(|k| *k == t))
}

/// Profiles excluded from the graph entirely: package-init files, dunder
/// methods, and classes/functions living in or named after helper modules.
pub fn is_noisy_profile(profile: &ProfileInput, rules: &NoiseRules) -> bool {
    let normalized = profile.file_path.replace('\\', "/");
    if normalized.ends_with("__init__.py") {
        return true;
    }
    if profile.kind == NodeKind::File {
        return false;
    }

    let function = profile.function_name.as_deref().unwrap_or("");
    let class = profile.class_name.as_deref().unwrap_or("");
    if is_dunder(function) || is_dunder(class) {
        return true;
    }

    path_segments(&normalized).iter().any(|seg| has_noise_token(seg, rules))
        || has_noise_token(function, rules)
        || has_noise_token(class, rules)
}

/// Last `.`/`::` component of a call, argument list dropped.
fn call_token(call: &str) -> &str {
    let head = call.split('(').next().unwrap_or(call);
    let token = head.rsplit('.').next().unwrap_or(head);
    token.rsplit("::").next().unwrap_or(token)
}

/// Calls dropped before resolution.
pub fn is_noisy_call(call: &str, rules: &NoiseRules) -> bool {
    let lower = call.to_ascii_lowercase();

    if is_dunder(call_token(call)) {
        return true;
    }
    if lower.starts_with("super(") || lower.starts_with("super().") || lower.starts_with("super::") {
        return true;
    }
    if rules.noise_keywords.iter().any(|k| lower.contains(k.as_str())) {
        return true;
    }
    rules.third_party_prefixes.iter().any(|prefix| {
        lower
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with("::"))
    })
}

/// Unresolved calls that should not even produce an external node.
pub fn is_noisy_external_call(call: &str, rules: &NoiseRules) -> bool {
    is_noisy_call(call, rules) || is_dunder(call)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub graph: CodeGraph,
    pub report: BuildReport,
}

fn profile_node(profile: &ProfileInput, category: Category) -> GraphNode {
    GraphNode {
        id: profile.id.clone(),
        kind: profile.kind,
        label: display_label(
            &profile.id,
            Some(&profile.file_path),
            profile.function_name.as_deref(),
            profile.class_name.as_deref(),
        ),
        category,
        file_path: Some(profile.file_path.clone()),
        function_name: profile.function_name.clone(),
        class_name: profile.class_name.clone(),
        start_line: profile.start_line,
        end_line: profile.end_line,
        docstring: profile.docstring.clone(),
        parent_id: profile.parent_id.clone(),
    }
}

fn push_weighted(graph: &mut CodeGraph, model: &EdgeWeightModel<'_>, mut edge: Edge) -> Result<()> {
    if let (Some(source), Some(target)) = (graph.node(&edge.source), graph.node(&edge.target)) {
        edge.weight = model.weight(source, target, &edge);
    }
    graph.push_edge(edge)
}

/// Build the call graph for one workspace. Fails with `BuildFailure` when the
/// batch has nothing usable left after validation and noise filtering.
pub fn build_call_graph(
    workspace: &str,
    batch: &ProfileBatch,
    config: &EngineConfig,
) -> Result<BuildOutput> {
    let start = Instant::now();
    let mut report = BuildReport { total: batch.total, skipped: batch.skipped, ..Default::default() };

    let fail = |reason: &str, report: BuildReport| GraphError::BuildFailure {
        workspace: workspace.to_string(),
        reason: reason.to_string(),
        report,
    };
    if batch.total == 0 {
        return Err(fail("empty profile batch", report));
    }
    if batch.profiles.is_empty() {
        return Err(fail("no well-formed profiles", report));
    }

    let kept: Vec<&ProfileInput> =
        batch.profiles.iter().filter(|p| !is_noisy_profile(p, &config.noise)).collect();
    report.filtered = batch.profiles.len() - kept.len();
    if kept.is_empty() {
        return Err(fail("every profile was filtered as noise", report));
    }

    let aliases = AliasIndex::build(kept.iter().copied());
    debug!(
        workspace,
        aliases = aliases.len(),
        ambiguous = aliases.ambiguous().count(),
        "Alias index built"
    );

    let classifier = Classifier::new(&config.classifier);
    let categories: Vec<Category> = kept
        .par_iter()
        .map(|p| classifier.classify(&ClassifyInput::from_profile(p)))
        .collect();

    let mut graph = CodeGraph::new();
    for (profile, category) in kept.iter().zip(&categories) {
        graph.add_node(profile_node(profile, *category));
    }

    let model = EdgeWeightModel::new(&config.weights);
    let by_id: HashMap<&str, &ProfileInput> = kept.iter().map(|p| (p.id.as_str(), *p)).collect();

    // Structural containment
    for profile in &kept {
        let mut seen = HashSet::new();
        for child_id in &profile.children {
            if child_id == &profile.id || !seen.insert(child_id.as_str()) {
                continue;
            }
            let Some(child) = by_id.get(child_id.as_str()) else { continue };
            let mut edge = Edge::new(&profile.id, child_id, EdgeType::Contains);
            edge.child_kind = Some(child.kind);
            edge.line = child.start_line;
            push_weighted(&mut graph, &model, edge)?;
        }
    }

    // Call resolution
    let mut noisy_calls = 0usize;
    for profile in &kept {
        let mut seen = HashSet::new();
        for raw in &profile.calls {
            let call = sanitize_call(raw);
            if call.is_empty() || is_noisy_call(&call, &config.noise) {
                noisy_calls += 1;
                continue;
            }
            if !seen.insert(call.clone()) {
                continue;
            }

            let candidates = aliases.resolve(&call);
            if !candidates.is_empty() {
                for target in candidates {
                    // Calling a class constructs it: that is a use, not a call.
                    let instantiates = by_id.get(target).is_some_and(|t| t.kind == NodeKind::Class);
                    let mut edge = if instantiates {
                        let mut edge = Edge::new(&profile.id, target, EdgeType::Uses);
                        edge.use_kind = Some(UseKind::Instantiation);
                        edge
                    } else {
                        Edge::new(&profile.id, target, EdgeType::Calls)
                    };
                    edge.call_expression = call.clone();
                    push_weighted(&mut graph, &model, edge)?;
                }
                continue;
            }

            if is_noisy_external_call(&call, &config.noise) {
                noisy_calls += 1;
                continue;
            }
            graph.record_unresolved(&call);
            let external = GraphNode::external(&call);
            let external_id = external.id.clone();
            graph.add_node(external);
            let mut edge = Edge::new(&profile.id, &external_id, EdgeType::Calls);
            edge.call_expression = call;
            edge.resolved = false;
            push_weighted(&mut graph, &model, edge)?;
        }
    }

    report.nodes = graph.node_count();
    report.edges = graph.edge_count();
    report.unresolved = graph.unresolved_calls().len();

    info!(
        workspace,
        nodes = report.nodes,
        edges = report.edges,
        unresolved = report.unresolved,
        skipped = report.skipped,
        filtered = report.filtered,
        noisy_calls,
        time_ms = start.elapsed().as_millis() as u64,
        "Call graph built"
    );

    Ok(BuildOutput { graph, report })
}
