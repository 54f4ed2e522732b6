//! Engine configuration: classifier keyword tables, noise rules, edge weight
//! tables, PageRank parameters, and query bounds.
//!
//! Everything here is plain data built once at startup and passed explicitly
//! into the classifier, builder, weight model, ranker, and query toolkit.
//! Defaults can be extended or overridden from an `archgraph.toml` file.

use crate::error::{GraphError, Result};
use crate::types::Category;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// Keyword-set categories in the order they are tried. First match wins.
pub const KEYWORD_ORDER: [Category; 8] = [
    Category::Utility,
    Category::Infrastructure,
    Category::Controller,
    Category::Service,
    Category::Model,
    Category::DataPipeline,
    Category::Integration,
    Category::Sdk,
];

const ROOT_CATEGORIES: &[(&str, Category)] = &[
    ("adapters", Category::Integration),
    ("adapter", Category::Integration),
    ("apis", Category::Controller),
    ("api", Category::Controller),
    ("apps", Category::Controller),
    ("clients", Category::Sdk),
    ("client", Category::Sdk),
    ("common", Category::Utility),
    ("configs", Category::Infrastructure),
    ("config", Category::Infrastructure),
    ("controller", Category::Controller),
    ("controllers", Category::Controller),
    ("dto", Category::Model),
    ("entities", Category::Model),
    ("entity", Category::Model),
    ("fixtures", Category::Test),
    ("helpers", Category::Utility),
    ("helper", Category::Utility),
    ("infra", Category::Infrastructure),
    ("infrastructure", Category::Infrastructure),
    ("integration", Category::Integration),
    ("integrations", Category::Integration),
    ("jobs", Category::Infrastructure),
    ("lib", Category::Utility),
    ("libs", Category::Utility),
    ("model", Category::Model),
    ("models", Category::Model),
    ("ops", Category::Infrastructure),
    ("pipeline", Category::DataPipeline),
    ("pipelines", Category::DataPipeline),
    ("plugin", Category::Integration),
    ("plugins", Category::Integration),
    ("providers", Category::Integration),
    ("provider", Category::Integration),
    ("routes", Category::Controller),
    ("router", Category::Controller),
    ("routers", Category::Controller),
    ("schemas", Category::Model),
    ("schema", Category::Model),
    ("sdk", Category::Sdk),
    ("service", Category::Service),
    ("services", Category::Service),
    ("shared", Category::Utility),
    ("scripts", Category::Utility),
    ("script", Category::Utility),
    ("tasks", Category::Infrastructure),
    ("tooling", Category::Utility),
    ("tools", Category::Utility),
    ("utils", Category::Utility),
    ("utility", Category::Utility),
    ("views", Category::Controller),
    ("workflows", Category::Service),
    ("workflow", Category::Service),
];

const UTILITY_KEYWORDS: &[&str] = &[
    "util", "utils", "helper", "helpers", "common", "shared", "base", "bases", "mixins",
    "constants", "types", "tool", "toolbox",
];

const INFRASTRUCTURE_KEYWORDS: &[&str] = &[
    "config", "configs", "setting", "settings", "constant", "constants", "credential",
    "credentials", "secret", "secrets", "env", "environment", "logging", "logger", "metrics",
    "monitor", "monitoring", "db", "database", "databases", "migrations", "registry",
    "management", "permission", "permissions", "auth", "authentication", "authorization",
    "scheduler", "schedulers", "task", "tasks", "celery", "cron", "email", "notification",
    "notifications",
];

const CONTROLLER_KEYWORDS: &[&str] = &[
    "controller", "controllers", "router", "routers", "route", "routes", "view", "views",
    "endpoint", "endpoints", "api",
];

const SERVICE_KEYWORDS: &[&str] = &[
    "service", "services", "usecase", "use_case", "usecases", "workflow", "workflows",
    "manager", "managers", "orchestrator", "orchestrators", "handler", "handlers", "processor",
    "processors",
];

const MODEL_KEYWORDS: &[&str] = &[
    "model", "models", "entity", "entities", "schema", "schemas", "dto", "document", "documents",
    "record", "records", "serializer", "serializers",
];

const PIPELINE_KEYWORDS: &[&str] = &[
    "pipeline", "pipelines", "ingest", "ingestion", "indexer", "indexing", "retriever",
    "retrieval", "etl", "extract", "loader", "loaders", "transform", "transforms", "batch",
    "stream",
];

const INTEGRATION_KEYWORDS: &[&str] = &[
    "integration", "intergration", "connector", "connectors", "adapter", "adapters", "webhook",
    "webhooks", "plugin", "plugins", "thirdparty", "third_party", "provider", "providers",
];

const SDK_KEYWORDS: &[&str] = &["sdk", "client", "clients", "api_client"];

const TEST_KEYWORDS: &[&str] = &["test", "tests", "testing", "fixture", "fixtures"];

const SERVICE_SUFFIXES: &[&str] =
    &["service", "manager", "workflow", "handler", "processor", "orchestrator", "usecase"];
const CONTROLLER_SUFFIXES: &[&str] = &["controller", "router", "endpoint", "view"];
const MODEL_SUFFIXES: &[&str] = &["model", "entity", "schema", "record", "document", "dto"];
const INTEGRATION_SUFFIXES: &[&str] = &["connector", "adapter", "integration", "hook", "provider"];
const SDK_SUFFIXES: &[&str] = &["client", "sdk"];

const NOISE_KEYWORDS: &[&str] = &["utils", "helper", "helpers"];

const THIRD_PARTY_PREFIXES: &[&str] = &[
    "aiohttp", "anthropic", "asyncio", "azure", "boto3", "botocore", "celery", "chromadb",
    "click", "cv2", "fastapi", "google", "httpx", "jinja2", "langchain", "langgraph", "milvus",
    "numpy", "openai", "opensearch", "pandas", "pillow", "pinecone", "psycopg", "pydantic",
    "redis", "requests", "rich", "scipy", "sentry_sdk", "sklearn", "sqlalchemy", "sqlmodel",
    "supabase", "tensorflow", "torch", "transformers", "typer", "uvicorn", "weaviate",
];

const LOGGING_PREFIXES: &[&str] = &[
    "logger.", "logging.", "log.", "metrics.", "statsd.", "sentry.", "sentry_sdk.", "tracer.",
    "tracing.", "telemetry.", "prometheus.",
];
const LOGGING_SUFFIXES: &[&str] = &[
    ".debug", ".info", ".warning", ".warn", ".error", ".exception", ".critical", ".trace", ".log",
];
const LOGGING_NAMES: &[&str] = &["print", "pprint", "log", "debug"];

fn string_set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn string_vec(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Classifier tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClassifierTables {
    /// First path segment -> category.
    pub root_categories: BTreeMap<String, Category>,
    /// Keyword sets for the categories in [`KEYWORD_ORDER`].
    pub keywords: BTreeMap<Category, BTreeSet<String>>,
    /// Name suffixes (`UserService` -> `service`) per category.
    pub name_suffixes: BTreeMap<Category, Vec<String>>,
    pub test_keywords: BTreeSet<String>,
}

impl Default for ClassifierTables {
    fn default() -> Self {
        let keywords = BTreeMap::from([
            (Category::Utility, string_set(UTILITY_KEYWORDS)),
            (Category::Infrastructure, string_set(INFRASTRUCTURE_KEYWORDS)),
            (Category::Controller, string_set(CONTROLLER_KEYWORDS)),
            (Category::Service, string_set(SERVICE_KEYWORDS)),
            (Category::Model, string_set(MODEL_KEYWORDS)),
            (Category::DataPipeline, string_set(PIPELINE_KEYWORDS)),
            (Category::Integration, string_set(INTEGRATION_KEYWORDS)),
            (Category::Sdk, string_set(SDK_KEYWORDS)),
        ]);
        let name_suffixes = BTreeMap::from([
            (Category::Controller, string_vec(CONTROLLER_SUFFIXES)),
            (Category::Service, string_vec(SERVICE_SUFFIXES)),
            (Category::Model, string_vec(MODEL_SUFFIXES)),
            (Category::Integration, string_vec(INTEGRATION_SUFFIXES)),
            (Category::Sdk, string_vec(SDK_SUFFIXES)),
        ]);
        ClassifierTables {
            root_categories: ROOT_CATEGORIES
                .iter()
                .map(|(root, cat)| (root.to_string(), *cat))
                .collect(),
            keywords,
            name_suffixes,
            test_keywords: string_set(TEST_KEYWORDS),
        }
    }
}

// ---------------------------------------------------------------------------
// Noise rules (builder)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NoiseRules {
    /// Tokens that mark helper modules; matching profiles and calls are dropped.
    pub noise_keywords: Vec<String>,
    /// Receivers of well-known third-party packages (`numpy.`, `redis::`).
    pub third_party_prefixes: BTreeSet<String>,
}

impl Default for NoiseRules {
    fn default() -> Self {
        NoiseRules {
            noise_keywords: string_vec(NOISE_KEYWORDS),
            third_party_prefixes: string_set(THIRD_PARTY_PREFIXES),
        }
    }
}

// ---------------------------------------------------------------------------
// Edge weight tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WeightTables {
    /// Base weight keyed by the callee's category.
    pub category_weight: BTreeMap<Category, f64>,
    /// Multiplier keyed by the caller's category (missing = 1.0).
    pub source_modifier: BTreeMap<Category, f64>,
    /// Ceiling for calls into file-kind nodes.
    pub file_cap: f64,
    /// Ceiling for logging/metrics/tracing calls. Must stay below `file_cap`.
    pub logging_cap: f64,
    pub logging_prefixes: Vec<String>,
    pub logging_suffixes: Vec<String>,
    pub logging_names: BTreeSet<String>,
}

impl Default for WeightTables {
    fn default() -> Self {
        WeightTables {
            category_weight: BTreeMap::from([
                (Category::Service, 1.0),
                (Category::Controller, 0.95),
                (Category::Model, 0.8),
                (Category::DataPipeline, 0.7),
                (Category::Implementation, 0.6),
                (Category::Unknown, 0.6),
                (Category::Integration, 0.5),
                (Category::Sdk, 0.45),
                (Category::Infrastructure, 0.35),
                (Category::Utility, 0.2),
                (Category::External, 0.1),
                (Category::Test, 0.0),
            ]),
            source_modifier: BTreeMap::from([
                (Category::Controller, 1.2),
                (Category::Service, 1.1),
                (Category::Infrastructure, 0.7),
                (Category::Utility, 0.6),
            ]),
            file_cap: 0.25,
            logging_cap: 0.02,
            logging_prefixes: string_vec(LOGGING_PREFIXES),
            logging_suffixes: string_vec(LOGGING_SUFFIXES),
            logging_names: string_set(LOGGING_NAMES),
        }
    }
}

// ---------------------------------------------------------------------------
// PageRank parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    /// Convergence threshold on the summed absolute rank delta.
    pub tolerance: f64,
    pub category_multiplier: BTreeMap<Category, f64>,
}

impl Default for RankConfig {
    fn default() -> Self {
        RankConfig {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1.0e-6,
            category_multiplier: BTreeMap::from([
                (Category::Service, 4.0),
                (Category::Controller, 3.5),
                (Category::Model, 2.2),
                (Category::DataPipeline, 0.65),
                (Category::Integration, 0.5),
                (Category::Sdk, 0.5),
                (Category::Utility, 0.35),
                (Category::Infrastructure, 0.4),
                (Category::Test, 0.0),
                (Category::External, 0.0),
                (Category::Implementation, 1.0),
                (Category::Unknown, 1.0),
            ]),
        }
    }
}

impl RankConfig {
    pub fn multiplier(&self, category: Category) -> f64 {
        self.category_multiplier.get(&category).copied().unwrap_or(1.0)
    }
}

// ---------------------------------------------------------------------------
// Query bounds
// ---------------------------------------------------------------------------

/// Inclusive range plus default for one caller-supplied bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    pub default: usize,
    pub min: usize,
    pub max: usize,
}

impl Bound {
    pub const fn new(default: usize, min: usize, max: usize) -> Self {
        Bound { default, min, max }
    }

    /// Validate `value` (or the default) against the range. Out-of-range
    /// values are rejected, never clamped.
    pub fn resolve(&self, name: &str, value: Option<usize>) -> Result<usize> {
        let v = value.unwrap_or(self.default);
        if v < self.min || v > self.max {
            return Err(GraphError::invalid(format!(
                "{name} must be between {} and {}, got {v}",
                self.min, self.max
            )));
        }
        Ok(v)
    }

    fn with_max(self, max: usize) -> Self {
        let max = max.max(self.min);
        Bound { default: self.default.min(max), min: self.min, max }
    }
}

#[derive(Debug, Clone)]
pub struct QueryLimits {
    pub subgraph_depth: Bound,
    pub subgraph_nodes: Bound,
    pub path_depth: Bound,
    pub paths_per_start: Bound,
    pub relative_depth: Bound,
    pub max_relatives: Bound,
    pub neighbor_limit: Bound,
    pub directory_limit: Bound,
    pub nodes_per_directory: Bound,
    pub directory_depth: Bound,
    pub rank_limit: Bound,
    pub context_limit: Bound,
    pub detail_nodes: Bound,
    /// Ids a single query accepts in one list argument.
    pub ids_per_call: Bound,
}

impl Default for QueryLimits {
    fn default() -> Self {
        QueryLimits {
            subgraph_depth: Bound::new(2, 1, 5),
            subgraph_nodes: Bound::new(30, 1, 100),
            path_depth: Bound::new(8, 1, 20),
            paths_per_start: Bound::new(25, 1, 200),
            relative_depth: Bound::new(5, 1, 15),
            max_relatives: Bound::new(50, 1, 500),
            neighbor_limit: Bound::new(25, 1, 500),
            directory_limit: Bound::new(20, 1, 100),
            nodes_per_directory: Bound::new(5, 1, 20),
            directory_depth: Bound::new(1, 1, 5),
            rank_limit: Bound::new(10, 1, 1000),
            context_limit: Bound::new(20, 1, 200),
            detail_nodes: Bound::new(10, 1, 50),
            ids_per_call: Bound::new(50, 1, 100),
        }
    }
}

impl QueryLimits {
    fn bound_mut(&mut self, name: &str) -> Option<&mut Bound> {
        Some(match name {
            "subgraph_depth" => &mut self.subgraph_depth,
            "subgraph_nodes" => &mut self.subgraph_nodes,
            "path_depth" => &mut self.path_depth,
            "paths_per_start" => &mut self.paths_per_start,
            "relative_depth" => &mut self.relative_depth,
            "max_relatives" => &mut self.max_relatives,
            "neighbor_limit" => &mut self.neighbor_limit,
            "directory_limit" => &mut self.directory_limit,
            "nodes_per_directory" => &mut self.nodes_per_directory,
            "directory_depth" => &mut self.directory_depth,
            "rank_limit" => &mut self.rank_limit,
            "context_limit" => &mut self.context_limit,
            "detail_nodes" => &mut self.detail_nodes,
            "ids_per_call" => &mut self.ids_per_call,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub classifier: ClassifierTables,
    pub noise: NoiseRules,
    pub weights: WeightTables,
    pub rank: RankConfig,
    pub limits: QueryLimits,
    /// Per-tool-call deadline used by the stdio server.
    pub query_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            classifier: ClassifierTables::default(),
            noise: NoiseRules::default(),
            weights: WeightTables::default(),
            rank: RankConfig::default(),
            limits: QueryLimits::default(),
            query_timeout_ms: 10_000,
        }
    }
}

/// Name of the optional config file at the store root.
pub const CONFIG_FILE_NAME: &str = "archgraph.toml";

/// Known top-level keys in `archgraph.toml`.
const KNOWN_CONFIG_KEYS: &[&str] = &["classifier", "weights", "rank", "limits", "query_timeout_ms"];

/// Edits (insert, delete, substitute) needed to turn `a` into `b`.
fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb { diag } else { 1 + diag.min(above).min(row[j]) };
            diag = above;
        }
    }
    row[b.len()]
}

/// The known key a misspelt `key` most likely meant, within three edits.
fn suggest_key<'k>(key: &str, known: &[&'k str]) -> Option<&'k str> {
    known
        .iter()
        .map(|k| (levenshtein(key, k), *k))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, k)| k)
}

fn warn_unknown_keys(table: &toml::Table, known: &[&str], section: &str) {
    for key in table.keys().filter(|k| !known.contains(&k.as_str())) {
        match suggest_key(key, known) {
            Some(s) => warn!(
                key = key.as_str(),
                section,
                suggestion = s,
                "Unknown key in {CONFIG_FILE_NAME}, did you mean '{s}'?"
            ),
            None => warn!(
                key = key.as_str(),
                section,
                "Unknown key in {CONFIG_FILE_NAME} (known keys: {})",
                known.join(", ")
            ),
        }
    }
}

fn as_f64(value: &toml::Value) -> Option<f64> {
    value.as_float().or_else(|| value.as_integer().map(|i| i as f64))
}

fn string_list(value: &toml::Value) -> Vec<String> {
    value
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str().map(|s| s.to_ascii_lowercase())).collect())
        .unwrap_or_default()
}

fn category_key(key: &str, section: &str) -> Option<Category> {
    let cat = Category::parse(key);
    if cat.is_none() {
        warn!(key, section, "Unknown category in {CONFIG_FILE_NAME}");
    }
    cat
}

fn merge_category_floats(target: &mut BTreeMap<Category, f64>, value: &toml::Value, section: &str) {
    let Some(table) = value.as_table() else { return };
    for (key, v) in table {
        let (Some(cat), Some(f)) = (category_key(key, section), as_f64(v)) else { continue };
        if f.is_finite() && f >= 0.0 {
            target.insert(cat, f);
        } else {
            warn!(key = key.as_str(), section, "Ignoring negative or non-finite value");
        }
    }
}

impl EngineConfig {
    /// Apply overrides from a parsed `archgraph.toml` table. List-valued
    /// keys extend the defaults; scalar and table entries replace them.
    pub fn apply_table(&mut self, table: &toml::Table) {
        warn_unknown_keys(table, KNOWN_CONFIG_KEYS, "root");

        if let Some(classifier) = table.get("classifier").and_then(|v| v.as_table()) {
            warn_unknown_keys(
                classifier,
                &["root_categories", "keywords", "name_suffixes", "noise_keywords", "third_party_prefixes"],
                "classifier",
            );
            if let Some(roots) = classifier.get("root_categories").and_then(|v| v.as_table()) {
                for (root, v) in roots {
                    if let Some(cat) = v.as_str().and_then(|s| category_key(s, "classifier")) {
                        self.classifier.root_categories.insert(root.to_ascii_lowercase(), cat);
                    }
                }
            }
            if let Some(keywords) = classifier.get("keywords").and_then(|v| v.as_table()) {
                for (key, v) in keywords {
                    match category_key(key, "classifier.keywords") {
                        Some(Category::Test) => self.classifier.test_keywords.extend(string_list(v)),
                        Some(cat) if KEYWORD_ORDER.contains(&cat) => {
                            self.classifier.keywords.entry(cat).or_default().extend(string_list(v));
                        }
                        Some(cat) => {
                            warn!(category = cat.label(), "Category has no keyword set, ignoring");
                        }
                        None => {}
                    }
                }
            }
            if let Some(suffixes) = classifier.get("name_suffixes").and_then(|v| v.as_table()) {
                for (key, v) in suffixes {
                    if let Some(cat) = category_key(key, "classifier.name_suffixes") {
                        self.classifier.name_suffixes.entry(cat).or_default().extend(string_list(v));
                    }
                }
            }
            if let Some(v) = classifier.get("noise_keywords") {
                self.noise.noise_keywords.extend(string_list(v));
            }
            if let Some(v) = classifier.get("third_party_prefixes") {
                self.noise.third_party_prefixes.extend(string_list(v));
            }
        }

        if let Some(weights) = table.get("weights").and_then(|v| v.as_table()) {
            warn_unknown_keys(
                weights,
                &["category_weight", "source_modifier", "file_cap", "logging_cap", "logging_prefixes", "logging_suffixes", "logging_names"],
                "weights",
            );
            if let Some(v) = weights.get("category_weight") {
                merge_category_floats(&mut self.weights.category_weight, v, "weights.category_weight");
            }
            if let Some(v) = weights.get("source_modifier") {
                merge_category_floats(&mut self.weights.source_modifier, v, "weights.source_modifier");
            }
            if let Some(cap) = weights.get("file_cap").and_then(as_f64) {
                self.weights.file_cap = cap.max(0.0);
            }
            if let Some(cap) = weights.get("logging_cap").and_then(as_f64) {
                self.weights.logging_cap = cap.max(0.0);
            }
            if let Some(v) = weights.get("logging_prefixes") {
                self.weights.logging_prefixes.extend(string_list(v));
            }
            if let Some(v) = weights.get("logging_suffixes") {
                self.weights.logging_suffixes.extend(string_list(v));
            }
            if let Some(v) = weights.get("logging_names") {
                self.weights.logging_names.extend(string_list(v));
            }
            if self.weights.logging_cap > self.weights.file_cap {
                warn!(
                    logging_cap = self.weights.logging_cap,
                    file_cap = self.weights.file_cap,
                    "logging_cap above file_cap, lowering it to file_cap"
                );
                self.weights.logging_cap = self.weights.file_cap;
            }
        }

        if let Some(rank) = table.get("rank").and_then(|v| v.as_table()) {
            warn_unknown_keys(rank, &["damping", "max_iterations", "tolerance", "category_multiplier"], "rank");
            if let Some(d) = rank.get("damping").and_then(as_f64) {
                if (0.0..1.0).contains(&d) {
                    self.rank.damping = d;
                } else {
                    warn!(damping = d, "damping must be in [0, 1), keeping default");
                }
            }
            if let Some(n) = rank.get("max_iterations").and_then(|v| v.as_integer()) {
                self.rank.max_iterations = n.max(1) as usize;
            }
            if let Some(t) = rank.get("tolerance").and_then(as_f64) {
                if t > 0.0 {
                    self.rank.tolerance = t;
                }
            }
            if let Some(v) = rank.get("category_multiplier") {
                merge_category_floats(&mut self.rank.category_multiplier, v, "rank.category_multiplier");
            }
        }

        if let Some(limits) = table.get("limits").and_then(|v| v.as_table()) {
            for (key, v) in limits {
                let Some(max) = v.as_integer().filter(|n| *n > 0) else {
                    warn!(key = key.as_str(), "limits entries must be positive integers");
                    continue;
                };
                match self.limits.bound_mut(key) {
                    Some(bound) => *bound = bound.with_max(max as usize),
                    None => warn!(key = key.as_str(), "Unknown key in [limits]"),
                }
            }
        }

        if let Some(ms) = table.get("query_timeout_ms").and_then(|v| v.as_integer()) {
            self.query_timeout_ms = ms.max(1) as u64;
        }
    }

    /// Parse config text. Syntax errors are reported, not ignored.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| GraphError::invalid(format!("{CONFIG_FILE_NAME}: {e}")))?;
        let mut config = EngineConfig::default();
        config.apply_table(&table);
        Ok(config)
    }
}

/// Load `archgraph.toml` from `dir`, falling back to defaults when the file
/// is absent or unparseable.
pub fn load_engine_config(dir: &Path) -> EngineConfig {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return EngineConfig::default();
    }
    debug!(path = %config_path.display(), "Loading {CONFIG_FILE_NAME}");
    match std::fs::read_to_string(&config_path) {
        Ok(content) => match EngineConfig::from_toml_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to parse {CONFIG_FILE_NAME}, using defaults");
                EngineConfig::default()
            }
        },
        Err(e) => {
            warn!(error = %e, "Failed to read {CONFIG_FILE_NAME}, using defaults");
            EngineConfig::default()
        }
    }
}
