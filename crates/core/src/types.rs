//! Core types shared across the engine: profile input records, node kinds,
//! architectural categories, edge types, and the node/edge entities stored
//! in a [`CodeGraph`](crate::graph::CodeGraph).

use serde::{Deserialize, Serialize};

/// Prefix of synthetic node ids created for calls that resolve to nothing.
pub const EXTERNAL_PREFIX: &str = "external::";

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Class,
    Function,
    Method,
    ExternalCall,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::ExternalCall => "external_call",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(NodeKind::File),
            "class" => Some(NodeKind::Class),
            "function" => Some(NodeKind::Function),
            "method" => Some(NodeKind::Method),
            "external_call" => Some(NodeKind::ExternalCall),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Architectural categories
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Service,
    Controller,
    Model,
    DataPipeline,
    Integration,
    Sdk,
    Utility,
    Infrastructure,
    Test,
    External,
    Implementation,
    #[default]
    Unknown,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Service,
        Category::Controller,
        Category::Model,
        Category::DataPipeline,
        Category::Integration,
        Category::Sdk,
        Category::Utility,
        Category::Infrastructure,
        Category::Test,
        Category::External,
        Category::Implementation,
        Category::Unknown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Service => "service",
            Category::Controller => "controller",
            Category::Model => "model",
            Category::DataPipeline => "data_pipeline",
            Category::Integration => "integration",
            Category::Sdk => "sdk",
            Category::Utility => "utility",
            Category::Infrastructure => "infrastructure",
            Category::Test => "test",
            Category::External => "external",
            Category::Implementation => "implementation",
            Category::Unknown => "unknown",
        }
    }

    /// Case-insensitive parse; surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Category::ALL.iter().copied().find(|c| c.label() == lowered)
    }
}

// ---------------------------------------------------------------------------
// Edge types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Calls,
    Contains,
    Uses,
    DataAccess,
    Imports,
    InheritsFrom,
}

impl EdgeType {
    pub const ALL: [EdgeType; 6] = [
        EdgeType::Calls,
        EdgeType::Contains,
        EdgeType::Uses,
        EdgeType::DataAccess,
        EdgeType::Imports,
        EdgeType::InheritsFrom,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EdgeType::Calls => "CALLS",
            EdgeType::Contains => "CONTAINS",
            EdgeType::Uses => "USES",
            EdgeType::DataAccess => "DATA_ACCESS",
            EdgeType::Imports => "IMPORTS",
            EdgeType::InheritsFrom => "INHERITS_FROM",
        }
    }

    /// Case-insensitive parse of `CALLS`, `data_access`, etc.
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        EdgeType::ALL.iter().copied().find(|t| t.label() == upper)
    }
}

/// How the source of a USES edge uses its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UseKind {
    /// A call expression that resolved to a class.
    Instantiation,
}

// ---------------------------------------------------------------------------
// Profile input (produced by an external extractor)
// ---------------------------------------------------------------------------

/// Structural record for one file, class, function, or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInput {
    pub id: String,
    pub kind: NodeKind,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub calls: Vec<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Explicit category hint; wins over every inferred signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ProfileInput {
    /// Minimal profile, mostly useful for tests and fixtures.
    pub fn new(id: &str, kind: NodeKind, file_path: &str) -> Self {
        ProfileInput {
            id: id.to_string(),
            kind,
            file_path: file_path.to_string(),
            function_name: None,
            class_name: None,
            start_line: None,
            end_line: None,
            docstring: None,
            parameters: Vec::new(),
            calls: Vec::new(),
            children: Vec::new(),
            parent_id: None,
            category: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Graph entities
// ---------------------------------------------------------------------------

/// Display name: `Class.function`, else function, else class, else path.
pub fn display_label(
    id: &str,
    file_path: Option<&str>,
    function_name: Option<&str>,
    class_name: Option<&str>,
) -> String {
    fn non_empty(s: Option<&str>) -> Option<&str> {
        s.filter(|v| !v.is_empty())
    }
    match (non_empty(class_name), non_empty(function_name)) {
        (Some(class), Some(func)) => format!("{class}.{func}"),
        (None, Some(func)) => func.to_string(),
        (Some(class), None) => class.to_string(),
        (None, None) => non_empty(file_path).unwrap_or(id).to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl GraphNode {
    /// Synthetic target for a call that matched no alias.
    pub fn external(call: &str) -> Self {
        GraphNode {
            id: format!("{EXTERNAL_PREFIX}{call}"),
            kind: NodeKind::ExternalCall,
            label: call.to_string(),
            category: Category::External,
            file_path: None,
            function_name: None,
            class_name: None,
            start_line: None,
            end_line: None,
            docstring: None,
            parent_id: None,
        }
    }
}

fn default_resolved() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub weight: f64,
    #[serde(default = "default_resolved")]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub call_expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_kind: Option<NodeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_kind: Option<UseKind>,
}

impl Edge {
    pub fn new(source: &str, target: &str, edge_type: EdgeType) -> Self {
        Edge {
            source: source.to_string(),
            target: target.to_string(),
            edge_type,
            weight: 0.0,
            resolved: true,
            call_expression: String::new(),
            child_kind: None,
            line: None,
            use_kind: None,
        }
    }
}
