//! Error taxonomy shared by graph construction, persistence, and queries.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Diagnostics collected while turning a profile batch into a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Records present in the batch.
    pub total: usize,
    /// Records dropped because a required field was missing or malformed.
    pub skipped: usize,
    /// Well-formed profiles removed by the noise filter.
    pub filtered: usize,
    pub nodes: usize,
    pub edges: usize,
    pub unresolved: usize,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "build failed for workspace '{}': {} ({} records, {} skipped, {} filtered)",
        .workspace, .reason, .report.total, .report.skipped, .report.filtered
    )]
    BuildFailure { workspace: String, reason: String, report: BuildReport },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("query cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    pub fn node_not_found(id: impl Into<String>) -> Self {
        GraphError::NotFound { what: "node", id: id.into() }
    }

    pub fn workspace_not_found(id: impl Into<String>) -> Self {
        GraphError::NotFound { what: "workspace", id: id.into() }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        GraphError::InvalidArgument(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraphError::Io { path: path.into(), source }
    }

    /// Stable machine-readable tag, used by the tool surface.
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::NotFound { .. } => "not_found",
            GraphError::InvalidArgument(_) => "invalid_argument",
            GraphError::BuildFailure { .. } => "build_failure",
            GraphError::Serialization(_) => "serialization_error",
            GraphError::Io { .. } => "io_error",
            GraphError::Cancelled => "cancelled",
        }
    }

    /// Errors the caller can fix by changing the request.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, GraphError::NotFound { .. } | GraphError::InvalidArgument(_))
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Serialization(e.to_string())
    }
}
