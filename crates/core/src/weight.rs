//! Edge weight model. A CALLS edge's weight is derived only from its two
//! endpoints (category, kind) and its own attributes, never from graph-wide
//! state, so weights can be recomputed for any single edge.

use crate::config::WeightTables;
use crate::types::{Category, Edge, EdgeType, GraphNode, NodeKind};

pub struct EdgeWeightModel<'a> {
    tables: &'a WeightTables,
}

/// Callee part of a call expression: lower-cased, argument list dropped.
fn callee(call: &str) -> String {
    let head = call.split('(').next().unwrap_or(call);
    head.trim().to_ascii_lowercase()
}

impl<'a> EdgeWeightModel<'a> {
    pub fn new(tables: &'a WeightTables) -> Self {
        EdgeWeightModel { tables }
    }

    /// Whether the callee looks like logging, metrics, or tracing plumbing.
    pub fn is_logging_call(&self, call: &str) -> bool {
        let name = callee(call);
        if name.is_empty() {
            return false;
        }
        self.tables.logging_names.contains(&name)
            || self.tables.logging_prefixes.iter().any(|p| name.starts_with(p.as_str()))
            || self.tables.logging_suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }

    pub fn weight(&self, source: &GraphNode, target: &GraphNode, edge: &Edge) -> f64 {
        if edge.edge_type != EdgeType::Calls {
            return 0.0;
        }
        if source.category == Category::Test || target.category == Category::Test {
            return 0.0;
        }

        let base = self
            .tables
            .category_weight
            .get(&target.category)
            .or_else(|| self.tables.category_weight.get(&Category::Implementation))
            .copied()
            .unwrap_or(0.0);
        let modifier = self.tables.source_modifier.get(&source.category).copied().unwrap_or(1.0);
        let mut weight = base * modifier;

        if target.kind == NodeKind::File {
            weight = weight.min(self.tables.file_cap);
        }
        if self.is_logging_call(&edge.call_expression) {
            weight = weight.min(self.tables.logging_cap);
        }
        if !edge.resolved {
            weight = 0.0;
        }

        if weight.is_finite() {
            weight.max(0.0)
        } else {
            0.0
        }
    }
}
