//! Category classifier: infers an architectural category for a node from its
//! path, kind, and declared names.
//!
//! Rules are applied in a fixed priority order and the first match wins:
//! explicit hint, external marker, test signals, root-directory table,
//! keyword sets (in [`KEYWORD_ORDER`]), then `implementation`.

use crate::config::{ClassifierTables, KEYWORD_ORDER};
use crate::types::{Category, GraphNode, NodeKind, ProfileInput, EXTERNAL_PREFIX};
use tracing::debug;

/// Borrowed view of everything the classifier looks at.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    pub id: &'a str,
    pub kind: NodeKind,
    pub file_path: Option<&'a str>,
    pub function_name: Option<&'a str>,
    pub class_name: Option<&'a str>,
    pub hint: Option<&'a str>,
}

impl<'a> ClassifyInput<'a> {
    pub fn from_profile(profile: &'a ProfileInput) -> Self {
        ClassifyInput {
            id: &profile.id,
            kind: profile.kind,
            file_path: Some(profile.file_path.as_str()),
            function_name: profile.function_name.as_deref(),
            class_name: profile.class_name.as_deref(),
            hint: profile.category.as_deref(),
        }
    }

    /// Re-derive from a stored node, ignoring its current category.
    pub fn from_node(node: &'a GraphNode) -> Self {
        ClassifyInput {
            id: &node.id,
            kind: node.kind,
            file_path: node.file_path.as_deref(),
            function_name: node.function_name.as_deref(),
            class_name: node.class_name.as_deref(),
            hint: None,
        }
    }
}

/// Lower-cased, non-empty path segments with `\` normalized to `/`.
pub fn path_segments(path: &str) -> Vec<String> {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|s| s.to_ascii_lowercase())
        .collect()
}

fn split_tokens(value: &str, out: &mut Vec<String>) {
    out.push(value.to_string());
    out.extend(
        value
            .split(['_', '-', '.'])
            .filter(|t| !t.is_empty() && *t != value)
            .map(|t| t.to_string()),
    );
}

fn strip_extension(segment: &str) -> &str {
    match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment,
    }
}

fn path_tokens(segments: &[String]) -> Vec<String> {
    let mut tokens = Vec::new();
    for (i, seg) in segments.iter().enumerate() {
        if i + 1 == segments.len() {
            split_tokens(strip_extension(seg), &mut tokens);
        } else {
            split_tokens(seg, &mut tokens);
        }
    }
    tokens
}

fn name_tokens(input: &ClassifyInput<'_>) -> Vec<String> {
    let mut tokens = Vec::new();
    for name in [input.class_name, input.function_name].into_iter().flatten() {
        let lowered = name.trim().to_ascii_lowercase();
        if !lowered.is_empty() {
            split_tokens(&lowered, &mut tokens);
        }
    }
    tokens
}

pub struct Classifier<'a> {
    tables: &'a ClassifierTables,
}

impl<'a> Classifier<'a> {
    pub fn new(tables: &'a ClassifierTables) -> Self {
        Classifier { tables }
    }

    pub fn classify(&self, input: &ClassifyInput<'_>) -> Category {
        if let Some(hint) = input.hint.map(str::trim).filter(|h| !h.is_empty()) {
            match Category::parse(hint) {
                Some(cat) => return cat,
                None => debug!(id = input.id, hint, "Ignoring unrecognized category hint"),
            }
        }

        if input.kind == NodeKind::ExternalCall || input.id.starts_with(EXTERNAL_PREFIX) {
            return Category::External;
        }

        let segments = input.file_path.map(path_segments).unwrap_or_default();
        let path_tokens = path_tokens(&segments);
        let name_tokens = name_tokens(input);

        if segments.is_empty() && name_tokens.is_empty() {
            return Category::Unknown;
        }

        if self.is_test(&segments, &path_tokens, &name_tokens) {
            return Category::Test;
        }

        if let Some(root) = segments.first() {
            if let Some(cat) = self.tables.root_categories.get(root) {
                return *cat;
            }
        }

        for cat in KEYWORD_ORDER {
            if self.matches_keywords(cat, &path_tokens, &name_tokens) {
                return cat;
            }
        }

        Category::Implementation
    }

    fn is_test(&self, segments: &[String], path_tokens: &[String], name_tokens: &[String]) -> bool {
        if segments.first().is_some_and(|s| s == "tests") {
            return true;
        }
        if let Some(file_name) = segments.last() {
            if file_name == "test.py" || file_name.ends_with("_test.py") {
                return true;
            }
        }
        let keywords = &self.tables.test_keywords;
        path_tokens.iter().chain(name_tokens).any(|t| keywords.contains(t))
    }

    fn matches_keywords(&self, cat: Category, path_tokens: &[String], name_tokens: &[String]) -> bool {
        if let Some(keywords) = self.tables.keywords.get(&cat) {
            if path_tokens.iter().chain(name_tokens).any(|t| keywords.contains(t)) {
                return true;
            }
        }
        if let Some(suffixes) = self.tables.name_suffixes.get(&cat) {
            return name_tokens.iter().any(|t| suffixes.iter().any(|s| t.ends_with(s.as_str())));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(path: &str, kind: NodeKind, func: Option<&str>, class: Option<&str>) -> Category {
        let tables = ClassifierTables::default();
        let input = ClassifyInput {
            id: "node",
            kind,
            file_path: Some(path),
            function_name: func,
            class_name: class,
            hint: None,
        };
        Classifier::new(&tables).classify(&input)
    }

    #[test]
    fn test_hint_wins() {
        let tables = ClassifierTables::default();
        let input = ClassifyInput {
            id: "tests/test_api.py",
            kind: NodeKind::File,
            file_path: Some("tests/test_api.py"),
            function_name: None,
            class_name: None,
            hint: Some("Service"),
        };
        assert_eq!(Classifier::new(&tables).classify(&input), Category::Service);
    }

    #[test]
    fn test_unparseable_hint_is_ignored() {
        let tables = ClassifierTables::default();
        let input = ClassifyInput {
            id: "app/models/user.py",
            kind: NodeKind::File,
            file_path: Some("app/models/user.py"),
            function_name: None,
            class_name: None,
            hint: Some("not-a-category"),
        };
        assert_eq!(Classifier::new(&tables).classify(&input), Category::Model);
    }

    #[test]
    fn test_external_by_kind_and_prefix() {
        let tables = ClassifierTables::default();
        let c = Classifier::new(&tables);
        let by_kind = ClassifyInput {
            id: "x",
            kind: NodeKind::ExternalCall,
            file_path: None,
            function_name: None,
            class_name: None,
            hint: None,
        };
        assert_eq!(c.classify(&by_kind), Category::External);
        let by_prefix = ClassifyInput { id: "external::json.dumps", kind: NodeKind::Function, ..by_kind };
        assert_eq!(c.classify(&by_prefix), Category::External);
    }

    #[test]
    fn test_test_signals() {
        assert_eq!(classify("tests/unit/a.py", NodeKind::File, None, None), Category::Test);
        assert_eq!(classify("app/services/user_test.py", NodeKind::File, None, None), Category::Test);
        assert_eq!(classify("app/services/test.py", NodeKind::File, None, None), Category::Test);
        assert_eq!(
            classify("app/services/user.py", NodeKind::Function, Some("test_create"), None),
            Category::Test
        );
        // test beats the root table
        assert_eq!(classify("services/fixtures/data.py", NodeKind::File, None, None), Category::Test);
    }

    #[test]
    fn test_root_table() {
        assert_eq!(classify("services/billing.py", NodeKind::File, None, None), Category::Service);
        assert_eq!(classify("controllers/users.py", NodeKind::File, None, None), Category::Controller);
        assert_eq!(classify("models/user.py", NodeKind::File, None, None), Category::Model);
        assert_eq!(classify("utils/strings.py", NodeKind::File, None, None), Category::Utility);
        // root table beats keyword sets: "config" would be infrastructure
        assert_eq!(classify("api/config.py", NodeKind::File, None, None), Category::Controller);
    }

    #[test]
    fn test_keyword_order_is_fixed() {
        // utility is tried before service
        assert_eq!(classify("app/services/base.py", NodeKind::File, None, None), Category::Utility);
        // infrastructure before controller
        assert_eq!(classify("app/routes/settings.py", NodeKind::File, None, None), Category::Infrastructure);
        // controller before service
        assert_eq!(classify("app/views/service.py", NodeKind::File, None, None), Category::Controller);
        assert_eq!(classify("app/services/user.py", NodeKind::File, None, None), Category::Service);
        assert_eq!(classify("app/ingest/load.py", NodeKind::File, None, None), Category::DataPipeline);
        assert_eq!(classify("app/webhooks/stripe.py", NodeKind::File, None, None), Category::Integration);
        assert_eq!(classify("app/sdk/session.py", NodeKind::File, None, None), Category::Sdk);
    }

    #[test]
    fn test_name_suffixes() {
        assert_eq!(
            classify("app/core/accounts.py", NodeKind::Class, None, Some("AccountService")),
            Category::Service
        );
        assert_eq!(
            classify("app/core/accounts.py", NodeKind::Class, None, Some("PaymentsClient")),
            Category::Sdk
        );
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(classify("app/core/engine.py", NodeKind::File, None, None), Category::Implementation);
        let tables = ClassifierTables::default();
        let empty = ClassifyInput {
            id: "orphan",
            kind: NodeKind::Function,
            file_path: None,
            function_name: None,
            class_name: None,
            hint: None,
        };
        assert_eq!(Classifier::new(&tables).classify(&empty), Category::Unknown);
    }

    #[test]
    fn test_classify_is_pure() {
        let first = classify("app/handlers/jobs.py", NodeKind::Method, Some("run"), Some("JobHandler"));
        for _ in 0..10 {
            assert_eq!(
                classify("app/handlers/jobs.py", NodeKind::Method, Some("run"), Some("JobHandler")),
                first
            );
        }
    }

    #[test]
    fn test_path_segments_normalize() {
        assert_eq!(path_segments(".\\App\\Services//x.py"), vec!["app", "services", "x.py"]);
    }
}
