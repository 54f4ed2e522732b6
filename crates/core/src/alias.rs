//! Alias index: maps normalized call-expression strings to the set of
//! profile ids they may refer to.
//!
//! Collisions are kept as candidate sets. A call that matches an alias shared
//! by several profiles resolves to all of them.

use crate::types::ProfileInput;
use std::collections::{BTreeMap, BTreeSet};

/// Strip all whitespace from a call expression or alias.
pub fn sanitize_call(expr: &str) -> String {
    expr.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `app/services/user.py` -> `app.services.user`
pub fn module_path(file_path: &str) -> String {
    let normalized = file_path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./");
    let without_ext = match trimmed.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem,
        _ => trimmed,
    };
    without_ext.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>().join(".")
}

/// Every alias a profile can be referenced by.
pub fn profile_aliases(profile: &ProfileInput) -> BTreeSet<String> {
    let mut aliases = BTreeSet::new();
    let mut add = |value: &str| {
        let alias = sanitize_call(value);
        if !alias.is_empty() {
            aliases.insert(alias);
        }
    };

    add(&profile.id);
    add(&profile.file_path);

    let module = module_path(&profile.file_path);
    if !module.is_empty() {
        add(&module);
        add(&module.replace('.', "::"));
    }

    let function = profile.function_name.as_deref().filter(|s| !s.is_empty());
    let class = profile.class_name.as_deref().filter(|s| !s.is_empty());

    if let Some(f) = function {
        add(f);
    }
    if let Some(c) = class {
        add(c);
    }

    let simple_class = class.map(|c| c.rsplit('.').next().unwrap_or(c));
    if let (false, Some(sc)) = (module.is_empty(), simple_class) {
        add(&format!("{module}.{sc}"));
        add(&format!("{}::{sc}", module.replace('.', "::")));
    }

    if let (Some(c), Some(f)) = (class, function) {
        add(&format!("{c}.{f}"));
        add(&format!("{c}::{f}"));
        if let (false, Some(sc)) = (module.is_empty(), simple_class) {
            add(&format!("{module}.{sc}.{f}"));
            add(&format!("{}::{sc}::{f}", module.replace('.', "::")));
        }
    }

    if let (false, Some(f)) = (module.is_empty(), function) {
        add(&format!("{module}.{f}"));
        add(&format!("{}::{f}", module.replace('.', "::")));
    }

    aliases
}

#[derive(Debug, Default, Clone)]
pub struct AliasIndex {
    map: BTreeMap<String, BTreeSet<String>>,
}

impl AliasIndex {
    pub fn build<'a>(profiles: impl IntoIterator<Item = &'a ProfileInput>) -> Self {
        let mut index = AliasIndex::default();
        for profile in profiles {
            for alias in profile_aliases(profile) {
                index.map.entry(alias).or_default().insert(profile.id.clone());
            }
        }
        index
    }

    /// Candidate ids for a call expression (sanitized before lookup). Empty
    /// when nothing matches; more than one when the alias is ambiguous.
    pub fn resolve(&self, call: &str) -> Vec<&str> {
        self.map
            .get(&sanitize_call(call))
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Aliases that map to more than one profile.
    pub fn ambiguous(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.map.iter().filter(|(_, ids)| ids.len() > 1).map(|(a, ids)| (a.as_str(), ids))
    }
}
