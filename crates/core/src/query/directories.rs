//! Directory-level view of the ranked graph. Paths are grouped below their
//! shared prefix so that depth 1 lands on meaningful top-level folders.

use super::round6;
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::CodeGraph;
use crate::rank;
use crate::types::{Category, GraphNode, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default, alias = "nodes_per_directory")]
    pub nodes_per_dir: Option<usize>,
    #[serde(default)]
    pub depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredNode {
    pub id: String,
    pub score: f64,
    pub label: String,
    pub kind: NodeKind,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryComponent {
    pub directory: String,
    pub avg_score: f64,
    pub total_score: f64,
    pub node_count: usize,
    pub kind_distribution: BTreeMap<NodeKind, usize>,
    pub category_distribution: BTreeMap<Category, usize>,
    pub top_nodes: Vec<ScoredNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryListing {
    pub common_prefix: String,
    pub directories: Vec<DirectoryComponent>,
}

/// Path parts with `\` normalized and leading `./` or `/` dropped.
fn path_parts(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|p| !p.is_empty() && *p != ".").collect()
}

/// Longest run of leading directory segments shared by every path.
fn common_prefix<'p>(paths: &[Vec<&'p str>]) -> Vec<&'p str> {
    let mut dirs = paths.iter().map(|parts| &parts[..parts.len().saturating_sub(1)]);
    let Some(first) = dirs.next() else {
        return Vec::new();
    };
    let mut shared = first.len();
    for parts in dirs {
        shared = shared.min(first.iter().zip(parts.iter()).take_while(|(a, b)| a == b).count());
    }
    first[..shared].to_vec()
}

pub fn list_directory_components(
    graph: &CodeGraph,
    config: &EngineConfig,
    params: &DirectoryParams,
    cancel: &CancelToken,
) -> Result<DirectoryListing> {
    let limit = config.limits.directory_limit.resolve("limit", params.limit)?;
    let per_dir = config.limits.nodes_per_directory.resolve("nodes_per_dir", params.nodes_per_dir)?;
    let depth = config.limits.directory_depth.resolve("depth", params.depth)?;

    let scores = rank::rank(graph, &config.rank);
    let located: Vec<(&GraphNode, f64, Vec<&str>)> = scores
        .iter()
        .filter_map(|(id, score)| {
            let node = graph.node(id)?;
            let path = node.file_path.as_deref().filter(|p| !p.is_empty())?;
            Some((node, *score, path_parts(path)))
        })
        .collect();

    let all_parts: Vec<Vec<&str>> = located.iter().map(|(_, _, parts)| parts.clone()).collect();
    let prefix = common_prefix(&all_parts);

    let mut groups: BTreeMap<String, Vec<(&GraphNode, f64)>> = BTreeMap::new();
    for (node, score, parts) in &located {
        cancel.check()?;
        let remaining = &parts[prefix.len()..];
        // A file name has to remain below the grouping directory.
        if remaining.len() <= depth {
            continue;
        }
        groups.entry(remaining[..depth].join("/")).or_default().push((*node, *score));
    }

    #[allow(clippy::cast_precision_loss)]
    let mut directories: Vec<DirectoryComponent> = groups
        .into_iter()
        .map(|(directory, mut members)| {
            let total: f64 = members.iter().map(|(_, s)| s).sum();
            let avg = total / members.len() as f64;

            let mut kind_distribution = BTreeMap::new();
            let mut category_distribution = BTreeMap::new();
            for (node, _) in &members {
                *kind_distribution.entry(node.kind).or_insert(0) += 1;
                if node.category != Category::Unknown {
                    *category_distribution.entry(node.category).or_insert(0) += 1;
                }
            }

            members.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
            let top_nodes = members
                .iter()
                .take(per_dir)
                .map(|(node, score)| ScoredNode {
                    id: node.id.clone(),
                    score: round6(*score),
                    label: node.label.clone(),
                    kind: node.kind,
                    category: node.category,
                    file_path: node.file_path.clone(),
                })
                .collect();

            DirectoryComponent {
                directory,
                avg_score: avg,
                total_score: total,
                node_count: members.len(),
                kind_distribution,
                category_distribution,
                top_nodes,
            }
        })
        .collect();

    directories.sort_by(|a, b| b.avg_score.total_cmp(&a.avg_score).then_with(|| a.directory.cmp(&b.directory)));
    directories.truncate(limit);
    for dir in &mut directories {
        dir.avg_score = round6(dir.avg_score);
        dir.total_score = round6(dir.total_score);
    }

    Ok(DirectoryListing { common_prefix: prefix.join("/"), directories })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::query::fixtures::{edge, node};
    use crate::types::EdgeType;

    fn located(id: &str, category: Category, path: &str) -> GraphNode {
        let mut n = node(id, category, Some(path));
        n.kind = NodeKind::Function;
        n
    }

    #[test]
    fn test_common_prefix_excludes_file_names() {
        let paths = vec![vec!["src", "app", "api", "a.py"], vec!["src", "app", "db", "b.py"]];
        assert_eq!(common_prefix(&paths), vec!["src", "app"]);
        let single = vec![vec!["src", "a.py"]];
        assert_eq!(common_prefix(&single), vec!["src"]);
        assert!(common_prefix(&[]).is_empty());
    }

    #[test]
    fn test_groups_below_shared_prefix() {
        let nodes = vec![
            located("api_view", Category::Controller, "src/app/api/views.py"),
            located("api_ser", Category::Controller, "src/app/api/serializers.py"),
            located("db_repo", Category::Model, "src/app/db/repo.py"),
            located("top", Category::Unknown, "src/app/main.py"),
        ];
        let edges = vec![
            edge("api_view", "db_repo", EdgeType::Calls, 0.8),
            edge("api_ser", "db_repo", EdgeType::Calls, 0.8),
        ];
        let g = CodeGraph::from_parts(nodes, edges, Vec::new()).unwrap();
        let out = list_directory_components(&g, &EngineConfig::default(), &DirectoryParams::default(), &CancelToken::new())
            .unwrap();
        assert_eq!(out.common_prefix, "src/app");
        let names: Vec<&str> = out.directories.iter().map(|d| d.directory.as_str()).collect();
        // main.py sits directly in the prefix and belongs to no group
        assert_eq!(names, vec!["db", "api"]);
        let api = &out.directories[1];
        assert_eq!(api.node_count, 2);
        assert_eq!(api.category_distribution.get(&Category::Controller), Some(&2));
        assert_eq!(api.top_nodes[0].id, "api_ser", "Equal scores fall back to id order");
    }

    #[test]
    fn test_equal_averages_sort_by_path() {
        let nodes = vec![
            located("z", Category::Implementation, "pkg/zeta/z.py"),
            located("a", Category::Implementation, "pkg/alpha/a.py"),
        ];
        let g = CodeGraph::from_parts(nodes, Vec::new(), Vec::new()).unwrap();
        let out = list_directory_components(&g, &EngineConfig::default(), &DirectoryParams::default(), &CancelToken::new())
            .unwrap();
        let names: Vec<&str> = out.directories.iter().map(|d| d.directory.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_unknown_category_not_counted() {
        let nodes = vec![
            located("x", Category::Unknown, "a/one/x.py"),
            located("y", Category::Service, "a/two/y.py"),
        ];
        let g = CodeGraph::from_parts(nodes, Vec::new(), Vec::new()).unwrap();
        let out = list_directory_components(&g, &EngineConfig::default(), &DirectoryParams::default(), &CancelToken::new())
            .unwrap();
        let one = out.directories.iter().find(|d| d.directory == "one").unwrap();
        assert!(one.category_distribution.is_empty());
        assert_eq!(one.kind_distribution.get(&NodeKind::Function), Some(&1));
    }

    #[test]
    fn test_bounds_validated() {
        let g = CodeGraph::new();
        let p = DirectoryParams { depth: Some(6), ..Default::default() };
        assert!(matches!(
            list_directory_components(&g, &EngineConfig::default(), &p, &CancelToken::new()),
            Err(GraphError::InvalidArgument(_))
        ));
        let empty = list_directory_components(&g, &EngineConfig::default(), &DirectoryParams::default(), &CancelToken::new())
            .unwrap();
        assert!(empty.directories.is_empty());
    }
}
