//! Relocate and create-group suggestions for related folders scattered across
//! different parents.
//!
//! Directories become nodes of an undirected graph. An edge joins two folders
//! under different parents when their names share significant tokens; its
//! weight blends token overlap with how close the two folders sit in the tree.
//! Connected components over edges above the relatedness threshold are the
//! candidate clusters.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use tracing::debug;

use crate::error::AnalysisError;
use crate::naming::{capitalize, significant_tokens};
use crate::suggestion::{Analyzer, Suggestion, SuggestionKind};
use crate::tree::{DirTree, NodeId};

const OVERLAP_WEIGHT: f64 = 0.75;
const PROXIMITY_WEIGHT: f64 = 0.25;

pub struct HierarchyOptimizer {
    threshold: f64,
    min_token_len: usize,
}

/// A connected group of related folders with the mean weight of its edges.
struct Cluster {
    members: Vec<NodeId>,
    strength: f64,
}

impl HierarchyOptimizer {
    pub fn new(threshold: f64, min_token_len: usize) -> Self {
        Self {
            threshold,
            min_token_len,
        }
    }

    /// Relatedness of two folders, or `None` when their names share nothing.
    fn relatedness(
        tree: &DirTree,
        a: NodeId,
        b: NodeId,
        tokens_a: &BTreeSet<String>,
        tokens_b: &BTreeSet<String>,
    ) -> Option<f64> {
        let smaller = tokens_a.len().min(tokens_b.len());
        if smaller == 0 {
            return None;
        }
        let shared = tokens_a.intersection(tokens_b).count();
        if shared == 0 {
            return None;
        }
        let overlap = shared as f64 / smaller as f64;

        let lca = tree.common_ancestor(a, b);
        let deepest = tree.depth_of(a).max(tree.depth_of(b));
        let gap = deepest.saturating_sub(tree.depth_of(lca) + 1);
        let proximity = 1.0 / (1.0 + gap as f64);

        Some(OVERLAP_WEIGHT * overlap + PROXIMITY_WEIGHT * proximity)
    }

    fn clusters(&self, tree: &DirTree, tokens: &HashMap<NodeId, BTreeSet<String>>) -> Vec<Cluster> {
        let dirs: Vec<NodeId> = tree.ids().into_iter().skip(1).collect();
        let mut graph: UnGraph<NodeId, f64> = UnGraph::new_undirected();
        let index: Vec<NodeIndex> = dirs.iter().map(|&id| graph.add_node(id)).collect();

        for i in 0..dirs.len() {
            for j in i + 1..dirs.len() {
                let (a, b) = (dirs[i], dirs[j]);
                if tree.parent(a) == tree.parent(b)
                    || tree.is_ancestor(a, b)
                    || tree.is_ancestor(b, a)
                {
                    continue;
                }
                if let Some(weight) = Self::relatedness(tree, a, b, &tokens[&a], &tokens[&b])
                    && weight >= self.threshold
                {
                    graph.add_edge(index[i], index[j], weight);
                }
            }
        }

        let mut components = UnionFind::<usize>::new(graph.node_count());
        for edge in graph.edge_references() {
            components.union(edge.source().index(), edge.target().index());
        }
        let labels = components.into_labeling();

        let mut grouped: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        let mut weights: HashMap<usize, Vec<f64>> = HashMap::new();
        for (i, &label) in labels.iter().enumerate() {
            grouped.entry(label).or_default().push(graph[NodeIndex::new(i)]);
        }
        for edge in graph.edge_references() {
            weights
                .entry(labels[edge.source().index()])
                .or_default()
                .push(*edge.weight());
        }

        grouped
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(label, members)| {
                let edge_weights = weights.get(&label).map(Vec::as_slice).unwrap_or(&[]);
                let strength = if edge_weights.is_empty() {
                    0.0
                } else {
                    edge_weights.iter().sum::<f64>() / edge_weights.len() as f64
                };
                Cluster { members, strength }
            })
            .collect()
    }

    /// Rejects clusters that cannot be moved as a unit.
    fn check_cluster(tree: &DirTree, members: &[NodeId]) -> Result<(), AnalysisError> {
        for &a in members {
            for &b in members {
                if a != b && tree.is_ancestor(a, b) {
                    return Err(AnalysisError::Cycle {
                        ancestor: tree.path(a).to_path_buf(),
                        descendant: tree.path(b).to_path_buf(),
                    });
                }
            }
        }
        let mut names = HashSet::new();
        for &id in members {
            if !names.insert(tree.name(id).to_lowercase()) {
                return Err(AnalysisError::NameCollision {
                    kind: SuggestionKind::CreateGroup,
                    target: tree.path(tree.common_ancestor(members[0], id)).to_path_buf(),
                    name: tree.name(id).to_string(),
                });
            }
        }
        Ok(())
    }

    /// The most common token across members, ties broken alphabetically.
    fn dominant_token(
        members: &[NodeId],
        tokens: &HashMap<NodeId, BTreeSet<String>>,
    ) -> Option<(String, usize)> {
        let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
        for id in members {
            for token in &tokens[id] {
                *votes.entry(token.as_str()).or_default() += 1;
            }
        }
        let mut best: Option<(&str, usize)> = None;
        for (token, count) in votes {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((token, count));
            }
        }
        best.map(|(t, c)| (t.to_string(), c))
    }

    /// An existing folder named after `token` alone that no member contains.
    /// Shallower folders win, then the smaller path.
    fn best_fit_parent(
        tree: &DirTree,
        members: &[NodeId],
        token: &str,
        tokens: &HashMap<NodeId, BTreeSet<String>>,
    ) -> Option<NodeId> {
        tree.ids()
            .into_iter()
            .skip(1)
            .filter(|id| {
                let own = &tokens[id];
                own.len() == 1 && own.contains(token)
            })
            .filter(|&id| !members.iter().any(|&m| tree.is_ancestor(m, id)))
            .min_by(|&a, &b| {
                tree.depth_of(a)
                    .cmp(&tree.depth_of(b))
                    .then_with(|| tree.path(a).cmp(tree.path(b)))
            })
    }

    fn suggest(
        &self,
        tree: &DirTree,
        cluster: &Cluster,
        tokens: &HashMap<NodeId, BTreeSet<String>>,
    ) -> Result<Option<Suggestion>, AnalysisError> {
        let members = &cluster.members;
        let parents: BTreeSet<Option<NodeId>> = members.iter().map(|&m| tree.parent(m)).collect();
        if parents.len() < 2 {
            return Ok(None);
        }
        Self::check_cluster(tree, members)?;

        let Some((token, votes)) = Self::dominant_token(members, tokens) else {
            return Ok(None);
        };
        if votes * 2 <= members.len() {
            return Ok(None);
        }

        let member_names = members
            .iter()
            .map(|&m| format!("'{}'", tree.name(m)))
            .collect::<Vec<_>>()
            .join(", ");

        if let Some(parent) = Self::best_fit_parent(tree, members, &token, tokens) {
            let movers: Vec<NodeId> = members
                .iter()
                .copied()
                .filter(|&m| m != parent && tree.parent(m) != Some(parent))
                .collect();
            if movers.is_empty() {
                return Ok(None);
            }
            let existing = tree.entry_names(parent);
            if let Some(&clash) = movers
                .iter()
                .find(|&&m| existing.contains(&tree.name(m).to_lowercase()))
            {
                return Err(AnalysisError::NameCollision {
                    kind: SuggestionKind::Relocate,
                    target: tree.path(parent).to_path_buf(),
                    name: tree.name(clash).to_string(),
                });
            }
            return Ok(Some(Suggestion::new(
                SuggestionKind::Relocate,
                movers.iter().map(|&m| tree.path(m).to_path_buf()).collect(),
                tree.path(parent).to_path_buf(),
                cluster.strength,
                format!(
                    "{} share the word '{}' but sit under {} different parents; \
                     move them into the existing folder '{}'",
                    member_names,
                    token,
                    parents.len(),
                    tree.name(parent)
                ),
            )));
        }

        let lca = members
            .iter()
            .skip(1)
            .fold(members[0], |acc, &m| tree.common_ancestor(acc, m));
        let siblings = tree.entry_names(lca);
        let mut group_name = capitalize(&token);
        if siblings.contains(&group_name.to_lowercase()) {
            group_name.push_str("_Group");
        }
        if siblings.contains(&group_name.to_lowercase()) {
            return Err(AnalysisError::NameCollision {
                kind: SuggestionKind::CreateGroup,
                target: tree.path(lca).to_path_buf(),
                name: group_name,
            });
        }

        let target: PathBuf = tree.path(lca).join(&group_name);
        Ok(Some(Suggestion::new(
            SuggestionKind::CreateGroup,
            members.iter().map(|&m| tree.path(m).to_path_buf()).collect(),
            target,
            cluster.strength,
            format!(
                "{} share the word '{}' but sit under {} different parents; \
                 collect them in a new folder '{}'",
                member_names,
                token,
                parents.len(),
                group_name
            ),
        )))
    }
}

impl Analyzer for HierarchyOptimizer {
    fn name(&self) -> &'static str {
        "hierarchy"
    }

    fn analyze(&self, tree: &DirTree) -> Vec<Suggestion> {
        let tokens: HashMap<NodeId, BTreeSet<String>> = tree
            .ids()
            .into_iter()
            .map(|id| (id, significant_tokens(tree.name(id), self.min_token_len)))
            .collect();

        let mut suggestions = Vec::new();
        for cluster in self.clusters(tree, &tokens) {
            match self.suggest(tree, &cluster, &tokens) {
                Ok(Some(suggestion)) => suggestions.push(suggestion),
                Ok(None) => {}
                Err(e) => debug!("dropping cluster: {}", e),
            }
        }
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;
    use chrono::Utc;

    fn optimizer() -> HierarchyOptimizer {
        HierarchyOptimizer::new(0.6, 3)
    }

    #[test]
    fn test_scattered_folders_get_new_group() {
        let now = Utc::now();
        let mut b = TreeBuilder::new("/r", now, now);
        let clients = b.add_dir(0, "clients", now, now);
        let archive = b.add_dir(0, "archive", now, now);
        b.add_dir(clients, "acme_invoices", now, now);
        b.add_dir(archive, "invoices_acme_2019", now, now);
        let tree = b.build();

        let suggestions = optimizer().analyze(&tree);
        assert_eq!(suggestions.len(), 1);
        let group = &suggestions[0];
        assert_eq!(group.kind, SuggestionKind::CreateGroup);
        assert_eq!(group.target, PathBuf::from("/r/Acme"));
        assert_eq!(
            group.sources,
            vec![
                PathBuf::from("/r/archive/invoices_acme_2019"),
                PathBuf::from("/r/clients/acme_invoices"),
            ]
        );
        assert!((group.confidence - 0.875).abs() < 1e-9);
    }

    #[test]
    fn test_existing_folder_receives_relocation() {
        let now = Utc::now();
        let mut b = TreeBuilder::new("/r", now, now);
        b.add_dir(0, "invoices", now, now);
        let archive = b.add_dir(0, "archive", now, now);
        b.add_dir(archive, "old_invoices", now, now);
        let tree = b.build();

        let suggestions = optimizer().analyze(&tree);
        assert_eq!(suggestions.len(), 1);
        let relocate = &suggestions[0];
        assert_eq!(relocate.kind, SuggestionKind::Relocate);
        assert_eq!(relocate.target, PathBuf::from("/r/invoices"));
        assert_eq!(relocate.sources, vec![PathBuf::from("/r/archive/old_invoices")]);
    }

    #[test]
    fn test_file_in_target_blocks_relocation() {
        let now = Utc::now();
        let mut b = TreeBuilder::new("/r", now, now);
        let invoices = b.add_dir(0, "invoices", now, now);
        let archive = b.add_dir(0, "archive", now, now);
        b.add_dir(archive, "old_invoices", now, now);
        b.add_file(invoices, "old_invoices", now);
        let tree = b.build();

        assert!(optimizer().analyze(&tree).is_empty());
    }

    #[test]
    fn test_group_name_taken_by_files_dropped() {
        let now = Utc::now();
        let mut b = TreeBuilder::new("/r", now, now);
        let clients = b.add_dir(0, "clients", now, now);
        let archive = b.add_dir(0, "archive", now, now);
        b.add_dir(clients, "acme_invoices", now, now);
        b.add_dir(archive, "invoices_acme_2019", now, now);
        b.add_file(0, "Acme", now);
        b.add_file(0, "acme_group", now);
        let tree = b.build();

        assert!(optimizer().analyze(&tree).is_empty());
    }

    #[test]
    fn test_siblings_are_not_clustered() {
        let now = Utc::now();
        let mut b = TreeBuilder::new("/r", now, now);
        b.add_dir(0, "acme_invoices", now, now);
        b.add_dir(0, "old_invoices", now, now);
        let tree = b.build();

        assert!(optimizer().analyze(&tree).is_empty());
    }

    #[test]
    fn test_cluster_with_ancestor_and_descendant_dropped() {
        let now = Utc::now();
        let mut b = TreeBuilder::new("/r", now, now);
        let reports = b.add_dir(0, "reports_2020", now, now);
        let nested = b.add_dir(reports, "drafts", now, now);
        b.add_dir(nested, "reports", now, now);
        let other = b.add_dir(0, "misc", now, now);
        b.add_dir(other, "reports_new", now, now);
        let tree = b.build();

        // reports_2020 and drafts/reports link through misc/reports_new,
        // putting an ancestor and its descendant in the same cluster.
        let suggestions = optimizer().analyze(&tree);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_unrelated_names_produce_nothing() {
        let now = Utc::now();
        let mut b = TreeBuilder::new("/r", now, now);
        let music = b.add_dir(0, "music", now, now);
        let work = b.add_dir(0, "work", now, now);
        b.add_dir(music, "jazz", now, now);
        b.add_dir(work, "contracts", now, now);
        let tree = b.build();

        assert!(optimizer().analyze(&tree).is_empty());
    }
}
