//! Merge suggestions for near-duplicate sibling folders.
//!
//! Only siblings are compared. Two folders with similar names in unrelated
//! subtrees (`clients/acme/invoices`, `archive/invoices`) are usually distinct
//! on purpose; the hierarchy optimizer handles those instead.

use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

use crate::naming::name_similarity;
use crate::suggestion::{Analyzer, Suggestion, SuggestionKind};
use crate::tree::{DirTree, NodeId};

/// Proposes merging sibling folders whose names score at or above the
/// threshold. The primary of a merge is the fuller folder, then the older one.
pub struct SimilarityAnalyzer {
    threshold: f64,
}

impl SimilarityAnalyzer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Decides which folder of a pair survives a merge: the one holding more
    /// entries, then the one created first, then the lexicographically
    /// smaller name.
    fn order_pair(tree: &DirTree, a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        let by_content = tree.descendant_count(b).cmp(&tree.descendant_count(a));
        let by_age = tree.node(a).created.cmp(&tree.node(b).created);
        let by_name = tree.name(a).cmp(tree.name(b));
        match by_content.then(by_age).then(by_name) {
            Ordering::Greater => (b, a),
            _ => (a, b),
        }
    }
}

impl Analyzer for SimilarityAnalyzer {
    fn name(&self) -> &'static str {
        "similarity"
    }

    fn analyze(&self, tree: &DirTree) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        for parent in tree.ids() {
            let children = tree.children(parent);
            let mut candidates: Vec<(f64, NodeId, NodeId)> = Vec::new();
            for (i, &a) in children.iter().enumerate() {
                for &b in &children[i + 1..] {
                    let score = name_similarity(tree.name(a), tree.name(b));
                    if score >= self.threshold {
                        candidates.push((score, a, b));
                    }
                }
            }

            // Each folder takes part in at most one merge: its strongest pair.
            candidates.sort_by(|x, y| {
                y.0.total_cmp(&x.0)
                    .then_with(|| tree.path(x.1).cmp(tree.path(y.1)))
                    .then_with(|| tree.path(x.2).cmp(tree.path(y.2)))
            });
            let mut claimed: HashSet<NodeId> = HashSet::new();
            for (score, a, b) in candidates {
                if claimed.contains(&a) || claimed.contains(&b) {
                    continue;
                }
                claimed.insert(a);
                claimed.insert(b);

                let (primary, absorbed) = Self::order_pair(tree, a, b);
                debug!(
                    primary = %tree.path(primary).display(),
                    absorbed = %tree.path(absorbed).display(),
                    score,
                    "similar sibling folders"
                );
                suggestions.push(Suggestion::new(
                    SuggestionKind::Merge,
                    vec![
                        tree.path(primary).to_path_buf(),
                        tree.path(absorbed).to_path_buf(),
                    ],
                    tree.path(primary).to_path_buf(),
                    score,
                    format!(
                        "'{}' and '{}' have {:.0}% similar names and look like duplicates; \
                         move the contents of '{}' into '{}'",
                        tree.name(primary),
                        tree.name(absorbed),
                        score * 100.0,
                        tree.name(absorbed),
                        tree.name(primary),
                    ),
                ));
            }
        }

        suggestions
    }
}
