//! Dedups and orders the suggestions of every analyzer.

use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

use crate::suggestion::Suggestion;

/// Merges analyzer output into the final presentation list.
///
/// Candidates are visited by descending confidence. A candidate is dropped
/// when its source set is contained in the source set of a suggestion that was
/// already kept. The survivors are ordered by kind, then descending
/// confidence, then first source path and target, so identical input always
/// produces the identical list.
pub fn rank(candidates: Vec<Suggestion>) -> Vec<Suggestion> {
    let mut candidates = candidates;
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.sources.cmp(&b.sources))
            .then_with(|| a.target.cmp(&b.target))
    });

    let mut kept: Vec<Suggestion> = Vec::with_capacity(candidates.len());
    let mut kept_sources: Vec<BTreeSet<PathBuf>> = Vec::new();
    for candidate in candidates {
        let sources: BTreeSet<PathBuf> = candidate.sources.iter().cloned().collect();
        if let Some(winner) = kept_sources.iter().position(|k| sources.is_subset(k)) {
            debug!(
                dropped = %candidate.kind,
                kept = %kept[winner].kind,
                source = %candidate.primary_source().display(),
                "suggestion covered by a stronger one"
            );
            continue;
        }
        kept_sources.push(sources);
        kept.push(candidate);
    }

    kept.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.primary_source().cmp(b.primary_source()))
            .then_with(|| a.target.cmp(&b.target))
    });
    kept
}
