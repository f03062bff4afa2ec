//! Proposed reorganizations and the analyzer capability that produces them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::AnalysisError;
use crate::tree::DirTree;

/// What a suggestion proposes. The declaration order is also the ranker's
/// presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// `sources[0]` is the primary folder, `sources[1..]` are absorbed into it.
    Merge,
    /// `sources[0]` is renamed to `target`.
    Rename,
    /// `sources` are moved into the new folder `target`.
    CreateGroup,
    /// `sources` are moved into the existing folder `target`.
    Relocate,
    /// Loose root files in `sources` are moved into `target`.
    GroupLooseFiles,
}

impl SuggestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            SuggestionKind::Merge => "Merge similar folders",
            SuggestionKind::Rename => "Rename for consistency",
            SuggestionKind::CreateGroup => "Create group folder",
            SuggestionKind::Relocate => "Relocate folders",
            SuggestionKind::GroupLooseFiles => "Group loose files",
        }
    }
}

impl fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuggestionKind::Merge => "merge",
            SuggestionKind::Rename => "rename",
            SuggestionKind::CreateGroup => "create-group",
            SuggestionKind::Relocate => "relocate",
            SuggestionKind::GroupLooseFiles => "group-loose-files",
        };
        f.write_str(name)
    }
}

/// Review state of a suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SuggestionStatus {
    #[default]
    Proposed,
    Approved,
    Rejected,
    /// Approved with a user-supplied replacement for the target's final name.
    Modified(String),
}

impl SuggestionStatus {
    /// Whether the applier should act on a suggestion in this state.
    pub fn is_accepted(&self) -> bool {
        matches!(self, SuggestionStatus::Approved | SuggestionStatus::Modified(_))
    }
}

/// One proposed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub sources: Vec<PathBuf>,
    pub target: PathBuf,
    /// Strength of the evidence, in [0, 1].
    pub confidence: f64,
    pub rationale: String,
    #[serde(default)]
    pub status: SuggestionStatus,
}

impl Suggestion {
    pub fn new(
        kind: SuggestionKind,
        sources: Vec<PathBuf>,
        target: PathBuf,
        confidence: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            sources,
            target,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: rationale.into(),
            status: SuggestionStatus::Proposed,
        }
    }

    /// The target after applying a [`SuggestionStatus::Modified`] override,
    /// which replaces the final path component.
    pub fn effective_target(&self) -> PathBuf {
        match &self.status {
            SuggestionStatus::Modified(name) => match self.target.parent() {
                Some(parent) => parent.join(name),
                None => PathBuf::from(name),
            },
            _ => self.target.clone(),
        }
    }

    /// Checks that every source still exists in the snapshot the suggestion
    /// was computed from.
    pub fn validate(&self, tree: &DirTree) -> Result<(), AnalysisError> {
        if self.sources.is_empty() {
            return Err(AnalysisError::EmptySources { kind: self.kind });
        }
        match self.sources.iter().find(|p| !tree.contains_path(p)) {
            Some(missing) => Err(AnalysisError::MissingSource {
                kind: self.kind,
                path: missing.clone(),
            }),
            None => Ok(()),
        }
    }

    /// First source path, used as a deterministic tie-breaker.
    pub fn primary_source(&self) -> &Path {
        self.sources.first().map(PathBuf::as_path).unwrap_or(Path::new(""))
    }
}

/// A pure analysis pass over a tree snapshot.
///
/// Analyzers never mutate shared state, so any number of them can be run over
/// the same snapshot in any order. An optional semantic scorer plugs in as one
/// more implementation without touching the ranker.
pub trait Analyzer {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Candidate suggestions for `tree`, in a deterministic order.
    fn analyze(&self, tree: &DirTree) -> Vec<Suggestion>;
}
