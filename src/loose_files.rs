//! Groups files sitting directly in the root by their inferred category.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use crate::error::AnalysisError;
use crate::file_category::{Category, FileMapper};
use crate::naming::{edit_ratio, normalize};
use crate::suggestion::{Analyzer, Suggestion, SuggestionKind};
use crate::tree::{DirTree, FileEntry, NodeId};

/// Edit ratio above which an existing folder is taken to mean a category.
const FOLDER_MATCH_RATIO: f64 = 0.85;

pub struct LooseFileGrouper {
    min_files: usize,
    mapper: FileMapper,
}

impl LooseFileGrouper {
    pub fn new(min_files: usize) -> Self {
        Self {
            min_files,
            mapper: FileMapper::default(),
        }
    }

    /// Buckets root files by category. Singleton buckets are folded into
    /// [`Category::Other`].
    fn buckets<'a>(&self, files: &[&'a FileEntry]) -> BTreeMap<Category, Vec<&'a FileEntry>> {
        let mut buckets: BTreeMap<Category, Vec<&FileEntry>> = BTreeMap::new();
        for &file in files {
            buckets
                .entry(self.mapper.categorize(&file.extension))
                .or_default()
                .push(file);
        }

        let singletons: Vec<Category> = buckets
            .iter()
            .filter(|(category, members)| **category != Category::Other && members.len() == 1)
            .map(|(category, _)| *category)
            .collect();
        for category in singletons {
            if let Some(members) = buckets.remove(&category) {
                buckets.entry(Category::Other).or_default().extend(members);
            }
        }
        buckets
    }

    /// An existing root folder whose name matches the category's canonical
    /// name or one of its aliases.
    fn folder_by_name(tree: &DirTree, category: Category) -> Option<NodeId> {
        let wanted: Vec<&str> = std::iter::once(category.folder_name())
            .chain(category.aliases().iter().copied())
            .collect();
        for candidate in wanted {
            let key = normalize(candidate);
            let found = tree.children(tree.root()).iter().copied().find(|&child| {
                let name = tree.name(child);
                normalize(name) == key || edit_ratio(name, candidate) >= FOLDER_MATCH_RATIO
            });
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// The root folder already holding the most files of `category`, at any
    /// depth. Ties go to the smaller path. [`Category::Other`] never matches.
    fn folder_by_content(&self, tree: &DirTree, category: Category) -> Option<NodeId> {
        if category == Category::Other {
            return None;
        }
        tree.children(tree.root())
            .iter()
            .copied()
            .map(|child| {
                let held = tree
                    .files()
                    .iter()
                    .filter(|f| f.parent == child || tree.is_ancestor(child, f.parent))
                    .filter(|f| self.mapper.categorize(&f.extension) == category)
                    .count();
                (child, held)
            })
            .filter(|&(_, held)| held > 0)
            .min_by(|&(a, held_a), &(b, held_b)| {
                held_b.cmp(&held_a).then_with(|| tree.path(a).cmp(tree.path(b)))
            })
            .map(|(child, _)| child)
    }

    fn existing_folder(&self, tree: &DirTree, category: Category) -> Option<NodeId> {
        Self::folder_by_name(tree, category).or_else(|| self.folder_by_content(tree, category))
    }
}

impl Analyzer for LooseFileGrouper {
    fn name(&self) -> &'static str {
        "loose_files"
    }

    fn analyze(&self, tree: &DirTree) -> Vec<Suggestion> {
        let loose = tree.loose_files();
        if loose.len() < self.min_files {
            debug!(count = loose.len(), "too few loose files to group");
            return Vec::new();
        }
        let total = loose.len();
        let taken = tree.entry_names(tree.root());

        let mut suggestions = Vec::new();
        for (category, mut members) in self.buckets(&loose) {
            if members.len() < 2 {
                debug!(?category, "single file left in bucket, not grouping");
                continue;
            }
            members.sort_by(|a, b| a.path.cmp(&b.path));

            let share = members.len() as f64 / total as f64;
            let base = if category == Category::Other { 0.3 } else { 0.5 };
            let (target, verb) = match self.existing_folder(tree, category) {
                Some(folder) => (tree.path(folder).to_path_buf(), "move them into the existing"),
                None => {
                    let name = category.folder_name();
                    if taken.contains(&name.to_lowercase()) {
                        let err = AnalysisError::NameCollision {
                            kind: SuggestionKind::GroupLooseFiles,
                            target: tree.root_path().to_path_buf(),
                            name: name.to_string(),
                        };
                        debug!("{}", err);
                        continue;
                    }
                    (tree.root_path().join(name), "create a new")
                }
            };
            let folder_name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            suggestions.push(Suggestion::new(
                SuggestionKind::GroupLooseFiles,
                members.iter().map(|f| f.path.clone()).collect::<Vec<PathBuf>>(),
                target,
                base + 0.5 * share,
                format!(
                    "{} of {} loose files in the root are {}; {} folder '{}'",
                    members.len(),
                    total,
                    category.description(),
                    verb,
                    folder_name
                ),
            ));
        }
        suggestions
    }
}
