//! Flattens a tree: every file moves to the root, then the emptied
//! directories are removed deepest first. Runs through the same journaled
//! [`Executor`] as suggestion apply, so an explode can be undone.

use indicatif::ProgressBar;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::applier::Executor;
use crate::error::ApplyError;
use crate::journal::{JournalMode, JournalStore, OpKind};
use crate::tree::DirTree;

/// The moves and removals an explode would perform on a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplodePlan {
    pub root: PathBuf,
    /// `(from, to)` pairs. A destination that clashes with an existing root
    /// entry, or an earlier move, is numbered `name_1.ext`, `name_2.ext`, ...
    pub moves: Vec<(PathBuf, PathBuf)>,
    /// Every directory below the root, deepest first.
    pub directories: Vec<PathBuf>,
}

impl ExplodePlan {
    pub fn for_tree(tree: &DirTree) -> Self {
        let root = tree.root_path().to_path_buf();
        let mut taken: HashSet<String> = tree
            .loose_files()
            .iter()
            .map(|f| f.name.clone())
            .chain(tree.children(tree.root()).iter().map(|&c| tree.name(c).to_string()))
            .collect();

        let mut moves = Vec::new();
        for file in tree.files().iter().filter(|f| f.parent != tree.root()) {
            let mut name = file.name.clone();
            let mut counter = 1;
            while taken.contains(&name) {
                name = numbered(&file.name, counter);
                counter += 1;
            }
            taken.insert(name.clone());
            moves.push((file.path.clone(), root.join(name)));
        }

        let mut dirs: Vec<(usize, PathBuf)> = tree
            .ids()
            .into_iter()
            .filter(|&id| id != tree.root())
            .map(|id| (tree.depth_of(id), tree.path(id).to_path_buf()))
            .collect();
        dirs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        Self {
            root,
            moves,
            directories: dirs.into_iter().map(|(_, p)| p).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.directories.is_empty()
    }
}

/// `report.txt` numbered 2 becomes `report_2.txt`.
fn numbered(name: &str, counter: usize) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], counter, &name[dot..]),
        _ => format!("{}_{}", name, counter),
    }
}

#[derive(Debug, Clone)]
pub struct ExplodeReport {
    pub journal: PathBuf,
    pub files_moved: usize,
    pub directories_removed: usize,
    /// Directories left in place because they still held entries the scan
    /// did not see, such as hidden or filtered files.
    pub directories_kept: Vec<PathBuf>,
    /// The error that halted the run, if any.
    pub failure: Option<String>,
}

impl ExplodeReport {
    pub fn partial_failure(&self) -> bool {
        self.failure.is_some()
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_none())
}

pub struct Exploder<'s> {
    store: &'s JournalStore,
    progress: ProgressBar,
}

impl<'s> Exploder<'s> {
    pub fn new(store: &'s JournalStore) -> Self {
        Self {
            store,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Executes `plan`, stopping at the first failed operation.
    pub fn run(&self, plan: &ExplodePlan) -> Result<ExplodeReport, ApplyError> {
        let mut journal = self.store.begin(&plan.root, JournalMode::Explode)?;
        let mut report = ExplodeReport {
            journal: PathBuf::new(),
            files_moved: 0,
            directories_removed: 0,
            directories_kept: Vec::new(),
            failure: None,
        };

        self.progress
            .set_length((plan.moves.len() + plan.directories.len()) as u64);
        let result = {
            let mut executor = Executor::new(&mut journal, None);
            self.execute(&mut executor, plan, &mut report)
        };
        self.progress.finish_and_clear();

        if let Err(e) = result {
            error!("explode halted: {}", e);
            report.failure = Some(e.to_string());
        }
        report.journal = journal.finalize(report.failure.is_some())?;
        info!(
            moved = report.files_moved,
            removed = report.directories_removed,
            kept = report.directories_kept.len(),
            "explode finished"
        );
        Ok(report)
    }

    fn execute(
        &self,
        executor: &mut Executor<'_>,
        plan: &ExplodePlan,
        report: &mut ExplodeReport,
    ) -> Result<(), ApplyError> {
        self.progress.set_message("moving files");
        for (from, to) in &plan.moves {
            executor.relocate(OpKind::Move, from, to)?;
            report.files_moved += 1;
            self.progress.inc(1);
        }

        self.progress.set_message("removing folders");
        for dir in &plan.directories {
            if is_empty_dir(dir) {
                executor.delete_dir(dir)?;
                report.directories_removed += 1;
            } else {
                warn!(dir = %dir.display(), "directory not empty after flatten, keeping it");
                report.directories_kept.push(dir.clone());
            }
            self.progress.inc(1);
        }
        Ok(())
    }
}
