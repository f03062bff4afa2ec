//! Transactional apply of approved suggestions.
//!
//! Each accepted suggestion becomes one or more journaled operations executed
//! in ranker order. The first failing operation halts the run: the suggestion
//! it belongs to is reported as failed, every later one as skipped, and the
//! journal is finalized with the partial-failure flag so the operations that
//! did happen can still be undone.

use indicatif::ProgressBar;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::error::ApplyError;
use crate::journal::{ChangeJournal, JournalMode, JournalStore, OpKind};
use crate::suggestion::{Suggestion, SuggestionKind};

/// True when something exists at `path`, without following symlinks.
pub(crate) fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Whether the directory entry at `path` carries exactly that name. On
/// case-insensitive filesystems `Foo` "exists" as soon as `foo` does.
fn has_exact_entry(path: &Path) -> bool {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return false;
    };
    fs::read_dir(parent)
        .map(|entries| entries.filter_map(|e| e.ok()).any(|e| e.file_name() == name))
        .unwrap_or(false)
}

/// Whether `to` is taken by something other than `from` under a different
/// letter case.
pub(crate) fn occupied(from: &Path, to: &Path) -> bool {
    if !exists(to) {
        return false;
    }
    let case_only = from.parent() == to.parent()
        && from.file_name().map(|n| n.to_string_lossy().to_lowercase())
            == to.file_name().map(|n| n.to_string_lossy().to_lowercase());
    !case_only || has_exact_entry(to)
}

/// `dir/name` if free, else `dir/stem_1.ext`, `dir/stem_2.ext`, ...
pub(crate) fn unique_destination(dir: &Path, name: &OsStr) -> PathBuf {
    let candidate = dir.join(name);
    if !exists(&candidate) {
        return candidate;
    }
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Performs filesystem operations through the journal: intent line, the
/// operation itself, then commit line.
pub struct Executor<'j> {
    journal: &'j mut ChangeJournal,
    suggestion: Option<usize>,
    operations: usize,
}

impl<'j> Executor<'j> {
    pub fn new(journal: &'j mut ChangeJournal, suggestion: Option<usize>) -> Self {
        Self {
            journal,
            suggestion,
            operations: 0,
        }
    }

    /// Operations performed so far.
    pub fn operations(&self) -> usize {
        self.operations
    }

    /// Renames or moves `from` to `to`.
    pub fn relocate(&mut self, op: OpKind, from: &Path, to: &Path) -> Result<(), ApplyError> {
        if !exists(from) {
            return Err(ApplyError::SourceVanished {
                op,
                source_path: from.to_path_buf(),
            });
        }
        if occupied(from, to) {
            return Err(ApplyError::Collision {
                op,
                destination: to.to_path_buf(),
            });
        }

        let record = self.journal.append(op, from, Some(to), self.suggestion)?;
        fs::rename(from, to).map_err(|source| ApplyError::Filesystem {
            op,
            source_path: from.to_path_buf(),
            destination: Some(to.to_path_buf()),
            source,
        })?;
        self.journal.commit(record.sequence)?;
        self.operations += 1;
        debug!(%op, from = %from.display(), to = %to.display(), "applied");
        Ok(())
    }

    fn create_dir(&mut self, dir: &Path) -> Result<(), ApplyError> {
        let record = self
            .journal
            .append(OpKind::CreateDir, dir, None, self.suggestion)?;
        fs::create_dir(dir).map_err(|source| ApplyError::Filesystem {
            op: OpKind::CreateDir,
            source_path: dir.to_path_buf(),
            destination: None,
            source,
        })?;
        self.journal.commit(record.sequence)?;
        self.operations += 1;
        debug!(dir = %dir.display(), "created directory");
        Ok(())
    }

    /// Creates `dir` and any missing ancestors, one journaled step each.
    pub fn ensure_dir(&mut self, dir: &Path) -> Result<(), ApplyError> {
        if let Ok(meta) = fs::symlink_metadata(dir) {
            if meta.is_dir() {
                return Ok(());
            }
            return Err(ApplyError::Collision {
                op: OpKind::CreateDir,
                destination: dir.to_path_buf(),
            });
        }

        let mut missing = vec![dir.to_path_buf()];
        let mut current = dir.parent();
        while let Some(parent) = current {
            if exists(parent) {
                break;
            }
            missing.push(parent.to_path_buf());
            current = parent.parent();
        }
        for path in missing.iter().rev() {
            self.create_dir(path)?;
        }
        Ok(())
    }

    /// Removes the empty directory `dir`.
    pub fn delete_dir(&mut self, dir: &Path) -> Result<(), ApplyError> {
        let record = self
            .journal
            .append(OpKind::DeleteDir, dir, None, self.suggestion)?;
        fs::remove_dir(dir).map_err(|source| ApplyError::Filesystem {
            op: OpKind::DeleteDir,
            source_path: dir.to_path_buf(),
            destination: None,
            source,
        })?;
        self.journal.commit(record.sequence)?;
        self.operations += 1;
        debug!(dir = %dir.display(), "removed directory");
        Ok(())
    }

    /// Moves everything inside `from` into `into`, then removes `from`.
    /// Subdirectories present on both sides are merged recursively; clashing
    /// files get a numbered name.
    pub fn merge_into(&mut self, from: &Path, into: &Path) -> Result<(), ApplyError> {
        if !exists(from) {
            return Err(ApplyError::SourceVanished {
                op: OpKind::Move,
                source_path: from.to_path_buf(),
            });
        }
        let read_err = |source| ApplyError::Filesystem {
            op: OpKind::Move,
            source_path: from.to_path_buf(),
            destination: Some(into.to_path_buf()),
            source,
        };
        let mut entries: Vec<PathBuf> = fs::read_dir(from)
            .map_err(read_err)?
            .map(|e| e.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .map_err(read_err)?;
        entries.sort();

        for entry in entries {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let dest = into.join(name);
            let both_dirs = fs::symlink_metadata(&entry).is_ok_and(|m| m.is_dir())
                && fs::symlink_metadata(&dest).is_ok_and(|m| m.is_dir());
            if both_dirs {
                self.merge_into(&entry, &dest)?;
            } else {
                let dest = unique_destination(into, name);
                self.relocate(OpKind::Move, &entry, &dest)?;
            }
        }
        self.delete_dir(from)
    }
}

/// Ordered prefix substitutions for paths moved by earlier suggestions in
/// the same run.
#[derive(Debug, Default)]
struct PathRemap {
    moves: Vec<(PathBuf, PathBuf)>,
}

impl PathRemap {
    fn push(&mut self, from: &Path, to: &Path) {
        if from != to {
            self.moves.push((from.to_path_buf(), to.to_path_buf()));
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        let mut current = path.to_path_buf();
        for (from, to) in &self.moves {
            if let Ok(rest) = current.strip_prefix(from) {
                current = if rest.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(rest)
                };
            }
        }
        current
    }
}

/// What happened to one accepted suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied { operations: usize },
    Failed { error: String },
    /// Not attempted because an earlier suggestion failed.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct SuggestionReport {
    pub suggestion: Suggestion,
    pub outcome: Outcome,
}

/// Result of an apply run.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub entries: Vec<SuggestionReport>,
    pub journal: PathBuf,
    pub partial_failure: bool,
}

impl ApplyReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Applied { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    /// Total filesystem operations performed.
    pub fn operations(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e.outcome {
                Outcome::Applied { operations } => operations,
                _ => 0,
            })
            .sum()
    }
}

/// Applies approved suggestions to a tree, journaling every step.
pub struct Applier<'s> {
    store: &'s JournalStore,
    progress: ProgressBar,
}

impl<'s> Applier<'s> {
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

    /// Applies the accepted suggestions of `suggestions`, in order.
    ///
    /// Only a journal that cannot be created or finalized is returned as an
    /// error. Filesystem failures end up in the report.
    pub fn apply(&self, root: &Path, suggestions: &[Suggestion]) -> Result<ApplyReport, ApplyError> {
        let accepted: Vec<&Suggestion> = suggestions
            .iter()
            .filter(|s| s.status.is_accepted())
            .collect();
        let mut journal = self.store.begin(root, JournalMode::Suggestions)?;
        let mut remap = PathRemap::default();
        let mut entries = Vec::with_capacity(accepted.len());
        let mut failed = false;

        self.progress.set_length(accepted.len() as u64);
        for (index, suggestion) in accepted.into_iter().enumerate() {
            if failed {
                entries.push(SuggestionReport {
                    suggestion: suggestion.clone(),
                    outcome: Outcome::Skipped,
                });
                continue;
            }

            self.progress.set_message(suggestion.kind.label());
            let mut executor = Executor::new(&mut journal, Some(index));
            let outcome = match apply_one(&mut executor, suggestion, &mut remap) {
                Ok(()) => Outcome::Applied {
                    operations: executor.operations(),
                },
                Err(e) => {
                    error!(kind = %suggestion.kind, "apply halted: {}", e);
                    failed = true;
                    Outcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            entries.push(SuggestionReport {
                suggestion: suggestion.clone(),
                outcome,
            });
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        let journal = journal.finalize(failed)?;
        info!(
            journal = %journal.display(),
            partial_failure = failed,
            "apply finished"
        );
        Ok(ApplyReport {
            entries,
            journal,
            partial_failure: failed,
        })
    }
}

fn apply_one(
    executor: &mut Executor<'_>,
    suggestion: &Suggestion,
    remap: &mut PathRemap,
) -> Result<(), ApplyError> {
    let sources: Vec<PathBuf> = suggestion.sources.iter().map(|p| remap.resolve(p)).collect();
    let target = remap.resolve(&suggestion.effective_target());

    match suggestion.kind {
        SuggestionKind::Merge => {
            let primary = remap.resolve(&suggestion.target);
            for absorbed in sources.iter().filter(|s| **s != primary) {
                executor.merge_into(absorbed, &primary)?;
                remap.push(absorbed, &primary);
            }
            if target != primary {
                executor.relocate(OpKind::Rename, &primary, &target)?;
                remap.push(&primary, &target);
            }
        }
        SuggestionKind::Rename => {
            let Some(source) = sources.first() else {
                return Ok(());
            };
            executor.relocate(OpKind::Rename, source, &target)?;
            remap.push(source, &target);
        }
        SuggestionKind::CreateGroup | SuggestionKind::Relocate | SuggestionKind::GroupLooseFiles => {
            executor.ensure_dir(&target)?;
            for source in &sources {
                let Some(name) = source.file_name() else {
                    return Err(ApplyError::SourceVanished {
                        op: OpKind::Move,
                        source_path: source.clone(),
                    });
                };
                let dest = if suggestion.kind == SuggestionKind::GroupLooseFiles {
                    unique_destination(&target, name)
                } else {
                    target.join(name)
                };
                executor.relocate(OpKind::Move, source, &dest)?;
                remap.push(source, &dest);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::LoadedJournal;
    use crate::suggestion::SuggestionStatus;
    use tempfile::TempDir;

    struct Setup {
        temp: TempDir,
        store: JournalStore,
    }

    impl Setup {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir(temp.path().join("tree")).unwrap();
            let store = JournalStore::new(temp.path().join("journals"));
            Self { temp, store }
        }

        fn root(&self) -> PathBuf {
            self.temp.path().join("tree")
        }

        fn file(&self, rel: &str) {
            let path = self.root().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, rel).unwrap();
        }

        fn dir(&self, rel: &str) {
            fs::create_dir_all(self.root().join(rel)).unwrap();
        }

        fn approved(&self, kind: SuggestionKind, sources: &[&str], target: &str) -> Suggestion {
            let mut s = Suggestion::new(
                kind,
                sources.iter().map(|s| self.root().join(s)).collect(),
                self.root().join(target),
                0.9,
                "",
            );
            s.status = SuggestionStatus::Approved;
            s
        }
    }

    #[test]
    fn test_merge_moves_contents_and_removes_absorbed() {
        let setup = Setup::new();
        setup.file("Photos2021/a.jpg");
        setup.file("Photos_2021/b.jpg");
        setup.file("Photos_2021/a.jpg");
        let merge = setup.approved(
            SuggestionKind::Merge,
            &["Photos2021", "Photos_2021"],
            "Photos2021",
        );

        let report = Applier::new(&setup.store)
            .apply(&setup.root(), &[merge])
            .unwrap();
        assert_eq!(report.applied(), 1);
        assert!(!report.partial_failure);
        let root = setup.root();
        assert!(root.join("Photos2021/b.jpg").exists());
        assert!(root.join("Photos2021/a_1.jpg").exists());
        assert!(!root.join("Photos_2021").exists());
    }

    #[test]
    fn test_group_creates_missing_target_first() {
        let setup = Setup::new();
        setup.file("a.jpg");
        setup.file("b.jpg");
        let group = setup.approved(SuggestionKind::GroupLooseFiles, &["a.jpg", "b.jpg"], "Images");

        let report = Applier::new(&setup.store)
            .apply(&setup.root(), &[group])
            .unwrap();
        let journal = LoadedJournal::load(&report.journal).unwrap();
        let kinds: Vec<OpKind> = journal.records.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![OpKind::CreateDir, OpKind::Move, OpKind::Move]);
        assert_eq!(journal.committed_records().len(), 3);
        assert!(setup.root().join("Images/a.jpg").exists());
    }

    #[test]
    fn test_modified_name_is_used() {
        let setup = Setup::new();
        setup.dir("Work Stuff");
        let mut rename = setup.approved(SuggestionKind::Rename, &["Work Stuff"], "work_stuff");
        rename.status = SuggestionStatus::Modified("work".to_string());

        Applier::new(&setup.store)
            .apply(&setup.root(), &[rename])
            .unwrap();
        assert!(setup.root().join("work").is_dir());
        assert!(!setup.root().join("work_stuff").exists());
    }

    #[test]
    fn test_later_suggestions_follow_earlier_moves() {
        let setup = Setup::new();
        setup.dir("Old Projects/alpha");
        setup.dir("archive");
        let rename = setup.approved(SuggestionKind::Rename, &["Old Projects"], "old_projects");
        let relocate = setup.approved(SuggestionKind::Relocate, &["Old Projects/alpha"], "archive");

        let report = Applier::new(&setup.store)
            .apply(&setup.root(), &[rename, relocate])
            .unwrap();
        assert_eq!(report.applied(), 2);
        assert!(setup.root().join("archive/alpha").is_dir());
    }

    #[test]
    fn test_failure_halts_remaining_suggestions() {
        let setup = Setup::new();
        setup.dir("a");
        setup.dir("b");
        setup.dir("c");
        let suggestions = vec![
            setup.approved(SuggestionKind::Rename, &["a"], "A"),
            setup.approved(SuggestionKind::Rename, &["gone"], "Gone"),
            setup.approved(SuggestionKind::Rename, &["c"], "C"),
        ];

        let report = Applier::new(&setup.store)
            .apply(&setup.root(), &suggestions)
            .unwrap();
        assert!(report.partial_failure);
        assert_eq!(
            report.entries.iter().map(|e| e.outcome.clone()).collect::<Vec<_>>()[2],
            Outcome::Skipped
        );
        assert_eq!((report.applied(), report.failed(), report.skipped()), (1, 1, 1));
        assert!(setup.root().join("c").is_dir());

        let journal = LoadedJournal::load(&report.journal).unwrap();
        assert!(journal.partial_failure());
        assert_eq!(journal.committed_records().len(), 1);
    }

    #[test]
    fn test_collision_is_reported() {
        let setup = Setup::new();
        setup.dir("alpha");
        setup.dir("group/alpha");
        let group = setup.approved(SuggestionKind::Relocate, &["alpha"], "group");

        let report = Applier::new(&setup.store)
            .apply(&setup.root(), &[group])
            .unwrap();
        assert_eq!(report.failed(), 1);
        match &report.entries[0].outcome {
            Outcome::Failed { error } => assert!(error.contains("already exists")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_rejected_suggestions_are_ignored() {
        let setup = Setup::new();
        setup.dir("a");
        let mut rename = setup.approved(SuggestionKind::Rename, &["a"], "A");
        rename.status = SuggestionStatus::Rejected;

        let report = Applier::new(&setup.store)
            .apply(&setup.root(), &[rename])
            .unwrap();
        assert!(report.entries.is_empty());
        assert!(setup.root().join("a").is_dir());
    }

    #[test]
    fn test_remap_resolves_prefixes() {
        let mut remap = PathRemap::default();
        remap.push(Path::new("/r/a"), Path::new("/r/b"));
        remap.push(Path::new("/r/b/x"), Path::new("/r/y"));
        assert_eq!(remap.resolve(Path::new("/r/a/x/file")), PathBuf::from("/r/y/file"));
        assert_eq!(remap.resolve(Path::new("/r/ab")), PathBuf::from("/r/ab"));
    }

    #[test]
    fn test_unique_destination_numbers_conflicts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "x").unwrap();
        fs::write(temp.path().join("notes_1.txt"), "x").unwrap();
        assert_eq!(
            unique_destination(temp.path(), OsStr::new("notes.txt")),
            temp.path().join("notes_2.txt")
        );
        assert_eq!(
            unique_destination(temp.path(), OsStr::new("fresh")),
            temp.path().join("fresh")
        );
    }
}
