//! Integration tests for foldersense
//!
//! These tests simulate real-world usage scenarios, driving the complete
//! scan, analyze, review, apply and undo pipeline against temporary trees.
//!
//! Test categories:
//! 1. Suggestion generation on disk
//! 2. Review and confirmation flows
//! 3. Apply and undo round trips
//! 4. Fail-fast apply
//! 5. Explode
//! 6. Configuration and filtering

use foldersense::applier::{Applier, Outcome};
use foldersense::cli::{RunMode, RunOutcome, Runner};
use foldersense::config::AppConfig;
use foldersense::engine::SuggestionEngine;
use foldersense::error::{Error, UndoError};
use foldersense::journal::{JournalStore, LoadedJournal};
use foldersense::review::{AutoApprove, DecisionSource, ReviewEvent, ScriptedDecisions};
use foldersense::scanner::scan;
use foldersense::suggestion::{Suggestion, SuggestionKind, SuggestionStatus};
use foldersense::tree::DirTree;
use foldersense::undo::UndoManager;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary directory holding the tree under test in `tree/` and the
/// journals in `journals/`, so journals never show up in the tree itself.
struct TestFixture {
    temp_dir: TempDir,
    config: AppConfig,
}

impl TestFixture {
    fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    fn with_config(config: AppConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("tree")).expect("Failed to create tree");
        TestFixture { temp_dir, config }
    }

    /// Canonical path of the tree under test.
    fn root(&self) -> PathBuf {
        self.temp_dir
            .path()
            .join("tree")
            .canonicalize()
            .expect("Failed to canonicalize root")
    }

    fn store(&self) -> JournalStore {
        JournalStore::new(self.temp_dir.path().join("journals"))
    }

    /// Create a file, and any missing parent folders, at `rel_path`.
    fn create_file(&self, rel_path: &str) {
        let path = self.root().join(rel_path);
        fs::create_dir_all(path.parent().expect("file has a parent"))
            .expect("Failed to create parent");
        fs::write(&path, rel_path).expect("Failed to write file");
    }

    fn create_files(&self, rel_paths: &[&str]) {
        for rel_path in rel_paths {
            self.create_file(rel_path);
        }
    }

    fn create_subdir(&self, rel_path: &str) {
        fs::create_dir_all(self.root().join(rel_path)).expect("Failed to create subdirectory");
    }

    /// Two mergeable folders of video clips plus six loose files.
    fn photos_scenario(&self) {
        self.create_files(&[
            "Photos2021/x.mov",
            "Photos2021/y.mov",
            "Photos_2021/z.mov",
            "a.jpg",
            "b.jpg",
            "c.png",
            "d.txt",
            "e.txt",
            "f.xyz",
        ]);
    }

    fn snapshot(&self) -> DirTree {
        let filters = self.config.compile_filters().expect("Failed to compile filters");
        scan(&self.root(), &filters).expect("Failed to scan")
    }

    fn outline(&self) -> Vec<String> {
        self.snapshot().outline()
    }

    fn run(&self, mode: RunMode, decisions: &mut dyn DecisionSource) -> Result<RunOutcome, Error> {
        Runner::new(self.config.clone(), self.store(), decisions).run(&self.root(), mode)
    }

    fn journal_files(&self) -> Vec<PathBuf> {
        self.store().journals(&self.root()).expect("Failed to list journals")
    }

    fn assert_dir_exists(&self, rel_path: &str) {
        let path = self.root().join(rel_path);
        assert!(path.is_dir(), "Directory should exist: {}", path.display());
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.root().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_not_exists(&self, rel_path: &str) {
        let path = self.root().join(rel_path);
        assert!(!path.exists(), "Path should not exist: {}", path.display());
    }
}

fn applied(outcome: RunOutcome) -> foldersense::applier::ApplyReport {
    match outcome {
        RunOutcome::Applied(report) => report,
        other => panic!("expected an applied run, got {:?}", other),
    }
}

// ============================================================================
// Test Suite 1: Suggestion Generation
// ============================================================================

#[test]
fn test_photos_scenario_suggestions() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    let root = fixture.root();

    let suggestions = SuggestionEngine::from_config(&fixture.config.analysis)
        .analyze(&fixture.snapshot());
    let summary: Vec<(SuggestionKind, PathBuf)> = suggestions
        .iter()
        .map(|s| (s.kind, s.target.clone()))
        .collect();

    assert_eq!(
        summary,
        vec![
            (SuggestionKind::Merge, root.join("Photos2021")),
            (SuggestionKind::GroupLooseFiles, root.join("Images")),
            (SuggestionKind::GroupLooseFiles, root.join("Documents")),
        ]
    );
    assert_eq!(
        suggestions[1].sources,
        vec![root.join("a.jpg"), root.join("b.jpg"), root.join("c.png")]
    );
    assert!(
        suggestions
            .iter()
            .all(|s| !s.sources.contains(&root.join("f.xyz")))
    );
}

#[test]
fn test_analysis_is_deterministic_across_scans() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    let engine = SuggestionEngine::from_config(&fixture.config.analysis);

    let first = engine.analyze(&fixture.snapshot());
    let second = engine.analyze(&fixture.snapshot());
    assert_eq!(first, second);
}

#[test]
fn test_loose_files_below_threshold_not_grouped() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);

    let suggestions = SuggestionEngine::from_config(&fixture.config.analysis)
        .analyze(&fixture.snapshot());
    assert!(
        suggestions
            .iter()
            .all(|s| s.kind != SuggestionKind::GroupLooseFiles)
    );
}

#[test]
fn test_well_organized_tree_is_a_no_op() {
    let fixture = TestFixture::new();
    fixture.create_files(&["docs/readme.md", "src/main.rs"]);
    let before = fixture.outline();

    let outcome = fixture
        .run(RunMode::Suggest { dry_run: false }, &mut AutoApprove)
        .expect("run failed");
    assert!(matches!(outcome, RunOutcome::NothingToDo));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(fixture.outline(), before);
    assert!(fixture.journal_files().is_empty());
}

// ============================================================================
// Test Suite 2: Review and Confirmation
// ============================================================================

#[test]
fn test_dry_run_makes_no_changes() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    let before = fixture.outline();

    let outcome = fixture
        .run(RunMode::Suggest { dry_run: true }, &mut AutoApprove)
        .expect("run failed");
    assert!(matches!(outcome, RunOutcome::Previewed { changes: 3 }));
    assert_eq!(fixture.outline(), before);
    assert!(fixture.journal_files().is_empty());
}

#[test]
fn test_dry_run_reviews_each_suggestion() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    let before = fixture.outline();
    let mut decisions = ScriptedDecisions::new([
        ReviewEvent::Reject,
        ReviewEvent::Approve,
        ReviewEvent::Reject,
    ]);

    let outcome = fixture
        .run(RunMode::Suggest { dry_run: true }, &mut decisions)
        .expect("run failed");
    assert!(matches!(outcome, RunOutcome::Previewed { changes: 1 }));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(decisions.remaining(), 0);
    assert_eq!(fixture.outline(), before);
    assert!(fixture.journal_files().is_empty());
}

#[test]
fn test_dry_run_with_everything_rejected_is_cancelled() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    let mut decisions = ScriptedDecisions::new([ReviewEvent::Quit]);

    let outcome = fixture
        .run(RunMode::Suggest { dry_run: true }, &mut decisions)
        .expect("run failed");
    assert!(matches!(outcome, RunOutcome::Cancelled));
    assert!(fixture.journal_files().is_empty());
}

#[test]
fn test_quit_applies_earlier_approvals() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    let mut decisions = ScriptedDecisions::new([ReviewEvent::Approve, ReviewEvent::Quit])
        .with_confirmations([true]);

    let report = applied(
        fixture
            .run(RunMode::Suggest { dry_run: false }, &mut decisions)
            .expect("run failed"),
    );
    assert_eq!(report.applied(), 1);
    fixture.assert_file_exists("Photos2021/z.mov");
    fixture.assert_not_exists("Photos_2021");
    fixture.assert_file_exists("a.jpg");
    fixture.assert_not_exists("Images");
}

#[test]
fn test_declined_confirmation_changes_nothing() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    let before = fixture.outline();
    let mut decisions = ScriptedDecisions::new([ReviewEvent::ApproveAll]).with_confirmations([false]);

    let outcome = fixture
        .run(RunMode::Suggest { dry_run: false }, &mut decisions)
        .expect("run failed");
    assert!(matches!(outcome, RunOutcome::Cancelled));
    assert_eq!(fixture.outline(), before);
    assert!(fixture.journal_files().is_empty());
}

#[test]
fn test_renamed_target_is_used() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    let mut decisions = ScriptedDecisions::new([
        ReviewEvent::Reject,
        ReviewEvent::Rename("Pictures".to_string()),
        ReviewEvent::Reject,
    ])
    .with_confirmations([true]);

    applied(
        fixture
            .run(RunMode::Suggest { dry_run: false }, &mut decisions)
            .expect("run failed"),
    );
    fixture.assert_file_exists("Pictures/a.jpg");
    fixture.assert_file_exists("Pictures/c.png");
    fixture.assert_not_exists("Images");
    fixture.assert_dir_exists("Photos_2021");
}

// ============================================================================
// Test Suite 3: Apply and Undo
// ============================================================================

#[test]
fn test_apply_all_then_undo_restores_tree() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    let before = fixture.outline();

    let report = applied(
        fixture
            .run(RunMode::Suggest { dry_run: false }, &mut AutoApprove)
            .expect("apply failed"),
    );
    assert_eq!(report.applied(), 3);
    assert!(!report.partial_failure);
    fixture.assert_file_exists("Photos2021/z.mov");
    fixture.assert_file_exists("Images/a.jpg");
    fixture.assert_file_exists("Documents/e.txt");
    fixture.assert_file_exists("f.xyz");
    assert_ne!(fixture.outline(), before);

    let outcome = fixture.run(RunMode::Undo, &mut AutoApprove).expect("undo failed");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(fixture.outline(), before);
}

#[test]
fn test_root_file_named_like_category_is_left_alone() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.jpg", "b.jpg", "c.png", "Images", "d.txt", "e.txt"]);

    let report = applied(
        fixture
            .run(RunMode::Suggest { dry_run: false }, &mut AutoApprove)
            .expect("apply failed"),
    );
    assert!(!report.partial_failure);
    assert_eq!(report.applied(), 1);
    assert_eq!(report.failed(), 0);
    fixture.assert_file_exists("Images");
    fixture.assert_file_exists("a.jpg");
    fixture.assert_file_exists("Documents/d.txt");
}

#[test]
fn test_journal_is_written_ahead_and_finalized() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();

    let report = applied(
        fixture
            .run(RunMode::Suggest { dry_run: false }, &mut AutoApprove)
            .expect("apply failed"),
    );
    let journal = LoadedJournal::load(&report.journal).expect("journal unreadable");
    assert_eq!(journal.root, fixture.root());
    assert!(journal.is_finalized());
    assert!(!journal.partial_failure());
    assert_eq!(journal.records.len(), journal.committed_records().len());
    assert_eq!(journal.records.len(), report.operations());
    assert!(
        journal
            .records
            .windows(2)
            .all(|w| w[0].sequence < w[1].sequence)
    );
}

#[test]
fn test_undo_without_journal_fails() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt");

    let result = fixture.run(RunMode::Undo, &mut AutoApprove);
    match result {
        Err(e) => {
            assert!(matches!(e, Error::Undo(UndoError::NoJournal { .. })));
            assert_eq!(e.exit_code(), 1);
        }
        Ok(outcome) => panic!("expected an error, got {:?}", outcome),
    }
}

#[test]
fn test_undo_refuses_non_empty_created_folder() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    fixture
        .run(RunMode::Suggest { dry_run: false }, &mut AutoApprove)
        .expect("apply failed");
    fixture.create_file("Images/added-later.jpg");

    let outcome = fixture.run(RunMode::Undo, &mut AutoApprove).expect("undo failed");
    let RunOutcome::Undone(report) = &outcome else {
        panic!("expected an undo, got {:?}", outcome);
    };
    assert_eq!(report.refused.len(), 1);
    assert!(matches!(report.refused[0], UndoError::NotEmpty { .. }));
    assert_eq!(outcome.exit_code(), 0);
    fixture.assert_file_exists("a.jpg");
    fixture.assert_file_exists("Images/added-later.jpg");
    fixture.assert_dir_exists("Photos_2021");
}

#[test]
fn test_second_undo_has_nothing_to_do() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    fixture
        .run(RunMode::Suggest { dry_run: false }, &mut AutoApprove)
        .expect("apply failed");
    fixture.run(RunMode::Undo, &mut AutoApprove).expect("undo failed");

    assert!(matches!(
        fixture.run(RunMode::Undo, &mut AutoApprove),
        Err(Error::Undo(UndoError::NoJournal { .. }))
    ));
}

// ============================================================================
// Test Suite 4: Fail-Fast Apply
// ============================================================================

fn approved_rename(root: &Path, from: &str, to: &str) -> Suggestion {
    let mut suggestion = Suggestion::new(
        SuggestionKind::Rename,
        vec![root.join(from)],
        root.join(to),
        0.8,
        "",
    );
    suggestion.status = SuggestionStatus::Approved;
    suggestion
}

#[test]
fn test_failure_on_third_of_five_halts_run() {
    let fixture = TestFixture::new();
    let root = fixture.root();
    for dir in ["one", "two", "three", "four", "five"] {
        fixture.create_subdir(dir);
    }
    let before = fixture.outline();
    let suggestions: Vec<Suggestion> = ["one", "two", "three", "four", "five"]
        .iter()
        .map(|d| approved_rename(&root, d, &format!("{}_renamed", d)))
        .collect();
    fs::remove_dir(root.join("three")).expect("Failed to remove folder");

    let store = fixture.store();
    let report = Applier::new(&store)
        .apply(&root, &suggestions)
        .expect("journal failure");

    let outcomes: Vec<&Outcome> = report.entries.iter().map(|e| &e.outcome).collect();
    assert!(matches!(outcomes[0], Outcome::Applied { operations: 1 }));
    assert!(matches!(outcomes[1], Outcome::Applied { operations: 1 }));
    assert!(matches!(outcomes[2], Outcome::Failed { .. }));
    assert_eq!(outcomes[3], &Outcome::Skipped);
    assert_eq!(outcomes[4], &Outcome::Skipped);
    assert!(report.partial_failure);
    assert_eq!(RunOutcome::Applied(report).exit_code(), 1);

    fixture.assert_dir_exists("one_renamed");
    fixture.assert_dir_exists("two_renamed");
    fixture.assert_dir_exists("four");
    fixture.assert_dir_exists("five");

    let undo = UndoManager::new(&store).undo(&root).expect("undo failed");
    assert_eq!(undo.restored, 2);
    fs::create_dir(root.join("three")).expect("Failed to recreate folder");
    assert_eq!(fixture.outline(), before);
}

// ============================================================================
// Test Suite 5: Explode
// ============================================================================

#[test]
fn test_explode_flattens_and_undo_restores() {
    let fixture = TestFixture::new();
    fixture.create_files(&[
        "notes.txt",
        "work/notes.txt",
        "work/2024/q1/report.pdf",
        "photos/trip/beach.jpg",
    ]);
    fixture.create_subdir("empty");
    let before = fixture.outline();

    let outcome = fixture
        .run(RunMode::Explode { dry_run: false }, &mut AutoApprove)
        .expect("explode failed");
    let RunOutcome::Exploded(report) = &outcome else {
        panic!("expected an explode, got {:?}", outcome);
    };
    assert_eq!(report.files_moved, 3);
    assert_eq!(report.directories_removed, 6);
    assert_eq!(
        fixture.outline(),
        vec!["beach.jpg", "notes.txt", "notes_1.txt", "report.pdf"]
    );

    fixture.run(RunMode::Undo, &mut AutoApprove).expect("undo failed");
    assert_eq!(fixture.outline(), before);
}

#[test]
fn test_explode_dry_run_and_decline() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a/one.txt", "b/two.txt"]);
    let before = fixture.outline();

    let preview = fixture
        .run(RunMode::Explode { dry_run: true }, &mut AutoApprove)
        .expect("preview failed");
    assert!(matches!(preview, RunOutcome::Previewed { changes: 4 }));

    let mut decline = ScriptedDecisions::default().with_confirmations([false]);
    let declined = fixture
        .run(RunMode::Explode { dry_run: false }, &mut decline)
        .expect("run failed");
    assert!(matches!(declined, RunOutcome::Cancelled));

    assert_eq!(fixture.outline(), before);
    assert!(fixture.journal_files().is_empty());
}

// ============================================================================
// Test Suite 6: Configuration and Filtering
// ============================================================================

#[test]
fn test_excluded_extension_changes_suggestions() {
    let config = AppConfig::from_toml(
        r#"
[filters.exclude]
extensions = ["txt"]
"#,
    )
    .expect("Failed to parse config");
    let fixture = TestFixture::with_config(config);
    fixture.photos_scenario();

    let suggestions = SuggestionEngine::from_config(&fixture.config.analysis)
        .analyze(&fixture.snapshot());
    let kinds: Vec<SuggestionKind> = suggestions.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![SuggestionKind::Merge]);
}

#[test]
fn test_hidden_files_never_move() {
    let fixture = TestFixture::new();
    fixture.photos_scenario();
    fixture.create_file(".hidden.jpg");

    fixture
        .run(RunMode::Suggest { dry_run: false }, &mut AutoApprove)
        .expect("apply failed");
    fixture.assert_file_exists(".hidden.jpg");
    fixture.assert_not_exists("Images/.hidden.jpg");
}

#[test]
fn test_disabled_analyzer_is_skipped() {
    let config = AppConfig::from_toml(
        r#"
[analysis]
loose_files = false
"#,
    )
    .expect("Failed to parse config");
    let fixture = TestFixture::with_config(config);
    fixture.photos_scenario();

    let suggestions = SuggestionEngine::from_config(&fixture.config.analysis)
        .analyze(&fixture.snapshot());
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].kind, SuggestionKind::Merge);
}

#[test]
fn test_missing_target_is_an_error() {
    let fixture = TestFixture::new();
    let missing = fixture.root().join("nope");
    let result = Runner::new(AppConfig::default(), fixture.store(), &mut AutoApprove)
        .run(&missing, RunMode::Suggest { dry_run: false });
    match result {
        Err(e) => assert_eq!(e.exit_code(), 1),
        Ok(outcome) => panic!("expected an error, got {:?}", outcome),
    }
}
