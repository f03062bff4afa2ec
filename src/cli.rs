//! Command-line interface module for foldersense.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing and validation
//! - Orchestration of scan, analysis, review and apply
//! - Explode and undo runs

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::applier::{Applier, ApplyReport};
use crate::config::AppConfig;
use crate::engine::SuggestionEngine;
use crate::error::{Error, InvocationError, ScanError};
use crate::explode::{ExplodePlan, ExplodeReport, Exploder};
use crate::journal::JournalStore;
use crate::logging::init_logging;
use crate::output::OutputFormatter;
use crate::review::{AutoApprove, DecisionSource, ReviewSession, TerminalDecisions};
use crate::scanner::scan;
use crate::tree::DirTree;
use crate::undo::{UndoManager, UndoReport};

#[derive(Debug, Parser)]
#[command(
    name = "foldersense",
    version,
    about = "Suggest and apply reversible folder reorganizations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze a directory, review suggestions and apply the approved ones.
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Directory to analyze.
    pub path: PathBuf,

    /// Show what would change without touching the filesystem.
    #[arg(long)]
    pub dry_run: bool,

    /// Log analysis decisions to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Revert the most recent apply or explode run on this directory.
    #[arg(long, conflicts_with_all = ["explode", "dry_run", "yes"])]
    pub undo: bool,

    /// Move every file to the root and delete all subfolders.
    #[arg(long)]
    pub explode: bool,

    /// Configuration file to use instead of the default lookup.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Approve every suggestion and confirmation without prompting.
    #[arg(short, long)]
    pub yes: bool,
}

/// What a run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Suggest { dry_run: bool },
    Explode { dry_run: bool },
    Undo,
}

impl RunArgs {
    pub fn mode(&self) -> RunMode {
        if self.undo {
            RunMode::Undo
        } else if self.explode {
            RunMode::Explode {
                dry_run: self.dry_run,
            }
        } else {
            RunMode::Suggest {
                dry_run: self.dry_run,
            }
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The analyzers had nothing to propose, or there was nothing to flatten.
    NothingToDo,
    /// Dry run; `changes` approved suggestions or planned operations were shown.
    Previewed { changes: usize },
    /// Review or confirmation ended without anything to apply.
    Cancelled,
    Applied(ApplyReport),
    Exploded(ExplodeReport),
    Undone(UndoReport),
}

impl RunOutcome {
    /// Process exit code for a run that returned normally.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Applied(report) if report.partial_failure => 1,
            RunOutcome::Exploded(report) if report.partial_failure() => 1,
            RunOutcome::Undone(report) if report.nothing_restored() => 1,
            _ => 0,
        }
    }
}

/// Checks the target and returns its canonical form.
pub fn resolve_root(path: &Path) -> Result<PathBuf, Error> {
    if path.as_os_str().is_empty() {
        return Err(InvocationError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is empty".to_string(),
        }
        .into());
    }
    let metadata = match path.metadata() {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScanError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        Err(source) => {
            return Err(ScanError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
            .into());
        }
    };
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory {
            path: path.to_path_buf(),
        }
        .into());
    }
    path.canonicalize().map_err(|source| {
        ScanError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Runs the pipeline for one invocation.
pub struct Runner<'d> {
    config: AppConfig,
    store: JournalStore,
    decisions: &'d mut dyn DecisionSource,
    progress: bool,
}

impl<'d> Runner<'d> {
    pub fn new(config: AppConfig, store: JournalStore, decisions: &'d mut dyn DecisionSource) -> Self {
        Self {
            config,
            store,
            decisions,
            progress: false,
        }
    }

    /// Show spinners and progress bars on the terminal.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(&mut self, path: &Path, mode: RunMode) -> Result<RunOutcome, Error> {
        let root = resolve_root(path)?;
        match mode {
            RunMode::Suggest { dry_run } => self.suggest(&root, dry_run),
            RunMode::Explode { dry_run } => self.explode(&root, dry_run),
            RunMode::Undo => self.undo(&root),
        }
    }

    fn scan(&self, root: &Path) -> Result<DirTree, Error> {
        let filters = self
            .config
            .compile_filters()
            .map_err(InvocationError::from)?;
        let spinner = self
            .progress
            .then(|| OutputFormatter::create_spinner(&format!("Scanning {}", root.display())));
        let tree = scan(root, &filters);
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        Ok(tree?)
    }

    fn progress_bar(&self) -> indicatif::ProgressBar {
        if self.progress {
            OutputFormatter::create_progress_bar(0)
        } else {
            indicatif::ProgressBar::hidden()
        }
    }

    fn suggest(&mut self, root: &Path, dry_run: bool) -> Result<RunOutcome, Error> {
        let tree = self.scan(root)?;
        let suggestions = SuggestionEngine::from_config(&self.config.analysis).analyze(&tree);
        info!(count = suggestions.len(), "analysis complete");

        if suggestions.is_empty() {
            OutputFormatter::success("This folder already looks well organized. Nothing to suggest.");
            return Ok(RunOutcome::NothingToDo);
        }

        if dry_run {
            OutputFormatter::dry_run_notice(&format!("{} suggestion(s) found", suggestions.len()));
        } else {
            OutputFormatter::info(&format!(
                "Found {} suggestion(s) for {}",
                suggestions.len(),
                root.display()
            ));
        }
        let mut session = ReviewSession::new(suggestions);
        session.run(&mut *self.decisions)?;
        let approved = session.approved();
        if approved.is_empty() {
            OutputFormatter::warning("No suggestions approved. Nothing was changed.");
            return Ok(RunOutcome::Cancelled);
        }
        if dry_run {
            OutputFormatter::suggestion_list(&approved, root);
            OutputFormatter::dry_run_notice(&format!(
                "{} approved change(s) would be applied. No changes were made.",
                approved.len()
            ));
            return Ok(RunOutcome::Previewed {
                changes: approved.len(),
            });
        }
        let approved = approved.len();
        if !self
            .decisions
            .confirm(&format!("Apply {} approved change(s)?", approved))?
        {
            OutputFormatter::warning("Cancelled. Nothing was changed.");
            return Ok(RunOutcome::Cancelled);
        }

        OutputFormatter::print_tree("BEFORE", &tree);
        let report = Applier::new(&self.store)
            .with_progress(self.progress_bar())
            .apply(root, session.suggestions())?;
        OutputFormatter::apply_summary(&report, root);

        if report.partial_failure {
            OutputFormatter::error(
                "Apply stopped at the first failure. Run with --undo to revert what was applied.",
            );
        } else {
            self.print_after(root);
            OutputFormatter::success(&format!(
                "Applied {} suggestion(s). Run 'foldersense run {} --undo' to revert.",
                report.applied(),
                root.display()
            ));
        }
        Ok(RunOutcome::Applied(report))
    }

    fn print_after(&self, root: &Path) {
        match self.scan(root) {
            Ok(after) => OutputFormatter::print_tree("AFTER", &after),
            Err(e) => warn!("could not rescan after apply: {}", e),
        }
    }

    fn explode(&mut self, root: &Path, dry_run: bool) -> Result<RunOutcome, Error> {
        let tree = self.scan(root)?;
        let plan = ExplodePlan::for_tree(&tree);
        if plan.is_empty() {
            OutputFormatter::success("Nothing to flatten.");
            return Ok(RunOutcome::NothingToDo);
        }

        if dry_run {
            OutputFormatter::explode_plan(&plan);
            OutputFormatter::dry_run_notice("No changes were made.");
            return Ok(RunOutcome::Previewed {
                changes: plan.moves.len() + plan.directories.len(),
            });
        }

        OutputFormatter::warning(&format!(
            "This will move every file under {} to its root and delete all subfolders.",
            root.display()
        ));
        if !self.decisions.confirm("Continue?")? {
            OutputFormatter::warning("Cancelled. Nothing was changed.");
            return Ok(RunOutcome::Cancelled);
        }

        let report = Exploder::new(&self.store)
            .with_progress(self.progress_bar())
            .run(&plan)?;
        OutputFormatter::explode_summary(&report, root);
        Ok(RunOutcome::Exploded(report))
    }

    fn undo(&mut self, root: &Path) -> Result<RunOutcome, Error> {
        let report = UndoManager::new(&self.store).undo(root)?;
        OutputFormatter::undo_summary(&report);
        Ok(RunOutcome::Undone(report))
    }
}

/// Entry point for `foldersense run`.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use foldersense::cli::{Cli, Command, run_cli};
///
/// let Command::Run(args) = Cli::parse().command;
/// match run_cli(&args) {
///     Ok(outcome) => std::process::exit(outcome.exit_code() as i32),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(args: &RunArgs) -> Result<RunOutcome, Error> {
    init_logging(args.verbose);
    let config = AppConfig::load(args.config.as_deref()).map_err(InvocationError::from)?;
    let store = JournalStore::from_config(&config.journal)?;

    let mut auto = AutoApprove;
    let mut terminal;
    let decisions: &mut dyn DecisionSource = if args.yes {
        &mut auto
    } else {
        terminal = TerminalDecisions::stdio(&resolve_root(&args.path)?);
        &mut terminal
    };

    Runner::new(config, store, decisions)
        .with_progress(true)
        .run(&args.path, args.mode())
}
