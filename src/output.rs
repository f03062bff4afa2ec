//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, suggestion cards and summary tables. This module abstracts
//! away output details, making it easy to change formatting globally.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::applier::{ApplyReport, Outcome};
use crate::explode::{ExplodePlan, ExplodeReport};
use crate::suggestion::Suggestion;
use crate::tree::{DirTree, NodeId};
use crate::undo::UndoReport;

/// Trees longer than this are not rendered before and after apply.
pub const TREE_RENDER_LIMIT: usize = 100;

/// `path` relative to `root`, or the full path when it lies outside.
pub fn relative(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => path.display().to_string(),
    }
}

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars and spinners for operations
/// - Suggestion cards and summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersense::output::OutputFormatter;
    /// OutputFormatter::success("Applied 3 suggestions");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersense::output::OutputFormatter;
    /// OutputFormatter::error("Failed to rename folder");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates and returns a progress bar for filesystem operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersense::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Creates a spinner for phases of unknown length, such as the scan.
    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("Invalid spinner template"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Renders one suggestion for review.
    ///
    /// ```
    /// use foldersense::output::OutputFormatter;
    /// use foldersense::suggestion::{Suggestion, SuggestionKind};
    /// use std::path::{Path, PathBuf};
    ///
    /// let s = Suggestion::new(
    ///     SuggestionKind::Rename,
    ///     vec![PathBuf::from("/r/Work Stuff")],
    ///     PathBuf::from("/r/work_stuff"),
    ///     0.75,
    ///     "3 of 4 sibling folders use snake_case",
    /// );
    /// let card = OutputFormatter::suggestion_card(0, 1, &s, Path::new("/r"));
    /// assert!(card.contains("Work Stuff"));
    /// assert!(card.contains("75%"));
    /// ```
    pub fn suggestion_card(index: usize, total: usize, suggestion: &Suggestion, root: &Path) -> String {
        let mut lines = vec![format!(
            "{} {}  {}",
            format!("[{}/{}]", index + 1, total).dimmed(),
            suggestion.kind.label().bold(),
            format!("confidence {:.0}%", suggestion.confidence * 100.0).cyan()
        )];
        for source in &suggestion.sources {
            lines.push(format!("    {}", relative(source, root)));
        }
        lines.push(format!(
            "  {} {}",
            "→".green(),
            relative(&suggestion.effective_target(), root).green()
        ));
        if !suggestion.rationale.is_empty() {
            lines.push(format!("  {}", suggestion.rationale.dimmed()));
        }
        lines.join("\n")
    }

    /// Prints every suggestion without prompting. Used by `--dry-run`.
    pub fn suggestion_list(suggestions: &[Suggestion], root: &Path) {
        for (index, suggestion) in suggestions.iter().enumerate() {
            println!(
                "\n{}",
                Self::suggestion_card(index, suggestions.len(), suggestion, root)
            );
        }
    }

    /// Prints `tree` under `title` when it fits in [`TREE_RENDER_LIMIT`] lines.
    pub fn print_tree(title: &str, tree: &DirTree) {
        let lines = tree_lines(tree);
        if lines.len() > TREE_RENDER_LIMIT {
            return;
        }
        Self::header(title);
        for line in lines {
            println!("{}", line);
        }
    }

    /// Prints the per-suggestion result table of an apply run.
    pub fn apply_summary(report: &ApplyReport, root: &Path) {
        Self::header("SUMMARY");
        let width = report
            .entries
            .iter()
            .map(|e| e.suggestion.kind.label().len())
            .max()
            .unwrap_or(0)
            .max(10);

        println!(
            "{:<width$} | {}",
            "Suggestion".bold(),
            "Result".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 30));
        for entry in &report.entries {
            let target = relative(&entry.suggestion.effective_target(), root);
            let result = match &entry.outcome {
                Outcome::Applied { operations } => {
                    let word = if *operations == 1 { "operation" } else { "operations" };
                    format!("{} {} ({} {})", "✓".green(), target, operations, word)
                }
                Outcome::Failed { error } => format!("{} {}: {}", "✗".red(), target, error),
                Outcome::Skipped => format!("{} {} (skipped)", "-".dimmed(), target),
            };
            println!(
                "{:<width$} | {}",
                entry.suggestion.kind.label(),
                result,
                width = width
            );
        }
        println!("{}", "-".repeat(width + 30));
        println!(
            "{:<width$} | {} applied, {} failed, {} skipped",
            "Total".bold(),
            report.applied().to_string().green().bold(),
            report.failed(),
            report.skipped(),
            width = width
        );
        println!("Journal: {}", report.journal.display());
    }

    /// Prints the outcome of an undo run.
    pub fn undo_summary(report: &UndoReport) {
        Self::header("UNDO SUMMARY");
        let word = if report.restored == 1 { "operation" } else { "operations" };
        println!("{} {} {} reverted", "✓".green(), report.restored, word);
        for refusal in &report.refused {
            println!("{} {}", "⚠".yellow(), refusal);
        }
        if report.uncommitted > 0 {
            println!(
                "{}",
                format!(
                    "{} interrupted operation(s) were never performed and were left alone",
                    report.uncommitted
                )
                .dimmed()
            );
        }
    }

    /// Prints the moves and removals an explode would make.
    pub fn explode_plan(plan: &ExplodePlan) {
        Self::header("FLATTEN PLAN");
        for (from, to) in &plan.moves {
            println!(
                "  {} {} {}",
                relative(from, &plan.root),
                "→".green(),
                relative(to, &plan.root)
            );
        }
        for dir in &plan.directories {
            println!("  {} {}/", "✗".red(), relative(dir, &plan.root));
        }
        println!(
            "{} file(s) to move, {} folder(s) to remove",
            plan.moves.len(),
            plan.directories.len()
        );
    }

    pub fn explode_summary(report: &ExplodeReport, root: &Path) {
        Self::header("SUMMARY");
        println!(
            "{} {} file(s) moved, {} folder(s) removed",
            "✓".green(),
            report.files_moved,
            report.directories_removed
        );
        for dir in &report.directories_kept {
            println!("{} kept non-empty folder {}/", "⚠".yellow(), relative(dir, root));
        }
        if let Some(failure) = &report.failure {
            println!("{} {}", "✗".red(), failure);
        }
        println!("Journal: {}", report.journal.display());
    }
}

/// Box-drawing rendering of `tree`, directories first, one entry per line.
pub fn tree_lines(tree: &DirTree) -> Vec<String> {
    let mut lines = vec![format!("{}/", tree.name(tree.root()))];
    render_children(tree, tree.root(), "", &mut lines);
    lines
}

fn render_children(tree: &DirTree, id: NodeId, prefix: &str, lines: &mut Vec<String>) {
    let dirs = tree.children(id);
    let files: Vec<&str> = tree.files_in(id).map(|f| f.name.as_str()).collect();
    let count = dirs.len() + files.len();

    for (i, &child) in dirs.iter().enumerate() {
        let last = i + 1 == count;
        lines.push(format!(
            "{}{}{}/",
            prefix,
            if last { "└── " } else { "├── " },
            tree.name(child)
        ));
        let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_children(tree, child, &nested, lines);
    }
    for (i, name) in files.iter().enumerate() {
        let last = dirs.len() + i + 1 == count;
        lines.push(format!(
            "{}{}{}",
            prefix,
            if last { "└── " } else { "├── " },
            name
        ));
    }
}
