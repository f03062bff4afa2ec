//! foldersense - metadata-driven folder reorganization
//!
//! This library scans a directory tree, proposes merges, renames, groupings
//! and relocations from names, timestamps and file extensions alone, walks a
//! reviewer through them, and applies the approved ones through a
//! write-ahead journal so every run can be undone.

pub mod applier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod explode;
pub mod file_category;
pub mod hierarchy;
pub mod journal;
pub mod logging;
pub mod loose_files;
pub mod naming;
pub mod output;
pub mod patterns;
pub mod ranker;
pub mod review;
pub mod scanner;
pub mod similarity;
pub mod suggestion;
pub mod tree;
pub mod undo;

pub use applier::{Applier, ApplyReport, Outcome};
pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use engine::SuggestionEngine;
pub use error::Error;
pub use file_category::{Category, FileMapper};
pub use journal::{ChangeJournal, ChangeRecord, JournalStore, OpKind};
pub use suggestion::{Analyzer, Suggestion, SuggestionKind, SuggestionStatus};
pub use tree::{DirTree, TreeBuilder};
pub use undo::{UndoManager, UndoReport};

pub use cli::{RunMode, RunOutcome, Runner, run_cli};
