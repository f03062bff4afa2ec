//! Error taxonomy for scanning, analysis, apply and undo.
//!
//! Each phase has its own error type so that callers can apply the right
//! propagation policy: scan errors are fatal, analysis and undo errors are
//! local to one suggestion or record, apply errors halt the remaining run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::journal::OpKind;
use crate::suggestion::SuggestionKind;

/// Failure while building the tree snapshot. Always fatal.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot scan {}: path does not exist", .path.display())]
    NotFound { path: PathBuf },

    #[error("cannot scan {}: not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A candidate suggestion that could not be emitted. The candidate is dropped,
/// the rest of the suggestion set is unaffected.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{kind} suggestion references {} which is not in the snapshot", .path.display())]
    MissingSource { kind: SuggestionKind, path: PathBuf },

    #[error("moving {} under {} would nest it inside itself", .ancestor.display(), .descendant.display())]
    Cycle {
        ancestor: PathBuf,
        descendant: PathBuf,
    },

    #[error("{kind} target {} already holds an entry named '{name}'", .target.display())]
    NameCollision {
        kind: SuggestionKind,
        target: PathBuf,
        name: String,
    },

    #[error("{kind} suggestion has no source paths")]
    EmptySources { kind: SuggestionKind },
}

/// Failure in the write-ahead journal itself.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("journal {} line {line} is malformed: {source}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("journal {} is invalid: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Filesystem failure while applying approved suggestions. Halts the run.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("{op} failed: source {} no longer exists", .source_path.display())]
    SourceVanished { op: OpKind, source_path: PathBuf },

    #[error("{op} failed: destination {} already exists", .destination.display())]
    Collision { op: OpKind, destination: PathBuf },

    #[error("{op} {} failed: {source}", describe(.source_path, .destination.as_ref()))]
    Filesystem {
        op: OpKind,
        source_path: PathBuf,
        destination: Option<PathBuf>,
        #[source]
        source: io::Error,
    },
}

/// Failure while undoing a journal. Per-record variants are collected in the
/// undo report and never stop the reverse pass.
#[derive(Debug, Error)]
pub enum UndoError {
    #[error("no finalized journal found for {}", .root.display())]
    NoJournal { root: PathBuf },

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("cannot undo {op} #{sequence}: {} no longer exists", .path.display())]
    Missing {
        op: OpKind,
        sequence: u64,
        path: PathBuf,
    },

    #[error("cannot undo {op} #{sequence}: {} is occupied", .path.display())]
    Occupied {
        op: OpKind,
        sequence: u64,
        path: PathBuf,
    },

    #[error("refusing to remove {} (#{sequence}): directory is no longer empty", .path.display())]
    NotEmpty { sequence: u64, path: PathBuf },

    #[error("cannot undo {op} #{sequence} on {}: {source}", .path.display())]
    Filesystem {
        op: OpKind,
        sequence: u64,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Bad flags or target path, reported before any scan.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("invalid target path {}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Top-level error returned by the CLI runner.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Undo(#[from] UndoError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Process exit code for this error: 2 for invalid invocation, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Invocation(_) => 2,
            _ => 1,
        }
    }
}

fn describe(source: &std::path::Path, destination: Option<&PathBuf>) -> String {
    match destination {
        Some(dest) => format!("{} -> {}", source.display(), dest.display()),
        None => source.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_error_names_paths() {
        let err = ApplyError::Filesystem {
            op: OpKind::Move,
            source_path: PathBuf::from("/data/a"),
            destination: Some(PathBuf::from("/data/b/a")),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let message = err.to_string();
        assert!(message.contains("move"));
        assert!(message.contains("/data/a -> /data/b/a"));
    }

    #[test]
    fn test_exit_codes() {
        let invocation = Error::Invocation(InvocationError::InvalidPath {
            path: PathBuf::from("x"),
            reason: "missing".to_string(),
        });
        assert_eq!(invocation.exit_code(), 2);

        let undo = Error::Undo(UndoError::NoJournal {
            root: PathBuf::from("x"),
        });
        assert_eq!(undo.exit_code(), 1);
    }
}
