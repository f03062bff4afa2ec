//! Write-ahead change journal.
//!
//! One JSON Lines file per apply run, stored outside the target tree under
//! `<journal_dir>/<root-slug>/<timestamp>.jsonl`. Every filesystem operation
//! is preceded by an `intent` line and followed by a `commit` line; both are
//! synced to disk before the run moves on. Undo only inverts committed
//! intents. A journal is consumed by exactly one undo, after which it is
//! renamed to `*.undone.jsonl`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::JournalConfig;
use crate::error::JournalError;

const JOURNAL_EXT: &str = "jsonl";
const ARCHIVED_SUFFIX: &str = ".undone.jsonl";

/// Filesystem operation recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Rename,
    Move,
    CreateDir,
    /// Removal of an empty directory.
    DeleteDir,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpKind::Rename => "rename",
            OpKind::Move => "move",
            OpKind::CreateDir => "create-dir",
            OpKind::DeleteDir => "delete-dir",
        })
    }
}

/// What produced a journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    Suggestions,
    Explode,
}

/// One journaled operation. Sequence numbers start at 1 and strictly increase
/// within a journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub sequence: u64,
    pub kind: OpKind,
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
    /// Index of the approved suggestion this operation belongs to.
    pub suggestion: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JournalLine {
    Header {
        root: PathBuf,
        mode: JournalMode,
        started_at: DateTime<Utc>,
    },
    Intent(ChangeRecord),
    Commit {
        sequence: u64,
    },
    Finalized {
        partial_failure: bool,
        finished_at: DateTime<Utc>,
    },
}

/// Append-only writer for the journal of a running apply.
#[derive(Debug)]
pub struct ChangeJournal {
    path: PathBuf,
    file: File,
    next_sequence: u64,
}

impl ChangeJournal {
    fn create(path: PathBuf, root: &Path, mode: JournalMode) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;
        let mut journal = Self {
            path,
            file,
            next_sequence: 1,
        };
        journal.write_line(&JournalLine::Header {
            root: root.to_path_buf(),
            mode,
            started_at: Utc::now(),
        })?;
        debug!(path = %journal.path.display(), "journal opened");
        Ok(journal)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &JournalLine) -> Result<(), JournalError> {
        let io_err = |source| JournalError::Io {
            path: self.path.clone(),
            source,
        };
        let mut text = serde_json::to_string(line).map_err(|e| JournalError::Invalid {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        text.push('\n');
        self.file.write_all(text.as_bytes()).map_err(io_err)?;
        self.file.sync_data().map_err(io_err)
    }

    /// Records the intent to perform an operation. Must be called, and must
    /// succeed, before the operation touches the filesystem.
    pub fn append(
        &mut self,
        kind: OpKind,
        source: &Path,
        destination: Option<&Path>,
        suggestion: Option<usize>,
    ) -> Result<ChangeRecord, JournalError> {
        let record = ChangeRecord {
            sequence: self.next_sequence,
            kind,
            source: source.to_path_buf(),
            destination: destination.map(Path::to_path_buf),
            timestamp: Utc::now(),
            suggestion,
        };
        self.write_line(&JournalLine::Intent(record.clone()))?;
        self.next_sequence += 1;
        Ok(record)
    }

    /// Marks a previously appended operation as performed.
    pub fn commit(&mut self, sequence: u64) -> Result<(), JournalError> {
        self.write_line(&JournalLine::Commit { sequence })
    }

    /// Closes the journal. A finalized journal is eligible for undo.
    pub fn finalize(mut self, partial_failure: bool) -> Result<PathBuf, JournalError> {
        self.write_line(&JournalLine::Finalized {
            partial_failure,
            finished_at: Utc::now(),
        })?;
        debug!(path = %self.path.display(), partial_failure, "journal finalized");
        Ok(self.path)
    }
}

/// Closing state of a finalized journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finalization {
    pub partial_failure: bool,
    pub finished_at: DateTime<Utc>,
}

/// A journal read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedJournal {
    pub path: PathBuf,
    pub root: PathBuf,
    pub mode: JournalMode,
    pub started_at: DateTime<Utc>,
    pub records: Vec<ChangeRecord>,
    committed: HashSet<u64>,
    pub finalized: Option<Finalization>,
}

impl LoadedJournal {
    pub fn is_committed(&self, sequence: u64) -> bool {
        self.committed.contains(&sequence)
    }

    /// Committed records in ascending sequence order.
    pub fn committed_records(&self) -> Vec<&ChangeRecord> {
        self.records
            .iter()
            .filter(|r| self.is_committed(r.sequence))
            .collect()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    pub fn partial_failure(&self) -> bool {
        self.finalized.is_some_and(|f| f.partial_failure)
    }

    /// Parses a journal file, checking its structure as it goes.
    pub fn load(path: &Path) -> Result<Self, JournalError> {
        let file = File::open(path).map_err(|source| JournalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let invalid = |reason: String| JournalError::Invalid {
            path: path.to_path_buf(),
            reason,
        };

        let mut header: Option<(PathBuf, JournalMode, DateTime<Utc>)> = None;
        let mut records: Vec<ChangeRecord> = Vec::new();
        let mut committed = HashSet::new();
        let mut finalized = None;

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let number = index + 1;
            let line = line.map_err(|source| JournalError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: JournalLine =
                serde_json::from_str(&line).map_err(|source| JournalError::Parse {
                    path: path.to_path_buf(),
                    line: number,
                    source,
                })?;

            if finalized.is_some() {
                return Err(invalid(format!("line {} follows the finalized marker", number)));
            }
            match parsed {
                JournalLine::Header {
                    root,
                    mode,
                    started_at,
                } => {
                    if header.is_some() || number != 1 {
                        return Err(invalid(format!("unexpected header on line {}", number)));
                    }
                    header = Some((root, mode, started_at));
                }
                _ if header.is_none() => {
                    return Err(invalid("missing header line".to_string()));
                }
                JournalLine::Intent(record) => {
                    if records.last().is_some_and(|last| record.sequence <= last.sequence) {
                        return Err(invalid(format!(
                            "sequence {} on line {} is not increasing",
                            record.sequence, number
                        )));
                    }
                    records.push(record);
                }
                JournalLine::Commit { sequence } => {
                    if !records.iter().any(|r| r.sequence == sequence) {
                        return Err(invalid(format!(
                            "commit for unknown sequence {} on line {}",
                            sequence, number
                        )));
                    }
                    committed.insert(sequence);
                }
                JournalLine::Finalized {
                    partial_failure,
                    finished_at,
                } => {
                    finalized = Some(Finalization {
                        partial_failure,
                        finished_at,
                    });
                }
            }
        }

        let (root, mode, started_at) =
            header.ok_or_else(|| invalid("journal is empty".to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            root,
            mode,
            started_at,
            records,
            committed,
            finalized,
        })
    }
}

/// Location of all journals, one subdirectory per target root.
#[derive(Debug, Clone)]
pub struct JournalStore {
    base: PathBuf,
}

impl JournalStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The configured journal directory, or the platform data directory.
    pub fn from_config(config: &JournalConfig) -> Result<Self, JournalError> {
        if let Some(dir) = &config.directory {
            return Ok(Self::new(dir));
        }
        let base = dirs::data_local_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| JournalError::Invalid {
                path: PathBuf::from("foldersense/journals"),
                reason: "no data directory available on this platform".to_string(),
            })?;
        Ok(Self::new(base.join("foldersense").join("journals")))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory holding every journal for `root`.
    pub fn dir_for(&self, root: &Path) -> PathBuf {
        let slug: String = root
            .to_string_lossy()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        let slug = slug.trim_matches('_');
        self.base.join(if slug.is_empty() { "root" } else { slug })
    }

    /// Starts a new journal for an apply run on `root`.
    pub fn begin(&self, root: &Path, mode: JournalMode) -> Result<ChangeJournal, JournalError> {
        let dir = self.dir_for(root);
        fs::create_dir_all(&dir).map_err(|source| JournalError::Io {
            path: dir.clone(),
            source,
        })?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let mut path = dir.join(format!("{}.{}", stamp, JOURNAL_EXT));
        let mut attempt = 1;
        while path.exists() {
            path = dir.join(format!("{}_{}.{}", stamp, attempt, JOURNAL_EXT));
            attempt += 1;
        }
        ChangeJournal::create(path, root, mode)
    }

    /// Every live (not yet undone) journal file for `root`, newest first.
    pub fn journals(&self, root: &Path) -> Result<Vec<PathBuf>, JournalError> {
        let dir = self.dir_for(root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| JournalError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                let name = p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                name.ends_with(&format!(".{}", JOURNAL_EXT)) && !name.ends_with(ARCHIVED_SUFFIX)
            })
            .collect();
        paths.sort();
        paths.reverse();
        Ok(paths)
    }

    /// The most recent finalized journal recorded for `root`.
    ///
    /// Unfinalized journals (a crashed run), unreadable journals and journals
    /// whose header names a different root are skipped.
    pub fn latest_finalized(&self, root: &Path) -> Result<Option<LoadedJournal>, JournalError> {
        for path in self.journals(root)? {
            let journal = match LoadedJournal::load(&path) {
                Ok(journal) => journal,
                Err(e) => {
                    warn!(path = %path.display(), "skipping unreadable journal: {}", e);
                    continue;
                }
            };
            if journal.root != root {
                debug!(path = %path.display(), "journal belongs to another root");
                continue;
            }
            if !journal.is_finalized() {
                warn!(path = %path.display(), "skipping journal that was never finalized");
                continue;
            }
            return Ok(Some(journal));
        }
        Ok(None)
    }

    /// Retires a consumed journal so it can never be undone twice.
    pub fn archive(&self, journal: &LoadedJournal) -> Result<PathBuf, JournalError> {
        let stem = journal
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = journal
            .path
            .with_file_name(format!("{}{}", stem, ARCHIVED_SUFFIX));
        fs::rename(&journal.path, &target).map_err(|source| JournalError::Io {
            path: journal.path.clone(),
            source,
        })?;
        Ok(target)
    }
}
