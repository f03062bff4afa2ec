//! Undo of an apply or explode run.
//!
//! This module replays the most recent finalized journal for a root in
//! strict reverse sequence order, inverting every committed operation.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::applier::{exists, occupied};
use crate::error::UndoError;
use crate::journal::{ChangeRecord, JournalMode, JournalStore, OpKind};

/// Represents the result of an undo run.
#[derive(Debug)]
pub struct UndoReport {
    /// Journal that was replayed, after archiving.
    pub journal: PathBuf,
    pub mode: JournalMode,
    /// Number of operations successfully inverted.
    pub restored: usize,
    /// Records that could not be inverted, with the reason.
    pub refused: Vec<UndoError>,
    /// Intents that were never committed, so there was nothing to invert.
    pub uncommitted: usize,
}

impl UndoReport {
    /// Returns the total number of committed records processed.
    pub fn total_processed(&self) -> usize {
        self.restored + self.refused.len()
    }

    /// Returns true if every committed record was inverted.
    pub fn is_complete_success(&self) -> bool {
        self.refused.is_empty()
    }

    /// True when records were refused and none could be inverted.
    pub fn nothing_restored(&self) -> bool {
        self.restored == 0 && !self.refused.is_empty()
    }
}

/// Manages undo runs.
pub struct UndoManager<'s> {
    store: &'s JournalStore,
}

impl<'s> UndoManager<'s> {
    pub fn new(store: &'s JournalStore) -> Self {
        Self { store }
    }

    /// Undoes the most recent finalized run on `root`.
    ///
    /// # Returns
    ///
    /// Returns an `UndoReport` describing what was restored and what was
    /// refused. Returns an error if there is no finalized journal for `root`
    /// or if the journal cannot be read or archived.
    ///
    /// # Edge Cases Handled
    ///
    /// * **Moved entry gone**: refused, the record is reported and skipped
    /// * **Original location taken**: refused, nothing is overwritten
    /// * **Created folder no longer empty**: refused, the folder stays
    /// * **Uncommitted intent**: counted, never inverted
    ///
    /// A refused record never stops the reverse pass. The journal is archived
    /// afterwards in every case, so it cannot be undone twice.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use foldersense::journal::JournalStore;
    /// use foldersense::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// let store = JournalStore::new("/tmp/journals");
    /// match UndoManager::new(&store).undo(Path::new("/path/to/directory")) {
    ///     Ok(report) => println!("Restored {} operations", report.restored),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(&self, root: &Path) -> Result<UndoReport, UndoError> {
        let journal = self
            .store
            .latest_finalized(root)?
            .ok_or_else(|| UndoError::NoJournal {
                root: root.to_path_buf(),
            })?;
        info!(
            journal = %journal.path.display(),
            records = journal.records.len(),
            "undoing"
        );

        let committed = journal.committed_records();
        let mut restored = 0;
        let mut refused = Vec::new();
        for record in committed.iter().rev() {
            match Self::revert(record) {
                Ok(()) => restored += 1,
                Err(e) => {
                    warn!("{}", e);
                    refused.push(e);
                }
            }
        }

        let uncommitted = journal.records.len() - committed.len();
        let archived = self.store.archive(&journal)?;
        info!(restored, refused = refused.len(), "undo finished");
        Ok(UndoReport {
            journal: archived,
            mode: journal.mode,
            restored,
            refused,
            uncommitted,
        })
    }

    /// Inverts one committed record.
    fn revert(record: &ChangeRecord) -> Result<(), UndoError> {
        let op = record.kind;
        let sequence = record.sequence;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| UndoError::Filesystem {
                op,
                sequence,
                path,
                source,
            }
        };

        match op {
            OpKind::Rename | OpKind::Move => {
                let Some(current) = record.destination.as_deref() else {
                    return Err(UndoError::Missing {
                        op,
                        sequence,
                        path: record.source.clone(),
                    });
                };
                if !exists(current) {
                    return Err(UndoError::Missing {
                        op,
                        sequence,
                        path: current.to_path_buf(),
                    });
                }
                if occupied(current, &record.source) {
                    return Err(UndoError::Occupied {
                        op,
                        sequence,
                        path: record.source.clone(),
                    });
                }
                fs::rename(current, &record.source).map_err(io_err(current))
            }
            OpKind::CreateDir => {
                let dir = record.source.as_path();
                let mut entries = match fs::read_dir(dir) {
                    Ok(entries) => entries,
                    Err(_) if !exists(dir) => {
                        return Err(UndoError::Missing {
                            op,
                            sequence,
                            path: dir.to_path_buf(),
                        });
                    }
                    Err(source) => return Err(io_err(dir)(source)),
                };
                if entries.next().is_some() {
                    return Err(UndoError::NotEmpty {
                        sequence,
                        path: dir.to_path_buf(),
                    });
                }
                fs::remove_dir(dir).map_err(io_err(dir))
            }
            OpKind::DeleteDir => {
                let dir = record.source.as_path();
                if exists(dir) {
                    return Err(UndoError::Occupied {
                        op,
                        sequence,
                        path: dir.to_path_buf(),
                    });
                }
                fs::create_dir(dir).map_err(io_err(dir))
            }
        }
    }
}
