//! Walks a directory on disk and freezes it into a [`DirTree`] snapshot.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::CompiledFilters;
use crate::error::ScanError;
use crate::tree::{DirTree, NodeId, TreeBuilder};

fn timestamps(metadata: &Metadata) -> (DateTime<Utc>, DateTime<Utc>) {
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    // Not every filesystem records a birth time.
    let created = metadata.created().unwrap_or(modified);
    (created.into(), modified.into())
}

fn unreadable(root: &Path, err: walkdir::Error) -> ScanError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
    ScanError::Unreadable {
        path,
        source: io::Error::from(err),
    }
}

/// Scans `root`, skipping entries rejected by `filters`.
///
/// Any unreadable entry aborts the scan. Symbolic links are recorded as files
/// and never followed.
pub fn scan(root: &Path, filters: &CompiledFilters) -> Result<DirTree, ScanError> {
    let root_meta = match root.metadata() {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ScanError::NotFound {
                path: root.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ScanError::Unreadable {
                path: root.to_path_buf(),
                source,
            });
        }
    };
    if !root_meta.is_dir() {
        return Err(ScanError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let (created, modified) = timestamps(&root_meta);
    let mut builder = TreeBuilder::new(root, created, modified);
    let mut dirs: HashMap<PathBuf, NodeId> = HashMap::new();
    dirs.insert(root.to_path_buf(), builder.root());

    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let keep = filters.should_include(relative, entry.file_type().is_dir());
            if !keep {
                debug!(path = %relative.display(), "filtered out");
            }
            keep
        });

    let mut file_count = 0usize;
    for entry in walker {
        let entry = entry.map_err(|e| unreadable(root, e))?;
        let metadata = entry.metadata().map_err(|e| unreadable(root, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let parent = entry
            .path()
            .parent()
            .and_then(|p| dirs.get(p))
            .copied()
            .unwrap_or(0);
        let (created, modified) = timestamps(&metadata);

        if entry.file_type().is_dir() {
            let id = builder.add_dir(parent, &name, created, modified);
            dirs.insert(entry.path().to_path_buf(), id);
        } else {
            builder.add_file(parent, &name, modified);
            file_count += 1;
        }
    }

    info!(
        root = %root.display(),
        directories = dirs.len(),
        files = file_count,
        "scan complete"
    );
    Ok(builder.build())
}
