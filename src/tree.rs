//! Read-only snapshot of a scanned directory hierarchy.
//!
//! The snapshot owns every [`DirectoryNode`] in a single arena. Parent links
//! are plain indices into that arena, so the tree never needs shared or cyclic
//! ownership. Once built, a [`DirTree`] exposes no mutating methods: analyzers
//! all observe the same immutable state, and a new scan is the only way to
//! refresh it.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Index of a directory inside a [`DirTree`].
pub type NodeId = usize;

/// A directory in the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryNode {
    /// Absolute path, unique within the snapshot.
    pub path: PathBuf,
    /// Final path component (the root keeps its own name).
    pub name: String,
    /// Child directories, ordered by name.
    pub children: Vec<NodeId>,
    /// Non-owning back-reference; `None` only for the root.
    pub parent: Option<NodeId>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Distance from the root (root is 0).
    pub depth: usize,
}

/// A file observed during the scan. Only metadata is kept, never contents.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    /// Lowercased extension without the dot, empty when the file has none.
    pub extension: String,
    pub path: PathBuf,
    /// Directory that directly contains the file.
    pub parent: NodeId,
    pub modified: DateTime<Utc>,
}

/// Immutable arena-backed directory snapshot.
#[derive(Debug, Clone)]
pub struct DirTree {
    nodes: Vec<DirectoryNode>,
    files: Vec<FileEntry>,
    by_path: HashMap<PathBuf, NodeId>,
}

impl DirTree {
    /// The root directory's id. Always `0`.
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn root_path(&self) -> &Path {
        &self.nodes[0].path
    }

    pub fn node(&self, id: NodeId) -> &DirectoryNode {
        &self.nodes[id]
    }

    /// Number of directories in the snapshot, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1 && self.files.is_empty()
    }

    /// All directory ids in pre-order (parents before children, siblings by name).
    pub fn ids(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        order
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn path(&self, id: NodeId) -> &Path {
        &self.nodes[id].path
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id].name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn depth_of(&self, id: NodeId) -> usize {
        self.nodes[id].depth
    }

    /// Other children of `id`'s parent. Empty for the root.
    pub fn siblings_of(&self, id: NodeId) -> Vec<NodeId> {
        match self.nodes[id].parent {
            Some(parent) => self.nodes[parent]
                .children
                .iter()
                .copied()
                .filter(|&other| other != id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Looks up a directory by absolute path.
    pub fn lookup(&self, path: &Path) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    /// True when `path` names a directory or a file of this snapshot.
    pub fn contains_path(&self, path: &Path) -> bool {
        self.by_path.contains_key(path) || self.files.iter().any(|f| f.path == path)
    }

    /// True when `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes[node].parent;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id].parent;
        }
        false
    }

    /// Deepest directory that is an ancestor-or-self of both nodes.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let (mut a, mut b) = (a, b);
        while self.depth_of(a) > self.depth_of(b) {
            a = self.nodes[a].parent.unwrap_or(0);
        }
        while self.depth_of(b) > self.depth_of(a) {
            b = self.nodes[b].parent.unwrap_or(0);
        }
        while a != b {
            a = self.nodes[a].parent.unwrap_or(0);
            b = self.nodes[b].parent.unwrap_or(0);
        }
        a
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Files directly inside `id`.
    pub fn files_in(&self, id: NodeId) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(move |f| f.parent == id)
    }

    /// Lowercased names of every directory and file directly inside `id`.
    pub fn entry_names(&self, id: NodeId) -> HashSet<String> {
        self.nodes[id]
            .children
            .iter()
            .map(|&child| self.nodes[child].name.to_lowercase())
            .chain(self.files_in(id).map(|f| f.name.to_lowercase()))
            .collect()
    }

    /// Files directly inside the root directory.
    pub fn loose_files(&self) -> Vec<&FileEntry> {
        self.files_in(self.root()).collect()
    }

    /// Number of files and directories anywhere below `id`.
    pub fn descendant_count(&self, id: NodeId) -> usize {
        let direct_files = self.files_in(id).count();
        self.nodes[id]
            .children
            .iter()
            .map(|&child| 1 + self.descendant_count(child))
            .sum::<usize>()
            + direct_files
    }

    /// Relative paths of every directory and file, sorted. Two snapshots with
    /// the same outline are structurally identical.
    pub fn outline(&self) -> Vec<String> {
        let root = self.root_path();
        let relative = |p: &Path| {
            p.strip_prefix(root)
                .unwrap_or(p)
                .to_string_lossy()
                .replace('\\', "/")
        };
        let mut lines: Vec<String> = self
            .nodes
            .iter()
            .skip(1)
            .map(|n| format!("{}/", relative(&n.path)))
            .chain(self.files.iter().map(|f| relative(&f.path)))
            .collect();
        lines.sort();
        lines
    }
}

/// Incrementally assembles a [`DirTree`]. Used by the scanner and by tests that
/// need a snapshot without touching the disk.
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<DirectoryNode>,
    files: Vec<FileEntry>,
}

impl TreeBuilder {
    pub fn new(root: impl Into<PathBuf>, created: DateTime<Utc>, modified: DateTime<Utc>) -> Self {
        let path = root.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            nodes: vec![DirectoryNode {
                path,
                name,
                children: Vec::new(),
                parent: None,
                created,
                modified,
                depth: 0,
            }],
            files: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    /// Adds a child directory named `name` under `parent`.
    pub fn add_dir(
        &mut self,
        parent: NodeId,
        name: &str,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> NodeId {
        let id = self.nodes.len();
        let path = self.nodes[parent].path.join(name);
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(DirectoryNode {
            path,
            name: name.to_string(),
            children: Vec::new(),
            parent: Some(parent),
            created,
            modified,
            depth,
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Adds a file named `name` directly inside `parent`.
    pub fn add_file(&mut self, parent: NodeId, name: &str, modified: DateTime<Utc>) {
        self.files.push(FileEntry {
            name: name.to_string(),
            extension: extension_of(name),
            path: self.nodes[parent].path.join(name),
            parent,
            modified,
        });
    }

    /// Freezes the snapshot. Children and files are ordered by name so every
    /// traversal of the result is deterministic.
    pub fn build(mut self) -> DirTree {
        let names: Vec<String> = self.nodes.iter().map(|n| n.name.clone()).collect();
        for node in &mut self.nodes {
            node.children.sort_by(|&a, &b| names[a].cmp(&names[b]));
        }
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        let by_path = self
            .nodes
            .iter()
            .enumerate()
            .map(|(id, node)| (node.path.clone(), id))
            .collect();
        DirTree {
            nodes: self.nodes,
            files: self.files,
            by_path,
        }
    }
}

/// Lowercased extension of a file name, without the dot. Dotfiles such as
/// `.bashrc` have no extension.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
