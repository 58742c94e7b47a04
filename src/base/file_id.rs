use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

/// An interned identifier for a source file.
///
/// Cheap to copy and compare; the actual path lives in the [`FileSet`]
/// that produced the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bidirectional map between paths and [`FileId`]s.
#[derive(Debug, Default)]
pub struct FileSet {
    paths: Vec<PathBuf>,
    ids: FxHashMap<PathBuf, FileId>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a path, returning the existing id if already present.
    pub fn intern(&mut self, path: &Path) -> FileId {
        if let Some(id) = self.ids.get(path) {
            return *id;
        }
        let id = FileId(self.paths.len() as u32);
        self.paths.push(path.to_path_buf());
        self.ids.insert(path.to_path_buf(), id);
        id
    }

    pub fn path(&self, id: FileId) -> &Path {
        &self.paths[id.index()]
    }

    pub fn get(&self, path: &Path) -> Option<FileId> {
        self.ids.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
