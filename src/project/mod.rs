//! A documentation project: a set of source files, their parsed entity
//! trees, and the correlated whole.
//!
//! Files are parsed in parallel, each into its own arena, then merged into
//! the project arena in path order so entity ids are reproducible for a
//! given file set. [`Project::correlate`] runs whole-project resolution and
//! the display prune; after it returns the model is read-only.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::base::FileSet;
use crate::correlate;
use crate::error::FortdocError;
use crate::model::entity::SourceFile;
use crate::model::{EntityArena, EntityId, EntityKind};
use crate::parser::{FileTree, StatementParser};
use crate::settings::ProjectSettings;

#[derive(Debug)]
pub struct Project {
    settings: ProjectSettings,
    arena: EntityArena,
    files: FileSet,
    roots: Vec<EntityId>,
}

impl Project {
    pub fn new(settings: ProjectSettings) -> Result<Self, FortdocError> {
        settings.validate()?;
        Ok(Self {
            settings,
            arena: EntityArena::new(),
            files: FileSet::new(),
            roots: Vec::new(),
        })
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn arena(&self) -> &EntityArena {
        &self.arena
    }

    /// Parse one file from disk and adopt it into the project.
    pub fn add_file(&mut self, path: &Path) -> Result<EntityId, FortdocError> {
        let tree = StatementParser::new(&self.settings)
            .parse_file(path)
            .map_err(|source| FortdocError::File {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(self.adopt(path, tree))
    }

    /// Parse in-memory source as if it lived at `path`.
    pub fn add_source(&mut self, path: &Path, text: &str) -> Result<EntityId, FortdocError> {
        let tree = StatementParser::new(&self.settings)
            .parse_text(path, text)
            .map_err(|source| FortdocError::File {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(self.adopt(path, tree))
    }

    /// Scan `dir` recursively for Fortran source and parse every file,
    /// in parallel. Returns the number of files adopted.
    ///
    /// A file that fails to parse is skipped with a warning; in strict mode
    /// the first failure aborts the scan instead.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize, FortdocError> {
        let mut paths: Vec<PathBuf> = Vec::new();
        let excluded = |name: &str| self.settings.exclude_dirs.iter().any(|d| d == name);
        let walker = WalkDir::new(dir).follow_links(false).into_iter().filter_entry(|e| {
            !(e.file_type().is_dir()
                && e.file_name().to_str().is_some_and(&excluded))
        });
        for entry in walker {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(dir).to_path_buf();
                match err.into_io_error() {
                    Some(source) => FortdocError::Io { path, source },
                    None => FortdocError::Io {
                        path,
                        source: std::io::Error::other("filesystem loop"),
                    },
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .unwrap_or_default();
            if self.settings.is_source_extension(&ext) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        debug!(files = paths.len(), dir = %dir.display(), "scanning source tree");

        let parsed = {
            let parser = StatementParser::new(&self.settings);
            let parsed: Mutex<Vec<(PathBuf, FileTree)>> = Mutex::new(Vec::new());
            let failure: Mutex<Option<FortdocError>> = Mutex::new(None);
            paths.par_iter().for_each(|path| {
                match parser.parse_file(path) {
                    Ok(tree) => parsed.lock().push((path.clone(), tree)),
                    Err(source) => {
                        if self.settings.strict {
                            let mut slot = failure.lock();
                            if slot.is_none() {
                                *slot = Some(FortdocError::File {
                                    path: path.clone(),
                                    source,
                                });
                            }
                        } else {
                            warn!(
                                path = %path.display(),
                                error = %source,
                                "skipping file that failed to parse"
                            );
                        }
                    }
                }
            });
            if let Some(err) = failure.into_inner() {
                return Err(err);
            }
            let mut parsed = parsed.into_inner();
            // Adoption order decides entity ids; keep it path-stable
            parsed.sort_by(|a, b| a.0.cmp(&b.0));
            parsed
        };

        let count = parsed.len();
        for (path, tree) in parsed {
            self.adopt(&path, tree);
        }
        info!(files = count, "source tree loaded");
        Ok(count)
    }

    fn adopt(&mut self, path: &Path, tree: FileTree) -> EntityId {
        let root = self.arena.merge(tree.arena, tree.root);
        let file = self.files.intern(path);
        if let EntityKind::SourceFile(sf) = &mut self.arena.get_mut(root).kind {
            sf.file = Some(file);
        }
        self.roots.push(root);
        root
    }

    /// Run whole-project resolution and the display prune.
    pub fn correlate(&mut self) -> Result<(), FortdocError> {
        correlate::correlate(&mut self.arena, &self.roots, &self.settings)?;
        correlate::prune(&mut self.arena, &self.roots, &self.settings);
        Ok(())
    }

    /// Source-file roots, in adoption order.
    pub fn file_roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// The path a file root was loaded from.
    pub fn path_of(&self, root: EntityId) -> Option<&Path> {
        match &self.arena.get(root).kind {
            EntityKind::SourceFile(sf) => sf.file.map(|id| self.files.path(id)),
            _ => None,
        }
    }

    pub fn modules(&self) -> Vec<EntityId> {
        self.file_children(|sf| &sf.modules)
    }

    pub fn submodules(&self) -> Vec<EntityId> {
        self.file_children(|sf| &sf.submodules)
    }

    pub fn programs(&self) -> Vec<EntityId> {
        self.file_children(|sf| &sf.programs)
    }

    /// Every procedure in the project: free procedures plus the contents of
    /// all code units, recursively.
    pub fn procedures(&self) -> Vec<EntityId> {
        let mut out = self.file_children(|sf| &sf.procedures);
        let mut stack = self.units();
        while let Some(id) = stack.pop() {
            if let Some(unit) = self.arena.get(id).unit() {
                for child in unit.procedures() {
                    out.push(child);
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Every derived type declared in any code unit of the project.
    pub fn types(&self) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = self.units();
        while let Some(id) = stack.pop() {
            if let Some(unit) = self.arena.get(id).unit() {
                out.extend_from_slice(&unit.types);
                stack.extend(unit.procedures());
            }
        }
        out
    }

    /// Every named interface declared in any code unit of the project.
    pub fn interfaces(&self) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = self.units();
        while let Some(id) = stack.pop() {
            if let Some(unit) = self.arena.get(id).unit() {
                out.extend_from_slice(&unit.interfaces);
                stack.extend(unit.procedures());
            }
        }
        out
    }

    fn units(&self) -> Vec<EntityId> {
        let mut out = self.modules();
        out.extend(self.submodules());
        out.extend(self.programs());
        out.extend(self.file_children(|sf| &sf.procedures));
        out
    }

    fn file_children(&self, pick: impl Fn(&SourceFile) -> &[EntityId]) -> Vec<EntityId> {
        let mut out = Vec::new();
        for &root in &self.roots {
            if let EntityKind::SourceFile(sf) = &self.arena.get(root).kind {
                out.extend_from_slice(pick(sf));
            }
        }
        out
    }
}
