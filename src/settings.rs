//! Project configuration.
//!
//! A single immutable [`ProjectSettings`] value is threaded explicitly
//! through the reader, parser, and correlation engine. Nothing in the crate
//! reads process-wide state, which is what makes per-file parallel parsing
//! safe even with differing per-call-site configuration.

use std::path::PathBuf;

use crate::error::FortdocError;
use crate::model::Permission;

/// Extensions conventionally holding free-form source.
pub const FREE_FORM_EXTENSIONS: &[&str] = &["f90", "f95", "f03", "f08", "f15", "f18"];

/// Extensions conventionally holding fixed-form source.
pub const FIXED_FORM_EXTENSIONS: &[&str] = &["f", "for", "f77", "fpp"];

/// Configuration for one documentation run.
#[derive(Debug, Clone)]
pub struct ProjectSettings {
    /// Character following `!` that marks a trailing documentation comment.
    pub docmark: char,
    /// Alternate doc mark opening a block that persists over plain comments.
    pub docmark_alt: char,
    /// Doc mark for documentation preceding the declaration it documents.
    pub predocmark: char,
    /// Alternate pre-doc mark, block-forming like `docmark_alt`.
    pub predocmark_alt: char,

    /// Treat files with an unknown extension as fixed-form.
    pub fixed_form_default: bool,

    /// External preprocessor command (program plus fixed arguments).
    /// `None` disables preprocessing.
    pub preprocessor: Option<Vec<String>>,
    /// Macro definitions handed to the preprocessor as `-D` arguments.
    pub macros: Vec<String>,
    /// Directories searched for `include` files, after the including file's
    /// own directory. Also handed to the preprocessor as `-I` arguments.
    pub include_dirs: Vec<PathBuf>,

    /// Permissions kept by the post-correlation prune pass.
    pub display: Vec<Permission>,

    /// Extra non-local modules, as (name, url) pairs. Merged over the
    /// intrinsic module table.
    pub extra_mods: Vec<(String, String)>,

    /// Emit a warning for every unresolved reference.
    pub warn: bool,
    /// Make per-file parse errors fatal instead of catch-and-continue.
    /// Intended for development and test runs.
    pub strict: bool,

    /// Directory names excluded from project scans.
    pub exclude_dirs: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            docmark: '!',
            docmark_alt: '*',
            predocmark: '>',
            predocmark_alt: '|',
            fixed_form_default: false,
            preprocessor: None,
            macros: Vec::new(),
            include_dirs: Vec::new(),
            display: vec![Permission::Public, Permission::Protected],
            extra_mods: Vec::new(),
            warn: false,
            strict: false,
            exclude_dirs: Vec::new(),
        }
    }
}

impl ProjectSettings {
    /// Check the settings for contradictions. Called eagerly by
    /// [`Project::new`](crate::project::Project::new); a doc-mark collision
    /// would make documentation classification ambiguous for every file, so
    /// it is rejected before any file is read.
    pub fn validate(&self) -> Result<(), FortdocError> {
        let marks = [
            ("docmark", self.docmark),
            ("docmark_alt", self.docmark_alt),
            ("predocmark", self.predocmark),
            ("predocmark_alt", self.predocmark_alt),
        ];
        for (i, (name_a, mark_a)) in marks.iter().enumerate() {
            for (name_b, mark_b) in &marks[i + 1..] {
                if mark_a == mark_b {
                    return Err(FortdocError::Config(format!(
                        "{name_a} and {name_b} are both {mark_a:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether `ext` (lower-case, no dot) names a Fortran source file.
    pub fn is_source_extension(&self, ext: &str) -> bool {
        FREE_FORM_EXTENSIONS.contains(&ext) || FIXED_FORM_EXTENSIONS.contains(&ext)
    }

    /// Whether a file with extension `ext` should be read as fixed-form.
    pub fn is_fixed_form(&self, ext: &str) -> bool {
        if FIXED_FORM_EXTENSIONS.contains(&ext) {
            true
        } else if FREE_FORM_EXTENSIONS.contains(&ext) {
            false
        } else {
            self.fixed_form_default
        }
    }

    /// Whether entities with `permission` survive the prune pass.
    pub fn is_displayed(&self, permission: Permission) -> bool {
        self.display.contains(&permission)
    }
}
