//! # fortdoc
//!
//! Core library for Fortran source normalization, statement parsing, and
//! whole-project correlation.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! project    → Project assembly, parallel file loading
//!   ↓
//! correlate  → Whole-project name resolution, export tables, pruning
//!   ↓
//! parser     → Statement parser, declaration grammar, entity building
//!   ↓
//! reader     → Normalizing reader: fixed-form, continuations, doc comments
//!   ↓
//! model      → Entity arena, typed entity tree, refs and permissions
//!   ↓
//! base       → Primitives (FileId interning, name folding)
//! ```

// ============================================================================
// MODULES (dependency order: base → model → reader → parser → correlate →
// project)
// ============================================================================

/// Foundation types: FileId interning, case folding for Fortran names
pub mod base;

/// Entity model: arena, typed entity tree, references, permissions
pub mod model;

/// Normalizing reader: source form, continuations, includes, doc comments
pub mod reader;

/// Statement parser: scope-stack descent over the reader's statements
pub mod parser;

/// Correlation engine: dependency ordering, export tables, resolution
pub mod correlate;

/// Project assembly: directory scans, parallel parsing, accessor views
pub mod project;

pub mod error;
pub mod settings;

// Re-export the types a typical caller touches
pub use error::{FortdocError, ParseError, ReaderError};
pub use model::{ident, Entity, EntityArena, EntityId, EntityKind, Permission, Ref};
pub use project::Project;
pub use settings::ProjectSettings;
