//! Crate-wide error types.
//!
//! The taxonomy follows the pipeline's failure semantics:
//! - [`ReaderError`] / [`ParseError`] are recoverable per file: the project
//!   assembler catches them at the file boundary, logs a warning, and keeps
//!   going with the rest of the project (unless strict mode is on).
//! - [`FortdocError`] is fatal for the whole run: a dependency cycle,
//!   duplicate programs, or a settings misconfiguration cannot be worked
//!   around and must surface to the caller.
//!
//! Unresolved references (a `use` of an unknown module, a call to a library
//! routine) are not errors at all - they are logged and left unresolved.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while normalizing one source file.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An `include` of a Fortran source file that cannot be found. Missing
    /// header-like includes are downgraded to warnings by the reader.
    #[error("{path}: could not find included source file {include:?}")]
    MissingInclude { path: PathBuf, include: String },

    #[error("{path}: includes nested deeper than {limit} levels (include cycle?)")]
    IncludeDepth { path: PathBuf, limit: usize },

    #[error("{path}:{line}: statement may not begin with a continuation '&'")]
    BadContinuation { path: PathBuf, line: usize },
}

/// Errors produced while parsing one file's statement stream.
///
/// Parsing aborts for the offending file only; other files are unaffected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: {scope} may not contain this construct: {statement:?}")]
    UnexpectedConstruct {
        line: usize,
        scope: String,
        statement: String,
    },

    #[error("line {line}: END does not match enclosing {expected}: {statement:?}")]
    MismatchedEnd {
        line: usize,
        expected: String,
        statement: String,
    },

    #[error("line {line}: second CONTAINS statement in {scope}")]
    DuplicateContains { line: usize, scope: String },

    #[error("line {line}: unexpected END with no open scope")]
    UnbalancedEnd { line: usize },

    #[error("file ended inside {scope}")]
    UnexpectedEof { scope: String },

    #[error(transparent)]
    Read(#[from] ReaderError),
}

/// Fatal, project-level errors.
#[derive(Debug, Error)]
pub enum FortdocError {
    #[error("invalid settings: {0}")]
    Config(String),

    #[error("failed to scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Raised in strict mode when a per-file error would otherwise have been
    /// downgraded to a warning.
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("circular dependency between modules: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("multiple programs named {0:?} in project")]
    DuplicateProgram(String),
}
