//! Foundation types for the fortdoc toolchain.
//!
//! This module provides fundamental types used throughout the pipeline:
//! - [`FileId`], [`FileSet`] - Interned file identifiers
//! - [`fold_name`] - Case folding for Fortran's case-insensitive names
//!
//! This module has NO dependencies on other fortdoc modules.

mod file_id;

pub use file_id::{FileId, FileSet};

/// Fold a Fortran name to its canonical lookup form.
///
/// All name matching in Fortran is case-insensitive, so every lookup table
/// in the crate is keyed on the folded form. Fortran identifiers are ASCII.
#[inline]
pub fn fold_name(name: &str) -> String {
    name.to_ascii_lowercase()
}
