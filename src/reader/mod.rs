//! Source normalization: raw Fortran text in, clean statement stream out.
//!
//! The pipeline per file is: optional external preprocessing, optional
//! fixed-form to free-form conversion, then the [`FortranReader`] scan that
//! merges continuations, strips comments, surfaces documentation, splits on
//! semicolons, and splices `include` files.

mod fixed_form;
mod preprocessor;
#[allow(clippy::module_inception)]
mod reader;
pub mod text;

pub use fixed_form::convert as fixed_to_free;
pub use reader::{FortranReader, Statement};
