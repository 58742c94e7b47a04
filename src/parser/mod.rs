//! A statement-level parser for the Fortran constructs that carry
//! documentation: program units, procedures, derived types, interfaces,
//! variable declarations, and the statements that link them (`use`,
//! attribute statements, calls).
//!
//! Executable code inside procedure bodies is not parsed beyond scanning
//! for call targets.

mod declarations;
mod intrinsics;
#[allow(clippy::module_inception)]
mod parser;
pub(crate) mod patterns;

pub use declarations::{implicit_type, parse_type, parse_variables, TypeSpec};
pub use parser::{FileTree, StatementParser};
