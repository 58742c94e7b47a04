//! External preprocessor invocation.
//!
//! When a preprocessor command is configured, the file is run through it
//! before normalization. Preprocessor failure is never fatal: the reader
//! warns and falls back to the unprocessed text, so a missing `cpp` on one
//! machine does not take the whole project down.

use std::path::Path;
use std::process::Command;

use tracing::warn;

use crate::settings::ProjectSettings;

/// Run the configured preprocessor over `path`, returning its stdout, or
/// `None` (after logging) when preprocessing is unavailable or fails.
pub fn preprocess(settings: &ProjectSettings, path: &Path) -> Option<String> {
    let command = settings.preprocessor.as_ref()?;
    let (program, fixed_args) = command.split_first()?;

    let mut cmd = Command::new(program);
    cmd.args(fixed_args);
    for mac in &settings.macros {
        cmd.arg(format!("-D{mac}"));
    }
    for dir in &settings.include_dirs {
        cmd.arg(format!("-I{}", dir.display()));
    }
    cmd.arg(path);

    match cmd.output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            warn!(
                "preprocessor {program:?} exited with {} for {}; using unprocessed text",
                output.status,
                path.display()
            );
            None
        }
        Err(err) => {
            warn!(
                "could not run preprocessor {program:?} for {}: {err}; using unprocessed text",
                path.display()
            );
            None
        }
    }
}
