//! The normalizing reader.
//!
//! Converts one raw Fortran source file into a stream of logical
//! statements, each either code or attached documentation:
//! - line continuations are merged into one logical line
//! - normal comments are stripped; documentation comments survive as
//!   dedicated [`Statement`] values
//! - statements are split along unquoted semicolons
//! - `include` directives are spliced in transparently
//!
//! The reader knows nothing about Fortran semantics beyond comment,
//! continuation, and quote syntax; everything else is the parser's job.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::error::ReaderError;
use crate::settings::ProjectSettings;

use super::{fixed_form, preprocessor, text};

/// Nesting limit for `include` splicing; defends against include cycles.
const INCLUDE_DEPTH_LIMIT: usize = 64;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r#"^include\s+["'](?<file>.+?)["']$"#)
        .case_insensitive(true)
        .build()
        .expect("invalid include pattern")
});

/// One logical statement produced by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A code statement, comments stripped and continuations merged.
    Code { text: String, line: usize },
    /// Documentation attached to the preceding declaration. An empty text
    /// marks a deliberate break: a blank line ended the doc block.
    Doc { text: String, line: usize },
    /// Documentation attached to the following declaration.
    Predoc { text: String, line: usize },
}

impl Statement {
    pub fn text(&self) -> &str {
        match self {
            Self::Code { text, .. } | Self::Doc { text, .. } | Self::Predoc { text, .. } => text,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Self::Code { line, .. } | Self::Doc { line, .. } | Self::Predoc { line, .. } => *line,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code { .. })
    }
}

/// Which multi-line documentation block, if any, is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocBlock {
    None,
    /// Opened by the alternate doc mark; runs over plain comments.
    Doc,
    /// Opened by the alternate pre-doc mark.
    Predoc,
}

pub struct FortranReader<'s> {
    settings: &'s ProjectSettings,
    path: PathBuf,
    lines: VecDeque<(usize, String)>,
    pending: VecDeque<Statement>,
    include_depth: usize,
    /// The previous returned statement was documentation; a following blank
    /// line then emits an empty doc to break attachment.
    prevdoc: bool,
    doc_block: DocBlock,
}

impl<'s> FortranReader<'s> {
    /// Open and normalize `path`: optional preprocessing, fixed-form
    /// conversion by extension, then lazy statement scanning.
    pub fn new(path: &Path, settings: &'s ProjectSettings) -> Result<Self, ReaderError> {
        let bytes = std::fs::read(path).map_err(|source| ReaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let content = match preprocessor::preprocess(settings, path) {
            Some(processed) => processed,
            None => String::from_utf8_lossy(&bytes).into_owned(),
        };
        // from_text applies fixed-form conversion; doing it here as well
        // would run the converter twice over the same text.
        Ok(Self::from_text(path, &content, settings))
    }

    /// Build a reader over in-memory text. Fixed-form conversion still
    /// applies based on the extension of `path`.
    pub fn from_text(path: &Path, content: &str, settings: &'s ProjectSettings) -> Self {
        let ext = extension_of(path);
        let content = if settings.is_fixed_form(&ext) {
            std::borrow::Cow::Owned(fixed_form::convert(content))
        } else {
            std::borrow::Cow::Borrowed(content)
        };
        Self {
            settings,
            path: path.to_path_buf(),
            lines: content
                .lines()
                .enumerate()
                .map(|(i, l)| (i + 1, l.to_string()))
                .collect(),
            pending: VecDeque::new(),
            include_depth: 0,
            prevdoc: false,
            doc_block: DocBlock::None,
        }
    }

    fn with_depth(path: &Path, content: &str, settings: &'s ProjectSettings, depth: usize) -> Self {
        let mut reader = Self::from_text(path, content, settings);
        reader.include_depth = depth;
        reader
    }

    /// Classify the comment trailing a line. Returns the statement to queue
    /// and the doc block mode it opens, or `None` for a plain comment.
    fn classify_comment(&mut self, comment: &str, line: usize) -> Option<Statement> {
        let mut chars = comment.chars();
        chars.next(); // the '!' itself
        let mark = chars.next()?;
        let text = strip_one_space(chars.as_str());
        if mark == self.settings.predocmark {
            self.doc_block = DocBlock::None;
            Some(Statement::Predoc { text, line })
        } else if mark == self.settings.predocmark_alt {
            self.doc_block = DocBlock::Predoc;
            Some(Statement::Predoc { text, line })
        } else if mark == self.settings.docmark_alt {
            self.doc_block = DocBlock::Doc;
            Some(Statement::Doc { text, line })
        } else if mark == self.settings.docmark {
            self.doc_block = DocBlock::None;
            Some(Statement::Doc { text, line })
        } else {
            None
        }
    }

    /// Consume physical lines until at least one statement is queued or the
    /// file is exhausted. Returns whether anything was queued.
    fn advance(&mut self) -> Result<bool, ReaderError> {
        let mut linebuffer = String::new();
        let mut first_line = 0usize;
        let mut continued = false;
        let mut open_quote: Option<char> = None;
        // Docs gathered on the statement's own lines, emitted after it
        let mut docs: Vec<Statement> = Vec::new();

        while let Some((num, raw)) = self.lines.pop_front() {
            let line = raw.trim_end();

            // Preprocessor residue
            if line.trim_start().starts_with('#') {
                continue;
            }

            // An open alternate-mark block swallows whole comment lines
            if self.doc_block != DocBlock::None && linebuffer.is_empty() {
                let trimmed = line.trim_start();
                if let Some(comment_text) = trimmed.strip_prefix('!') {
                    let text = strip_one_space(comment_text);
                    let stmt = match self.doc_block {
                        DocBlock::Doc => Statement::Doc { text, line: num },
                        DocBlock::Predoc => Statement::Predoc { text, line: num },
                        DocBlock::None => unreachable!(),
                    };
                    self.pending.push_back(stmt);
                    self.prevdoc = true;
                    continue;
                }
                // Blank line or code closes the block
                self.doc_block = DocBlock::None;
                if trimmed.is_empty() {
                    self.push_doc_break(num);
                    if !self.pending.is_empty() {
                        return Ok(true);
                    }
                    continue;
                }
            }

            // Split off a trailing comment, respecting open string literals
            let (code_part, comment_part) = match text::find_unquoted(line, '!', open_quote) {
                Some(i) => (&line[..i], Some(&line[i..])),
                None => (line, None),
            };

            if let Some(comment) = comment_part {
                match self.classify_comment(comment, num) {
                    // Documentation buffered during a continuation is
                    // discarded; docs belong to whole statements only.
                    Some(_) if continued => {}
                    Some(stmt) => docs.push(stmt),
                    None => {}
                }
            }

            let mut code = code_part.trim().to_string();
            open_quote = text::scan_quotes(&code, open_quote);

            if code.is_empty() {
                if linebuffer.is_empty() && docs.is_empty() {
                    // Blank or comment-only line: breaks doc attachment
                    self.push_doc_break(num);
                    if !self.pending.is_empty() {
                        return Ok(true);
                    }
                    continue;
                }
                if !continued && (!linebuffer.is_empty() || !docs.is_empty()) {
                    return self.finish_statement(linebuffer, first_line, docs);
                }
                continue;
            }

            if first_line == 0 {
                first_line = num;
            }

            // Leading '&' resumes the previous line mid-token
            let mut direct_join = false;
            if let Some(rest) = code.strip_prefix('&') {
                if !continued {
                    return Err(ReaderError::BadContinuation {
                        path: self.path.clone(),
                        line: num,
                    });
                }
                code = rest.trim_start().to_string();
                direct_join = true;
            }

            // Trailing '&' continues onto the next line
            if let Some(rest) = code.strip_suffix('&') {
                continued = true;
                docs.clear();
                code = rest.trim_end().to_string();
            } else {
                continued = false;
            }

            if linebuffer.is_empty() {
                linebuffer = code;
            } else if direct_join {
                linebuffer.push_str(&code);
            } else {
                linebuffer.push(' ');
                linebuffer.push_str(&code);
            }

            if !continued && !linebuffer.is_empty() {
                return self.finish_statement(linebuffer, first_line, docs);
            }
        }

        // End of file. A pending continuation yields the accumulated
        // partial statement rather than an error (legacy behavior).
        if !linebuffer.is_empty() || !docs.is_empty() {
            return self.finish_statement(linebuffer, first_line, docs);
        }
        Ok(false)
    }

    fn finish_statement(
        &mut self,
        linebuffer: String,
        first_line: usize,
        docs: Vec<Statement>,
    ) -> Result<bool, ReaderError> {
        for frag in text::split_unquoted(&linebuffer, ';') {
            self.pending.push_back(Statement::Code {
                text: frag,
                line: first_line,
            });
        }
        self.prevdoc = !docs.is_empty();
        for doc in docs {
            self.pending.push_back(doc);
        }
        Ok(true)
    }

    /// A blank line after documentation emits an empty doc statement so the
    /// parser stops attaching subsequent docs to the previous declaration.
    fn push_doc_break(&mut self, line: usize) {
        if self.prevdoc {
            self.pending.push_back(Statement::Doc {
                text: String::new(),
                line,
            });
            self.prevdoc = false;
        }
    }

    /// Replace an `include` statement with the statements of the included
    /// file. Missing header-like includes degrade to a warning.
    fn splice_include(&mut self, name: &str) -> Result<(), ReaderError> {
        if self.include_depth + 1 > INCLUDE_DEPTH_LIMIT {
            return Err(ReaderError::IncludeDepth {
                path: self.path.clone(),
                limit: INCLUDE_DEPTH_LIMIT,
            });
        }

        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(dir) = self.path.parent() {
            candidates.push(dir.join(name));
        }
        for dir in &self.settings.include_dirs {
            candidates.push(dir.join(name));
        }

        let found = candidates.iter().find(|p| p.is_file());
        let Some(include_path) = found else {
            let ext = extension_of(Path::new(name));
            if self.settings.is_source_extension(&ext) {
                return Err(ReaderError::MissingInclude {
                    path: self.path.clone(),
                    include: name.to_string(),
                });
            }
            warn!(
                "{}: could not find include {name:?}; ignoring",
                self.path.display()
            );
            return Ok(());
        };

        let bytes = std::fs::read(include_path).map_err(|source| ReaderError::Io {
            path: include_path.clone(),
            source,
        })?;
        let content = String::from_utf8_lossy(&bytes);
        let sub = FortranReader::with_depth(
            include_path,
            &content,
            self.settings,
            self.include_depth + 1,
        );
        let mut spliced = Vec::new();
        for stmt in sub {
            spliced.push(stmt?);
        }
        for stmt in spliced.into_iter().rev() {
            self.pending.push_front(stmt);
        }
        Ok(())
    }
}

impl Iterator for FortranReader<'_> {
    type Item = Result<Statement, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(stmt) = self.pending.pop_front() {
                if let Statement::Code { text, .. } = &stmt {
                    if let Some(m) = INCLUDE_RE.captures(text) {
                        let name = m["file"].to_string();
                        if let Err(err) = self.splice_include(&name) {
                            return Some(Err(err));
                        }
                        continue;
                    }
                }
                return Some(Ok(stmt));
            }
            match self.advance() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn strip_one_space(text: &str) -> String {
    text.strip_prefix(' ').unwrap_or(text).to_string()
}
