//! Text utilities for working with Fortran source.
//!
//! Everything here is quote-aware: Fortran strings use single or double
//! quotes, with a doubled quote character acting as an escape inside a
//! string of the same kind, and string literals may span continued lines.
//! Quote state is therefore threaded explicitly through every scan.

/// Advance quote state over `text`, starting from `state` (the quote
/// character currently open, if any). Returns the state after the last
/// character.
pub fn scan_quotes(text: &str, state: Option<char>) -> Option<char> {
    let mut state = state;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            Some(q) if c == q => {
                // Doubled quote is an escape, not a terminator
                if chars.peek() == Some(&q) {
                    chars.next();
                } else {
                    state = None;
                }
            }
            Some(_) => {}
            None if c == '\'' || c == '"' => state = Some(c),
            None => {}
        }
    }
    state
}

/// Find the first occurrence of `target` in `text` that is outside any
/// string literal, starting from quote state `state`. Returns the byte
/// index and the quote state at the end of `text` (used when the caller
/// keeps only a prefix, it must rescan with [`scan_quotes`]).
pub fn find_unquoted(text: &str, target: char, state: Option<char>) -> Option<usize> {
    let mut state = state;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match state {
            Some(q) if c == q => {
                if chars.peek().map(|(_, n)| *n) == Some(q) {
                    chars.next();
                } else {
                    state = None;
                }
            }
            Some(_) => {}
            None if c == target => return Some(i),
            None if c == '\'' || c == '"' => state = Some(c),
            None => {}
        }
    }
    None
}

/// Split `text` on every unquoted occurrence of `sep`, dropping empty
/// fragments. Assumes the scan starts outside any string.
pub fn split_unquoted(text: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    loop {
        match find_unquoted(rest, sep, None) {
            Some(i) => {
                let frag = rest[..i].trim();
                if !frag.is_empty() {
                    out.push(frag.to_string());
                }
                rest = &rest[i + sep.len_utf8()..];
            }
            None => {
                let frag = rest.trim();
                if !frag.is_empty() {
                    out.push(frag.to_string());
                }
                return out;
            }
        }
    }
}

/// Split `text` on unquoted occurrences of `sep` that are not inside
/// parentheses. Used for declaration lists, where array specs and
/// initializers may themselves contain commas.
pub fn paren_split(text: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) if c == q => {
                if chars.peek().map(|(_, n)| *n) == Some(q) {
                    chars.next();
                } else {
                    quote = None;
                }
            }
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                _ if c == sep && depth == 0 => {
                    out.push(text[start..i].to_string());
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    out.push(text[start..].to_string());
    out
}

/// Replace every string literal in `text` with a `"N"` placeholder,
/// returning the masked text and the captured strings. Masking makes the
/// statement classifiers immune to keywords inside literals; initializer
/// text is unmasked again before it is stored on an entity.
pub fn mask_strings(text: &str) -> (String, Vec<String>) {
    let mut masked = String::with_capacity(text.len());
    let mut strings = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' || c == '"' {
            let q = c;
            let start = i;
            let mut end = text.len();
            while let Some((j, d)) = chars.next() {
                if d == q {
                    if chars.peek().map(|(_, n)| *n) == Some(q) {
                        chars.next();
                    } else {
                        end = j + d.len_utf8();
                        break;
                    }
                }
            }
            masked.push_str(&format!("\"{}\"", strings.len()));
            strings.push(text[start..end].to_string());
        } else {
            masked.push(c);
        }
    }
    (masked, strings)
}

/// Undo [`mask_strings`] placeholders in `text`.
pub fn unmask_strings(text: &str, strings: &[String]) -> String {
    let mut out = text.to_string();
    for (n, s) in strings.iter().enumerate() {
        out = out.replace(&format!("\"{n}\""), s);
    }
    out
}

/// Extract the leading parenthesized group of `text`, including the
/// parentheses, or an empty string if `text` does not start with `(`.
/// Also accepts a leading `*len` legacy length spec.
pub fn leading_parens(text: &str) -> &str {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('*') {
        // `character*8` or `character*(*)`
        let rest = rest.trim_start();
        if rest.starts_with('(') {
            let inner = leading_parens(rest);
            return &trimmed[..trimmed.len() - rest.len() + inner.len()];
        }
        let len = rest
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        return &trimmed[..trimmed.len() - rest.len() + len];
    }
    if !trimmed.starts_with('(') {
        return "";
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in trimmed.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return &trimmed[..i + 1];
                    }
                }
                _ => {}
            },
        }
    }
    trimmed
}
