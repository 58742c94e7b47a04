//! Conversion of fixed source form to free source form.
//!
//! A pure text-to-text transformation on whole lines, applied before the
//! normalizing reader ever looks at the file:
//! - a comment marker in column 1 (`c`, `C`, `*`, `!`) becomes `!`
//! - a continuation marker in column 6 becomes a trailing `&` on the most
//!   recent regular line, with comment lines allowed in between
//! - statement labels in columns 1-5 are kept
//! - an OpenMP sentinel (`c$omp`) stays a directive, not a comment

struct FixedLine {
    converted: String,
    is_regular: bool,
    is_continuation: bool,
}

fn analyse(line: &str) -> FixedLine {
    let first = line.chars().next().unwrap_or(' ');
    let label: String = line.chars().take(5).collect::<String>().trim().to_string();
    let cont_char = line.chars().nth(5).unwrap_or(' ');
    let five: String = line.chars().skip(1).take(4).collect();
    let is_short = line.len() <= 6;

    let mut is_comment = matches!(first, 'c' | 'C' | '*' | '!');
    let is_new_comment = five.contains('!') && !is_comment;
    let is_omp = is_comment && five.eq_ignore_ascii_case("$omp");
    if is_omp {
        is_comment = false;
    }
    let is_cpp = first == '#';
    let is_regular = !(is_comment || is_new_comment || is_cpp || is_short);
    let is_continuation = is_regular && !(cont_char == ' ' || cont_char == '0');

    let code: &str = line.get(6..).unwrap_or("");
    let converted = if is_comment {
        format!("!{}", line.get(1..).unwrap_or(""))
    } else if is_new_comment || is_cpp {
        line.to_string()
    } else if is_omp {
        format!("!{} {}", five, code)
    } else if !label.is_empty() && !is_continuation {
        format!("{} {}", label, code)
    } else {
        code.to_string()
    };

    FixedLine {
        converted,
        is_regular,
        is_continuation,
    }
}

/// Convert a whole fixed-form file to free form.
pub fn convert(text: &str) -> String {
    // Comment lines may sit between a statement and its continuation, so
    // converted lines are held back until the next regular line decides
    // whether the pending statement needs a trailing `&`.
    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<FixedLine> = Vec::new();

    for line in text.lines() {
        let conv = analyse(line);
        if conv.is_regular {
            if conv.is_continuation {
                if let Some(pending) = stack.iter_mut().find(|l| l.is_regular) {
                    let trimmed = pending.converted.trim_end().to_string();
                    pending.converted = format!("{trimmed} &");
                }
            }
            for l in stack.drain(..) {
                out.push_str(&l.converted);
                out.push('\n');
            }
        }
        stack.push(conv);
    }
    for l in stack.drain(..) {
        out.push_str(&l.converted);
        out.push('\n');
    }
    out
}
