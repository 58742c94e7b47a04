//! Statement classifiers.
//!
//! One compiled regex per statement form the parser recognizes, applied to
//! a normalized statement whose string literals have been masked out. All
//! patterns are case-insensitive and compiled once at first use.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Build a case-insensitive regex from a compile-time constant pattern.
///
/// # Panics
///
/// Panics if the pattern is invalid, at first access of the `LazyLock`
/// static. All patterns in this module are constants covered by tests.
fn build_re(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|_| panic!("invalid regex pattern: {pattern}"))
}

pub static END_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(
        r"^end\s*(?:(?P<kind>module|submodule|subroutine|function|procedure|program|type|interface|enum|block\s*data|block|associate)(?:\s+(?P<name>\w+))?)?$",
    )
});

pub static MODULE_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"^module(?:\s+(?P<name>\w+))?$"));

pub static SUBMODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(
        r"^submodule\s*\(\s*(?P<ancestor>\w+)\s*(?::\s*(?P<parent>\w+))?\s*\)\s*(?P<name>\w+)$",
    )
});

pub static PROGRAM_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"^program(?:\s+(?P<name>\w+))?$"));

pub static SUBROUTINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(
        r"^(?:(?P<attributes>.+?)\s+)?subroutine\s+(?P<name>\w+)\s*(?P<arguments>\([^()]*\))?(?:\s*bind\s*\(\s*(?P<bind>.*?)\s*\))?$",
    )
});

/// Matches a function statement up to the argument list. The trailing
/// `result(...)` and `bind(...)` clauses are extracted from the `rest`
/// group with [`RESULT_RE`] and [`BIND_RE`].
pub static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(
        r"^(?:(?P<attributes>.+?)\s+)?function\s+(?P<name>\w+)\s*(?P<arguments>\([^()]*\))?(?P<rest>.*)$",
    )
});

pub static RESULT_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"result\s*\(\s*(?P<result>\w+)\s*\)"));

pub static BIND_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"bind\s*\(\s*(?P<bind>[^()]*?)\s*\)"));

/// A derived-type definition. Also matches the `type is (...)` guard of a
/// `select type` construct, which the caller must reject by checking the
/// captured name against [`is_select_guard`].
pub static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(r"^type(?:\s+|\s*(?P<attributes>,.*)?::\s*)(?P<name>\w+)\s*(?P<parameters>\([^()]*\))?\s*$")
});

pub static EXTENDS_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"extends\s*\(\s*(?P<base>[^()\s]+)\s*\)"));

pub static INTERFACE_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"^(?P<abstract>abstract\s+)?interface(?:\s+(?P<name>.+))?$"));

pub static BOUNDPROC_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(
        r"^(?P<generic>generic|procedure)\s*(?P<prototype>\([^()]*\))?\s*(?:,\s*(?P<attributes>\w[^:]*))?(?:\s*::)?\s*(?P<names>\w.*)$",
    )
});

pub static FINAL_RE: LazyLock<Regex> = LazyLock::new(|| build_re(r"^final\s*::\s*(?P<names>\w.*)$"));

pub static MODPROC_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(r"^(?P<module>module\s+)?procedure\s*(?:::|\s)\s*(?P<names>\w.*)$")
});

pub static USE_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(r"^use(?:\s*(?:,\s*(?:non_)?intrinsic\s*)?::\s*|\s+)(?P<name>\w+)\s*(?P<rest>$|,.*)")
});

pub static ATTRIB_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(
        r"^(?P<attr>asynchronous|allocatable|bind\s*\(.*\)|data|dimension|external|intent\s*\(\s*\w+\s*\)|optional|parameter|pointer|private|protected|public|save|target|value|volatile)(?:\s+|\s*::\s*)(?P<names>(/|\(|\w).*?)\s*$",
    )
});

/// A variable declaration by leading type keyword. `type is` / `class is` /
/// `class default` guards also match and must be rejected separately.
pub static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(
        r"^(?P<vartype>integer|real|double\s*precision|character|complex|double\s*complex|logical|type|class|procedure)\s*(?P<rest>(?:\(|\s\w|[:,*]).*)$",
    )
});

pub static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| build_re(r"^(\w+\s*:)?\s*block$"));

pub static ASSOCIATE_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"^(\w+\s*:)?\s*associate\s*\(.*\)$"));

pub static ENUM_RE: LazyLock<Regex> = LazyLock::new(|| build_re(r"^enum\s*,\s*bind\s*\(.*\)$"));

pub static BLOCK_DATA_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"^block\s*data(\s+\w+)?$"));

pub static SUBCALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(r"^(?:if\s*\(.*\)\s*)?call\s+(?P<chain>(?:.*%\s*)?(?:\w+\s*(?:\(\))?))")
});

/// The start of a function-style reference: an optional component-access
/// chain followed by `name(`. The argument list is walked by the caller.
pub static CALL_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    build_re(r"(?P<chain>(?:\w+\s*(?:\(\))?\s*%\s*)*(?P<name>\w+))\s*\(")
});

pub static ARITH_GOTO_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"go\s*to\s*\([0-9,\s]+\)"));

pub static FORMAT_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"^[0-9]+\s+format\s*\(.*\)"));

// Type-declaration sub-patterns, applied after the leading keyword.

pub static VARKIND_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"\((?P<parens>.*)\)|\*\s*(?P<star>\d+|\(.*\))"));

pub static KIND_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"kind\s*=\s*(?P<kind>[^,\s]+)"));

pub static LEN_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"^(?:len\s*=\s*(?P<spec>\w+|\*|:|\d+)|(?P<bare>\d+))"));

pub static PROTO_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"^(?P<name>\*|\w+)\s*(?:\((?P<args>.*)\))?"));

pub static ATTRIBSPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| build_re(r"^,\s*(?P<attribs>\w.*?)::\s*(?P<decls>.*)\s*$"));

pub static DOUBLE_PREC_RE: LazyLock<Regex> = LazyLock::new(|| build_re(r"^double\s+precision"));

pub static DOUBLE_CMPLX_RE: LazyLock<Regex> = LazyLock::new(|| build_re(r"^double\s+complex"));

/// `type is (...)`, `class is (...)`, and `class default` select-type
/// guards, which would otherwise parse as declarations.
pub fn is_select_guard(statement: &str) -> bool {
    static GUARD_RE: LazyLock<Regex> =
        LazyLock::new(|| build_re(r"^(type\s+is|class\s+is|class\s+default)\b"));
    GUARD_RE.is_match(statement)
}
