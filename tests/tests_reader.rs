//! Reader Tests - Statement Normalization
//!
//! These tests exercise the normalizing reader on its own: continuation
//! merging, documentation mark classification, semicolon splitting,
//! include splicing and fixed-form conversion, before any parsing happens.

use std::path::Path;

use rstest::rstest;

use fortdoc::reader::{FortranReader, Statement};
use fortdoc::{ProjectSettings, ReaderError};

/// Read free-form source from memory and collect every statement.
fn statements(src: &str) -> Vec<Statement> {
    let settings = ProjectSettings::default();
    FortranReader::from_text(Path::new("test.f90"), src, &settings)
        .collect::<Result<Vec<_>, _>>()
        .expect("reader should succeed")
}

fn code_texts(stmts: &[Statement]) -> Vec<&str> {
    stmts
        .iter()
        .filter(|s| s.is_code())
        .map(|s| s.text())
        .collect()
}

// ============================================================================
// Continuations
// ============================================================================

#[test]
fn test_continuation_merges_with_space() {
    let stmts = statements("call foo(a, &\n    b)\n");
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0], Statement::Code {
        text: "call foo(a, b)".to_string(),
        line: 1,
    });
}

#[test]
fn test_leading_ampersand_resumes_mid_token() {
    let stmts = statements("integer :: long_na&\n     &me\n");
    assert_eq!(code_texts(&stmts), vec!["integer :: long_name"]);
}

#[test]
fn test_statement_line_is_first_physical_line() {
    let stmts = statements("\n\nx = 1 + &\n    2\n");
    assert_eq!(stmts[0].line(), 3);
}

#[test]
fn test_leading_ampersand_without_continuation_is_an_error() {
    let settings = ProjectSettings::default();
    let reader = FortranReader::from_text(Path::new("test.f90"), "&x = 1\n", &settings);
    let result: Result<Vec<_>, _> = reader.collect();
    match result {
        Err(ReaderError::BadContinuation { line, .. }) => assert_eq!(line, 1),
        other => panic!("expected BadContinuation, got {other:?}"),
    }
}

#[test]
fn test_comment_between_continued_lines() {
    let stmts = statements("call foo(a, &\n! just a remark\n    b)\n");
    assert_eq!(code_texts(&stmts), vec!["call foo(a, b)"]);
}

#[test]
fn test_open_string_hides_ampersand_and_bang() {
    // The '!' and the '&' are inside the literal
    let stmts = statements("s = 'a ! b & c'\n");
    assert_eq!(code_texts(&stmts), vec!["s = 'a ! b & c'"]);
}

#[test]
fn test_string_continued_across_lines_suppresses_comments() {
    // The literal stays open over the continuation, so neither '!' is a
    // comment marker
    let stmts = statements("s = 'a ! b&\n&c!d'\n");
    assert_eq!(code_texts(&stmts), vec!["s = 'a ! bc!d'"]);
}

// ============================================================================
// Documentation marks
// ============================================================================

#[test]
fn test_trailing_doc_follows_its_statement() {
    let stmts = statements("integer :: x !! the counter\n");
    assert_eq!(stmts, vec![
        Statement::Code {
            text: "integer :: x".to_string(),
            line: 1,
        },
        Statement::Doc {
            text: "the counter".to_string(),
            line: 1,
        },
    ]);
}

#[test]
fn test_full_line_doc_after_statement() {
    let stmts = statements("integer :: x\n!! counter doc\n");
    assert_eq!(stmts.len(), 2);
    assert_eq!(stmts[1], Statement::Doc {
        text: "counter doc".to_string(),
        line: 2,
    });
}

#[test]
fn test_predoc_precedes_its_statement() {
    let stmts = statements("!> summary of m\nmodule m\nend module\n");
    assert_eq!(stmts[0], Statement::Predoc {
        text: "summary of m".to_string(),
        line: 1,
    });
    assert!(stmts[1].is_code());
}

#[test]
fn test_blank_line_breaks_doc_attachment() {
    let stmts = statements("module m\n!! doc one\n\ninteger :: x\n");
    // The blank line emits an empty doc so later docs cannot attach to m
    assert_eq!(stmts[2], Statement::Doc {
        text: String::new(),
        line: 3,
    });
}

#[test]
fn test_alt_predoc_block_swallows_plain_comments() {
    let stmts = statements("!| first line\n! second line\nmodule m\nend module\n");
    assert_eq!(stmts[0].text(), "first line");
    assert!(matches!(stmts[0], Statement::Predoc { .. }));
    assert_eq!(stmts[1].text(), "second line");
    assert!(matches!(stmts[1], Statement::Predoc { .. }));
    assert_eq!(stmts[2].text(), "module m");
}

#[test]
fn test_alt_doc_block_closed_by_blank_line() {
    let stmts = statements("integer :: x !* doc a\n! doc b\n\ny = 1\n");
    assert_eq!(stmts[0].text(), "integer :: x");
    assert_eq!(stmts[1], Statement::Doc {
        text: "doc a".to_string(),
        line: 1,
    });
    assert_eq!(stmts[2], Statement::Doc {
        text: "doc b".to_string(),
        line: 2,
    });
    // Break, then the next statement
    assert_eq!(stmts[3].text(), "");
    assert_eq!(stmts[4].text(), "y = 1");
}

#[test]
fn test_only_one_leading_space_is_stripped() {
    let stmts = statements("integer :: x !!   indented\n");
    assert_eq!(stmts[1].text(), "  indented");
}

#[test]
fn test_doc_on_continued_line_is_discarded() {
    let stmts = statements("call foo(a, & !! not kept\n    b)\n");
    assert_eq!(stmts, vec![Statement::Code {
        text: "call foo(a, b)".to_string(),
        line: 1,
    }]);
}

#[rstest]
#[case("x = 1 !! d", true)]
#[case("x = 1 !* d", true)]
#[case("x = 1 !> d", false)]
#[case("x = 1 !| d", false)]
fn test_default_mark_classification(#[case] src: &str, #[case] is_doc: bool) {
    let stmts = statements(src);
    assert_eq!(stmts[0].text(), "x = 1");
    match (&stmts[1], is_doc) {
        (Statement::Doc { text, .. }, true) | (Statement::Predoc { text, .. }, false) => {
            assert_eq!(text, "d");
        }
        (other, _) => panic!("wrong classification for {src:?}: {other:?}"),
    }
}

#[test]
fn test_plain_comment_produces_nothing() {
    let stmts = statements("! nothing to see\nx = 1\n");
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].text(), "x = 1");
}

#[test]
fn test_custom_doc_marks() {
    let settings = ProjectSettings {
        docmark: '<',
        predocmark: '^',
        ..ProjectSettings::default()
    };
    let reader = FortranReader::from_text(
        Path::new("test.f90"),
        "!^ before\nx = 1 !< after\n",
        &settings,
    );
    let stmts: Vec<_> = reader.collect::<Result<_, _>>().expect("reader should succeed");
    assert!(matches!(&stmts[0], Statement::Predoc { text, .. } if text == "before"));
    assert_eq!(stmts[1].text(), "x = 1");
    assert!(matches!(&stmts[2], Statement::Doc { text, .. } if text == "after"));
}

// ============================================================================
// Statement splitting
// ============================================================================

#[test]
fn test_semicolons_split_statements() {
    let stmts = statements("a = 1; b = 2\n");
    assert_eq!(stmts, vec![
        Statement::Code {
            text: "a = 1".to_string(),
            line: 1,
        },
        Statement::Code {
            text: "b = 2".to_string(),
            line: 1,
        },
    ]);
}

#[test]
fn test_semicolon_inside_string_does_not_split() {
    let stmts = statements("s = 'a;b'\n");
    assert_eq!(code_texts(&stmts), vec!["s = 'a;b'"]);
}

#[test]
fn test_preprocessor_residue_is_skipped() {
    let stmts = statements("#define FOO 1\ninteger :: x\n#endif\n");
    assert_eq!(code_texts(&stmts), vec!["integer :: x"]);
}

#[test]
fn test_eof_with_pending_continuation_yields_partial() {
    let stmts = statements("x = 1 + &\n");
    assert_eq!(code_texts(&stmts), vec!["x = 1 +"]);
}

// ============================================================================
// Fixed source form
// ============================================================================

#[test]
fn test_fixed_form_selected_by_extension() {
    let src = "c a comment\n      integer x\n      x = 1\n";
    let settings = ProjectSettings::default();
    let reader = FortranReader::from_text(Path::new("test.f"), src, &settings);
    let stmts: Vec<_> = reader.collect::<Result<_, _>>().expect("reader should succeed");
    assert_eq!(code_texts(&stmts), vec!["integer x", "x = 1"]);
}

#[test]
fn test_fixed_form_column_six_continuation() {
    let src = "      call foo(a,\n     &  b)\n";
    let settings = ProjectSettings::default();
    let reader = FortranReader::from_text(Path::new("test.f"), src, &settings);
    let stmts: Vec<_> = reader.collect::<Result<_, _>>().expect("reader should succeed");
    assert_eq!(stmts.len(), 1);
    assert_eq!(stmts[0].text(), "call foo(a, b)");
}

#[test]
fn test_fixed_form_file_converted_once() {
    // Conversion must happen exactly once on the disk path; a second pass
    // would mistake column six of the freed text for a continuation marker.
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("legacy.f");
    std::fs::write(&path, "      program old\n      end program old\n").expect("write source");

    let settings = ProjectSettings::default();
    let reader = FortranReader::new(&path, &settings).expect("open source");
    let stmts: Vec<_> = reader.collect::<Result<_, _>>().expect("reader should succeed");
    assert_eq!(code_texts(&stmts), vec!["program old", "end program old"]);
}

// ============================================================================
// Include splicing
// ============================================================================

#[test]
fn test_include_splices_statements_in_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    let main = dir.path().join("main.f90");
    std::fs::write(&main, "integer :: a\ninclude \"part.inc\"\ninteger :: b\n")
        .expect("write main");
    std::fs::write(dir.path().join("part.inc"), "integer :: c\n").expect("write include");

    let settings = ProjectSettings::default();
    let reader = FortranReader::new(&main, &settings).expect("open main");
    let stmts: Vec<_> = reader.collect::<Result<_, _>>().expect("reader should succeed");
    assert_eq!(
        code_texts(&stmts),
        vec!["integer :: a", "integer :: c", "integer :: b"]
    );
}

#[test]
fn test_include_searches_include_dirs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let incdir = dir.path().join("inc");
    std::fs::create_dir(&incdir).expect("mkdir");
    std::fs::write(incdir.join("defs.inc"), "integer :: c\n").expect("write include");

    let settings = ProjectSettings {
        include_dirs: vec![incdir],
        ..ProjectSettings::default()
    };
    let reader = FortranReader::from_text(
        &dir.path().join("main.f90"),
        "include 'defs.inc'\n",
        &settings,
    );
    let stmts: Vec<_> = reader.collect::<Result<_, _>>().expect("reader should succeed");
    assert_eq!(code_texts(&stmts), vec!["integer :: c"]);
}

#[test]
fn test_missing_source_include_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = ProjectSettings::default();
    let reader = FortranReader::from_text(
        &dir.path().join("main.f90"),
        "include \"gone.f90\"\n",
        &settings,
    );
    let result: Result<Vec<_>, _> = reader.collect();
    match result {
        Err(ReaderError::MissingInclude { include, .. }) => assert_eq!(include, "gone.f90"),
        other => panic!("expected MissingInclude, got {other:?}"),
    }
}

#[test]
fn test_missing_header_include_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = ProjectSettings::default();
    let reader = FortranReader::from_text(
        &dir.path().join("main.f90"),
        "include \"config.h\"\ninteger :: x\n",
        &settings,
    );
    let stmts: Vec<_> = reader.collect::<Result<_, _>>().expect("reader should succeed");
    assert_eq!(code_texts(&stmts), vec!["integer :: x"]);
}
