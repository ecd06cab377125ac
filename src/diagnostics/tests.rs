use super::*;

#[test]
fn test_diagnostic_json() {
    let diag = Diagnostic::error("E1001")
        .message("typechecker: duplicate declaration 'Thing'")
        .location(Some(Location::new("thing.able", 3, 1)))
        .build();

    let json = diag.to_json();
    assert!(json.contains("E1001"));
    assert!(json.contains("duplicate declaration"));
    assert!(json.contains("\"line\":3"));
}

#[test]
fn test_diagnostic_json_omits_missing_location() {
    let diag = Diagnostic::warning("W1001")
        .message("typechecker: redundant union member i32")
        .build();
    insta::assert_snapshot!(
        diag.to_json(),
        @r#"{"code":"W1001","severity":"warning","message":"typechecker: redundant union member i32"}"#
    );
}

#[test]
fn test_diagnostic_warning() {
    let diag = Diagnostic::warning("W1001").message("redundant").build();
    assert!(!diag.is_error());
    assert_eq!(diag.severity, Severity::Warning);
}

#[test]
fn test_diagnostic_display() {
    let diag = Diagnostic::error("E1002")
        .message("typechecker: undefined identifier 'x'")
        .location(Some(Location::new("main.able", 4, 9)))
        .build();
    assert_eq!(
        diag.to_string(),
        "error[E1002]: typechecker: undefined identifier 'x' (main.able:4:9)"
    );
}

#[test]
fn test_location_display_without_path() {
    assert_eq!(Location::new("", 1, 2).to_string(), "<unknown>:1:2");
}

#[test]
fn test_diagnostic_with_note() {
    let diag = Diagnostic::error("E1001")
        .message("duplicate")
        .note(Note::new("first declared here").with_location(Location::new("a.able", 1, 1)))
        .build();
    let json = diag.to_json();
    assert!(json.contains("first declared here"));
}

#[test]
fn test_diagnostic_bag() {
    let mut bag = DiagnosticBag::new();
    assert!(bag.is_empty());
    bag.push(Diagnostic::error("E1001").message("one").build());
    bag.push(Diagnostic::warning("W1001").message("two").build());

    assert_eq!(bag.len(), 2);
    assert!(bag.has_errors());
    assert!(bag.has_warnings());
    assert_eq!(bag.error_count(), 1);
    assert_eq!(bag.warning_count(), 1);
    assert_eq!(bag.messages().collect::<Vec<_>>(), vec!["one", "two"]);
}

#[test]
fn test_diagnostic_bag_merge_and_json() {
    let mut first = DiagnosticBag::from(Diagnostic::error("E1001").message("a").build());
    let second = DiagnosticBag::from(Diagnostic::error("E1002").message("b").build());
    first.merge(second);

    let json = first.to_json();
    assert!(json.starts_with('['));
    assert!(json.contains("E1001"));
    assert!(json.contains("E1002"));
    assert_eq!(first.take().len(), 2);
}
