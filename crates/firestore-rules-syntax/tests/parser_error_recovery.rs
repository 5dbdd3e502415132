mod common;
use common::*;

// Error Recovery
#[test]
fn test_missing_semicolon() {
    insta::assert_snapshot!(snapshot_parse("service s { allow read }"), @r"
    (SourceFile 0..24
      (ServiceDecl 0..24
        (ServiceName 8..9)
        (Block 10..24
          (AllowStmt 12..23
            (MethodList 18..22)
            (MissingNode 23..23)))))
    ---
    Errors:
      - expected `;` at 23..23
    ");
}

#[test]
fn test_unterminated_block() {
    insta::assert_snapshot!(snapshot_parse("service cloud.firestore { match /a/ {"), @r"
    (SourceFile 0..37
      (ServiceDecl 0..37
        (ServiceName 8..23)
        (Block 24..37
          (MatchDecl 26..37
            (MatchPath 32..34
              (PathSegment 32..34
                (Name 33..34)))
            (ErrorNode 34..35)
            (Block 36..37
              (MissingNode 37..37)))
          (MissingNode 37..37))))
    ---
    Errors:
      - unexpected `/` at 34..35
      - expected `}` at 37..37
      - expected `}` at 37..37
    ");
}

#[test]
fn test_junk_statement_in_block() {
    insta::assert_snapshot!(snapshot_parse("service s { allow read; oops; allow write; }"), @r"
    (SourceFile 0..44
      (ServiceDecl 0..44
        (ServiceName 8..9)
        (Block 10..44
          (AllowStmt 12..23
            (MethodList 18..22))
          (ErrorNode 24..29)
          (AllowStmt 30..42
            (MethodList 36..41)))))
    ---
    Errors:
      - unexpected identifier at 24..29
    ");
}

#[test]
fn test_missing_condition_expression() {
    insta::assert_snapshot!(snapshot_parse("service s { allow read: if ; }"), @r"
    (SourceFile 0..30
      (ServiceDecl 0..30
        (ServiceName 8..9)
        (Block 10..30
          (AllowStmt 12..28
            (MethodList 18..22)
            (AllowCondition 22..27
              (MissingNode 27..27))))))
    ---
    Errors:
      - incomplete AllowCondition at 27..27
    ");
}

#[test]
fn test_innermost_scope_holds_missing_brace() {
    let source = "service cloud.firestore { match /a/ {";
    let tree = parse(grammar(), source);
    assert_covers(&tree);

    let blocks = nodes(&tree, SyntaxKind::Block);
    let innermost = blocks.last().unwrap();
    let missing = innermost.last_child().unwrap();
    assert!(missing.is_missing());
    assert_eq!(missing.expected_token(), Some(TokenKind::RBrace));
}

#[test]
fn test_stray_tokens_before_service() {
    let tree = parse(grammar(), "}}} service s { }");
    assert_covers(&tree);
    assert!(tree.has_error());
    // Each closing brace is a boundary of its own.
    let errors = nodes(&tree, SyntaxKind::ErrorNode);
    assert_eq!(errors.len(), 3);
    for error in &errors {
        assert_eq!(error.text(), "}");
        assert_eq!(error.parent().unwrap().kind(), SyntaxKind::SourceFile);
    }
    assert_eq!(nodes(&tree, SyntaxKind::ServiceDecl).len(), 1);
    assert!(!find(&tree, SyntaxKind::ServiceDecl, 0).has_error());
}

#[test]
fn test_recovery_continues_with_next_statement() {
    let source = "service s {\n  allow read: if a b;\n  allow write;\n}";
    let tree = parse(grammar(), source);
    assert_covers(&tree);

    let allows = nodes(&tree, SyntaxKind::AllowStmt);
    assert_eq!(allows.len(), 2);
    assert!(allows[0].has_error());
    assert!(!allows[1].has_error());
    assert_eq!(allows[1].text(), "allow write;");
    assert_eq!(find(&tree, SyntaxKind::ErrorNode, 0).text(), "b");
}

#[test]
fn test_garbage_input_is_wrapped() {
    for source in ["$$$", "\u{1F600} \u{1F600}", "'unterminated", "/* open", ")))"] {
        let tree = parse(grammar(), source);
        assert_covers(&tree);
        assert!(tree.has_error(), "{source:?}");
        for error in tree.errors() {
            assert!(error.range.end() <= TextSize::of(source));
        }
    }
}

#[test]
fn test_errors_are_in_source_order() {
    let tree = parse(
        grammar(),
        "service s { allow read: if ; allow ; match /x { allow write } }",
    );
    assert_covers(&tree);
    let errors = tree.errors();
    assert!(errors.len() >= 3, "{errors:?}");
    for pair in errors.windows(2) {
        assert!(pair[0].range.start() <= pair[1].range.start());
    }
}
