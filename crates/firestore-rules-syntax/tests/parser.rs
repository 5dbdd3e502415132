mod common;
use common::*;

fn texts(tree: &Tree, kind: SyntaxKind) -> Vec<String> {
    nodes(tree, kind)
        .iter()
        .map(|node| node.text().to_string())
        .collect()
}

// =============================================================================
// Declarations
// =============================================================================

#[test]
fn test_nested_match_blocks() {
    let source = "service cloud.firestore { match /databases/{db}/documents { match /users/{uid} { allow read: if request.auth.uid == uid; } } }";
    let tree = parse(grammar(), source);

    assert_covers(&tree);
    assert!(!tree.has_error(), "{}", tree.dump());
    assert!(tree.errors().is_empty());

    assert_eq!(nodes(&tree, SyntaxKind::ServiceDecl).len(), 1);
    assert_eq!(texts(&tree, SyntaxKind::ServiceName), vec!["cloud.firestore"]);

    let outer = find(&tree, SyntaxKind::MatchDecl, 0);
    let inner = find(&tree, SyntaxKind::MatchDecl, 1);
    assert_eq!(outer.parent().unwrap().kind(), SyntaxKind::Block);
    assert_eq!(
        inner.parent().unwrap().parent().unwrap().byte_range(),
        outer.byte_range()
    );

    let captures: Vec<_> = nodes(&tree, SyntaxKind::PathCapture)
        .iter()
        .map(|capture| capture.first_child().unwrap().text().to_string())
        .collect();
    assert_eq!(captures, vec!["db", "uid"]);
    assert_eq!(texts(&tree, SyntaxKind::PathSegment), vec!["/databases", "/documents", "/users"]);

    let allow = find(&tree, SyntaxKind::AllowStmt, 0);
    assert_eq!(allow.parent().unwrap().parent().unwrap().byte_range(), inner.byte_range());
    let condition = find(&tree, SyntaxKind::AllowCondition, 0);
    let comparison = condition.first_child().unwrap();
    assert_eq!(comparison.kind(), SyntaxKind::BinaryExpr);
    assert_eq!(comparison.text(), "request.auth.uid == uid");
    let operator = comparison
        .syntax()
        .children_with_tokens()
        .filter_map(|element| element.into_token())
        .find(|token| !token.kind().is_trivia())
        .unwrap();
    assert_eq!(operator.kind(), SyntaxKind::EqEq);
}

#[test]
fn test_rules_version_and_methods() {
    let source = "rules_version = '2';\nservice cloud.firestore {\n  match /{document=**} {\n    allow get, list, create: if false;\n  }\n}\n";
    let tree = parse(grammar(), source);
    assert!(!tree.has_error(), "{}", tree.dump());

    assert_eq!(texts(&tree, SyntaxKind::RulesVersion), vec!["rules_version = '2';"]);
    let wildcard = find(&tree, SyntaxKind::PathWildcard, 0);
    assert_eq!(wildcard.text(), "/{document=**}");
    assert_eq!(wildcard.first_child().unwrap().text(), "document");
    assert_eq!(texts(&tree, SyntaxKind::MethodList), vec!["get, list, create"]);
    assert_eq!(texts(&tree, SyntaxKind::Literal), vec!["false"]);
}

#[test]
fn test_function_declaration() {
    let source = "service s { function isOwner(uid, other) { let me = request.auth.uid; return me == uid; } }";
    let tree = parse(grammar(), source);
    assert!(!tree.has_error(), "{}", tree.dump());

    let function = find(&tree, SyntaxKind::FunctionDecl, 0);
    let kinds: Vec<_> = function.children().map(|node| node.kind()).collect();
    assert_eq!(
        kinds,
        vec![SyntaxKind::Name, SyntaxKind::ParamList, SyntaxKind::FunctionBody]
    );
    assert_eq!(function.first_child().unwrap().text(), "isOwner");
    assert_eq!(texts(&tree, SyntaxKind::Param), vec!["uid", "other"]);

    let body = find(&tree, SyntaxKind::FunctionBody, 0);
    let statements: Vec<_> = body.children().map(|node| node.kind()).collect();
    assert_eq!(statements, vec![SyntaxKind::LetStmt, SyntaxKind::ReturnStmt]);
    assert_eq!(
        find(&tree, SyntaxKind::LetStmt, 0).first_child().unwrap().text(),
        "me"
    );
    assert_eq!(texts(&tree, SyntaxKind::ReturnStmt), vec!["return me == uid;"]);
}

// =============================================================================
// Expressions
// =============================================================================

fn condition(expr: &str) -> Tree {
    parse(grammar(), &format!("service s {{ allow read: if {expr}; }}"))
}

fn top_expression(tree: &Tree) -> Node<'_> {
    find(tree, SyntaxKind::AllowCondition, 0)
        .first_child()
        .unwrap()
}

#[test]
fn test_ternary_is_right_associative() {
    let tree = condition("a ? b : c ? d : e");
    assert!(!tree.has_error(), "{}", tree.dump());
    let top = top_expression(&tree);
    assert_eq!(top.kind(), SyntaxKind::TernaryExpr);
    let parts: Vec<_> = top.children().map(|node| (node.kind(), node.text().to_string())).collect();
    assert_eq!(
        parts,
        vec![
            (SyntaxKind::NameRef, "a".to_string()),
            (SyntaxKind::NameRef, "b".to_string()),
            (SyntaxKind::TernaryExpr, "c ? d : e".to_string()),
        ]
    );
}

#[test]
fn test_unary_binds_tighter_than_binary() {
    let tree = condition("!a && -b < c");
    assert!(!tree.has_error(), "{}", tree.dump());
    let top = top_expression(&tree);
    assert_eq!(top.kind(), SyntaxKind::BinaryExpr);
    let parts: Vec<_> = top.children().map(|node| (node.kind(), node.text().to_string())).collect();
    assert_eq!(
        parts,
        vec![
            (SyntaxKind::UnaryExpr, "!a".to_string()),
            (SyntaxKind::BinaryExpr, "-b < c".to_string()),
        ]
    );
}

#[test]
fn test_postfix_chains() {
    let tree = condition("data['key'].size() > 0");
    assert!(!tree.has_error(), "{}", tree.dump());
    let top = top_expression(&tree);
    assert_eq!(top.kind(), SyntaxKind::BinaryExpr);

    let member = top.first_child().unwrap();
    assert_eq!(member.kind(), SyntaxKind::MemberExpr);
    let kinds: Vec<_> = member.children().map(|node| node.kind()).collect();
    assert_eq!(kinds, vec![SyntaxKind::IndexExpr, SyntaxKind::CallExpr]);
    assert_eq!(texts(&tree, SyntaxKind::ArgList), vec!["()"]);
}

#[test]
fn test_membership_in_list() {
    let tree = condition("request.auth.token.role in ['admin', 'owner'] || resource == null");
    assert!(!tree.has_error(), "{}", tree.dump());
    let top = top_expression(&tree);
    assert_eq!(top.kind(), SyntaxKind::BinaryExpr);
    assert_eq!(
        top.first_child().unwrap().text(),
        "request.auth.token.role in ['admin', 'owner']"
    );
    assert_eq!(texts(&tree, SyntaxKind::ListExpr), vec!["['admin', 'owner']"]);
}

#[test]
fn test_document_path_arguments() {
    let tree = condition("exists(/databases/$(database)/documents/users/$(request.auth.uid))");
    assert!(!tree.has_error(), "{}", tree.dump());
    let path = find(&tree, SyntaxKind::PathExpr, 0);
    let kinds: Vec<_> = path.children().map(|node| node.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            SyntaxKind::PathSegment,
            SyntaxKind::PathInterpolation,
            SyntaxKind::PathSegment,
            SyntaxKind::PathSegment,
            SyntaxKind::PathInterpolation,
        ]
    );
    assert_eq!(
        find(&tree, SyntaxKind::PathInterpolation, 1).text(),
        "/$(request.auth.uid)"
    );
}

#[test]
fn test_deep_nesting_does_not_overflow() {
    let depth = 500;
    let expr = format!("{}a{}", "(".repeat(depth), ")".repeat(depth));
    let tree = condition(&expr);
    assert_covers(&tree);
    assert!(!tree.has_error());
    assert_eq!(nodes(&tree, SyntaxKind::ParenExpr).len(), depth);
}

fn max_depth(tree: &Tree) -> usize {
    let mut depth = 0usize;
    let mut max = 0;
    for event in tree.syntax().preorder() {
        match event {
            rowan::WalkEvent::Enter(_) => {
                depth += 1;
                max = max.max(depth);
            }
            rowan::WalkEvent::Leave(_) => depth -= 1,
        }
    }
    max
}

#[test]
fn test_nesting_past_the_limit_is_flattened() {
    let depth = 20_000;
    let sources = [
        format!("service s {{ allow read: if {}a{}; }}", "(".repeat(depth), ")".repeat(depth)),
        format!("service s {{ allow read: if {}a; }}", "!".repeat(depth)),
        format!("service s {{ allow read: if a{}; }}", " || a".repeat(depth)),
        format!("service s {{ allow read: if {}a{}; }}", "[".repeat(depth), "]".repeat(depth)),
        format!("service s {{ {}{} }}", "match /a { ".repeat(depth), "} ".repeat(depth)),
    ];
    for source in &sources {
        let tree = parse(grammar(), source);
        assert_covers(&tree);
        assert!(tree.has_error());
        assert!(max_depth(&tree) < 1100, "{}", max_depth(&tree));
        // Dropping a tree frees it level by level.
        drop(tree);
    }
}

#[test]
fn test_parenthesised_expression() {
    let tree = condition("(a || b) && c");
    assert!(!tree.has_error(), "{}", tree.dump());
    let top = top_expression(&tree);
    let first = top.first_child().unwrap();
    assert_eq!(first.kind(), SyntaxKind::ParenExpr);
    assert_eq!(first.first_child().unwrap().text(), "a || b");
}

// =============================================================================
// Snapshots
// =============================================================================

#[test]
fn test_snapshot_allow() {
    insta::assert_snapshot!(snapshot_parse("service s { allow read; }"), @r"
    (SourceFile 0..25
      (ServiceDecl 0..25
        (ServiceName 8..9)
        (Block 10..25
          (AllowStmt 12..23
            (MethodList 18..22)))))
    ");
}

#[test]
fn test_snapshot_empty_file() {
    insta::assert_snapshot!(snapshot_parse(""), @"(SourceFile 0..0)");
}
