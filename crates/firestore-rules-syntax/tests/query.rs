mod common;
use common::*;

use firestore_rules_syntax::{Query, QueryError};

const RULES: &str = "service cloud.firestore {
  match /databases/{db}/documents {
    match /users/{uid} {
      allow read: if request.auth.uid == uid;
      allow write: if isOwner(uid);
    }
    function isOwner(id) { return request.auth.uid == id; }
  }
}";

#[test]
fn test_path_captures() {
    let tree = parse(grammar(), RULES);
    let query = Query::new("(MatchDecl (MatchPath (PathCapture (Name) @var))) @match").unwrap();
    assert_eq!(query.capture_names(), ["match", "var"]);

    let matches: Vec<_> = query.matches(&tree).collect();
    assert_eq!(matches.len(), 2);

    let vars: Vec<_> = matches
        .iter()
        .map(|m| m.get("var").unwrap().text())
        .collect();
    assert_eq!(vars, vec!["db", "uid"]);

    // Outer patterns capture first, and the whole match is the match node.
    let first = &matches[0];
    assert_eq!(first.captures()[0].name, "match");
    assert_eq!(first.captures()[0].node.byte_range(), first.node().byte_range());
    assert_eq!(first.node().kind(), SyntaxKind::MatchDecl);
}

#[test]
fn test_wildcard_pattern() {
    let tree = parse(grammar(), RULES);
    let query = Query::new("(_ (NameRef) @callee (ArgList))").unwrap();
    let callees: Vec<_> = query
        .matches(&tree)
        .map(|m| m.get("callee").unwrap().text().to_string())
        .collect();
    assert_eq!(callees, vec!["isOwner"]);
}

#[test]
fn test_children_match_in_order() {
    let tree = parse(grammar(), RULES);
    let in_order = Query::new("(FunctionDecl (Name) (FunctionBody))").unwrap();
    assert_eq!(in_order.matches(&tree).count(), 1);
    let reversed = Query::new("(FunctionDecl (FunctionBody) (Name))").unwrap();
    assert_eq!(reversed.matches(&tree).count(), 0);
}

#[test]
fn test_conditions_of_allow_statements() {
    let tree = parse(grammar(), RULES);
    let query = Query::new("(AllowStmt (AllowCondition (_) @condition))").unwrap();
    let conditions: Vec<_> = query
        .matches(&tree)
        .map(|m| m.get("condition").unwrap().kind())
        .collect();
    assert_eq!(conditions, vec![SyntaxKind::BinaryExpr, SyntaxKind::CallExpr]);
}

#[test]
fn test_reset_restarts_iteration() {
    let tree = parse(grammar(), RULES);
    let query = Query::new("(AllowStmt) @allow").unwrap();
    let mut matches = query.matches(&tree);
    assert!(matches.next().is_some());
    assert!(matches.next().is_some());
    assert!(matches.next().is_none());

    matches.reset();
    assert_eq!(matches.count(), 2);
}

#[test]
fn test_query_finds_error_nodes() {
    let tree = parse(grammar(), "service s { allow read: if a b; }");
    let query = Query::new("(AllowStmt (ErrorNode) @error)").unwrap();
    let errors: Vec<_> = query
        .matches(&tree)
        .map(|m| m.get("error").unwrap().text().to_string())
        .collect();
    assert_eq!(errors, vec!["b"]);
}

#[test]
fn test_invalid_queries() {
    assert!(matches!(
        Query::new("(MatchDecl"),
        Err(QueryError::Unclosed)
    ));
    assert!(matches!(
        Query::new("(NotAKind)"),
        Err(QueryError::UnknownKind { .. })
    ));
    let error = Query::new("(Block) extra").unwrap_err();
    assert_eq!(error.to_string(), "unexpected 'e' at offset 8");
}
