//! `firestore-rules-syntax` - Incremental, error-tolerant parser for
//! Firestore security rules.
//!
//! This crate provides the syntactic layer for rules source code:
//!
//! - **Lexer**: Tokenizes source text into a stream of tokens
//! - **Grammar**: A declarative grammar table, validated once when loaded
//! - **Parser**: A grammar-driven engine that builds a concrete syntax tree
//!   (CST) and reuses unchanged subtrees when reparsing after an edit
//! - **Tree**: Persistent, lossless trees with edit tracking and dumps
//! - **Query**: S-expression patterns over finished trees
//!
//! # Design Principles
//!
//! This crate follows the design of `rust-analyzer` and uses the `rowan` library
//! for building lossless syntax trees. Key design decisions:
//!
//! - **Lossless**: All source text is preserved, including whitespace and comments
//! - **Error-tolerant**: Every input yields a tree covering all of it; problems
//!   show up as `ErrorNode` and `MissingNode` nodes
//! - **Incremental**: Reparsing after an edit shares untouched subtrees with
//!   the previous tree
//!
//! # Example
//!
//! ```
//! use firestore_rules_syntax::{load_grammar, parse, SyntaxKind};
//!
//! let grammar = load_grammar().expect("built-in grammar is valid");
//! let tree = parse(grammar, "service cloud.firestore { match /users/{uid} { allow read; } }");
//!
//! assert!(!tree.has_error());
//! let kinds: Vec<_> = tree.root().descendants().map(|node| node.kind()).collect();
//! assert!(kinds.contains(&SyntaxKind::PathCapture));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod syntax;
mod token_kinds;
pub mod tree;

pub use grammar::{load_grammar, ConfigurationError, Grammar};
pub use lexer::{lex, Lexer, Token, TokenKind};
pub use parser::{parse, reparse, Parser};
pub use query::{Query, QueryError};
pub use syntax::{RulesLanguage, SyntaxKind, SyntaxNode, SyntaxToken};
pub use text_size::{TextRange, TextSize};
pub use tree::{Edit, Node, Point, SyntaxError, Tree};
