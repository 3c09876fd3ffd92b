//! # Gatekeep Syntax
//!
//! Lexer, parser, and AST definitions for the gatekeep rule language.
//!
//! ## Overview
//!
//! This crate is the front half of the engine:
//!
//! - **Lexer**: turns source text into a stream of spanned tokens
//! - **Parser**: recursive descent over the token stream into an AST
//! - **AST**: typed statements and expressions, each carrying a [`Span`]
//! - **Errors**: [`LexError`] and [`ParseError`] with exact positions,
//!   renderable via [`Diagnostic`]
//!
//! ```text
//! source text
//!     |  tokenize
//! Vec<SpannedToken>
//!     |  parse
//! Vec<Stmt>
//! ```
//!
//! ## Example
//!
//! ```rust
//! use gatekeep_syntax::{parse, tokenize};
//!
//! let source = r#"
//!     if true {
//!         print "checks passed"
//!     }
//! "#;
//!
//! let tokens = tokenize(source).expect("tokenize");
//! let program = parse(tokens).expect("parse");
//! assert_eq!(program.len(), 1);
//! ```
//!
//! ## Grammar sketch
//!
//! ```text
//! statement:
//!   run <expr> | print <expr> | let <name> = <expr>
//!   block | warn | allow  [ "<msg>" ] [ if <cond> ] [ message "<msg>" ]
//!   if <cond> { ... } [ else { ... } ]
//!   foreach <expr> [ matching "<glob>" ] { <var> in ... }
//!   match <expr> { <pattern> -> ... }
//!   parallel { ... }
//!   group <name> [critical|warning|info] [disabled] { ... }
//!   macro <name>(<params>) { ... }      @[ns.]<name>(<args>)
//!   import "<path>" [as <alias>]       use "<package>" [as <alias>]
//!   try { ... } catch [<name>] { ... }
//!   break | continue
//!
//! expression (loosest to tightest):
//!   or | and | not | == != < <= > >= | + - | * / % | unary - |
//!   call, method call, property access, index
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use error::{Diagnostic, LexError, ParseError, ParseErrorKind, Span};
pub use lexer::{SpannedToken, Token, tokenize};
pub use parser::parse;
