//! tsql - a parser for the TSQL time-series query language
//!
//! TSQL is a SQL-like dialect whose SELECT statement is extended with
//! time-series concepts: metric sources qualified by database and
//! time-to-live, `GROUP BY time(duration)` windowing, fill policies for
//! empty windows, per-series pagination, regex-matched sources, subqueries,
//! bound parameters, and typed column casts.
//!
//! Pipeline overview:
//!
//! ```text
//! query text ──► scanner (rune reader, token stream)
//!                    │
//!                    ▼
//!             parser (recursive descent, precedence climbing,
//!                     bound parameter substitution)
//!                    │
//!                    ▼
//!             AST (closed node variants, visitor traversal,
//!                  canonical text serialization)
//! ```
//!
//! Parsing a query returns an immutable [`ast::Query`]; any AST value
//! serializes back to canonical TSQL text through `Display`, and that text
//! re-parses to a structurally equivalent tree.
//!
//! ```
//! let query = tsql::parse_query("SELECT mean(value) FROM cpu GROUP BY time(10m)").unwrap();
//! assert_eq!(
//!     query.to_string(),
//!     "SELECT mean(value) FROM cpu GROUP BY time(10m)"
//! );
//! ```

pub mod ast;
pub mod duration;
pub mod error;
pub mod parser;
pub mod scanner;
pub mod token;

pub use crate::error::{ParseError, Result};
pub use crate::parser::{parse_expr, parse_query, parse_statement, BindValue, Parser};
