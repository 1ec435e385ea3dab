//! Recursive-descent parser for TSQL.
//!
//! The parser owns a buffered scanner and a map of bound parameter values.
//! Whitespace and comments are skipped by [`Parser::scan_ignore_whitespace`];
//! the raw [`Parser::scan`] is used at the few places where token adjacency
//! matters, such as telling `distinct(expr)` apart from `DISTINCT ident`.
//! Bound parameters are substituted at the scan boundary: a `$name` token
//! whose key is present in the parameter map is replaced in-line by the bound
//! value's token kind and literal.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::ast::{Query, Statement};
use crate::error::{ParseError, Result};
use crate::scanner::BufScanner;
use crate::token::{quote_ident, Pos, Token};

mod clauses;
mod expressions;
mod params;
mod select;

pub use self::params::BindValue;
pub use self::select::TargetRequirement;

/// Parses a query string and returns its AST representation.
pub fn parse_query(s: &str) -> Result<Query> {
    Parser::new(s).parse_query()
}

/// Parses a statement string and returns its AST representation.
pub fn parse_statement(s: &str) -> Result<Statement> {
    Parser::new(s).parse_statement()
}

/// Parses an expression string and returns its AST representation.
pub fn parse_expr(s: &str) -> Result<crate::ast::Expr> {
    Parser::new(s).parse_expr()
}

/// A TSQL parser.
pub struct Parser {
    s: BufScanner,
    params: HashMap<String, BindValue>,
}

impl Parser {
    pub fn new(input: &str) -> Parser {
        Parser {
            s: BufScanner::new(input),
            params: HashMap::new(),
        }
    }

    /// Sets the parameters used for bound parameter substitution. Values are
    /// JSON-shaped; see [`BindValue::bind`] for the accepted forms.
    pub fn set_params(&mut self, params: HashMap<String, JsonValue>) {
        self.params = params
            .into_iter()
            .map(|(name, value)| {
                let bound = BindValue::bind(&value);
                (name, bound)
            })
            .collect();
    }

    /// Parses semicolon-separated statements until EOF.
    pub fn parse_query(&mut self) -> Result<Query> {
        let mut statements = Vec::new();
        let mut semi = true;

        loop {
            let (pos, tok, lit) = self.scan_ignore_whitespace();
            if tok == Token::Eof {
                return Ok(Query { statements });
            } else if tok == Token::Semicolon {
                semi = true;
            } else {
                if !semi {
                    return Err(ParseError::expected(tokstr(tok, &lit), &[";"], pos));
                }
                self.unscan();
                statements.push(self.parse_statement()?);
                semi = false;
            }
        }
    }

    /// Parses a single statement.
    pub fn parse_statement(&mut self) -> Result<Statement> {
        let (pos, tok, lit) = self.scan_ignore_whitespace();
        match tok {
            Token::Select => {
                let stmt = self.parse_select_statement(TargetRequirement::NotRequired)?;
                Ok(Statement::Select(Box::new(stmt)))
            }
            _ => Err(ParseError::expected(
                tokstr(tok, &lit),
                &[Token::Select.as_str()],
                pos,
            )),
        }
    }

    //=========================================================================
    // Scan plumbing
    //=========================================================================

    /// Reads the next token, substituting bound parameter values in place.
    pub(crate) fn scan(&mut self) -> (Pos, Token, String) {
        let (pos, tok, lit) = self.s.scan();
        self.substitute_param(pos, tok, lit)
    }

    /// Reads a regex token, substituting bound parameter values in place.
    pub(crate) fn scan_regex(&mut self) -> (Pos, Token, String) {
        let (pos, tok, lit) = self.s.scan_regex();
        self.substitute_param(pos, tok, lit)
    }

    fn substitute_param(
        &mut self,
        pos: Pos,
        mut tok: Token,
        mut lit: String,
    ) -> (Pos, Token, String) {
        if tok == Token::BoundParam {
            let key = lit.strip_prefix('$').unwrap_or(&lit).to_string();
            if !key.is_empty() {
                if let Some(value) = self.params.get(&key) {
                    // Error values keep their BOUNDPARAM shape and literal so
                    // the expression parser can surface the stored message at
                    // the use site.
                    if value.token_type() != Token::BoundParam {
                        tok = value.token_type();
                        lit = value.value();
                    }
                }
            }
        }
        (pos, tok, lit)
    }

    /// Reads the next non-whitespace, non-comment token.
    pub(crate) fn scan_ignore_whitespace(&mut self) -> (Pos, Token, String) {
        loop {
            let (pos, tok, lit) = self.scan();
            if tok == Token::Ws || tok == Token::Comment {
                continue;
            }
            return (pos, tok, lit);
        }
    }

    /// Consumes the next token if it is whitespace.
    pub(crate) fn consume_whitespace(&mut self) {
        let (_, tok, _) = self.scan();
        if tok != Token::Ws {
            self.unscan();
        }
    }

    /// Pushes the previously scanned token back onto the buffer.
    pub(crate) fn unscan(&mut self) {
        self.s.unscan();
    }

    /// Returns the next rune without consuming it.
    pub(crate) fn peek_rune(&mut self) -> char {
        self.s.peek()
    }

    pub(crate) fn param(&self, key: &str) -> Option<&BindValue> {
        self.params.get(key)
    }

    //=========================================================================
    // Shared primitive parsers
    //=========================================================================

    /// Parses an identifier.
    pub(crate) fn parse_ident(&mut self) -> Result<String> {
        let (pos, tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::Ident {
            return Err(ParseError::expected(tokstr(tok, &lit), &["identifier"], pos));
        }
        Ok(lit)
    }

    /// Parses dot-separated identifier segments such as `"db"."ttl".metric`
    /// or `"db"..metric`. A double dot contributes an empty segment. Parsing
    /// stops before a dot that is followed by a regex or by context-specific
    /// syntax (`:`), leaving those for the caller.
    pub(crate) fn parse_segmented_idents(&mut self) -> Result<Vec<String>> {
        let mut idents = vec![self.parse_ident()?];

        loop {
            let (_, tok, _) = self.scan();
            if tok != Token::Dot {
                // No more segments.
                self.unscan();
                break;
            }

            match self.peek_rune() {
                // Next segment is a regex, so this ident list is done.
                '/' => break,
                // Context-specific syntax follows; let the caller handle it.
                ':' => break,
                '.' => {
                    idents.push(String::new());
                    continue;
                }
                _ => {}
            }

            idents.push(self.parse_ident()?);
        }

        if idents.len() > 3 {
            let msg = format!("too many segments in {}", quote_ident(&idents));
            return Err(ParseError::message_at(msg, Pos::default()));
        }

        Ok(idents)
    }

    /// Consumes an expected sequence of tokens.
    pub(crate) fn parse_tokens(&mut self, toks: &[Token]) -> Result<()> {
        for &expected in toks {
            let (pos, tok, lit) = self.scan_ignore_whitespace();
            if tok != expected {
                return Err(ParseError::expected(
                    tokstr(tok, &lit),
                    &[expected.as_str()],
                    pos,
                ));
            }
        }
        Ok(())
    }
}

/// Returns the literal if one was scanned, otherwise the token's spelling.
pub(crate) fn tokstr(tok: Token, lit: &str) -> String {
    if lit.is_empty() {
        tok.to_string()
    } else {
        lit.to_string()
    }
}

#[cfg(test)]
mod tests;
