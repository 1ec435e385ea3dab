//! Expression parsing with operator-precedence climbing.
//!
//! A new binary operator is inserted at the first position along the tree's
//! right spine whose operator precedence is greater than or equal to the
//! incoming operator's. Equal-precedence sequences come out left-associative
//! and higher-precedence operators nest under the current right child.

use regex::Regex;

use crate::ast::{DataType, Expr, Literal, RegexLiteral, WildcardType};
use crate::duration::parse_duration;
use crate::error::{ParseError, Result};
use crate::parser::{tokstr, Parser};
use crate::token::{is_whitespace, Pos, Token};

impl Parser {
    /// Parses an expression.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        let mut root = self.parse_unary_expr()?;

        // Fold operators and unary expressions into a tree by precedence.
        loop {
            let (_, op, _) = self.scan_ignore_whitespace();
            if !op.is_operator() {
                self.unscan();
                return Ok(root);
            }

            let rhs = if op.is_regex_op() {
                // The right-hand side of a regex operator must be a regex.
                match self.parse_regex()? {
                    Some(re) => Expr::Literal(Literal::Regex(re)),
                    None => {
                        let (pos, tok, lit) = self.scan_ignore_whitespace();
                        return Err(ParseError::expected(tokstr(tok, &lit), &["regex"], pos));
                    }
                }
            } else {
                self.parse_unary_expr()?
            };

            root = insert_operator(root, op, rhs);
        }
    }

    // Parses a non-binary expression.
    fn parse_unary_expr(&mut self) -> Result<Expr> {
        // A left parenthesis starts its own grouped expression.
        let (_, tok, _) = self.scan_ignore_whitespace();
        if tok == Token::LParen {
            let expr = self.parse_expr()?;
            let (pos, tok, lit) = self.scan_ignore_whitespace();
            if tok != Token::RParen {
                return Err(ParseError::expected(tokstr(tok, &lit), &[")"], pos));
            }
            return Ok(Expr::Paren(Box::new(expr)));
        }
        self.unscan();

        let (pos, tok, lit) = self.scan_ignore_whitespace();
        match tok {
            Token::Ident => {
                // An immediately following left parenthesis makes this a
                // function call; otherwise it is a variable reference.
                let (_, tok0, _) = self.scan();
                if tok0 == Token::LParen {
                    return self.parse_call(lit);
                }
                self.unscan(); // the non-LPAREN token
                self.unscan(); // the IDENT token
                self.parse_var_ref()
            }
            Token::Distinct => {
                let (pos0, tok0, lit0) = self.scan();
                if tok0 == Token::LParen {
                    self.parse_call("distinct".to_string())
                } else if tok0 == Token::Ws {
                    let (pos1, tok1, lit1) = self.scan_ignore_whitespace();
                    if tok1 != Token::Ident {
                        return Err(ParseError::expected(
                            tokstr(tok1, &lit1),
                            &["identifier"],
                            pos1,
                        ));
                    }
                    Ok(Expr::Distinct { val: lit1 })
                } else {
                    Err(ParseError::expected(
                        tokstr(tok0, &lit0),
                        &["(", "identifier"],
                        pos0,
                    ))
                }
            }
            Token::String => Ok(Expr::Literal(Literal::String(lit))),
            Token::Number => match lit.parse::<f64>() {
                Ok(v) => Ok(Expr::Literal(Literal::Number(v))),
                Err(_) => Err(ParseError::message_at("unable to parse number", pos)),
            },
            Token::Integer => match lit.parse::<i64>() {
                Ok(v) => Ok(Expr::Literal(Literal::Integer(v))),
                // Too large for i64; scanner output is never negative here,
                // so fall back to an unsigned literal.
                Err(_) => match lit.parse::<u64>() {
                    Ok(v) => Ok(Expr::Literal(Literal::Unsigned(v))),
                    Err(_) => Err(ParseError::message_at("unable to parse integer", pos)),
                },
            },
            Token::True | Token::False => {
                Ok(Expr::Literal(Literal::Boolean(tok == Token::True)))
            }
            Token::Duration => match parse_duration(&lit) {
                Ok(v) => Ok(Expr::Literal(Literal::Duration(v))),
                Err(e) => Err(ParseError::message(e.to_string())),
            },
            Token::Mul => {
                let (_, tok, _) = self.scan();
                if tok == Token::DoubleColon {
                    let (pos, tok, lit) = self.scan();
                    match tok {
                        Token::Field => Ok(Expr::Wildcard(WildcardType::Field)),
                        Token::Tag => Ok(Expr::Wildcard(WildcardType::Tag)),
                        _ => Err(ParseError::expected(
                            tokstr(tok, &lit),
                            &["field", "tag"],
                            pos,
                        )),
                    }
                } else {
                    self.unscan();
                    Ok(Expr::Wildcard(WildcardType::All))
                }
            }
            Token::Regex => compile_regex(&lit, pos).map(|re| Expr::Literal(Literal::Regex(re))),
            Token::BoundParam => {
                // A bound parameter reaching this point was not substituted:
                // either the key is missing or the bound value was an error
                // value. Figure out which and surface it.
                let key = lit.strip_prefix('$').unwrap_or(&lit).to_string();
                if key.is_empty() {
                    return Err(ParseError::message("empty bound parameter"));
                }
                match self.param(&key) {
                    None => Err(ParseError::message(format!("missing parameter: {}", key))),
                    // Only an error value keeps the BOUNDPARAM token kind.
                    Some(v) => Err(ParseError::message(v.value())),
                }
            }
            Token::Add | Token::Sub => {
                let mul: i64 = if tok == Token::Sub { -1 } else { 1 };

                let (pos0, tok0, lit0) = self.scan_ignore_whitespace();
                match tok0 {
                    Token::Number
                    | Token::Integer
                    | Token::Duration
                    | Token::LParen
                    | Token::Ident => {
                        self.unscan();
                        let expr = self.parse_unary_expr()?;
                        match expr {
                            Expr::Literal(Literal::Number(v)) => {
                                Ok(Expr::Literal(Literal::Number(v * mul as f64)))
                            }
                            Expr::Literal(Literal::Integer(v)) => {
                                Ok(Expr::Literal(Literal::Integer(v * mul)))
                            }
                            Expr::Literal(Literal::Unsigned(v)) => {
                                if tok == Token::Sub {
                                    // i64::MIN parses as an unsigned literal
                                    // because its magnitude overflows i64,
                                    // but it fits once negated.
                                    if v == (i64::MAX as u64) + 1 {
                                        Ok(Expr::Literal(Literal::Integer(i64::MIN)))
                                    } else {
                                        Err(ParseError::message(format!(
                                            "constant -{} underflows int64",
                                            v
                                        )))
                                    }
                                } else {
                                    Ok(Expr::Literal(Literal::Unsigned(v)))
                                }
                            }
                            Expr::Literal(Literal::Duration(v)) => {
                                Ok(Expr::Literal(Literal::Duration(v * mul)))
                            }
                            e @ (Expr::VarRef { .. } | Expr::Call { .. } | Expr::Paren(_)) => {
                                // Fold the sign in as a multiplication.
                                Ok(Expr::Binary {
                                    op: Token::Mul,
                                    lhs: Box::new(Expr::Literal(Literal::Integer(mul))),
                                    rhs: Box::new(e),
                                })
                            }
                            _ => unreachable!("unexpected unary operand"),
                        }
                    }
                    _ => Err(ParseError::expected(
                        tokstr(tok0, &lit0),
                        &["identifier", "number", "duration", "("],
                        pos0,
                    )),
                }
            }
            _ => Err(ParseError::expected(
                tokstr(tok, &lit),
                &["identifier", "string", "number", "bool"],
                pos,
            )),
        }
    }

    /// Parses a function call. The name and the opening parenthesis have
    /// already been consumed. A regex is accepted as any argument.
    fn parse_call(&mut self, name: String) -> Result<Expr> {
        let name = name.to_lowercase();
        let mut args = Vec::new();

        // Parse the first argument if one exists.
        if let Some(re) = self.parse_regex()? {
            args.push(Expr::Literal(Literal::Regex(re)));
        } else {
            let (_, tok, _) = self.scan();
            if tok == Token::RParen {
                return Ok(Expr::Call { name, args });
            }
            self.unscan();
            args.push(self.parse_expr()?);
        }

        // Parse additional arguments while there is a comma.
        loop {
            let (_, tok, _) = self.scan_ignore_whitespace();
            if tok != Token::Comma {
                self.unscan();
                break;
            }

            if let Some(re) = self.parse_regex()? {
                args.push(Expr::Literal(Literal::Regex(re)));
                continue;
            }
            args.push(self.parse_expr()?);
        }

        let (pos, tok, lit) = self.scan();
        if tok != Token::RParen {
            return Err(ParseError::expected(tokstr(tok, &lit), &[")"], pos));
        }
        Ok(Expr::Call { name, args })
    }

    /// Parses a reference to a metric, field, or tag, with an optional
    /// `::type` cast.
    pub(crate) fn parse_var_ref(&mut self) -> Result<Expr> {
        let segments = self.parse_segmented_idents()?;

        let mut data_type = DataType::Unknown;
        let (_, tok, _) = self.scan();
        if tok == Token::DoubleColon {
            let (pos, tok, lit) = self.scan();
            data_type = match tok {
                Token::Ident => match lit.to_lowercase().as_str() {
                    "float" => DataType::Float,
                    "integer" => DataType::Integer,
                    "unsigned" => DataType::Unsigned,
                    "string" => DataType::String,
                    "boolean" => DataType::Boolean,
                    _ => {
                        return Err(ParseError::expected(
                            tokstr(tok, &lit),
                            &[
                                "float", "integer", "unsigned", "string", "boolean", "field",
                                "tag",
                            ],
                            pos,
                        ))
                    }
                },
                Token::Field => DataType::AnyField,
                Token::Tag => DataType::Tag,
                _ => {
                    return Err(ParseError::expected(
                        tokstr(tok, &lit),
                        &["float", "integer", "string", "boolean", "field", "tag"],
                        pos,
                    ))
                }
            };
        } else {
            self.unscan();
        }

        Ok(Expr::VarRef {
            val: segments.join("."),
            data_type,
        })
    }

    /// Parses a regular expression literal if one starts at the next rune,
    /// returning `None` otherwise. A `$` may also start one when the bound
    /// parameter resolves to a regex value.
    pub(crate) fn parse_regex(&mut self) -> Result<Option<RegexLiteral>> {
        if is_whitespace(self.peek_rune()) {
            self.consume_whitespace();
        }

        let next = self.peek_rune();
        if next == '$' {
            let (_, tok, _) = self.scan();
            self.unscan();
            if tok != Token::Regex {
                // The parameter does not resolve to a regex.
                return Ok(None);
            }
        } else if next != '/' {
            return Ok(None);
        }

        let (pos, tok, lit) = self.scan_regex();
        match tok {
            Token::Regex => compile_regex(&lit, pos).map(Some),
            Token::BadEscape => Err(ParseError::message_at(format!("bad escape: {}", lit), pos)),
            Token::BadRegex => Err(ParseError::message_at(format!("bad regex: {}", lit), pos)),
            _ => Err(ParseError::expected(tokstr(tok, &lit), &["regex"], pos)),
        }
    }
}

fn compile_regex(pattern: &str, pos: Pos) -> Result<RegexLiteral> {
    match Regex::new(pattern) {
        Ok(re) => Ok(RegexLiteral { val: re }),
        Err(e) => Err(ParseError::message_at(e.to_string(), pos)),
    }
}

// Descends the right spine of the tree and inserts the new operator at the
// first node whose operator precedence is >= the incoming operator's.
fn insert_operator(tree: Expr, op: Token, rhs: Expr) -> Expr {
    match tree {
        Expr::Binary {
            op: cur_op,
            lhs,
            rhs: cur_rhs,
        } if cur_op.precedence() < op.precedence() => Expr::Binary {
            op: cur_op,
            lhs,
            rhs: Box::new(insert_operator(*cur_rhs, op, rhs)),
        },
        lhs => Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    }
}
