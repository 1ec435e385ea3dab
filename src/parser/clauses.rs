//! Trailing SELECT clauses: WHERE, GROUP BY, fill(), ORDER BY, the four
//! pagination clauses, and TZ().

use chrono_tz::Tz;

use crate::ast::{Dimension, Expr, FillOption, FillValue, Literal, SortField};
use crate::duration::parse_duration;
use crate::error::{ParseError, Result};
use crate::parser::{tokstr, Parser};
use crate::token::Token;

impl Parser {
    /// Parses a duration literal in nanoseconds. `INF` reads as a zero
    /// duration.
    pub fn parse_duration(&mut self) -> Result<i64> {
        let (pos, tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::Duration && tok != Token::Inf {
            return Err(ParseError::expected(tokstr(tok, &lit), &["duration"], pos));
        }

        if tok == Token::Inf {
            return Ok(0);
        }

        parse_duration(&lit).map_err(|e| ParseError::message_at(e.to_string(), pos))
    }

    /// Parses the WHERE clause, if present.
    pub(crate) fn parse_condition(&mut self) -> Result<Option<Expr>> {
        let (_, tok, _) = self.scan_ignore_whitespace();
        if tok != Token::Where {
            self.unscan();
            return Ok(None);
        }

        Ok(Some(self.parse_expr()?))
    }

    /// Parses the GROUP BY clause, if present.
    pub(crate) fn parse_dimensions(&mut self) -> Result<Vec<Dimension>> {
        let (_, tok, _) = self.scan_ignore_whitespace();
        if tok != Token::Group {
            self.unscan();
            return Ok(Vec::new());
        }

        let (pos, tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::By {
            return Err(ParseError::expected(tokstr(tok, &lit), &["BY"], pos));
        }

        let mut dimensions = Vec::new();
        loop {
            dimensions.push(self.parse_dimension()?);

            let (_, tok, _) = self.scan();
            if tok != Token::Comma {
                self.unscan();
                break;
            }
        }
        Ok(dimensions)
    }

    fn parse_dimension(&mut self) -> Result<Dimension> {
        if let Some(re) = self.parse_regex()? {
            return Ok(Dimension {
                expr: Expr::Literal(Literal::Regex(re)),
            });
        }

        let expr = self.parse_expr()?;

        self.consume_whitespace();

        Ok(Dimension { expr })
    }

    /// Parses the fill() call and its option, if present. The argument is
    /// one of the option names or a numeric constant.
    pub(crate) fn parse_fill(&mut self) -> Result<(FillOption, Option<FillValue>)> {
        let (_, tok, lit) = self.scan_ignore_whitespace();
        self.unscan();
        if tok != Token::Ident || !lit.eq_ignore_ascii_case("fill") {
            return Ok((FillOption::Null, None));
        }

        let expr = self.parse_expr()?;
        let args = match expr {
            Expr::Call { args, .. } => args,
            _ => return Err(ParseError::message("fill must be a function call")),
        };
        if args.len() != 1 {
            return Err(ParseError::message(
                "fill requires an argument, e.g.: 0, null, none, previous, linear",
            ));
        }

        match args[0].to_string().as_str() {
            "null" => Ok((FillOption::Null, None)),
            "none" => Ok((FillOption::None, None)),
            "previous" => Ok((FillOption::Previous, None)),
            "linear" => Ok((FillOption::Linear, None)),
            _ => match &args[0] {
                Expr::Literal(Literal::Integer(v)) => {
                    Ok((FillOption::Number, Some(FillValue::Integer(*v))))
                }
                Expr::Literal(Literal::Number(v)) => {
                    Ok((FillOption::Number, Some(FillValue::Number(*v))))
                }
                _ => Err(ParseError::message("expected number argument in fill()")),
            },
        }
    }

    /// Parses the TZ() call, if present, resolving the name against the
    /// IANA time zone database.
    pub(crate) fn parse_location(&mut self) -> Result<Option<Tz>> {
        let (_, tok, lit) = self.scan_ignore_whitespace();
        self.unscan();
        if tok != Token::Ident || !lit.eq_ignore_ascii_case("tz") {
            return Ok(None);
        }

        let expr = self.parse_expr()?;
        let args = match expr {
            Expr::Call { args, .. } => args,
            _ => return Err(ParseError::message("tz must be a function call")),
        };
        if args.len() != 1 {
            return Err(ParseError::message("tz requires exactly one argument"));
        }

        let name = match &args[0] {
            Expr::Literal(Literal::String(s)) => s,
            _ => return Err(ParseError::message("expected string argument in tz()")),
        };

        // Keep the resolver's own error out of the message; it can contain
        // file system paths.
        name.parse::<Tz>()
            .map(Some)
            .map_err(|_| ParseError::message(format!("unable to find time zone {}", name)))
    }

    /// Parses the given token followed by a non-negative integer, if the
    /// token is present.
    pub(crate) fn parse_optional_token_and_int(&mut self, t: Token) -> Result<i64> {
        let (_, tok, _) = self.scan_ignore_whitespace();
        if tok != t {
            self.unscan();
            return Ok(0);
        }

        let (pos, tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::Integer {
            return Err(ParseError::expected(tokstr(tok, &lit), &["integer"], pos));
        }

        let n: i64 = lit.parse().unwrap_or_default();
        if n < 0 {
            return Err(ParseError::message_at(format!("{} must be >= 0", t), pos));
        }

        Ok(n)
    }

    /// Parses the ORDER BY clause, if present.
    pub(crate) fn parse_order_by(&mut self) -> Result<Vec<SortField>> {
        let (_, tok, _) = self.scan_ignore_whitespace();
        if tok != Token::Order {
            self.unscan();
            return Ok(Vec::new());
        }

        let (pos, tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::By {
            return Err(ParseError::expected(tokstr(tok, &lit), &["BY"], pos));
        }

        self.parse_sort_fields()
    }

    // Additional comma-separated sort fields are accepted syntactically, but
    // only sorting on time is currently supported.
    fn parse_sort_fields(&mut self) -> Result<Vec<SortField>> {
        let mut fields = Vec::new();

        let (pos, tok, lit) = self.scan_ignore_whitespace();
        match tok {
            // The first sort field may be a bare direction: ORDER BY ASC.
            Token::Asc | Token::Desc => fields.push(SortField {
                name: String::new(),
                ascending: tok == Token::Asc,
            }),
            Token::Ident => {
                self.unscan();
                let field = self.parse_sort_field()?;
                if lit != "time" {
                    return Err(ParseError::message(
                        "only ORDER BY time supported at this time",
                    ));
                }
                fields.push(field);
            }
            _ => {
                return Err(ParseError::expected(
                    tokstr(tok, &lit),
                    &["identifier", "ASC", "DESC"],
                    pos,
                ))
            }
        }

        loop {
            let (_, tok, _) = self.scan_ignore_whitespace();
            if tok != Token::Comma {
                self.unscan();
                break;
            }
            fields.push(self.parse_sort_field()?);
        }

        if fields.len() > 1 {
            return Err(ParseError::message(
                "only ORDER BY time supported at this time",
            ));
        }

        Ok(fields)
    }

    fn parse_sort_field(&mut self) -> Result<SortField> {
        let name = self.parse_ident()?;

        // Optional direction; ascending is the default.
        let (_, tok, _) = self.scan_ignore_whitespace();
        let ascending = match tok {
            Token::Asc => true,
            Token::Desc => false,
            _ => {
                self.unscan();
                true
            }
        };

        Ok(SortField { name, ascending })
    }
}
