//! SELECT statement parsing: the field list, the INTO target, and the
//! FROM sources (metrics, regex metrics, and subqueries).

use crate::ast::{
    walk, Expr, Field, Literal, Metric, Node, SelectStatement, Source, SubQuery, Target, Visitor,
};
use crate::error::{ParseError, Result};
use crate::parser::{tokstr, Parser};
use crate::token::Token;

/// Whether an INTO clause is required, optional, or forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRequirement {
    Required,
    NotRequired,
    /// Subqueries cannot write their result anywhere.
    Subquery,
}

impl Parser {
    /// Parses a select statement. The SELECT token has already been
    /// consumed.
    pub(crate) fn parse_select_statement(
        &mut self,
        tr: TargetRequirement,
    ) -> Result<SelectStatement> {
        let mut stmt = SelectStatement::default();

        stmt.fields = self.parse_fields()?;

        stmt.target = self.parse_target(tr)?;

        let (pos, tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::From {
            return Err(ParseError::expected(tokstr(tok, &lit), &["FROM"], pos));
        }
        stmt.sources = self.parse_sources(true)?;

        stmt.condition = self.parse_condition()?;

        stmt.dimensions = self.parse_dimensions()?;

        let (fill, fill_value) = self.parse_fill()?;
        stmt.fill = fill;
        stmt.fill_value = fill_value;

        stmt.sort_fields = self.parse_order_by()?;

        stmt.limit = self.parse_optional_token_and_int(Token::Limit)?;
        stmt.offset = self.parse_optional_token_and_int(Token::Offset)?;
        stmt.slimit = self.parse_optional_token_and_int(Token::SLimit)?;
        stmt.soffset = self.parse_optional_token_and_int(Token::SOffset)?;

        stmt.location = self.parse_location()?;

        // A raw data query is one with no aggregate call anywhere in its
        // field list.
        stmt.is_raw_query = !stmt.fields.iter().any(field_has_call);

        Ok(stmt)
    }

    /// Parses a comma-separated list of one or more fields.
    fn parse_fields(&mut self) -> Result<Vec<Field>> {
        let mut fields = Vec::new();

        loop {
            fields.push(self.parse_field()?);

            let (_, tok, _) = self.scan();
            if tok != Token::Comma {
                self.unscan();
                break;
            }
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> Result<Field> {
        // A regex is allowed as a field expression.
        let expr = if let Some(re) = self.parse_regex()? {
            Expr::Literal(Literal::Regex(re))
        } else {
            let (pos, _, _) = self.scan_ignore_whitespace();
            self.unscan();

            let expr = self.parse_expr()?;
            if let Some(op) = find_invalid_field_operator(&expr) {
                return Err(ParseError::message(format!(
                    "invalid operator {} in SELECT clause at line {}, char {}; operator is intended for WHERE clause",
                    op,
                    pos.line + 1,
                    pos.char + 1
                )));
            }
            expr
        };

        let alias = self.parse_alias()?;

        self.consume_whitespace();

        Ok(Field { expr, alias })
    }

    /// Parses the optional "AS IDENT" alias for a field.
    fn parse_alias(&mut self) -> Result<Option<String>> {
        let (_, tok, _) = self.scan_ignore_whitespace();
        if tok != Token::As {
            self.unscan();
            return Ok(None);
        }
        Ok(Some(self.parse_ident()?))
    }

    /// Parses the INTO target, if any. The destination is up to three
    /// segments; a trailing `:METRIC` stands in for a metric name taken
    /// from the source.
    fn parse_target(&mut self, tr: TargetRequirement) -> Result<Option<Target>> {
        let (pos, tok, lit) = self.scan_ignore_whitespace();
        if tok != Token::Into {
            if tr == TargetRequirement::Required {
                return Err(ParseError::expected(tokstr(tok, &lit), &["INTO"], pos));
            }
            self.unscan();
            return Ok(None);
        }
        if tr == TargetRequirement::Subquery {
            return Err(ParseError::expected("INTO", &["FROM"], pos));
        }

        let mut idents = self.parse_segmented_idents()?;

        if idents.len() < 3 && self.peek_rune() == ':' {
            self.parse_tokens(&[Token::Colon, Token::Metric])?;
            // The metric name comes from the source at execution time.
            idents.push(String::new());
        }

        let mut metric = Metric {
            is_target: true,
            ..Metric::default()
        };
        match idents.len() {
            1 => {
                metric.name = idents.remove(0);
            }
            2 => {
                metric.time_to_live = idents.remove(0);
                metric.name = idents.remove(0);
            }
            3 => {
                metric.database = idents.remove(0);
                metric.time_to_live = idents.remove(0);
                metric.name = idents.remove(0);
            }
            _ => {}
        }

        Ok(Some(Target { metric }))
    }

    /// Parses a comma-separated list of sources.
    fn parse_sources(&mut self, subqueries: bool) -> Result<Vec<Source>> {
        let mut sources = Vec::new();

        loop {
            sources.push(self.parse_source(subqueries)?);

            let (_, tok, _) = self.scan_ignore_whitespace();
            if tok != Token::Comma {
                self.unscan();
                break;
            }
        }

        Ok(sources)
    }

    fn parse_source(&mut self, subqueries: bool) -> Result<Source> {
        let mut metric = Metric::default();

        // A bare regex is a complete source.
        if let Some(re) = self.parse_regex()? {
            metric.regex = Some(re);
            return Ok(Source::Metric(metric));
        }

        // A parenthesized SELECT is a subquery source where allowed.
        if subqueries {
            let (_, tok, _) = self.scan_ignore_whitespace();
            if tok == Token::LParen {
                self.parse_tokens(&[Token::Select])?;
                let stmt = self.parse_select_statement(TargetRequirement::Subquery)?;
                self.parse_tokens(&[Token::RParen])?;
                return Ok(Source::SubQuery(Box::new(SubQuery { statement: stmt })));
            }
            self.unscan();
        }

        let mut idents = self.parse_segmented_idents()?;

        // With the maximum number of segments, no trailing regex is allowed.
        if idents.len() == 3 {
            metric.database = idents.remove(0);
            metric.time_to_live = idents.remove(0);
            metric.name = idents.remove(0);
            return Ok(Source::Metric(metric));
        }

        let re = self.parse_regex()?;
        let has_regex = re.is_some();
        metric.regex = re;

        // A trailing regex shifts the identifiers one qualifier up.
        match idents.len() {
            1 => {
                if has_regex {
                    metric.time_to_live = idents.remove(0);
                } else {
                    metric.name = idents.remove(0);
                }
            }
            2 => {
                if has_regex {
                    metric.database = idents.remove(0);
                    metric.time_to_live = idents.remove(0);
                } else {
                    metric.time_to_live = idents.remove(0);
                    metric.name = idents.remove(0);
                }
            }
            _ => {}
        }

        Ok(Source::Metric(metric))
    }
}

// Field expressions must not contain comparison or logical operators; those
// belong in the WHERE clause.
fn find_invalid_field_operator(expr: &Expr) -> Option<Token> {
    struct Validate {
        bad: Option<Token>,
    }
    impl Visitor for Validate {
        fn visit(&mut self, node: Node<'_>) -> bool {
            if let Node::Expr(Expr::Binary { op, .. }) = node {
                match op {
                    Token::Eq
                    | Token::Neq
                    | Token::EqRegex
                    | Token::NeqRegex
                    | Token::Lt
                    | Token::Lte
                    | Token::Gt
                    | Token::Gte
                    | Token::And
                    | Token::Or => {
                        self.bad = Some(*op);
                        return false;
                    }
                    _ => {}
                }
            }
            true
        }
    }

    let mut v = Validate { bad: None };
    walk(&mut v, Node::Expr(expr));
    v.bad
}

fn field_has_call(field: &Field) -> bool {
    struct HasCall {
        found: bool,
    }
    impl Visitor for HasCall {
        fn visit(&mut self, node: Node<'_>) -> bool {
            if let Node::Expr(Expr::Call { .. }) = node {
                self.found = true;
            }
            true
        }
    }

    let mut v = HasCall { found: false };
    walk(&mut v, Node::Field(field));
    v.found
}
