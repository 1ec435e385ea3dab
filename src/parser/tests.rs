use std::collections::HashMap;

use regex::Regex;
use serde_json::json;

use crate::ast::{
    DataType, Dimension, Expr, Field, FillOption, FillValue, Literal, Metric, RegexLiteral,
    SelectStatement, SortField, Source, Statement, SubQuery, Target, WildcardType,
};
use crate::duration::{NANOS_PER_HOUR, NANOS_PER_MINUTE};
use crate::parser::{parse_expr, parse_query, parse_statement, Parser};
use crate::token::Token;

fn var(name: &str) -> Expr {
    Expr::VarRef {
        val: name.to_string(),
        data_type: DataType::Unknown,
    }
}

fn cast(name: &str, data_type: DataType) -> Expr {
    Expr::VarRef {
        val: name.to_string(),
        data_type,
    }
}

fn int(v: i64) -> Expr {
    Expr::Literal(Literal::Integer(v))
}

fn num(v: f64) -> Expr {
    Expr::Literal(Literal::Number(v))
}

fn string(v: &str) -> Expr {
    Expr::Literal(Literal::String(v.to_string()))
}

fn re_lit(pattern: &str) -> RegexLiteral {
    RegexLiteral {
        val: Regex::new(pattern).unwrap(),
    }
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.to_string(),
        args,
    }
}

fn binary(op: Token, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn field(expr: Expr) -> Field {
    Field { expr, alias: None }
}

fn metric(name: &str) -> Source {
    Source::Metric(Metric {
        name: name.to_string(),
        ..Metric::default()
    })
}

fn select(stmt: SelectStatement) -> Statement {
    Statement::Select(Box::new(stmt))
}

#[test]
fn test_parse_query_multi() {
    let q = parse_query("SELECT a FROM b; SELECT c FROM d").unwrap();
    assert_eq!(q.statements.len(), 2);

    // A trailing semicolon is allowed.
    let q = parse_query("SELECT a FROM b;").unwrap();
    assert_eq!(q.statements.len(), 1);

    let q = parse_query("").unwrap();
    assert!(q.statements.is_empty());
}

#[test]
fn test_parse_query_missing_semicolon() {
    let err = parse_query("SELECT a FROM b SELECT c FROM d").unwrap_err();
    assert_eq!(err.to_string(), "found SELECT, expected ; at line 1, char 17");
}

#[test]
fn test_parse_statement_requires_select() {
    let err = parse_statement("DELETE FROM cpu").unwrap_err();
    assert_eq!(err.to_string(), "found DELETE, expected SELECT at line 1, char 1");
}

#[test]
fn test_parse_select_wildcard() {
    let stmt = parse_statement("SELECT * FROM ma").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(Expr::Wildcard(WildcardType::All))],
            sources: vec![metric("ma")],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_wildcard_dimension() {
    let stmt = parse_statement("SELECT field1, * FROM ma GROUP BY *").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(var("field1")), field(Expr::Wildcard(WildcardType::All))],
            sources: vec![metric("ma")],
            dimensions: vec![Dimension {
                expr: Expr::Wildcard(WildcardType::All)
            }],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_aggregates_full() {
    let stmt = parse_statement(
        "SELECT mean(field1), sum(field2), count(field3) AS field_x FROM ma \
         WHERE host = 'hosta.org' and time > '2020-01-01T00:00:00Z' \
         GROUP BY time(10h) ORDER BY DESC LIMIT 20 OFFSET 10;",
    )
    .unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: false,
            fields: vec![
                field(call("mean", vec![var("field1")])),
                field(call("sum", vec![var("field2")])),
                Field {
                    expr: call("count", vec![var("field3")]),
                    alias: Some("field_x".to_string()),
                },
            ],
            sources: vec![metric("ma")],
            condition: Some(binary(
                Token::And,
                binary(Token::Eq, var("host"), string("hosta.org")),
                binary(Token::Gt, var("time"), string("2020-01-01T00:00:00Z")),
            )),
            dimensions: vec![Dimension {
                expr: call(
                    "time",
                    vec![Expr::Literal(Literal::Duration(10 * NANOS_PER_HOUR))]
                ),
            }],
            sort_fields: vec![SortField {
                name: String::new(),
                ascending: false,
            }],
            limit: 20,
            offset: 10,
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_quoted_field_alias() {
    let stmt = parse_statement(r#"SELECT "foo.bar.baz" AS foo FROM ma"#).unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![Field {
                expr: var("foo.bar.baz"),
                alias: Some("foo".to_string()),
            }],
            sources: vec![metric("ma")],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_lowercase_and_string_field() {
    let stmt = parse_statement("select my_field FROM ma").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(var("my_field"))],
            sources: vec![metric("ma")],
            ..SelectStatement::default()
        })
    );

    // A single-quoted value is a string literal, not an identifier.
    let stmt = parse_statement("select 'my_field' FROM ma").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(string("my_field"))],
            sources: vec![metric("ma")],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_slimit_soffset() {
    let stmt = parse_statement("SELECT field1 FROM ma SLIMIT 10 SOFFSET 5").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(var("field1"))],
            sources: vec![metric("ma")],
            slimit: 10,
            soffset: 5,
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_regex_condition() {
    let stmt =
        parse_statement("SELECT * FROM cpu WHERE host = 'serverC' AND region =~ /.*west.*/")
            .unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(Expr::Wildcard(WildcardType::All))],
            sources: vec![metric("cpu")],
            condition: Some(binary(
                Token::And,
                binary(Token::Eq, var("host"), string("serverC")),
                binary(
                    Token::EqRegex,
                    var("region"),
                    Expr::Literal(Literal::Regex(re_lit(".*west.*"))),
                ),
            )),
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_call_arguments() {
    let stmt = parse_statement(r#"select percentile("field1", 2.0) from cpu"#).unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: false,
            fields: vec![field(call("percentile", vec![var("field1"), num(2.0)]))],
            sources: vec![metric("cpu")],
            ..SelectStatement::default()
        })
    );

    let stmt = parse_statement("select top(field1, tag1, 2), tag1 from cpu").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: false,
            fields: vec![
                field(call("top", vec![var("field1"), var("tag1"), int(2)])),
                field(var("tag1")),
            ],
            sources: vec![metric("cpu")],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_distinct() {
    let stmt = parse_statement("select distinct(field1) from cpu").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: false,
            fields: vec![field(call("distinct", vec![var("field1")]))],
            sources: vec![metric("cpu")],
            ..SelectStatement::default()
        })
    );

    let stmt = parse_statement("select count(distinct field3), sum(field4) from metrics").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: false,
            fields: vec![
                field(call(
                    "count",
                    vec![Expr::Distinct {
                        val: "field3".to_string()
                    }]
                )),
                field(call("sum", vec![var("field4")])),
            ],
            sources: vec![metric("metrics")],
            ..SelectStatement::default()
        })
    );

    let stmt = parse_statement("select count(distinct(field3)) from metrics").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: false,
            fields: vec![field(call("count", vec![call("distinct", vec![var("field3")])]))],
            sources: vec![metric("metrics")],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_comparison_operators() {
    let cases = vec![
        (">", Token::Gt),
        (">=", Token::Gte),
        ("=", Token::Eq),
        ("<=", Token::Lte),
        ("<", Token::Lt),
        ("!=", Token::Neq),
        ("<>", Token::Neq),
    ];

    for (op_str, op) in cases {
        let stmt =
            parse_statement(&format!("SELECT * FROM cpu WHERE load {} 100", op_str)).unwrap();
        assert_eq!(
            stmt,
            select(SelectStatement {
                is_raw_query: true,
                fields: vec![field(Expr::Wildcard(WildcardType::All))],
                sources: vec![metric("cpu")],
                condition: Some(binary(op, var("load"), int(100))),
                ..SelectStatement::default()
            }),
            "operator {}",
            op_str
        );
    }
}

#[test]
fn test_parse_select_regex_sources() {
    let cases: Vec<(&str, Metric)> = vec![
        (
            "SELECT * FROM /cpu.*/",
            Metric {
                regex: Some(re_lit("cpu.*")),
                ..Metric::default()
            },
        ),
        (
            r#"SELECT * FROM "db"."ttl"./cpu.*/"#,
            Metric {
                database: "db".to_string(),
                time_to_live: "ttl".to_string(),
                regex: Some(re_lit("cpu.*")),
                ..Metric::default()
            },
        ),
        (
            r#"SELECT * FROM "db"../cpu.*/"#,
            Metric {
                database: "db".to_string(),
                regex: Some(re_lit("cpu.*")),
                ..Metric::default()
            },
        ),
        (
            r#"SELECT * FROM "ttl"./cpu.*/"#,
            Metric {
                time_to_live: "ttl".to_string(),
                regex: Some(re_lit("cpu.*")),
                ..Metric::default()
            },
        ),
    ];

    for (s, m) in cases {
        let stmt = parse_statement(s).unwrap();
        assert_eq!(
            stmt,
            select(SelectStatement {
                is_raw_query: true,
                fields: vec![field(Expr::Wildcard(WildcardType::All))],
                sources: vec![Source::Metric(m)],
                ..SelectStatement::default()
            }),
            "{}",
            s
        );
    }
}

#[test]
fn test_parse_select_double_dot_source() {
    let stmt = parse_statement(r#"SELECT * FROM "a"..name"#).unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(Expr::Wildcard(WildcardType::All))],
            sources: vec![Source::Metric(Metric {
                database: "a".to_string(),
                name: "name".to_string(),
                ..Metric::default()
            })],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_regex_field() {
    let stmt = parse_statement("SELECT /foo/ FROM cpu").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(Expr::Literal(Literal::Regex(re_lit("foo"))))],
            sources: vec![metric("cpu")],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_fill() {
    let base_fields = vec![field(call("mean", vec![var("value")]))];
    let base_dims = vec![Dimension {
        expr: call(
            "time",
            vec![Expr::Literal(Literal::Duration(5 * NANOS_PER_MINUTE))],
        ),
    }];

    let cases: Vec<(&str, FillOption, Option<FillValue>)> = vec![
        ("fill(1)", FillOption::Number, Some(FillValue::Integer(1))),
        (
            "fill(2.5)",
            FillOption::Number,
            Some(FillValue::Number(2.5)),
        ),
        ("FILL(none)", FillOption::None, None),
        ("FILL(previous)", FillOption::Previous, None),
        ("fill(linear)", FillOption::Linear, None),
        ("fill(null)", FillOption::Null, None),
        ("", FillOption::Null, None),
    ];

    for (fill_str, fill, fill_value) in cases {
        let s = format!(
            "SELECT mean(value) FROM cpu GROUP BY time(5m) {}",
            fill_str
        );
        let stmt = parse_statement(&s).unwrap();
        assert_eq!(
            stmt,
            select(SelectStatement {
                is_raw_query: false,
                fields: base_fields.clone(),
                sources: vec![metric("cpu")],
                dimensions: base_dims.clone(),
                fill,
                fill_value,
                ..SelectStatement::default()
            }),
            "{}",
            s
        );
    }
}

#[test]
fn test_parse_select_fill_errors() {
    let err = parse_statement("SELECT mean(value) FROM cpu GROUP BY time(5m) fill()").unwrap_err();
    assert_eq!(
        err.to_string(),
        "fill requires an argument, e.g.: 0, null, none, previous, linear"
    );

    let err = parse_statement("SELECT mean(value) FROM cpu GROUP BY time(5m) fill(x)").unwrap_err();
    assert_eq!(err.to_string(), "expected number argument in fill()");
}

#[test]
fn test_parse_select_casts() {
    let stmt = parse_statement(
        "SELECT field1::float, field2::integer, field3::string, field4::boolean, \
         field5::field, tag1::tag FROM cpu",
    )
    .unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![
                field(cast("field1", DataType::Float)),
                field(cast("field2", DataType::Integer)),
                field(cast("field3", DataType::String)),
                field(cast("field4", DataType::Boolean)),
                field(cast("field5", DataType::AnyField)),
                field(cast("tag1", DataType::Tag)),
            ],
            sources: vec![metric("cpu")],
            ..SelectStatement::default()
        })
    );

    let stmt = parse_statement("SELECT *::tag FROM cpu").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(Expr::Wildcard(WildcardType::Tag))],
            sources: vec![metric("cpu")],
            ..SelectStatement::default()
        })
    );

    let err = parse_statement("SELECT field1::bogus FROM cpu").unwrap_err();
    assert_eq!(
        err.to_string(),
        "found bogus, expected float, integer, unsigned, string, boolean, field, tag \
         at line 1, char 16"
    );
}

#[test]
fn test_parse_select_bound_parameter() {
    let mut p = Parser::new("SELECT value FROM cpu WHERE value > $value");
    p.set_params(HashMap::from([("value".to_string(), json!(2))]));
    let stmt = p.parse_statement().unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(var("value"))],
            sources: vec![metric("cpu")],
            condition: Some(binary(Token::Gt, var("value"), int(2))),
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_bound_parameter_regex() {
    let mut p = Parser::new("SELECT value FROM cpu WHERE region =~ $re");
    p.set_params(HashMap::from([(
        "re".to_string(),
        json!({"regex": ".*west.*"}),
    )]));
    let stmt = p.parse_statement().unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(var("value"))],
            sources: vec![metric("cpu")],
            condition: Some(binary(
                Token::EqRegex,
                var("region"),
                Expr::Literal(Literal::Regex(re_lit(".*west.*"))),
            )),
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_bound_parameter_errors() {
    let err = parse_statement("SELECT value FROM cpu WHERE value > $p").unwrap_err();
    assert_eq!(err.to_string(), "missing parameter: p");

    let err = parse_statement("SELECT value FROM cpu WHERE value > $").unwrap_err();
    assert_eq!(err.to_string(), "empty bound parameter");

    // A value that cannot be bound surfaces its stored message when used.
    let mut p = Parser::new("SELECT value FROM cpu WHERE value > $p");
    p.set_params(HashMap::from([("p".to_string(), json!(null))]));
    let err = p.parse_statement().unwrap_err();
    assert_eq!(err.to_string(), "unable to bind parameter with type null");
}

#[test]
fn test_parse_select_subquery() {
    let stmt = parse_statement("SELECT max(value) FROM (SELECT value FROM cpu)").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: false,
            fields: vec![field(call("max", vec![var("value")]))],
            sources: vec![Source::SubQuery(Box::new(SubQuery {
                statement: SelectStatement {
                    is_raw_query: true,
                    fields: vec![field(var("value"))],
                    sources: vec![metric("cpu")],
                    ..SelectStatement::default()
                },
            }))],
            ..SelectStatement::default()
        })
    );

    // Subqueries cannot have an INTO clause.
    let err = parse_statement("SELECT * FROM (SELECT value INTO dest FROM cpu)").unwrap_err();
    assert_eq!(err.to_string(), "found INTO, expected FROM at line 1, char 29");
}

#[test]
fn test_parse_select_into_target() {
    let stmt = parse_statement(r#"SELECT value INTO "db"."ttl"."dest" FROM cpu"#).unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(var("value"))],
            target: Some(Target {
                metric: Metric {
                    database: "db".to_string(),
                    time_to_live: "ttl".to_string(),
                    name: "dest".to_string(),
                    is_target: true,
                    ..Metric::default()
                },
            }),
            sources: vec![metric("cpu")],
            ..SelectStatement::default()
        })
    );

    // A trailing :METRIC keeps the metric name from the source.
    let stmt = parse_statement(r#"SELECT value INTO "ttl".:METRIC FROM cpu"#).unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: true,
            fields: vec![field(var("value"))],
            target: Some(Target {
                metric: Metric {
                    time_to_live: "ttl".to_string(),
                    is_target: true,
                    ..Metric::default()
                },
            }),
            sources: vec![metric("cpu")],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_group_by_tags() {
    let stmt = parse_statement("SELECT mean(value) FROM cpu GROUP BY time(10m), host").unwrap();
    assert_eq!(
        stmt,
        select(SelectStatement {
            is_raw_query: false,
            fields: vec![field(call("mean", vec![var("value")]))],
            sources: vec![metric("cpu")],
            dimensions: vec![
                Dimension {
                    expr: call(
                        "time",
                        vec![Expr::Literal(Literal::Duration(10 * NANOS_PER_MINUTE))],
                    ),
                },
                Dimension { expr: var("host") },
            ],
            ..SelectStatement::default()
        })
    );
}

#[test]
fn test_parse_select_order_by() {
    let stmt = parse_statement("SELECT * FROM cpu ORDER BY time ASC").unwrap();
    let Statement::Select(s) = stmt;
    assert_eq!(
        s.sort_fields,
        vec![SortField {
            name: "time".to_string(),
            ascending: true,
        }]
    );

    let stmt = parse_statement("SELECT * FROM cpu ORDER BY time desc").unwrap();
    let Statement::Select(s) = stmt;
    assert_eq!(
        s.sort_fields,
        vec![SortField {
            name: "time".to_string(),
            ascending: false,
        }]
    );

    let err = parse_statement("SELECT * FROM m ORDER BY field1").unwrap_err();
    assert_eq!(err.to_string(), "only ORDER BY time supported at this time");

    let err = parse_statement("SELECT * FROM m ORDER BY time, time").unwrap_err();
    assert_eq!(err.to_string(), "only ORDER BY time supported at this time");

    let err = parse_statement("SELECT * FROM m ORDER BY 1").unwrap_err();
    assert_eq!(
        err.to_string(),
        "found 1, expected identifier, ASC, DESC at line 1, char 26"
    );
}

#[test]
fn test_parse_select_limit_offset_errors() {
    let err = parse_statement("SELECT * FROM cpu LIMIT -1").unwrap_err();
    assert_eq!(err.to_string(), "found -, expected integer at line 1, char 25");

    let err = parse_statement("SELECT * FROM cpu OFFSET x").unwrap_err();
    assert_eq!(err.to_string(), "found x, expected integer at line 1, char 26");
}

#[test]
fn test_parse_select_tz() {
    let stmt = parse_statement("SELECT value FROM cpu TZ('America/Chicago')").unwrap();
    let Statement::Select(s) = stmt;
    assert_eq!(s.location, Some(chrono_tz::America::Chicago));

    let err = parse_statement("SELECT value FROM cpu TZ('Nowhere/Nothing')").unwrap_err();
    assert_eq!(err.to_string(), "unable to find time zone Nowhere/Nothing");

    let err = parse_statement("SELECT value FROM cpu TZ(foo)").unwrap_err();
    assert_eq!(err.to_string(), "expected string argument in tz()");
}

#[test]
fn test_parse_select_invalid_field_operator() {
    let err = parse_statement("SELECT x = 1 FROM m").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid operator = in SELECT clause at line 1, char 8; \
         operator is intended for WHERE clause"
    );

    let err = parse_statement("SELECT a AND b FROM m").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid operator AND in SELECT clause at line 1, char 8; \
         operator is intended for WHERE clause"
    );

    // With several invalid operators, the one visited last is reported.
    let err = parse_statement("SELECT foo(a = b, c > d) FROM m").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid operator > in SELECT clause at line 1, char 8; \
         operator is intended for WHERE clause"
    );

    let err = parse_statement("SELECT (a = b) + (c > d) FROM m").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid operator > in SELECT clause at line 1, char 8; \
         operator is intended for WHERE clause"
    );

    // Arithmetic in the field list is fine.
    parse_statement("SELECT a + b FROM m").unwrap();
}

#[test]
fn test_parse_select_too_many_segments() {
    let err = parse_statement("SELECT * FROM db.ttl.cpu.extra").unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"too many segments in "db"."ttl"."cpu".extra at line 1, char 1"#
    );
}

#[test]
fn test_parse_unary_sign() {
    assert_eq!(parse_expr("-1").unwrap(), int(-1));
    assert_eq!(parse_expr("+5").unwrap(), int(5));
    assert_eq!(parse_expr("-2.5").unwrap(), num(-2.5));
    assert_eq!(
        parse_expr("-5m").unwrap(),
        Expr::Literal(Literal::Duration(-5 * NANOS_PER_MINUTE))
    );

    // A signed reference becomes a multiplication.
    assert_eq!(
        parse_expr("-value").unwrap(),
        binary(Token::Mul, int(-1), var("value"))
    );
    assert_eq!(
        parse_expr("-(value)").unwrap(),
        binary(Token::Mul, int(-1), Expr::Paren(Box::new(var("value"))))
    );
}

#[test]
fn test_parse_integer_boundaries() {
    // One above i64::MAX parses as an unsigned literal.
    assert_eq!(
        parse_expr("9223372036854775808").unwrap(),
        Expr::Literal(Literal::Unsigned(9223372036854775808))
    );
    // ...and negating it lands exactly on i64::MIN.
    assert_eq!(
        parse_expr("-9223372036854775808").unwrap(),
        Expr::Literal(Literal::Integer(i64::MIN))
    );
    assert_eq!(
        parse_expr("18446744073709551615").unwrap(),
        Expr::Literal(Literal::Unsigned(u64::MAX))
    );
    let err = parse_expr("-9223372036854775809").unwrap_err();
    assert_eq!(
        err.to_string(),
        "constant -9223372036854775809 underflows int64"
    );
}

#[test]
fn test_parse_duration_primitive() {
    assert_eq!(
        Parser::new("10h").parse_duration().unwrap(),
        10 * NANOS_PER_HOUR
    );
    // INF reads as an unbounded, zero-valued duration.
    assert_eq!(Parser::new("INF").parse_duration().unwrap(), 0);
    let err = Parser::new("foo").parse_duration().unwrap_err();
    assert_eq!(err.to_string(), "found foo, expected duration at line 1, char 1");
}

#[test]
fn test_parse_expr_precedence() {
    // Multiplication binds tighter than addition.
    assert_eq!(
        parse_expr("1 + 2 * 3").unwrap(),
        binary(Token::Add, int(1), binary(Token::Mul, int(2), int(3)))
    );
    assert_eq!(
        parse_expr("2 * 3 + 1").unwrap(),
        binary(Token::Add, binary(Token::Mul, int(2), int(3)), int(1))
    );
    // Equal precedence is left-associative.
    assert_eq!(
        parse_expr("1 - 2 - 3").unwrap(),
        binary(Token::Sub, binary(Token::Sub, int(1), int(2)), int(3))
    );
    // Comparisons bind tighter than AND, which binds tighter than OR.
    assert_eq!(
        parse_expr("a = 1 AND b = 2 OR c = 3").unwrap(),
        binary(
            Token::Or,
            binary(
                Token::And,
                binary(Token::Eq, var("a"), int(1)),
                binary(Token::Eq, var("b"), int(2)),
            ),
            binary(Token::Eq, var("c"), int(3)),
        )
    );
    // Parentheses are preserved as nodes.
    assert_eq!(
        parse_expr("(1 + 2) * 3").unwrap(),
        binary(
            Token::Mul,
            Expr::Paren(Box::new(binary(Token::Add, int(1), int(2)))),
            int(3),
        )
    );
}

#[test]
fn test_parse_expr_missing_regex_operand() {
    let err = parse_expr("region =~ 'foo'").unwrap_err();
    assert_eq!(err.to_string(), "found foo, expected regex at line 1, char 11");
}

#[test]
fn test_round_trip() {
    let queries = vec![
        "SELECT * FROM ma",
        "SELECT field1, * FROM ma GROUP BY *",
        "SELECT mean(field1) AS field_x FROM ma WHERE host = 'hosta.org' \
         GROUP BY time(10h) fill(none) ORDER BY DESC LIMIT 20 OFFSET 10 SLIMIT 5 SOFFSET 2",
        r#"SELECT * FROM "db"."ttl"./cpu.*/"#,
        r#"SELECT * FROM "db"../cpu.*/"#,
        "SELECT field1::float, field2::integer, tag1::tag, *::field FROM cpu",
        "SELECT max(value) FROM (SELECT value FROM cpu) GROUP BY time(5m) fill(previous)",
        r#"SELECT value INTO "ttl".:METRIC FROM cpu"#,
        "SELECT value FROM cpu WHERE region =~ /.*west.*/ AND value > 2.500 TZ('America/Chicago')",
        "SELECT -1 * value FROM cpu",
        "SELECT DISTINCT field2 FROM metrics",
        "SELECT /regex/ FROM cpu GROUP BY time(10h) fill(1)",
        "SELECT a FROM b; SELECT c FROM d",
    ];

    for q in queries {
        let first = parse_query(q).unwrap();
        let text = first.to_string();
        let second = parse_query(&text).unwrap();
        assert_eq!(first, second, "round trip of {:?} via {:?}", q, text);
    }
}

#[test]
fn test_is_raw_query_transitive() {
    // A call nested in arithmetic still marks the query as aggregate.
    let stmt = parse_statement("SELECT 1 + mean(value) FROM cpu").unwrap();
    let Statement::Select(s) = stmt;
    assert!(!s.is_raw_query);

    let stmt = parse_statement("SELECT (mean(value)) FROM cpu").unwrap();
    let Statement::Select(s) = stmt;
    assert!(!s.is_raw_query);

    let stmt = parse_statement("SELECT value FROM cpu").unwrap();
    let Statement::Select(s) = stmt;
    assert!(s.is_raw_query);
}
