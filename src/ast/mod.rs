//! Abstract syntax tree for TSQL.
//!
//! Node families are closed enums: a `Statement` is only ever a SELECT, a
//! `Source` is a metric or a subquery, and an `Expr` is one of the variants
//! below. Every node serializes back to canonical TSQL text through
//! `Display`, and a parsed tree round-trips through that text.

use std::fmt::{self};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::duration::format_duration;
use crate::token::{quote_ident, quote_string, Token};

pub mod walk;
pub use self::walk::{contains_var_ref, expr_names, walk, walk_fn, Node, Visitor};

/// The minimum representable point time, in nanoseconds since the epoch.
/// The two lowest values are reserved as sentinels.
pub const MIN_TIME: i64 = i64::MIN + 2;

/// The maximum representable point time, in nanoseconds since the epoch.
/// One below the absolute maximum so exclusive ranges keep the last point.
pub const MAX_TIME: i64 = i64::MAX - 1;

//=============================================================================
// Data types
//=============================================================================

/// The primitive data types a column reference can be cast to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DataType {
    #[default]
    Unknown,
    Float,
    Integer,
    String,
    Boolean,
    Time,
    Duration,
    Tag,
    AnyField,
    Unsigned,
}

impl DataType {
    /// Returns the data type for its string representation, or `Unknown`.
    pub fn from_name(s: &str) -> DataType {
        match s {
            "float" => DataType::Float,
            "integer" => DataType::Integer,
            "unsigned" => DataType::Unsigned,
            "string" => DataType::String,
            "boolean" => DataType::Boolean,
            "time" => DataType::Time,
            "duration" => DataType::Duration,
            "tag" => DataType::Tag,
            "field" => DataType::AnyField,
            _ => DataType::Unknown,
        }
    }

    /// Returns true if the other data type has greater precedence. `Unknown`
    /// has the lowest precedence. This is not plain discriminant ordering:
    /// the discriminants decrease with higher precedence, `Unknown` sits at
    /// the bottom, and `Unsigned` slots in between `Integer` and the
    /// higher-precedence numeric types.
    pub fn less_than(self, other: DataType) -> bool {
        if self == DataType::Unknown {
            true
        } else if self == DataType::Unsigned {
            other != DataType::Unknown && other <= DataType::Integer
        } else if other == DataType::Unsigned {
            self >= DataType::String
        } else {
            other != DataType::Unknown && other < self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::Integer => "integer",
            DataType::Unsigned => "unsigned",
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Time => "time",
            DataType::Duration => "duration",
            DataType::Tag => "tag",
            DataType::AnyField => "field",
            DataType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=============================================================================
// Literals
//=============================================================================

/// A compiled regular expression literal. Equality compares the source
/// pattern, which is what structural AST comparison needs.
#[derive(Debug, Clone)]
pub struct RegexLiteral {
    pub val: Regex,
}

impl PartialEq for RegexLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.val.as_str() == other.val.as_str()
    }
}

impl fmt::Display for RegexLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.val.as_str().replace('/', "\\/"))
    }
}

/// Format for date literals.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format for date-time literals.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

lazy_static! {
    static ref DATE_STRING_RE: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("invalid date pattern");
    static ref DATE_TIME_STRING_RE: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}.+").expect("invalid date-time pattern");
}

/// Returns true if the string looks like a date-only time literal.
pub fn is_date_string(s: &str) -> bool {
    DATE_STRING_RE.is_match(s)
}

/// Returns true if the string looks like a date+time time literal.
pub fn is_date_time_string(s: &str) -> bool {
    DATE_TIME_STRING_RE.is_match(s)
}

/// Error converting a string literal into a time literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTimeError;

impl fmt::Display for InvalidTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid timestamp string")
    }
}

impl std::error::Error for InvalidTimeError {}

/// A static literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    /// A duration in nanoseconds.
    Duration(i64),
    Integer(i64),
    /// Only produced when a parsed integer overflows `i64`.
    Unsigned(u64),
    Number(f64),
    Regex(RegexLiteral),
    /// A list of tag key identifiers.
    List(Vec<String>),
    String(String),
    Time(DateTime<Utc>),
    /// Internal-only nil value; not reachable from the query language.
    Nil,
    /// A `$name` placeholder, usable when building query text from an AST.
    BoundParameter(String),
}

impl Literal {
    /// Returns true if this is a string literal that can be read as a time.
    pub fn is_time_literal(&self) -> bool {
        matches!(self, Literal::String(s) if is_date_time_string(s) || is_date_string(s))
    }

    /// Converts a date or date-time string literal into a time literal,
    /// interpreting wall-clock input in `loc` (UTC when absent).
    pub fn to_time_literal(&self, loc: Option<Tz>) -> Result<Literal, InvalidTimeError> {
        let s = match self {
            Literal::String(s) => s,
            _ => return Err(InvalidTimeError),
        };

        if is_date_time_string(s) {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, DATE_TIME_FORMAT) {
                return Ok(Literal::Time(local_to_utc(naive, loc)?));
            }
            if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                return Ok(Literal::Time(t.with_timezone(&Utc)));
            }
            Err(InvalidTimeError)
        } else if is_date_string(s) {
            let date = NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| InvalidTimeError)?;
            Ok(Literal::Time(local_to_utc(
                date.and_time(NaiveTime::MIN),
                loc,
            )?))
        } else {
            Err(InvalidTimeError)
        }
    }
}

fn local_to_utc(naive: NaiveDateTime, loc: Option<Tz>) -> Result<DateTime<Utc>, InvalidTimeError> {
    match loc {
        Some(tz) => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .ok_or(InvalidTimeError),
        None => Ok(Utc.from_utc_datetime(&naive)),
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(v) => f.write_str(if *v { "true" } else { "false" }),
            Literal::Duration(v) => f.write_str(&format_duration(*v)),
            Literal::Integer(v) => write!(f, "{}", v),
            Literal::Unsigned(v) => write!(f, "{}", v),
            Literal::Number(v) => write!(f, "{:.3}", v),
            Literal::Regex(re) => re.fmt(f),
            Literal::List(vals) => {
                f.write_str("(")?;
                for (i, key) in vals.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&quote_ident(&[key]))?;
                }
                f.write_str(")")
            }
            Literal::String(v) => f.write_str(&quote_string(v)),
            Literal::Time(v) => write!(
                f,
                "'{}'",
                v.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
            ),
            Literal::Nil => f.write_str("nil"),
            Literal::BoundParameter(name) => write!(f, "${}", quote_ident(&[name])),
        }
    }
}

//=============================================================================
// Expressions
//=============================================================================

/// The restriction on a `*` wildcard expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WildcardType {
    #[default]
    All,
    Field,
    Tag,
}

/// An expression that can be evaluated to a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// An operation between two expressions.
    Binary {
        op: Token,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A function call.
    Call { name: String, args: Vec<Expr> },
    /// A `DISTINCT ident` expression.
    Distinct { val: String },
    /// A parenthesized expression, preserved for round-tripping.
    Paren(Box<Expr>),
    /// A reference to a field or tag, optionally type-cast.
    VarRef { val: String, data_type: DataType },
    /// A `*` wildcard, optionally restricted to fields or tags.
    Wildcard(WildcardType),
    Literal(Literal),
}

impl Expr {
    /// Converts a `DISTINCT ident` expression into the equivalent
    /// `distinct(ident)` call.
    pub fn to_distinct_call(&self) -> Option<Expr> {
        match self {
            Expr::Distinct { val } => Some(Expr::Call {
                name: "distinct".to_string(),
                args: vec![Expr::VarRef {
                    val: val.clone(),
                    data_type: DataType::Unknown,
                }],
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                }
                f.write_str(")")
            }
            Expr::Distinct { val } => write!(f, "DISTINCT {}", val),
            Expr::Paren(expr) => write!(f, "({})", expr),
            Expr::VarRef { val, data_type } => {
                f.write_str(&quote_ident(&[val]))?;
                if *data_type != DataType::Unknown {
                    write!(f, "::{}", data_type)?;
                }
                Ok(())
            }
            Expr::Wildcard(wt) => f.write_str(match wt {
                WildcardType::All => "*",
                WildcardType::Field => "*::field",
                WildcardType::Tag => "*::tag",
            }),
            Expr::Literal(lit) => lit.fmt(f),
        }
    }
}

// Returns the derived name for an expression: a call name, the underscored
// variable names of a binary expression, or a variable name.
fn expr_name(expr: &Expr) -> String {
    match expr {
        Expr::Call { name, .. } => name.clone(),
        Expr::Binary { .. } => {
            let mut names = Vec::new();
            collect_names(expr, &mut names);
            names.join("_")
        }
        Expr::Paren(inner) => expr_name(inner),
        Expr::VarRef { val, .. } => val.clone(),
        _ => String::new(),
    }
}

fn collect_names(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::VarRef { val, .. } => out.push(val.clone()),
        Expr::Call { name, .. } => out.push(name.clone()),
        Expr::Binary { lhs, rhs, .. } => {
            collect_names(lhs, out);
            collect_names(rhs, out);
        }
        Expr::Paren(inner) => collect_names(inner, out),
        _ => {}
    }
}

//=============================================================================
// Fields, dimensions, sort fields
//=============================================================================

/// An expression retrieved from a select statement, optionally aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl Field {
    /// Returns the output name of the field: the alias if set, otherwise a
    /// name derived from the expression.
    pub fn name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        expr_name(&self.expr)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expr.fmt(f)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", quote_ident(&[alias]))?;
        }
        Ok(())
    }
}

/// An expression that a select statement is grouped by.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub expr: Expr,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expr.fmt(f)
    }
}

/// Splits dimensions into the `time(interval)` window width (0 when absent)
/// and the list of tag dimensions.
pub fn normalize_dimensions(dimensions: &[Dimension]) -> (i64, Vec<String>) {
    let mut interval = 0;
    let mut tags = Vec::new();
    for dim in dimensions {
        match &dim.expr {
            Expr::Call { args, .. } => {
                if let Some(Expr::Literal(Literal::Duration(d))) = args.first() {
                    interval = *d;
                }
            }
            Expr::VarRef { val, .. } => tags.push(val.clone()),
            _ => {}
        }
    }
    (interval, tags)
}

/// A field to sort results by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    /// Name of the field; may be empty for a bare `ORDER BY ASC`.
    pub name: String,
    pub ascending: bool,
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            write!(f, "{} ", self.name)?;
        }
        f.write_str(if self.ascending { "ASC" } else { "DESC" })
    }
}

//=============================================================================
// Sources
//=============================================================================

/// A single metric used as a data source. A metric either carries a name or
/// a regex, never both; a regex metric may still be qualified by a database
/// and time-to-live.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metric {
    pub database: String,
    pub time_to_live: String,
    pub name: String,
    pub regex: Option<RegexLiteral>,
    pub is_target: bool,
    /// When set, the metric reads from the named system iterator.
    pub system_iterator: String,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.database.is_empty() {
            write!(f, "{}.", quote_ident(&[&self.database]))?;
        }
        if !self.time_to_live.is_empty() {
            f.write_str(&quote_ident(&[&self.time_to_live]))?;
        }
        if !self.database.is_empty() || !self.time_to_live.is_empty() {
            f.write_str(".")?;
        }

        if !self.name.is_empty() && self.system_iterator.is_empty() {
            f.write_str(&quote_ident(&[&self.name]))?;
        } else if !self.system_iterator.is_empty() {
            f.write_str(&quote_ident(&[&self.system_iterator]))?;
        } else if let Some(re) = &self.regex {
            re.fmt(f)?;
        }
        Ok(())
    }
}

/// A source backed by a parenthesized select statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub statement: SelectStatement,
}

impl fmt::Display for SubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.statement)
    }
}

/// A source of data for a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Metric(Metric),
    SubQuery(Box<SubQuery>),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Metric(m) => m.fmt(f),
            Source::SubQuery(sq) => sq.fmt(f),
        }
    }
}

/// Returns all metrics in the sources, including those nested in subqueries.
pub fn source_metrics(sources: &[Source]) -> Vec<&Metric> {
    fn collect<'a>(sources: &'a [Source], out: &mut Vec<&'a Metric>) {
        for src in sources {
            match src {
                Source::Metric(m) => out.push(m),
                Source::SubQuery(sq) => collect(&sq.statement.sources, out),
            }
        }
    }
    let mut out = Vec::new();
    collect(sources, &mut out);
    out
}

/// The destination of a SELECT INTO query.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub metric: Metric,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INTO {}", self.metric)?;
        if self.metric.name.is_empty() {
            f.write_str(":METRIC")?;
        }
        Ok(())
    }
}

//=============================================================================
// Statements
//=============================================================================

/// The policy for filling empty aggregate windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillOption {
    /// Empty windows carry null values.
    #[default]
    Null,
    /// Empty windows are dropped from the result.
    None,
    /// Empty windows are filled with a constant number.
    Number,
    /// Empty windows repeat the previous window's value.
    Previous,
    /// Empty windows interpolate between the neighboring windows.
    Linear,
}

/// The constant used by `FillOption::Number`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillValue {
    Integer(i64),
    Number(f64),
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillValue::Integer(v) => write!(f, "{}", v),
            FillValue::Number(v) => write!(f, "{}", v),
        }
    }
}

/// A command for extracting data from the database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectStatement {
    /// Expressions returned from the selection.
    pub fields: Vec<Field>,
    /// Destination for the result of a SELECT INTO query.
    pub target: Option<Target>,
    /// Expressions used for grouping the selection.
    pub dimensions: Vec<Dimension>,
    /// Data sources that fields are extracted from.
    pub sources: Vec<Source>,
    /// An expression evaluated on each data point.
    pub condition: Option<Expr>,
    /// Fields to sort results by.
    pub sort_fields: Vec<SortField>,
    /// Maximum number of rows to be returned. Unlimited if zero.
    pub limit: i64,
    /// Returns rows starting at an offset from the first row.
    pub offset: i64,
    /// Maximum number of series to be returned. Unlimited if zero.
    pub slimit: i64,
    /// Returns series starting at an offset from the first one.
    pub soffset: i64,
    /// Whether this is a query for raw data values rather than an aggregate.
    pub is_raw_query: bool,
    /// The fill option the statement uses, if any.
    pub fill: FillOption,
    /// The value to fill empty aggregate windows with; set iff `fill` is
    /// `FillOption::Number`.
    pub fill_value: Option<FillValue>,
    /// The time zone for the query, if any.
    pub location: Option<Tz>,
    /// Renames the implicit time field name.
    pub time_alias: String,
    /// Removes the time column from the output.
    pub omit_time: bool,
    /// Removes the metric name from the resulting query.
    pub strip_name: bool,
    /// Overrides the output metric name.
    pub emit_name: String,
    /// Removes duplicate rows from raw queries.
    pub dedupe: bool,
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        f.write_str(&join_display(&self.fields, ", "))?;

        if let Some(target) = &self.target {
            write!(f, " {}", target)?;
        }
        if !self.sources.is_empty() {
            write!(f, " FROM {}", join_display(&self.sources, ", "))?;
        }
        if let Some(condition) = &self.condition {
            write!(f, " WHERE {}", condition)?;
        }
        if !self.dimensions.is_empty() {
            write!(f, " GROUP BY {}", join_display(&self.dimensions, ", "))?;
        }
        match self.fill {
            FillOption::None => f.write_str(" fill(none)")?,
            FillOption::Number => {
                f.write_str(" fill(")?;
                if let Some(v) = &self.fill_value {
                    v.fmt(f)?;
                }
                f.write_str(")")?;
            }
            FillOption::Linear => f.write_str(" fill(linear)")?,
            FillOption::Previous => f.write_str(" fill(previous)")?,
            FillOption::Null => {}
        }
        if !self.sort_fields.is_empty() {
            write!(f, " ORDER BY {}", join_display(&self.sort_fields, ", "))?;
        }
        if self.limit > 0 {
            write!(f, " LIMIT {}", self.limit)?;
        }
        if self.offset > 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        if self.slimit > 0 {
            write!(f, " SLIMIT {}", self.slimit)?;
        }
        if self.soffset > 0 {
            write!(f, " SOFFSET {}", self.soffset)?;
        }
        if let Some(location) = &self.location {
            write!(f, " TZ('{}')", location)?;
        }
        Ok(())
    }
}

/// A single command in TSQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<SelectStatement>),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(s) => s.fmt(f),
        }
    }
}

/// A collection of ordered statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub statements: Vec<Statement>,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_display(&self.statements, ";\n"))
    }
}

fn join_display<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}
