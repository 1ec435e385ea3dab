//! Bound parameter values.
//!
//! A bound value knows the token kind and literal text it substitutes for a
//! `$name` placeholder during scanning. Error values deliberately keep the
//! `BOUNDPARAM` token kind so they travel to the expression parser, which
//! then surfaces the stored message as the parse error.

use serde_json::Value as JsonValue;

use crate::duration::format_duration;
use crate::token::Token;

/// A value that can be bound to a parameter when parsing a query.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// An identifier value.
    Identifier(String),
    /// A string literal.
    String(String),
    /// A regex literal.
    Regex(String),
    /// A float literal.
    Number(f64),
    /// An integer literal.
    Integer(i64),
    /// A boolean literal.
    Boolean(bool),
    /// A duration literal, kept in its textual form.
    Duration(String),
    /// A value that produces an error when it is used in a parse.
    Error(String),
}

impl BindValue {
    /// The token kind this value substitutes into the token stream.
    pub fn token_type(&self) -> Token {
        match self {
            BindValue::Identifier(_) => Token::Ident,
            BindValue::String(_) => Token::String,
            BindValue::Regex(_) => Token::Regex,
            BindValue::Number(_) => Token::Number,
            BindValue::Integer(_) => Token::Integer,
            BindValue::Boolean(b) => {
                if *b {
                    Token::True
                } else {
                    Token::False
                }
            }
            BindValue::Duration(_) => Token::Duration,
            BindValue::Error(_) => Token::BoundParam,
        }
    }

    /// The literal text this value substitutes into the token stream. A
    /// boolean carries its truth in the token itself, so its literal is
    /// empty.
    pub fn value(&self) -> String {
        match self {
            BindValue::Identifier(s)
            | BindValue::String(s)
            | BindValue::Regex(s)
            | BindValue::Duration(s)
            | BindValue::Error(s) => s.clone(),
            BindValue::Number(v) => format!("{}", v),
            BindValue::Integer(v) => format!("{}", v),
            BindValue::Boolean(_) => String::new(),
        }
    }

    /// Binds a JSON-shaped value. Plain numbers, strings and booleans map to
    /// the corresponding literal; a single-entry object `{kind: value}`
    /// selects a typed form explicitly. Anything else binds to an error
    /// value that surfaces when the parameter is used.
    pub fn bind(v: &JsonValue) -> BindValue {
        match v {
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::Integer(i)
                } else if n.is_f64() {
                    BindValue::Number(n.as_f64().unwrap_or_default())
                } else {
                    // A positive integer beyond i64. Report the overflow the
                    // way the integer parse itself describes it.
                    let lit = n.to_string();
                    match lit.parse::<i64>() {
                        Ok(i) => BindValue::Integer(i),
                        Err(e) => BindValue::Error(format!("parsing \"{}\": {}", lit, e)),
                    }
                }
            }
            JsonValue::String(s) => BindValue::String(s.clone()),
            JsonValue::Bool(b) => BindValue::Boolean(*b),
            JsonValue::Object(m) => Self::bind_object(m),
            other => BindValue::Error(format!(
                "unable to bind parameter with type {}",
                json_type_name(other)
            )),
        }
    }

    fn bind_object(m: &serde_json::Map<String, JsonValue>) -> BindValue {
        if m.len() != 1 {
            return BindValue::Error(
                "bound object parameter value must have exactly one entry".to_string(),
            );
        }
        let (k, v) = match m.iter().next() {
            Some(entry) => entry,
            None => {
                return BindValue::Error(
                    "bound object parameter value must have exactly one entry".to_string(),
                )
            }
        };

        match k.as_str() {
            "ident" | "identifier" => match v.as_str() {
                Some(s) => BindValue::Identifier(s.to_string()),
                None => BindValue::Error("identifier must be a string value".to_string()),
            },
            "regex" => match v.as_str() {
                Some(s) => BindValue::Regex(s.to_string()),
                None => BindValue::Error("regex literal must be a string value".to_string()),
            },
            "string" => match v.as_str() {
                Some(s) => BindValue::String(s.to_string()),
                None => BindValue::Error("string literal must be a string value".to_string()),
            },
            "float" | "number" => match v.as_f64() {
                Some(f) => BindValue::Number(f),
                None => BindValue::Error("number literal must be a float value".to_string()),
            },
            "int" | "integer" => match v.as_i64() {
                Some(i) => BindValue::Integer(i),
                None => BindValue::Error("integer literal must be an integer value".to_string()),
            },
            "duration" => {
                if let Some(s) = v.as_str() {
                    BindValue::Duration(s.to_string())
                } else if let Some(i) = v.as_i64() {
                    BindValue::Duration(format_duration(i))
                } else {
                    BindValue::Error(
                        "duration literal must be a string or integer value".to_string(),
                    )
                }
            }
            other => BindValue::Error(format!("unknown bind object type: {}", other)),
        }
    }
}

fn json_type_name(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
