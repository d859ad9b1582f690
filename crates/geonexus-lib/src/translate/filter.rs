//! Attribute filter dialect for the spatial database backend.
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! filter     := clause ( "AND" clause )*
//! clause     := "1" "=" "1" | field op literal
//! op         := "=" | "<>" | "!=" | "<" | "<=" | ">" | ">=" | "LIKE"
//! literal    := 'string' | number | TRUE | FALSE | NULL
//! ```
//!
//! `NULL` is only valid with `=` and `<>`/`!=`. Field names follow the same
//! rules as table identifier segments.

use std::fmt;

use crate::error::{Error, Result};
use crate::translate::TableRef;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl FilterOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::NotEq => "<>",
            FilterOp::Lt => "<",
            FilterOp::LtEq => "<=",
            FilterOp::Gt => ">",
            FilterOp::GtEq => ">=",
            FilterOp::Like => "LIKE",
        }
    }
}

/// Literal operand of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterLiteral {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Null,
}

/// One `field op literal` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterLiteral,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(String),
    Text(String),
    Op(FilterOp),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => f.write_str(word),
            Token::Number(number) => f.write_str(number),
            Token::Text(text) => write!(f, "'{}'", text),
            Token::Op(op) => f.write_str(op.as_sql()),
        }
    }
}

/// Parse `raw` into a conjunction of comparisons.
///
/// The tautology `1=1` contributes nothing, so `"1=1"` parses to an empty list.
pub fn parse_filter(raw: &str) -> Result<Vec<Comparison>> {
    let fail = |reason: String| Error::InvalidFilter {
        filter: raw.to_string(),
        reason,
    };

    let tokens = tokenize(raw).map_err(fail)?;
    let mut comparisons = Vec::new();
    let mut rest = tokens.as_slice();

    loop {
        match rest {
            [Token::Number(left), Token::Op(FilterOp::Eq), Token::Number(right), tail @ ..]
                if left == "1" && right == "1" =>
            {
                rest = tail;
            }
            [Token::Word(field), Token::Op(op), literal, tail @ ..] => {
                comparisons.push(comparison(field, *op, literal).map_err(fail)?);
                rest = tail;
            }
            [Token::Word(field), Token::Word(like), literal, tail @ ..]
                if like.eq_ignore_ascii_case("like") =>
            {
                comparisons.push(comparison(field, FilterOp::Like, literal).map_err(fail)?);
                rest = tail;
            }
            [] => return Err(fail("filter is empty".to_string())),
            [first, ..] => return Err(fail(format!("unexpected token '{}'", first))),
        }

        match rest {
            [] => return Ok(comparisons),
            [Token::Word(and), tail @ ..]
                if and.eq_ignore_ascii_case("and") && !tail.is_empty() =>
            {
                rest = tail;
            }
            [other, ..] => {
                return Err(fail(format!(
                    "expected AND between clauses, found '{}'",
                    other
                )))
            }
        }
    }
}

fn comparison(
    field: &str,
    op: FilterOp,
    literal: &Token,
) -> std::result::Result<Comparison, String> {
    TableRef::validate_segment(field)
        .map_err(|reason| format!("field '{}': {}", field, reason))?;

    let value = match literal {
        Token::Text(text) => FilterLiteral::Text(text.clone()),
        Token::Number(number) => parse_number(number)?,
        Token::Word(word) => match word.to_ascii_lowercase().as_str() {
            "true" => FilterLiteral::Bool(true),
            "false" => FilterLiteral::Bool(false),
            "null" => FilterLiteral::Null,
            _ => return Err(format!("'{}' is not a literal value", word)),
        },
        Token::Op(op) => return Err(format!("unexpected operator '{}'", op.as_sql())),
    };

    if value == FilterLiteral::Null && !matches!(op, FilterOp::Eq | FilterOp::NotEq) {
        return Err(format!("NULL cannot be compared with '{}'", op.as_sql()));
    }
    if op == FilterOp::Like && !matches!(value, FilterLiteral::Text(_)) {
        return Err("LIKE requires a string pattern".to_string());
    }

    Ok(Comparison {
        field: field.to_string(),
        op,
        value,
    })
}

fn parse_number(raw: &str) -> std::result::Result<FilterLiteral, String> {
    if let Ok(integer) = raw.parse::<i64>() {
        return Ok(FilterLiteral::Integer(integer));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(FilterLiteral::Real)
        .ok_or_else(|| format!("'{}' is not a valid number", raw))
}

fn tokenize(raw: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '\'' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            text.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(other) => {
                            text.push(*other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Text(text));
            }
            '=' => {
                tokens.push(Token::Op(FilterOp::Eq));
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(FilterOp::NotEq));
                i += 2;
            }
            '<' => {
                let (op, width) = match chars.get(i + 1) {
                    Some('=') => (FilterOp::LtEq, 2),
                    Some('>') => (FilterOp::NotEq, 2),
                    _ => (FilterOp::Lt, 1),
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            '>' => {
                let (op, width) = match chars.get(i + 1) {
                    Some('=') => (FilterOp::GtEq, 2),
                    _ => (FilterOp::Gt, 1),
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E'))
                {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}
