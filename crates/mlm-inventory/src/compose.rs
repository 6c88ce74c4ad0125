//! Composed host variables.
//!
//! A small expression language over host variables, enough for the usual
//! inventory `compose` entries:
//!
//! ```text
//! network_info.ip
//! registration_date | string
//! patch_status == 'needs_reboot'
//! os_name | lower != "sles"
//! ```
//!
//! An operand is a dotted variable path or a literal (quoted string, number,
//! `true`/`false`). It may be followed by filters: `string`, `lower`,
//! `upper`, `int`, `bool`, `length`. Two operands may be compared with `==`
//! or `!=`. A path that does not resolve leaves the variable unset.

use serde_json::{Map, Value};

use crate::filter::{truthy, value_text};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(Value),
    Pipe,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    String,
    Lower,
    Upper,
    Int,
    Bool,
    Length,
}

impl Filter {
    fn parse(name: &str) -> Result<Self, String> {
        match name {
            "string" => Ok(Filter::String),
            "lower" => Ok(Filter::Lower),
            "upper" => Ok(Filter::Upper),
            "int" => Ok(Filter::Int),
            "bool" => Ok(Filter::Bool),
            "length" | "count" => Ok(Filter::Length),
            other => Err(format!("unsupported filter '{}'", other)),
        }
    }

    fn apply(self, value: Value) -> Value {
        match self {
            Filter::String => Value::String(value_text(&value)),
            Filter::Lower => Value::String(value_text(&value).to_lowercase()),
            Filter::Upper => Value::String(value_text(&value).to_uppercase()),
            Filter::Int => {
                let n = match &value {
                    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                    Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
                    Value::Bool(b) => Some(i64::from(*b)),
                    _ => None,
                };
                Value::from(n.unwrap_or(0))
            }
            Filter::Bool => Value::Bool(match &value {
                Value::String(s) => {
                    matches!(s.trim().to_lowercase().as_str(), "yes" | "on" | "true" | "1")
                }
                other => truthy(other),
            }),
            Filter::Length => Value::from(match &value {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                _ => 0,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Literal(Value),
    Path(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
struct Term {
    operand: Operand,
    filters: Vec<Filter>,
}

impl Term {
    fn eval(&self, vars: &Map<String, Value>) -> Option<Value> {
        let value = match &self.operand {
            Operand::Literal(value) => value.clone(),
            Operand::Path(path) => lookup(vars, path)?.clone(),
        };
        Some(self.filters.iter().fold(value, |v, f| f.apply(v)))
    }
}

/// A parsed `compose` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    left: Term,
    comparison: Option<(bool, Term)>,
}

impl Expression {
    /// Parse an expression.
    pub fn parse(source: &str) -> Result<Self, String> {
        let tokens = tokenize(source)?;
        let mut tokens = tokens.into_iter().peekable();

        let left = parse_term(&mut tokens)?;
        let comparison = match tokens.next() {
            None => None,
            Some(Token::Eq) => Some((true, parse_term(&mut tokens)?)),
            Some(Token::Ne) => Some((false, parse_term(&mut tokens)?)),
            Some(other) => return Err(format!("unexpected {:?}", other)),
        };
        if let Some(extra) = tokens.next() {
            return Err(format!("unexpected {:?} after expression", extra));
        }

        Ok(Self { left, comparison })
    }

    /// Evaluate against a host's variables. `None` when a path does not
    /// resolve.
    pub fn eval(&self, vars: &Map<String, Value>) -> Option<Value> {
        let left = self.left.eval(vars)?;
        match &self.comparison {
            None => Some(left),
            Some((equal, right)) => {
                let right = right.eval(vars)?;
                Some(Value::Bool(values_equal(&left, &right) == *equal))
            }
        }
    }
}

fn parse_term<I>(tokens: &mut std::iter::Peekable<I>) -> Result<Term, String>
where
    I: Iterator<Item = Token>,
{
    let operand = match tokens.next() {
        Some(Token::Str(s)) => Operand::Literal(Value::String(s)),
        Some(Token::Number(n)) => Operand::Literal(n),
        Some(Token::Ident(name)) => match name.as_str() {
            "true" | "True" => Operand::Literal(Value::Bool(true)),
            "false" | "False" => Operand::Literal(Value::Bool(false)),
            "none" | "None" => Operand::Literal(Value::Null),
            _ => Operand::Path(split_path(&name)?),
        },
        Some(other) => return Err(format!("expected a value, found {:?}", other)),
        None => return Err("expected a value".to_string()),
    };

    let mut filters = Vec::new();
    while tokens.peek() == Some(&Token::Pipe) {
        tokens.next();
        match tokens.next() {
            Some(Token::Ident(name)) => filters.push(Filter::parse(&name)?),
            _ => return Err("expected a filter name after '|'".to_string()),
        }
    }

    Ok(Term { operand, filters })
}

fn split_path(name: &str) -> Result<Vec<String>, String> {
    let parts: Vec<String> = name.split('.').map(str::to_string).collect();
    if parts.iter().any(String::is_empty) {
        return Err(format!("invalid variable path '{}'", name));
    }
    Ok(parts)
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '=' | '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(format!("expected '{}='", c));
                }
                tokens.push(if c == '=' { Token::Eq } else { Token::Ne });
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == c => break,
                        Some(ch) => text.push(ch),
                        None => return Err("unterminated string".to_string()),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '0'..='9' | '-' => {
                let mut text = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || matches!(ch, '.' | '-') {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number: Value = serde_json::from_str(&text)
                    .map_err(|_| format!("invalid number '{}'", text))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || matches!(ch, '_' | '.') {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(text));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

fn lookup<'a>(vars: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = vars.get(first)?;
    for key in rest {
        current = match current {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}
