//! Typed setting values and best-effort type inference.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("integer literal regex"));

// Decimal or exponent form. `nan`/`inf` stay strings.
static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.\d*|\.\d+|\d+)([eE][+-]?\d+)?$").expect("float literal regex")
});

/// A setting value. Heterogeneous types are a tagged variant, never a bare string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("a list literal closed with `]`")]
    UnterminatedList,

    #[error("a closing quote")]
    UnterminatedQuote,

    #[error("scalar list elements (nested lists are not supported)")]
    NestedList,
}

impl Value {
    /// Infer the value of a single token: `True`/`False`, `None`, a bracketed
    /// list, a quoted string, an integer, a float, or else a plain string.
    pub fn infer(raw: &str) -> Result<Value, ValueError> {
        let token = raw.trim();
        if let Some(rest) = token.strip_prefix('[') {
            let inner = rest.strip_suffix(']').ok_or(ValueError::UnterminatedList)?;
            return infer_list(inner);
        }
        infer_scalar(token)
    }

    /// Infer the right-hand side of a `key = value` line. Unlike [`Value::infer`],
    /// an unquoted top-level comma makes a list (`lamps = ArI,NeI`).
    pub fn infer_assignment(raw: &str) -> Result<Value, ValueError> {
        let token = raw.trim();
        if token.starts_with('[') {
            return Value::infer(token);
        }
        let parts = split_top_level(token)?;
        if parts.len() > 1 {
            return collect_scalars(&parts);
        }
        infer_scalar(token)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// A list whose every element is numeric.
    pub fn as_f64_list(&self) -> Option<Vec<f64>> {
        self.as_list()?.iter().map(Value::as_f64).collect()
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

fn infer_list(inner: &str) -> Result<Value, ValueError> {
    if inner.trim().is_empty() {
        return Ok(Value::List(Vec::new()));
    }
    collect_scalars(&split_top_level(inner)?)
}

fn collect_scalars(parts: &[&str]) -> Result<Value, ValueError> {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(infer_scalar)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn infer_scalar(raw: &str) -> Result<Value, ValueError> {
    let token = raw.trim();

    if token.starts_with('"') {
        return unescape_double(token)
            .map(Value::Str)
            .ok_or(ValueError::UnterminatedQuote);
    }
    if token.starts_with('\'') {
        if token.len() >= 2 && token.ends_with('\'') {
            return Ok(Value::Str(token[1..token.len() - 1].to_string()));
        }
        return Err(ValueError::UnterminatedQuote);
    }
    if token.starts_with('[') {
        return Err(ValueError::NestedList);
    }

    match token {
        "True" => return Ok(Value::Bool(true)),
        "False" => return Ok(Value::Bool(false)),
        "None" => return Ok(Value::None),
        _ => {}
    }

    if INT_RE.is_match(token) {
        if let Ok(i) = token.parse::<i64>() {
            return Ok(Value::Int(i));
        }
    }
    if INT_RE.is_match(token) || FLOAT_RE.is_match(token) {
        if let Some(f) = token.parse::<f64>().ok().filter(|f| f.is_finite()) {
            return Ok(Value::Float(f));
        }
    }

    Ok(Value::Str(token.to_string()))
}

/// Body of a `"..."` token. Inside double quotes `\"` and `\\` are escapes;
/// any other backslash is literal. `None` without a final unescaped quote.
fn unescape_double(token: &str) -> Option<String> {
    let mut chars = token.strip_prefix('"')?.chars().peekable();
    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some('"' | '\\')) => out.extend(chars.next()),
            '"' if chars.peek().is_none() => return Some(out),
            c => out.push(c),
        }
    }
    None
}

/// Split on commas that are not inside quotes.
fn split_top_level(s: &str) -> Result<Vec<&str>, ValueError> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some('"'), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ',') => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            (None, _) => {}
        }
    }
    if quote.is_some() {
        return Err(ValueError::UnterminatedQuote);
    }
    parts.push(&s[start..]);
    Ok(parts)
}

/// Whether a string must be quoted to read back as the same string.
fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s != s.trim()
        || s.contains([',', '\'', '"'])
        || s.starts_with('[')
        || infer_scalar(s).ok() != Some(Value::Str(s.to_string()))
}

fn fmt_str(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !needs_quotes(s) {
        return f.write_str(s);
    }
    if !s.contains('\'') {
        return write!(f, "'{}'", s);
    }
    f.write_str("\"")?;
    for c in s.chars() {
        if matches!(c, '"' | '\\') {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("\"")
}

/// Canonical literal form; reads back to an equal value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            // Debug keeps a `.0` or exponent, so the literal stays a float.
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => fmt_str(s, f),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bracketed_numbers_make_a_numeric_list() {
        let v = Value::infer("[10.0,10.0]").unwrap();
        assert_eq!(v, Value::List(vec![Value::Float(10.0), Value::Float(10.0)]));
        assert_eq!(v.as_f64_list(), Some(vec![10.0, 10.0]));
    }

    #[test]
    fn capitalized_literals() {
        assert_eq!(Value::infer("True").unwrap(), Value::Bool(true));
        assert_eq!(Value::infer("False").unwrap(), Value::Bool(false));
        assert_eq!(Value::infer("None").unwrap(), Value::None);
        // Lowercase is just a string.
        assert_eq!(Value::infer("true").unwrap(), Value::Str("true".into()));
    }

    #[test]
    fn numeric_inference() {
        assert_eq!(Value::infer("1").unwrap(), Value::Int(1));
        assert_eq!(Value::infer("-3").unwrap(), Value::Int(-3));
        assert_eq!(Value::infer("20.0").unwrap(), Value::Float(20.0));
        assert_eq!(Value::infer(".5").unwrap(), Value::Float(0.5));
        assert_eq!(Value::infer("1e-3").unwrap(), Value::Float(1e-3));
        assert_eq!(Value::infer("nan").unwrap(), Value::Str("nan".into()));
        assert_eq!(Value::infer("600/4310").unwrap(), Value::Str("600/4310".into()));
        assert_eq!(
            Value::infer("99999999999999999999").unwrap(),
            Value::Float(1e20)
        );
    }

    #[test]
    fn quoted_strings_keep_their_text() {
        assert_eq!(Value::infer("'1,1'").unwrap(), Value::Str("1,1".into()));
        assert_eq!(Value::infer("\"True\"").unwrap(), Value::Str("True".into()));
        assert_eq!(Value::infer("'open"), Err(ValueError::UnterminatedQuote));
    }

    #[test]
    fn double_quotes_take_backslash_escapes() {
        assert_eq!(Value::infer(r#""a'b\"c""#).unwrap(), Value::Str("a'b\"c".into()));
        assert_eq!(Value::infer(r#""C:\\raw""#).unwrap(), Value::Str("C:\\raw".into()));
        // Other backslashes are kept.
        assert_eq!(Value::infer(r#""a\b""#).unwrap(), Value::Str("a\\b".into()));
        assert_eq!(Value::infer(r#""open\""#), Err(ValueError::UnterminatedQuote));
        assert_eq!(
            Value::infer_assignment(r#""x\",y", z"#).unwrap(),
            Value::List(vec![Value::Str("x\",y".into()), Value::Str("z".into())])
        );
        assert_eq!(Value::Str("a'b\"c".into()).to_string(), r#""a'b\"c""#);
    }

    #[test]
    fn list_errors() {
        assert_eq!(Value::infer("[1,2"), Err(ValueError::UnterminatedList));
        assert_eq!(Value::infer("[[1],2]"), Err(ValueError::NestedList));
        assert_eq!(Value::infer("[]").unwrap(), Value::List(vec![]));
    }

    #[test]
    fn assignment_commas_make_lists() {
        assert_eq!(
            Value::infer_assignment("ArI, NeI,HgI").unwrap(),
            Value::List(vec![
                Value::Str("ArI".into()),
                Value::Str("NeI".into()),
                Value::Str("HgI".into()),
            ])
        );
        assert_eq!(
            Value::infer_assignment("'a,b'").unwrap(),
            Value::Str("a,b".into())
        );
        assert_eq!(Value::infer_assignment("bspline").unwrap(), Value::Str("bspline".into()));
    }

    #[test]
    fn display_reads_back() {
        let values = vec![
            Value::None,
            Value::Bool(true),
            Value::Int(7),
            Value::Float(10.0),
            Value::Float(1e-5),
            Value::Str("None".into()),
            Value::Str("1,1".into()),
            Value::Str("12".into()),
            Value::Str("".into()),
            Value::Str("bspline".into()),
            Value::Str("it's".into()),
            Value::Str("a'b\"c".into()),
            Value::Str("it's C:\\raw\\".into()),
            Value::List(vec![Value::Float(10.0), Value::Str("a b".into())]),
        ];
        for v in values {
            let text = v.to_string();
            assert_eq!(Value::infer_assignment(&text).unwrap(), v, "literal {text}");
        }
    }
}
