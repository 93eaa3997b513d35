//! Typed scalar encoding for outgoing messages.
//!
//! Hosts often hand over a list of typed values instead of a string. Each
//! value is rendered in its canonical text form and the results are joined
//! with a single separator character, e.g. `[1, 2.5, "x"]` → `"1 2.5 x"`.

use std::fmt;

/// One outgoing scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// Signed integer, rendered in decimal.
    Int(i64),
    /// Floating-point number, rendered in shortest round-trip form
    /// (`2.5` → `2.5`, `1.0` → `1`).
    Float(f64),
    /// Text, rendered verbatim.
    Text(String),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Atom {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Atom {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Atom {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Goes through `f32`'s own shortest form so `0.1f32` stays `0.1` rather
/// than picking up the digits of its widened `f64` value.
impl From<f32> for Atom {
    fn from(v: f32) -> Self {
        Self::Float(v.to_string().parse().unwrap_or(f64::from(v)))
    }
}

impl From<&str> for Atom {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Atom {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Joins `values` into one message, optionally led by `tag`.
///
/// The tag, when present and non-empty, comes first and is followed by the
/// separator only if at least one value follows. There is never a trailing
/// separator.
#[must_use]
pub fn encode(tag: Option<&str>, values: &[Atom], separator: char) -> String {
    let mut out = String::new();

    if let Some(tag) = tag.filter(|t| !t.is_empty()) {
        out.push_str(tag);
        if !values.is_empty() {
            out.push(separator);
        }
    }

    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(separator);
        }
        out.push_str(&value.to_string());
    }
    out
}
