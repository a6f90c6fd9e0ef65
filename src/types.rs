//! Core value types shared by extractors, the matrix model and the row buffer.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::Number;

use crate::extract::AtomKind;

/// A single matrix cell.
///
/// Integers outside the `i64` range and decimals outside the `f64` range are kept as
/// [`serde_json::Number`], which preserves their exact text.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Missing/empty value.
    Null,
    /// Integer that fits in 64 bits.
    Integer(i64),
    /// Integer beyond 64 bits.
    BigInteger(Number),
    /// Finite 64-bit float.
    Float(f64),
    /// Decimal beyond the range of `f64`.
    Decimal(Number),
    /// UTF-8 text.
    Text(String),
}

/// One ordered row of cells.
pub type Row = Vec<Scalar>;

impl Scalar {
    /// Infer a typed scalar from raw field text.
    ///
    /// Empty text is [`Scalar::Null`]. Otherwise an integral parse is tried first, then a
    /// decimal parse; text matching neither grammar is kept verbatim as [`Scalar::Text`].
    /// Inference never fails.
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Null;
        }

        let text = raw.trim();
        if is_integer_text(text) {
            if let Ok(v) = text.parse::<i64>() {
                return Self::Integer(v);
            }
            if let Some(n) = exact_number(text) {
                return Self::BigInteger(n);
            }
        } else if is_decimal_text(text) {
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() => return Self::Float(v),
                _ => {
                    if let Some(n) = exact_number(text) {
                        return Self::Decimal(n);
                    }
                }
            }
        }

        Self::Text(raw.to_owned())
    }

    /// Classify an already-parsed JSON number.
    pub fn from_number(n: &Number) -> Self {
        if let Some(v) = n.as_i64() {
            return Self::Integer(v);
        }
        if is_integer_text(&n.to_string()) {
            return Self::BigInteger(n.clone());
        }
        match n.as_f64() {
            Some(v) if v.is_finite() => Self::Float(v),
            _ => Self::Decimal(n.clone()),
        }
    }

    /// The atom kind this scalar is emitted as.
    pub fn kind(&self) -> AtomKind {
        match self {
            Self::Null => AtomKind::Null,
            Self::Integer(_) | Self::BigInteger(_) => AtomKind::Integer,
            Self::Float(_) | Self::Decimal(_) => AtomKind::Float,
            Self::Text(_) => AtomKind::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::BigInteger(n) | Self::Decimal(n) => n.serialize(serializer),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Number(n) => Ok(Self::from_number(&n)),
            serde_json::Value::String(s) => Ok(Self::Text(s)),
            other => Err(de::Error::custom(format!(
                "matrix cells must be numbers, strings or null (got {other})"
            ))),
        }
    }
}

// Optional sign followed by one or more ASCII digits.
fn is_integer_text(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

// Optional sign, digits with an optional fraction, optional exponent. At least one mantissa
// digit and at least one of fraction/exponent must be present.
fn is_decimal_text(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.is_none_or(all_digits) {
        return false;
    }
    if int_part.is_empty() && frac_part.is_none_or(str::is_empty) {
        return false;
    }

    match exponent {
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && all_digits(exp)
        }
        None => frac_part.is_some(),
    }
}

// Rewrites a numeral accepted by the grammars above into JSON number syntax: no `+` sign, no
// leading zeros, and at least one digit on each side of the decimal point.
fn exact_number(text: &str) -> Option<Number> {
    let (sign, body) = match text.as_bytes().first() {
        Some(b'-') => ("-", &text[1..]),
        Some(b'+') => ("", &text[1..]),
        _ => ("", text),
    };
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => body.split_at(idx),
        None => (body, ""),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };

    let int_part = int_part.trim_start_matches('0');
    let mut json = String::with_capacity(text.len() + 2);
    json.push_str(sign);
    json.push_str(if int_part.is_empty() { "0" } else { int_part });
    if let Some(frac) = frac_part {
        json.push('.');
        json.push_str(if frac.is_empty() { "0" } else { frac });
    }
    json.push_str(exponent);
    Number::from_str(&json).ok()
}

/// Header band depths written into every emitted matrix document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layout {
    /// Number of leading header rows (`columnHeaders`).
    pub column_headers: usize,
    /// Number of leading header columns per row (`rowHeaders`).
    pub row_headers: usize,
}

impl Layout {
    pub fn new(column_headers: usize, row_headers: usize) -> Self {
        Self {
            column_headers,
            row_headers,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.column_headers, self.row_headers)
    }
}

/// Parses `<columnHeaders>,<rowHeaders>`, e.g. `1,0`.
impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (c, r) = s
            .split_once(',')
            .ok_or_else(|| format!("bad layout '{s}': expected <columnHeaders>,<rowHeaders>"))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| format!("bad layout '{s}': {e}"))
        };
        Ok(Self::new(parse(c)?, parse(r)?))
    }
}
