//! Column value normalization.
//!
//! The stream collaborator hands over [`RawValue`]s that may still carry
//! temporal or arbitrary-precision decimal payloads. [`normalize`] turns them
//! into [`Value`]s, which are plain numeric or string literals and are the
//! only thing statement rendering ever looks at.

use std::borrow::Cow;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// Canonical rendering for temporal values.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A column value as decoded from a binlog row image.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Byte strings; rendered as UTF-8 (lossy) text.
    Bytes(Vec<u8>),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    /// MySQL TIME, which may be negative and exceed 24 hours.
    Time {
        negative: bool,
        days: u32,
        hours: u8,
        minutes: u8,
        seconds: u8,
    },
    /// Anything the collaborator could not decode, kept as its textual form.
    Opaque(String),
}

/// A normalized scalar: NULL, a numeric literal or a string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

/// Normalize a raw column value. Never fails.
pub fn normalize(raw: RawValue) -> Value {
    match raw {
        RawValue::Null => Value::Null,
        RawValue::Int(i) => Value::Int(i),
        RawValue::UInt(u) => Value::UInt(u),
        RawValue::Float(f) => Value::Float(f),
        RawValue::Text(s) => Value::Text(s),
        RawValue::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        },
        RawValue::Decimal(d) => Value::Text(d.to_string()),
        RawValue::DateTime(dt) => Value::Text(dt.format(DATETIME_FORMAT).to_string()),
        RawValue::Date(d) => Value::Text(d.format("%Y-%m-%d 00:00:00").to_string()),
        RawValue::Time {
            negative,
            days,
            hours,
            minutes,
            seconds,
        } => {
            let total_hours = u64::from(days) * 24 + u64::from(hours);
            let sign = if negative { "-" } else { "" };
            Value::Text(format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}"))
        }
        RawValue::Opaque(s) => Value::Text(s),
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Non-null and parses as a finite floating-point number.
    pub fn is_number(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(_) | Value::UInt(_) => true,
            Value::Float(f) => f.is_finite(),
            Value::Text(s) => s.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false),
        }
    }

    /// NULL, empty string and numeric zero.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Int(i) => *i == 0,
            Value::UInt(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
        }
    }

    /// Unquoted textual form, used for length checks and numeric rendering.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed("NULL"),
            Value::Int(i) => Cow::Owned(i.to_string()),
            Value::UInt(u) => Cow::Owned(u.to_string()),
            Value::Float(f) => Cow::Owned(f.to_string()),
            Value::Text(s) => Cow::Borrowed(s),
        }
    }

    /// SQL literal: numeric values bare, everything else quoted and escaped.
    pub fn literal(&self) -> String {
        if self.is_null() {
            return "NULL".to_string();
        }
        let text = self.text();
        if self.is_number() {
            text.into_owned()
        } else {
            format!("'{}'", crate::predicate::escape_string(&text))
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

/// Ordered column → value mapping for one row image.
///
/// Order is the table's column order, which keeps rendered SQL deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowImage {
    columns: Vec<(String, Value)>,
}

impl RowImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for RowImage {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_temporal_values_render_canonical_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap();
        assert_eq!(
            normalize(RawValue::DateTime(dt)),
            Value::Text("2024-03-07 09:05:01".to_string())
        );

        let d = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(
            normalize(RawValue::Date(d)),
            Value::Text("1999-12-31 00:00:00".to_string())
        );
    }

    #[test]
    fn test_decimal_keeps_scale_without_exponent() {
        let d = Decimal::from_str("1200.50").unwrap();
        assert_eq!(normalize(RawValue::Decimal(d)), Value::Text("1200.50".to_string()));

        let tiny = Decimal::from_str("0.000000001").unwrap();
        assert_eq!(
            normalize(RawValue::Decimal(tiny)),
            Value::Text("0.000000001".to_string())
        );
    }

    #[test]
    fn test_time_values() {
        let v = normalize(RawValue::Time {
            negative: true,
            days: 1,
            hours: 2,
            minutes: 3,
            seconds: 4,
        });
        assert_eq!(v, Value::Text("-26:03:04".to_string()));
    }

    #[test]
    fn test_primitives_pass_through() {
        assert_eq!(normalize(RawValue::Null), Value::Null);
        assert_eq!(normalize(RawValue::Int(-3)), Value::Int(-3));
        assert_eq!(normalize(RawValue::UInt(7)), Value::UInt(7));
        assert_eq!(normalize(RawValue::Float(1.5)), Value::Float(1.5));
        assert_eq!(
            normalize(RawValue::Bytes(b"bob".to_vec())),
            Value::Text("bob".to_string())
        );
        assert_eq!(
            normalize(RawValue::Opaque("{\"a\":1}".to_string())),
            Value::Text("{\"a\":1}".to_string())
        );
    }

    #[test]
    fn test_invalid_utf8_degrades_instead_of_failing() {
        let v = normalize(RawValue::Bytes(vec![0x61, 0xff, 0x62]));
        assert_eq!(v, Value::Text("a\u{fffd}b".to_string()));
    }

    #[test]
    fn test_is_number() {
        assert!(Value::from("42").is_number());
        assert!(Value::from("-4.25").is_number());
        assert!(Value::from("1e3").is_number());
        assert!(!Value::from("42a").is_number());
        assert!(!Value::from("").is_number());
        assert!(!Value::from("inf").is_number());
        assert!(!Value::Null.is_number());
        assert!(Value::Int(0).is_number());
        assert!(!Value::Float(f64::NAN).is_number());
    }

    #[test]
    fn test_literal_quoting() {
        assert_eq!(Value::from("42").literal(), "42");
        assert_eq!(Value::from("42a").literal(), "'42a'");
        assert_eq!(Value::from("O'Brien").literal(), "'O\\'Brien'");
        assert_eq!(Value::Int(5).literal(), "5");
    }

    #[test]
    fn test_falsy() {
        assert!(Value::Null.is_falsy());
        assert!(Value::Int(0).is_falsy());
        assert!(Value::from("").is_falsy());
        assert!(!Value::from("0").is_falsy());
        assert!(!Value::Int(1).is_falsy());
    }

    #[test]
    fn test_row_image_keeps_column_order() {
        let row: RowImage = vec![("z", Value::Int(1)), ("a", Value::Int(2))]
            .into_iter()
            .collect();
        let names: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["z", "a"]);
        assert_eq!(row.get("a"), Some(&Value::Int(2)));
        assert_eq!(row.get("missing"), None);
    }
}
