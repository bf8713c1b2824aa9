//! Cell values and column types.

use chrono::NaiveDateTime;
use std::fmt;

/// The format we use when displaying or serializing timestamps.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single cell in a [`super::RowBuffer`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Boolean(bool),
    Text(String),
    Null,
}

impl Value {
    /// Is this value missing?
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert this value so that it fits in a column of type `ty`.
    ///
    /// `ty` must be the result of [`ColumnType::unify`] with our own type, so
    /// the only conversions we ever need are integer-to-float and
    /// anything-to-text.
    pub(crate) fn widen_to(self, ty: ColumnType) -> Value {
        match (self, ty) {
            (Value::Null, _) => Value::Null,
            (Value::Integer(i), ColumnType::Float) => Value::Float(i as f64),
            (Value::Text(s), ColumnType::Text) => Value::Text(s),
            (value, ColumnType::Text) => Value::Text(value.to_string()),
            (value, _) => value,
        }
    }

    /// Convert this value to JSON, in the form BigQuery expects when loading
    /// newline-delimited JSON.
    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Integer(i) => serde_json::Value::from(*i),
            // Non-finite floats become `null`.
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Timestamp(ts) => {
                serde_json::Value::String(ts.format(TIMESTAMP_FORMAT).to_string())
            }
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            // `{:?}` keeps the trailing `.0` on whole numbers.
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Boolean(true) => write!(f, "True"),
            Value::Boolean(false) => write!(f, "False"),
            Value::Text(s) => write!(f, "{}", s),
            Value::Null => Ok(()),
        }
    }
}

/// The type of an entire column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnType {
    /// We haven't seen any non-null values yet.
    Null,
    Integer,
    Float,
    Timestamp,
    Boolean,
    Text,
}

impl ColumnType {
    /// Find the narrowest type which can hold values of both `self` and
    /// `other`.
    pub fn unify(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (Null, ty) | (ty, Null) => ty,
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Null => "null",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
        };
        name.fmt(f)
    }
}

#[test]
fn unify_widens_numbers_and_falls_back_to_text() {
    use ColumnType::*;
    assert_eq!(Null.unify(Integer), Integer);
    assert_eq!(Boolean.unify(Null), Boolean);
    assert_eq!(Integer.unify(Integer), Integer);
    assert_eq!(Integer.unify(Float), Float);
    assert_eq!(Float.unify(Integer), Float);
    assert_eq!(Integer.unify(Boolean), Text);
    assert_eq!(Timestamp.unify(Float), Text);
    assert_eq!(Null.unify(Null), Null);
}

#[test]
fn widen_converts_values() {
    assert_eq!(Value::Integer(3).widen_to(ColumnType::Float), Value::Float(3.0));
    assert_eq!(
        Value::Boolean(true).widen_to(ColumnType::Text),
        Value::Text("True".to_owned()),
    );
    assert_eq!(
        Value::Float(2.5).widen_to(ColumnType::Text),
        Value::Text("2.5".to_owned()),
    );
    assert_eq!(Value::Null.widen_to(ColumnType::Text), Value::Null);
    assert_eq!(Value::Integer(1).widen_to(ColumnType::Integer), Value::Integer(1));
}

#[test]
fn json_output_matches_bigquery_expectations() {
    use chrono::NaiveDate;

    let ts = NaiveDate::from_ymd_opt(2024, 1, 31)
        .and_then(|d| d.and_hms_opt(13, 5, 0))
        .unwrap();
    assert_eq!(
        Value::Timestamp(ts).to_json(),
        serde_json::json!("2024-01-31 13:05:00"),
    );
    assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
    assert_eq!(Value::Integer(-7).to_json(), serde_json::json!(-7));
    assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
}
