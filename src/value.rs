use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A single database value: exactly one case is active, and no case converts
/// implicitly into another.
///
/// The same enum is used for bound parameters and decoded result columns, so
/// application code never touches driver types directly:
/// ```rust
/// use pg_rowmap::DbValue;
///
/// let v = DbValue::from(42_i64);
/// assert_eq!(v.as_long(), Some(42));
/// assert!(DbValue::Null.is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    /// SQL NULL
    Null,
    /// BOOL
    Bool(bool),
    /// SMALLINT (16-bit)
    Short(i16),
    /// INTEGER (32-bit)
    Int(i32),
    /// BIGINT (64-bit)
    Long(i64),
    /// DOUBLE PRECISION (64-bit binary float)
    Double(f64),
    /// NUMERIC, fixed-point; never passes through a binary float
    Decimal(Decimal),
    /// TEXT / VARCHAR
    Text(String),
    /// BYTEA
    Bytea(Vec<u8>),
    /// UUID
    Uuid(Uuid),
    /// DATE
    Date(NaiveDate),
    /// TIME (no time zone)
    Time(NaiveTime),
    /// TIMESTAMP (no time zone)
    Timestamp(NaiveDateTime),
    /// TIMESTAMPTZ, normalized to UTC
    TimestampTz(DateTime<Utc>),
    /// TEXT[]
    TextArray(Vec<String>),
    /// INTEGER[]
    IntArray(Vec<i32>),
    /// JSONB, carried as the parsed document
    Jsonb(JsonValue),
    /// hstore: keys to nullable values
    HStore(HashMap<String, Option<String>>),
}

/// Names a [`DbValue`] case without carrying its payload. Used in error
/// reporting, where the payload would only add noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Short,
    Int,
    Long,
    Double,
    Decimal,
    Text,
    Bytea,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    TextArray,
    IntArray,
    Jsonb,
    HStore,
}

impl ValueKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Short => "short",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Double => "double",
            ValueKind::Decimal => "decimal",
            ValueKind::Text => "text",
            ValueKind::Bytea => "bytea",
            ValueKind::Uuid => "uuid",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::Timestamp => "timestamp",
            ValueKind::TimestampTz => "timestamptz",
            ValueKind::TextArray => "text[]",
            ValueKind::IntArray => "int[]",
            ValueKind::Jsonb => "jsonb",
            ValueKind::HStore => "hstore",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DbValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The active case, for error reporting and dispatch.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            DbValue::Null => ValueKind::Null,
            DbValue::Bool(_) => ValueKind::Bool,
            DbValue::Short(_) => ValueKind::Short,
            DbValue::Int(_) => ValueKind::Int,
            DbValue::Long(_) => ValueKind::Long,
            DbValue::Double(_) => ValueKind::Double,
            DbValue::Decimal(_) => ValueKind::Decimal,
            DbValue::Text(_) => ValueKind::Text,
            DbValue::Bytea(_) => ValueKind::Bytea,
            DbValue::Uuid(_) => ValueKind::Uuid,
            DbValue::Date(_) => ValueKind::Date,
            DbValue::Time(_) => ValueKind::Time,
            DbValue::Timestamp(_) => ValueKind::Timestamp,
            DbValue::TimestampTz(_) => ValueKind::TimestampTz,
            DbValue::TextArray(_) => ValueKind::TextArray,
            DbValue::IntArray(_) => ValueKind::IntArray,
            DbValue::Jsonb(_) => ValueKind::Jsonb,
            DbValue::HStore(_) => ValueKind::HStore,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let DbValue::Bool(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_short(&self) -> Option<i16> {
        if let DbValue::Short(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        if let DbValue::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_long(&self) -> Option<i64> {
        if let DbValue::Long(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        if let DbValue::Double(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        if let DbValue::Decimal(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let DbValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bytea(&self) -> Option<&[u8]> {
        if let DbValue::Bytea(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        if let DbValue::Uuid(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        if let DbValue::Date(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_time(&self) -> Option<NaiveTime> {
        if let DbValue::Time(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let DbValue::Timestamp(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp_tz(&self) -> Option<DateTime<Utc>> {
        if let DbValue::TimestampTz(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text_array(&self) -> Option<&[String]> {
        if let DbValue::TextArray(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_int_array(&self) -> Option<&[i32]> {
        if let DbValue::IntArray(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_jsonb(&self) -> Option<&JsonValue> {
        if let DbValue::Jsonb(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_hstore(&self) -> Option<&HashMap<String, Option<String>>> {
        if let DbValue::HStore(value) = self {
            Some(value)
        } else {
            None
        }
    }
}

// One native type, one case. Conversions are total; partiality lives only in
// the `as_*` direction.
impl From<bool> for DbValue {
    fn from(value: bool) -> Self {
        DbValue::Bool(value)
    }
}

impl From<i16> for DbValue {
    fn from(value: i16) -> Self {
        DbValue::Short(value)
    }
}

impl From<i32> for DbValue {
    fn from(value: i32) -> Self {
        DbValue::Int(value)
    }
}

impl From<i64> for DbValue {
    fn from(value: i64) -> Self {
        DbValue::Long(value)
    }
}

impl From<f64> for DbValue {
    fn from(value: f64) -> Self {
        DbValue::Double(value)
    }
}

impl From<Decimal> for DbValue {
    fn from(value: Decimal) -> Self {
        DbValue::Decimal(value)
    }
}

impl From<String> for DbValue {
    fn from(value: String) -> Self {
        DbValue::Text(value)
    }
}

impl From<&str> for DbValue {
    fn from(value: &str) -> Self {
        DbValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(value: Vec<u8>) -> Self {
        DbValue::Bytea(value)
    }
}

impl From<&[u8]> for DbValue {
    fn from(value: &[u8]) -> Self {
        DbValue::Bytea(value.to_vec())
    }
}

impl From<Uuid> for DbValue {
    fn from(value: Uuid) -> Self {
        DbValue::Uuid(value)
    }
}

impl From<NaiveDate> for DbValue {
    fn from(value: NaiveDate) -> Self {
        DbValue::Date(value)
    }
}

impl From<NaiveTime> for DbValue {
    fn from(value: NaiveTime) -> Self {
        DbValue::Time(value)
    }
}

impl From<NaiveDateTime> for DbValue {
    fn from(value: NaiveDateTime) -> Self {
        DbValue::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for DbValue {
    fn from(value: DateTime<Utc>) -> Self {
        DbValue::TimestampTz(value)
    }
}

impl From<Vec<String>> for DbValue {
    fn from(value: Vec<String>) -> Self {
        DbValue::TextArray(value)
    }
}

impl From<Vec<i32>> for DbValue {
    fn from(value: Vec<i32>) -> Self {
        DbValue::IntArray(value)
    }
}

impl From<JsonValue> for DbValue {
    fn from(value: JsonValue) -> Self {
        DbValue::Jsonb(value)
    }
}

impl From<HashMap<String, Option<String>>> for DbValue {
    fn from(value: HashMap<String, Option<String>>) -> Self {
        DbValue::HStore(value)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DbValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_is_deterministic_per_native_type() {
        assert_eq!(DbValue::from(true).kind(), ValueKind::Bool);
        assert_eq!(DbValue::from(1_i16).kind(), ValueKind::Short);
        assert_eq!(DbValue::from(1_i32).kind(), ValueKind::Int);
        assert_eq!(DbValue::from(1_i64).kind(), ValueKind::Long);
        assert_eq!(DbValue::from(1.5_f64).kind(), ValueKind::Double);
        assert_eq!(DbValue::from("x").kind(), ValueKind::Text);
        assert_eq!(DbValue::from(vec![1_u8]).kind(), ValueKind::Bytea);
        assert_eq!(DbValue::from(Uuid::nil()).kind(), ValueKind::Uuid);
        assert_eq!(
            DbValue::from(vec!["a".to_string()]).kind(),
            ValueKind::TextArray
        );
        assert_eq!(DbValue::from(vec![1_i32, 2]).kind(), ValueKind::IntArray);
        assert_eq!(
            DbValue::from(serde_json::json!({"k": 1})).kind(),
            ValueKind::Jsonb
        );
    }

    #[test]
    fn option_none_becomes_null() {
        assert_eq!(DbValue::from(None::<i64>), DbValue::Null);
        assert_eq!(DbValue::from(Some(7_i64)), DbValue::Long(7));
    }

    #[test]
    fn accessors_are_partial() {
        let v = DbValue::Long(9);
        assert_eq!(v.as_long(), Some(9));
        assert_eq!(v.as_int(), None);
        assert_eq!(v.as_text(), None);

        let t = DbValue::Text("abc".into());
        assert_eq!(t.as_text(), Some("abc"));
        assert_eq!(t.as_long(), None);
    }

    #[test]
    fn no_implicit_numeric_widening() {
        // An INT4 payload is not readable as Long; the caller converts
        // explicitly if widening is what they want.
        assert_eq!(DbValue::Int(5).as_long(), None);
        assert_eq!(DbValue::Short(5).as_int(), None);
    }

    #[test]
    fn decimal_round_trips_without_float() {
        let d: Decimal = "12.5".parse().unwrap();
        let v = DbValue::from(d);
        assert_eq!(v.as_decimal(), Some(d));
        assert_eq!(v.as_double(), None);
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ValueKind::TimestampTz.to_string(), "timestamptz");
        assert_eq!(ValueKind::TextArray.to_string(), "text[]");
        assert_eq!(ValueKind::HStore.to_string(), "hstore");
    }
}
