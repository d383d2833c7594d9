//! Result decoding: driver rows to [`DbValue`] rows.
//!
//! Dispatch is on the column's declared `Type`. The supported set is closed;
//! a column outside it fails with a `Decode` error naming the column and
//! type rather than falling back to a lossy representation.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tokio_postgres::types::{Date as PgDate, FromSql, Timestamp as PgTimestamp, Type};
use uuid::Uuid;

use crate::error::DbError;
use crate::row::{Columns, Row};
use crate::value::DbValue;

/// How out-of-band temporal values decode.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DecodePolicy {
    /// When set, `infinity`/`-infinity` dates and timestamps map to the
    /// carrier's representable extreme instead of failing.
    pub allow_timestamp_extremes: bool,
}

/// Decodes driver rows that share one column layout.
#[derive(Debug, Clone)]
pub(crate) struct RowDecoder {
    columns: Columns,
    policy: DecodePolicy,
}

impl RowDecoder {
    pub(crate) fn new(columns: &[tokio_postgres::Column], policy: DecodePolicy) -> Self {
        let names = columns.iter().map(|c| c.name().to_string()).collect();
        Self {
            columns: Columns::new(names),
            policy,
        }
    }

    pub(crate) fn columns(&self) -> &Columns {
        &self.columns
    }

    pub(crate) fn decode_row(&self, row: &tokio_postgres::Row) -> Result<Row, DbError> {
        Ok(Row::new(self.columns.clone(), self.decode_values(row)?))
    }

    pub(crate) fn decode_values(&self, row: &tokio_postgres::Row) -> Result<Vec<DbValue>, DbError> {
        let columns = row.columns();
        let mut values = Vec::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            values.push(self.decode_column(row, idx, column.name(), column.type_())?);
        }
        Ok(values)
    }

    /// Decode a single column; index 0 is the scalar read path.
    pub(crate) fn decode_first(&self, row: &tokio_postgres::Row) -> Result<DbValue, DbError> {
        let column = row
            .columns()
            .first()
            .ok_or_else(|| DbError::Decode {
                column: String::new(),
                message: "result has no columns".to_string(),
            })?;
        self.decode_column(row, 0, column.name(), column.type_())
    }

    fn decode_column(
        &self,
        row: &tokio_postgres::Row,
        idx: usize,
        name: &str,
        ty: &Type,
    ) -> Result<DbValue, DbError> {
        let value = match *ty {
            Type::BOOL => fetch::<bool>(row, idx, name)?.map(DbValue::Bool),
            Type::INT2 => fetch::<i16>(row, idx, name)?.map(DbValue::Short),
            Type::INT4 => fetch::<i32>(row, idx, name)?.map(DbValue::Int),
            Type::INT8 => fetch::<i64>(row, idx, name)?.map(DbValue::Long),
            // FLOAT4 widens; f32 -> f64 is exact.
            Type::FLOAT4 => fetch::<f32>(row, idx, name)?.map(|v| DbValue::Double(f64::from(v))),
            Type::FLOAT8 => fetch::<f64>(row, idx, name)?.map(DbValue::Double),
            Type::NUMERIC => fetch::<Decimal>(row, idx, name)?.map(DbValue::Decimal),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
                fetch::<String>(row, idx, name)?.map(DbValue::Text)
            }
            Type::BYTEA => fetch::<Vec<u8>>(row, idx, name)?.map(DbValue::Bytea),
            Type::UUID => fetch::<Uuid>(row, idx, name)?.map(DbValue::Uuid),
            Type::DATE => match fetch::<PgDate<NaiveDate>>(row, idx, name)? {
                None => None,
                Some(PgDate::Value(v)) => Some(DbValue::Date(v)),
                Some(PgDate::PosInfinity) => {
                    Some(DbValue::Date(infinite_date(self.policy, name, true)?))
                }
                Some(PgDate::NegInfinity) => {
                    Some(DbValue::Date(infinite_date(self.policy, name, false)?))
                }
            },
            Type::TIME => fetch::<NaiveTime>(row, idx, name)?.map(DbValue::Time),
            Type::TIMESTAMP => match fetch::<PgTimestamp<NaiveDateTime>>(row, idx, name)? {
                None => None,
                Some(PgTimestamp::Value(v)) => Some(DbValue::Timestamp(v)),
                Some(PgTimestamp::PosInfinity) => Some(DbValue::Timestamp(infinite_timestamp(
                    self.policy,
                    name,
                    true,
                )?)),
                Some(PgTimestamp::NegInfinity) => Some(DbValue::Timestamp(infinite_timestamp(
                    self.policy,
                    name,
                    false,
                )?)),
            },
            Type::TIMESTAMPTZ => match fetch::<PgTimestamp<DateTime<Utc>>>(row, idx, name)? {
                None => None,
                Some(PgTimestamp::Value(v)) => Some(DbValue::TimestampTz(v)),
                Some(PgTimestamp::PosInfinity) => Some(DbValue::TimestampTz(
                    infinite_timestamp_tz(self.policy, name, true)?,
                )),
                Some(PgTimestamp::NegInfinity) => Some(DbValue::TimestampTz(
                    infinite_timestamp_tz(self.policy, name, false)?,
                )),
            },
            Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY => {
                fetch::<Vec<String>>(row, idx, name)?.map(DbValue::TextArray)
            }
            Type::INT4_ARRAY => fetch::<Vec<i32>>(row, idx, name)?.map(DbValue::IntArray),
            Type::JSON | Type::JSONB => fetch::<JsonValue>(row, idx, name)?.map(DbValue::Jsonb),
            _ if ty.name() == "hstore" => {
                fetch::<HashMap<String, Option<String>>>(row, idx, name)?.map(DbValue::HStore)
            }
            _ => return Err(unsupported(name, ty)),
        };
        Ok(value.unwrap_or(DbValue::Null))
    }
}

fn fetch<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    idx: usize,
    name: &str,
) -> Result<Option<T>, DbError> {
    row.try_get::<_, Option<T>>(idx).map_err(|e| DbError::Decode {
        column: name.to_string(),
        message: e.to_string(),
    })
}

fn unsupported(column: &str, ty: &Type) -> DbError {
    DbError::Decode {
        column: column.to_string(),
        message: format!("unsupported column type `{ty}`"),
    }
}

fn extremes_disabled(column: &str) -> DbError {
    DbError::Decode {
        column: column.to_string(),
        message: "value is infinity; enable allow_timestamp_extremes to read it".to_string(),
    }
}

fn infinite_timestamp(
    policy: DecodePolicy,
    column: &str,
    positive: bool,
) -> Result<NaiveDateTime, DbError> {
    if !policy.allow_timestamp_extremes {
        return Err(extremes_disabled(column));
    }
    Ok(if positive {
        NaiveDateTime::MAX
    } else {
        NaiveDateTime::MIN
    })
}

fn infinite_timestamp_tz(
    policy: DecodePolicy,
    column: &str,
    positive: bool,
) -> Result<DateTime<Utc>, DbError> {
    if !policy.allow_timestamp_extremes {
        return Err(extremes_disabled(column));
    }
    Ok(if positive {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    })
}

fn infinite_date(policy: DecodePolicy, column: &str, positive: bool) -> Result<NaiveDate, DbError> {
    if !policy.allow_timestamp_extremes {
        return Err(extremes_disabled(column));
    }
    Ok(if positive {
        NaiveDate::MAX
    } else {
        NaiveDate::MIN
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinity_fails_with_extremes_disabled() {
        let policy = DecodePolicy::default();
        let err = infinite_timestamp(policy, "born", true).unwrap_err();
        match err {
            DbError::Decode { column, message } => {
                assert_eq!(column, "born");
                assert!(message.contains("allow_timestamp_extremes"));
            }
            other => panic!("expected Decode, got {other:?}"),
        }
        assert!(infinite_timestamp_tz(policy, "born", false).is_err());
        assert!(infinite_date(policy, "born", true).is_err());
    }

    #[test]
    fn infinity_maps_to_carrier_extremes_when_enabled() {
        let policy = DecodePolicy {
            allow_timestamp_extremes: true,
        };
        assert_eq!(
            infinite_timestamp(policy, "t", true).unwrap(),
            NaiveDateTime::MAX
        );
        assert_eq!(
            infinite_timestamp(policy, "t", false).unwrap(),
            NaiveDateTime::MIN
        );
        assert_eq!(
            infinite_timestamp_tz(policy, "t", true).unwrap(),
            DateTime::<Utc>::MAX_UTC
        );
        assert_eq!(infinite_date(policy, "t", false).unwrap(), NaiveDate::MIN);
    }

    #[test]
    fn unsupported_type_error_names_column_and_type() {
        let err = unsupported("spanned", &Type::INTERVAL);
        let msg = err.to_string();
        assert!(msg.contains("spanned"));
        assert!(msg.contains("interval"));
    }
}
