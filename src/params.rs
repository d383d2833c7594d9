//! Parameter encoding: [`DbValue`] to the driver's wire format.
//!
//! Each bound value also declares a parameter type for the prepare round
//! trip (`pg_type`), which is what lets a bare `select @p` echo resolve
//! without casts. `Null` and `HStore` declare "unspecified" (OID 0) and the
//! server infers the type from context.

use std::error::Error;

use bytes::BytesMut;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};

use crate::value::DbValue;

impl ToSql for DbValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        // Delegate to the carrier's checked encoder so a value whose case
        // disagrees with the statement's parameter type fails cleanly here
        // instead of sending bytes the server will misread.
        match self {
            DbValue::Null => Ok(IsNull::Yes),
            DbValue::Bool(v) => v.to_sql_checked(ty, out),
            DbValue::Short(v) => v.to_sql_checked(ty, out),
            DbValue::Int(v) => v.to_sql_checked(ty, out),
            DbValue::Long(v) => v.to_sql_checked(ty, out),
            DbValue::Double(v) => v.to_sql_checked(ty, out),
            DbValue::Decimal(v) => v.to_sql_checked(ty, out),
            DbValue::Text(v) => v.to_sql_checked(ty, out),
            DbValue::Bytea(v) => v.to_sql_checked(ty, out),
            DbValue::Uuid(v) => v.to_sql_checked(ty, out),
            DbValue::Date(v) => v.to_sql_checked(ty, out),
            DbValue::Time(v) => v.to_sql_checked(ty, out),
            DbValue::Timestamp(v) => v.to_sql_checked(ty, out),
            DbValue::TimestampTz(v) => v.to_sql_checked(ty, out),
            DbValue::TextArray(v) => v.to_sql_checked(ty, out),
            DbValue::IntArray(v) => v.to_sql_checked(ty, out),
            DbValue::Jsonb(v) => v.to_sql_checked(ty, out),
            DbValue::HStore(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Null must encode against whatever type the server inferred, so the
        // blanket gate stays open; the per-case delegation above rejects real
        // mismatches.
        true
    }

    to_sql_checked!();
}

/// The parameter type declared to the server for a bound value.
pub(crate) fn pg_type(value: &DbValue) -> Type {
    match value {
        // No static OID: hstore is an extension type, and Null adapts to its
        // context. OID 0 tells the server to infer.
        DbValue::Null | DbValue::HStore(_) => unspecified(),
        DbValue::Bool(_) => Type::BOOL,
        DbValue::Short(_) => Type::INT2,
        DbValue::Int(_) => Type::INT4,
        DbValue::Long(_) => Type::INT8,
        DbValue::Double(_) => Type::FLOAT8,
        DbValue::Decimal(_) => Type::NUMERIC,
        DbValue::Text(_) => Type::TEXT,
        DbValue::Bytea(_) => Type::BYTEA,
        DbValue::Uuid(_) => Type::UUID,
        DbValue::Date(_) => Type::DATE,
        DbValue::Time(_) => Type::TIME,
        DbValue::Timestamp(_) => Type::TIMESTAMP,
        DbValue::TimestampTz(_) => Type::TIMESTAMPTZ,
        DbValue::TextArray(_) => Type::TEXT_ARRAY,
        DbValue::IntArray(_) => Type::INT4_ARRAY,
        DbValue::Jsonb(_) => Type::JSONB,
    }
}

pub(crate) fn param_types(values: &[DbValue]) -> Vec<Type> {
    values.iter().map(pg_type).collect()
}

fn unspecified() -> Type {
    Type::new(
        "unspecified".to_string(),
        0,
        Kind::Simple,
        "pg_catalog".to_string(),
    )
}
