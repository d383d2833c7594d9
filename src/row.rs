use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::value::{DbValue, ValueKind};

/// Column layout shared by every row of one result.
///
/// Names and the name-to-index cache live behind `Arc`s so each [`Row`] costs
/// two pointer clones, not a copy of the header. Lookup is case-sensitive and
/// matches the names exactly as the server reported them.
#[derive(Debug, Clone)]
pub struct Columns {
    names: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

impl Columns {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        Self {
            names: Arc::new(names),
            index: Arc::new(index),
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Index of a column by exact name, or `None` if the result has no such
    /// column. Duplicate names keep the last index; positional access is the
    /// escape hatch for those results.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for Columns {
    fn default() -> Self {
        Columns::new(Vec::new())
    }
}

/// One decoded result row: the shared column layout plus this row's values,
/// in column order. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Columns,
    values: Vec<DbValue>,
}

impl Row {
    #[must_use]
    pub fn new(columns: Columns, values: Vec<DbValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    #[must_use]
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Value of the named column, or `None` if the column does not exist.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DbValue> {
        self.columns.position(name).and_then(|i| self.values.get(i))
    }

    /// Value at a column position, for results with duplicate or generated
    /// names.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&DbValue> {
        self.values.get(index)
    }

    #[must_use]
    pub fn values(&self) -> &[DbValue] {
        &self.values
    }

    /// Borrow this row behind the typed accessor surface.
    #[must_use]
    pub fn reader(&self) -> RowReader<'_> {
        RowReader { row: self }
    }
}

/// A fully buffered query result: the shared column layout and every fetched
/// row in fetch order. An empty result is an empty table, not an error.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Columns,
    rows: Vec<Row>,
}

impl Table {
    #[must_use]
    pub fn new(columns: Columns) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(columns: Columns, capacity: usize) -> Self {
        Self {
            columns,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, values: Vec<DbValue>) {
        self.rows.push(Row::new(self.columns.clone(), values));
    }

    #[must_use]
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl IntoIterator for Table {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Typed read access to one [`Row`].
///
/// One accessor per value case, by column name. The non-suffixed form fails
/// on `Null`; the `_opt` form maps `Null` to `None`. Both fail with
/// [`DbError::ColumnNotFound`] for absent columns and
/// [`DbError::TypeMismatch`] when the active case is something else entirely.
/// Accessors never touch the connection.
#[derive(Debug, Clone, Copy)]
pub struct RowReader<'a> {
    row: &'a Row,
}

// Copy carriers are read out by value, heap carriers by clone. Each arm
// generates the strict accessor and its `_opt` twin.
macro_rules! copy_accessors {
    ($($name:ident / $opt:ident -> $native:ty [$case:ident]),+ $(,)?) => {
        $(
            #[doc = concat!("Read a non-null `", stringify!($case), "` column.")]
            ///
            /// # Errors
            ///
            /// `ColumnNotFound` for an absent column, `TypeMismatch` for any
            /// other active case, including `Null`.
            pub fn $name(&self, column: &str) -> Result<$native, DbError> {
                match self.value(column)? {
                    DbValue::$case(v) => Ok(*v),
                    other => Err(mismatch(column, ValueKind::$case, other)),
                }
            }

            #[doc = concat!("Read a nullable `", stringify!($case), "` column; `Null` becomes `None`.")]
            ///
            /// # Errors
            ///
            /// `ColumnNotFound` for an absent column, `TypeMismatch` for any
            /// other non-null active case.
            pub fn $opt(&self, column: &str) -> Result<Option<$native>, DbError> {
                match self.value(column)? {
                    DbValue::$case(v) => Ok(Some(*v)),
                    DbValue::Null => Ok(None),
                    other => Err(mismatch(column, ValueKind::$case, other)),
                }
            }
        )+
    };
}

macro_rules! owned_accessors {
    ($($name:ident / $opt:ident -> $native:ty [$case:ident]),+ $(,)?) => {
        $(
            #[doc = concat!("Read a non-null `", stringify!($case), "` column.")]
            ///
            /// # Errors
            ///
            /// `ColumnNotFound` for an absent column, `TypeMismatch` for any
            /// other active case, including `Null`.
            pub fn $name(&self, column: &str) -> Result<$native, DbError> {
                match self.value(column)? {
                    DbValue::$case(v) => Ok(v.clone()),
                    other => Err(mismatch(column, ValueKind::$case, other)),
                }
            }

            #[doc = concat!("Read a nullable `", stringify!($case), "` column; `Null` becomes `None`.")]
            ///
            /// # Errors
            ///
            /// `ColumnNotFound` for an absent column, `TypeMismatch` for any
            /// other non-null active case.
            pub fn $opt(&self, column: &str) -> Result<Option<$native>, DbError> {
                match self.value(column)? {
                    DbValue::$case(v) => Ok(Some(v.clone())),
                    DbValue::Null => Ok(None),
                    other => Err(mismatch(column, ValueKind::$case, other)),
                }
            }
        )+
    };
}

fn mismatch(column: &str, expected: ValueKind, actual: &DbValue) -> DbError {
    DbError::TypeMismatch {
        column: column.to_string(),
        expected: expected.as_str(),
        actual: actual.kind(),
    }
}

impl<'a> RowReader<'a> {
    /// The raw value of a column, whatever its case.
    ///
    /// # Errors
    ///
    /// `ColumnNotFound` if the result has no such column.
    pub fn value(&self, column: &str) -> Result<&'a DbValue, DbError> {
        self.row
            .get(column)
            .ok_or_else(|| DbError::ColumnNotFound(column.to_string()))
    }

    copy_accessors! {
        bool / bool_opt -> bool [Bool],
        short / short_opt -> i16 [Short],
        int / int_opt -> i32 [Int],
        long / long_opt -> i64 [Long],
        double / double_opt -> f64 [Double],
        decimal / decimal_opt -> Decimal [Decimal],
        uuid / uuid_opt -> Uuid [Uuid],
        date / date_opt -> NaiveDate [Date],
        time / time_opt -> NaiveTime [Time],
        timestamp / timestamp_opt -> NaiveDateTime [Timestamp],
        timestamp_tz / timestamp_tz_opt -> DateTime<Utc> [TimestampTz],
    }

    owned_accessors! {
        text / text_opt -> String [Text],
        bytea / bytea_opt -> Vec<u8> [Bytea],
        text_array / text_array_opt -> Vec<String> [TextArray],
        int_array / int_array_opt -> Vec<i32> [IntArray],
        jsonb / jsonb_opt -> JsonValue [Jsonb],
        hstore / hstore_opt -> HashMap<String, Option<String>> [HStore],
    }
}
