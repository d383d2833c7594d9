use crate::error::DbError;
use crate::row::RowReader;

/// Maps one row to a caller-owned type through a [`RowReader`].
///
/// Implementations read columns by name with the reader's typed accessors
/// and surface the reader's errors unchanged, so a wrong column name or a
/// mismatched type aborts the mapping with the usual diagnostics.
///
/// ```
/// use pg_rowmap::{DbError, FromRow, RowReader};
///
/// struct Person {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for Person {
///     fn from_row(reader: &RowReader<'_>) -> Result<Self, DbError> {
///         Ok(Self {
///             id: reader.long("id")?,
///             name: reader.text("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Build `Self` from one row.
    ///
    /// # Errors
    ///
    /// Whatever the reader's accessors return, usually
    /// [`DbError::ColumnNotFound`] or [`DbError::TypeMismatch`].
    fn from_row(reader: &RowReader<'_>) -> Result<Self, DbError>;
}
