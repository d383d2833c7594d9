use thiserror::Error;

use crate::value::ValueKind;

/// Failure taxonomy for every operation in this crate.
///
/// Each execution mode returns `Result<_, DbError>`; nothing panics outside
/// of tests and nothing is silently swallowed. Driver faults are classified
/// into this enum at a single conversion point (the `From` impl below).
#[derive(Debug, Error)]
pub enum DbError {
    /// The database could not be reached, authentication failed, or the
    /// connection died mid-call.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server rejected the statement (syntax error, constraint
    /// violation, ...). Carries the SQLSTATE code when the server sent one.
    #[error("statement rejected by server: {message}")]
    Statement {
        code: Option<String>,
        message: String,
    },

    /// A typed accessor was used against a column whose active value case
    /// does not match, including `Null` read through a non-nullable accessor.
    #[error("column `{column}`: expected {expected}, found {actual}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: ValueKind,
    },

    /// A named accessor was used against a column the result does not have.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A scalar or first-row read ran against an empty result.
    #[error("query returned no rows")]
    NoResults,

    /// The configured statement timeout elapsed before the driver round
    /// trip completed.
    #[error("statement timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// One execution inside [`crate::DbClient::execute_transaction`] failed;
    /// the whole transaction was rolled back. The indexes identify the
    /// failing group and parameter set.
    #[error(
        "transaction aborted at statement {statement_index}, parameter set {param_set_index}: {source}"
    )]
    TransactionAborted {
        statement_index: usize,
        param_set_index: usize,
        source: Box<DbError>,
    },

    /// A result column could not be converted into a [`crate::DbValue`]
    /// (unsupported column type, out-of-range value, or an infinite
    /// timestamp with extremes disabled).
    #[error("column `{column}`: {message}")]
    Decode { column: String, message: String },

    /// Parameter binding failed: duplicate/missing/unused names, an invalid
    /// placeholder name, or positional `$N` placeholders in the text.
    #[error("parameter error: {0}")]
    Parameter(String),

    /// Connection configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return DbError::Connection(err.to_string());
        }
        if let Some(db) = err.as_db_error() {
            return DbError::Statement {
                code: Some(db.code().code().to_string()),
                message: db.message().to_string(),
            };
        }
        // Anything else (encode failures, protocol-level trouble) still
        // belongs to the statement that triggered it.
        DbError::Statement {
            code: None,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_column_for_mismatches() {
        let err = DbError::TypeMismatch {
            column: "id".into(),
            expected: "long",
            actual: ValueKind::Text,
        };
        assert_eq!(err.to_string(), "column `id`: expected long, found text");
    }

    #[test]
    fn transaction_abort_reports_position_and_cause() {
        let err = DbError::TransactionAborted {
            statement_index: 1,
            param_set_index: 2,
            source: Box::new(DbError::NoResults),
        };
        let msg = err.to_string();
        assert!(msg.contains("statement 1"));
        assert!(msg.contains("parameter set 2"));
        assert!(msg.contains("no rows"));
    }

    #[test]
    fn timeout_reports_the_configured_limit() {
        let err = DbError::Timeout { millis: 250 };
        assert_eq!(err.to_string(), "statement timed out after 250ms");
    }
}
