//! Typed value mapping and execution over `tokio-postgres`.
//!
//! SQL stays SQL; parameters are named (`@name` placeholders), values
//! cross the wire as the closed [`DbValue`] set, and every operation
//! returns `Result<_, DbError>`. See [`Statement`] for the execution
//! surface and [`DbClient::execute_transaction`] for the atomic batch
//! path.

mod binder;
mod client;
mod config;
mod decode;
mod error;
mod executor;
mod from_row;
mod params;
mod row;
mod statement;
mod transaction;
mod value;

pub mod blocking;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use client::DbClient;
pub use config::ConnectConfig;
pub use error::DbError;
pub use from_row::FromRow;
pub use row::{Columns, Row, RowReader, Table};
pub use statement::{Statement, StatementOptions};
pub use transaction::{ParamSet, TransactionGroup};
pub use value::{DbValue, ValueKind};
