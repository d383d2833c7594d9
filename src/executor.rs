//! Driver round trips shared by the client and the transaction coordinator.
//!
//! Everything here is generic over [`GenericClient`] so the same prepare,
//! execute and fetch paths serve both a plain connection and an open
//! transaction. Each round trip goes through [`ExecContext::driver_call`],
//! which applies the configured timeout and issues a best-effort cancel
//! request when it expires.

use std::pin::pin;
use std::time::Duration;

use futures_util::TryStreamExt;
use tokio_postgres::types::Type;
use tokio_postgres::{CancelToken, GenericClient, NoTls, Statement};
use tracing::warn;

use crate::decode::{DecodePolicy, RowDecoder};
use crate::error::DbError;
use crate::row::Table;
use crate::value::DbValue;

/// Per-call execution state: cancel handle, timeout, decode policy. Owned
/// and cloneable so it can outlive a borrow of the client inside a stream.
#[derive(Clone)]
pub(crate) struct ExecContext {
    pub cancel: CancelToken,
    pub timeout: Option<Duration>,
    pub policy: DecodePolicy,
}

impl ExecContext {
    /// Run one driver future under the configured timeout.
    ///
    /// On expiry the in-flight call is abandoned, a cancel request goes out
    /// on a fresh connection so the server stops working too, and the caller
    /// gets [`DbError::Timeout`]. Without a timeout this is a plain await.
    pub(crate) async fn driver_call<T, F>(&self, fut: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, tokio_postgres::Error>>,
    {
        let Some(limit) = self.timeout else {
            return Ok(fut.await?);
        };
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                if let Err(e) = self.cancel.cancel_query(NoTls).await {
                    warn!(error = %e, "cancel request after timeout failed");
                }
                Err(DbError::Timeout {
                    millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }
}

/// Prepare with declared parameter types, which is what lets a bare
/// `select $1` resolve without casts.
pub(crate) async fn prepare<C: GenericClient>(
    client: &C,
    ctx: &ExecContext,
    sql: &str,
    types: &[Type],
) -> Result<Statement, DbError> {
    ctx.driver_call(client.prepare_typed(sql, types)).await
}

/// Execute without fetching rows; returns the affected-row count.
pub(crate) async fn execute_prepared<C: GenericClient>(
    client: &C,
    ctx: &ExecContext,
    statement: &Statement,
    values: &[DbValue],
) -> Result<usize, DbError> {
    let count = ctx
        .driver_call(client.execute_raw(statement, values.iter()))
        .await?;
    usize::try_from(count).map_err(|e| DbError::Statement {
        code: None,
        message: format!("affected row count out of range: {e}"),
    })
}

/// Fetch every row into a [`Table`], in fetch order. Column names come from
/// the statement metadata, so an empty result still carries its layout.
pub(crate) async fn fetch_table<C: GenericClient>(
    client: &C,
    ctx: &ExecContext,
    statement: &Statement,
    values: &[DbValue],
) -> Result<Table, DbError> {
    let rows = ctx
        .driver_call(client.query_raw(statement, values.iter()))
        .await?;
    let mut rows = pin!(rows);
    let decoder = RowDecoder::new(statement.columns(), ctx.policy);
    let mut table = Table::new(decoder.columns().clone());
    while let Some(row) = ctx.driver_call(rows.try_next()).await? {
        table.push(decoder.decode_values(&row)?);
    }
    Ok(table)
}

/// Column 0 of row 0; the rest of the result is dropped with the stream.
pub(crate) async fn fetch_scalar<C: GenericClient>(
    client: &C,
    ctx: &ExecContext,
    statement: &Statement,
    values: &[DbValue],
) -> Result<DbValue, DbError> {
    let rows = ctx
        .driver_call(client.query_raw(statement, values.iter()))
        .await?;
    let mut rows = pin!(rows);
    let decoder = RowDecoder::new(statement.columns(), ctx.policy);
    match ctx.driver_call(rows.try_next()).await? {
        Some(row) => decoder.decode_first(&row),
        None => Err(DbError::NoResults),
    }
}
