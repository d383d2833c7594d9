//! Statement descriptor: builder-assembled, executed by a terminal call.

use std::borrow::Cow;
use std::pin::pin;
use std::time::Duration;

use async_stream::try_stream;
use futures_util::{Stream, TryStreamExt};
use tokio_postgres::Statement as PgStatement;
use tracing::debug;

use crate::binder::bind_statement;
use crate::client::DbClient;
use crate::decode::RowDecoder;
use crate::error::DbError;
use crate::executor::{self, ExecContext};
use crate::from_row::FromRow;
use crate::params::param_types;
use crate::row::{RowReader, Table};
use crate::value::DbValue;

/// Per-statement behavior knobs, set through the builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementOptions {
    /// Reuse the prepared statement across calls on this connection,
    /// keyed by text and declared parameter types. Off by default; the
    /// wire protocol still prepares either way, this only adds named reuse.
    pub prepare: bool,
    /// Per-driver-await time limit for the consuming call.
    pub timeout: Option<Duration>,
}

/// A statement under construction: SQL text with `@name` placeholders plus
/// ordered named bindings.
///
/// Building is pure — the network is touched only by the terminal call that
/// consumes the statement. The builder holds the connection `&mut`, so one
/// statement at a time per connection, by construction.
///
/// ```rust,no_run
/// use pg_rowmap::{ConnectConfig, DbClient, DbError};
///
/// # async fn demo(client: &mut DbClient) -> Result<(), DbError> {
/// let inserted = client
///     .statement("insert into users (name, age) values (@name, @age)")
///     .bind("name", "alice")
///     .bind("age", 39_i32)
///     .execute()
///     .await?;
/// assert_eq!(inserted, 1);
/// # Ok(())
/// # }
/// ```
pub struct Statement<'c, 'q> {
    client: &'c mut DbClient,
    sql: Cow<'q, str>,
    bindings: Vec<(String, DbValue)>,
    options: StatementOptions,
}

/// A statement past binding and prepare, holding everything a fetch needs.
struct Ready<'c> {
    client: &'c mut DbClient,
    ctx: ExecContext,
    statement: PgStatement,
    values: Vec<DbValue>,
}

impl<'c, 'q> Statement<'c, 'q> {
    pub(crate) fn new(client: &'c mut DbClient, sql: Cow<'q, str>) -> Self {
        Self {
            client,
            sql,
            bindings: Vec::new(),
            options: StatementOptions::default(),
        }
    }

    /// Bind a value to `@name`. A leading `@` on `name` is accepted and
    /// ignored. Binding the same name twice is not an overwrite; it is a
    /// `Parameter` error surfaced by the terminal call.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<DbValue>) -> Self {
        self.bindings.push((name.into(), value.into()));
        self
    }

    /// Reuse the prepared form of this statement across calls on the same
    /// connection. Worth it for statements executed repeatedly; see
    /// [`StatementOptions::prepare`].
    #[must_use]
    pub fn prepare(mut self, prepare: bool) -> Self {
        self.options.prepare = prepare;
        self
    }

    /// Fail the terminal call with `Timeout` if any driver round trip takes
    /// longer than this. A best-effort cancel request tells the server to
    /// stop working on the statement.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Replace every behavior knob at once.
    #[must_use]
    pub fn options(mut self, options: StatementOptions) -> Self {
        self.options = options;
        self
    }

    /// Bind, rewrite and prepare; shared front half of every terminal call.
    async fn ready(self) -> Result<Ready<'c>, DbError> {
        let Statement {
            client,
            sql,
            bindings,
            options,
        } = self;
        let bound = bind_statement(&sql, &bindings)?;
        let types = param_types(&bound.values);
        let ctx = client.exec_context(options.timeout);
        debug!(sql = %bound.sql, params = bound.values.len(), "executing statement");
        let statement = client
            .prepared(&ctx, &bound.sql, &types, options.prepare)
            .await?;
        Ok(Ready {
            client,
            ctx,
            statement,
            values: bound.values,
        })
    }

    /// Execute and return the affected-row count. No rows are fetched.
    ///
    /// # Errors
    ///
    /// `Parameter` for binding problems, `Statement` when the server rejects
    /// the SQL, `Timeout`/`Connection` for transport trouble.
    pub async fn execute(self) -> Result<usize, DbError> {
        let ready = self.ready().await?;
        executor::execute_prepared(
            &ready.client.client,
            &ready.ctx,
            &ready.statement,
            &ready.values,
        )
        .await
    }

    /// Column 0 of row 0. Extra rows and columns are ignored; they are
    /// dropped with the portal, not buffered.
    ///
    /// # Errors
    ///
    /// `NoResults` when the result is empty, plus the usual execution
    /// failures.
    pub async fn query_scalar(self) -> Result<DbValue, DbError> {
        let ready = self.ready().await?;
        executor::fetch_scalar(
            &ready.client.client,
            &ready.ctx,
            &ready.statement,
            &ready.values,
        )
        .await
    }

    /// Buffer the whole result in fetch order. An empty result is an empty
    /// [`Table`], not an error.
    ///
    /// # Errors
    ///
    /// `Decode` when a column falls outside the supported set, plus the
    /// usual execution failures.
    pub async fn query_table(self) -> Result<Table, DbError> {
        let ready = self.ready().await?;
        executor::fetch_table(
            &ready.client.client,
            &ready.ctx,
            &ready.statement,
            &ready.values,
        )
        .await
    }

    /// Buffer the result and map each row in order. The first mapping
    /// failure aborts the whole read.
    ///
    /// # Errors
    ///
    /// The first accessor or mapping error, plus the usual execution
    /// failures.
    pub async fn query_mapped<T, F>(self, mut map: F) -> Result<Vec<T>, DbError>
    where
        F: FnMut(&RowReader<'_>) -> Result<T, DbError>,
    {
        let table = self.query_table().await?;
        let mut out = Vec::with_capacity(table.len());
        for row in table.iter() {
            out.push(map(&row.reader())?);
        }
        Ok(out)
    }

    /// Like [`query_mapped`](Self::query_mapped) with the mapping supplied
    /// by the row type itself.
    ///
    /// # Errors
    ///
    /// See [`query_mapped`](Self::query_mapped).
    pub async fn query_as<T: FromRow>(self) -> Result<Vec<T>, DbError> {
        self.query_mapped(|reader| T::from_row(reader)).await
    }

    /// Fetch and map rows one at a time from the live portal. Memory stays
    /// flat in the result size; each `next` is a suspension point. The
    /// first driver or mapping failure ends the stream with that error.
    pub fn query_stream<T, F>(self, mut map: F) -> impl Stream<Item = Result<T, DbError>>
    where
        F: FnMut(&RowReader<'_>) -> Result<T, DbError>,
    {
        try_stream! {
            let ready = self.ready().await?;
            let rows = ready
                .ctx
                .driver_call(ready.client.client.query_raw(&ready.statement, ready.values.iter()))
                .await?;
            let mut rows = pin!(rows);
            let decoder = RowDecoder::new(ready.statement.columns(), ready.ctx.policy);
            while let Some(fetched) = ready.ctx.driver_call(rows.try_next()).await? {
                let row = decoder.decode_row(&fetched)?;
                yield map(&row.reader())?;
            }
        }
    }
}
