//! Synchronous facade for callers without an async runtime of their own.
//!
//! [`DbSession`] owns a current-thread tokio runtime together with a
//! [`DbClient`] and mirrors every operation by blocking on it. One session
//! is one connection; nothing here spawns threads.

use std::borrow::Cow;
use std::pin::pin;

use futures_util::TryStreamExt;
use tokio::runtime::{Builder, Runtime};

use crate::client::DbClient;
use crate::config::ConnectConfig;
use crate::error::DbError;
use crate::from_row::FromRow;
use crate::row::{RowReader, Table};
use crate::statement::Statement;
use crate::transaction::TransactionGroup;
use crate::value::DbValue;

/// A blocking database session.
///
/// ```no_run
/// use pg_rowmap::blocking::DbSession;
/// use pg_rowmap::ConnectConfig;
///
/// # fn main() -> Result<(), pg_rowmap::DbError> {
/// let config = ConnectConfig::new()
///     .host("localhost")
///     .dbname("app")
///     .user("app");
/// let mut session = DbSession::connect(&config)?;
/// let count = session
///     .statement("update widgets set sold = true where id = @id")
///     .bind("id", 7_i32)
///     .execute()?;
/// # let _ = count;
/// # Ok(())
/// # }
/// ```
pub struct DbSession {
    runtime: Runtime,
    client: DbClient,
}

impl DbSession {
    /// Connect and hold the runtime that drives the connection.
    ///
    /// # Errors
    ///
    /// [`DbError::Config`] for invalid configuration or a runtime that
    /// cannot be built, [`DbError::Connection`] when the server cannot be
    /// reached.
    pub fn connect(config: &ConnectConfig) -> Result<Self, DbError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbError::Config(format!("blocking runtime: {e}")))?;
        let client = runtime.block_on(DbClient::connect(config))?;
        Ok(Self { runtime, client })
    }

    /// Start a blocking statement against this session's connection.
    pub fn statement<'s, 'q>(&'s mut self, sql: impl Into<Cow<'q, str>>) -> BlockingStatement<'s, 'q> {
        let Self { runtime, client } = self;
        BlockingStatement {
            runtime: &*runtime,
            statement: client.statement(sql),
        }
    }

    /// Blocking mirror of [`DbClient::execute_many`].
    ///
    /// # Errors
    ///
    /// The first failing statement's error; earlier statements stay
    /// committed.
    pub fn execute_many(&mut self, statements: &[&str]) -> Result<Vec<Table>, DbError> {
        let Self { runtime, client } = self;
        runtime.block_on(client.execute_many(statements))
    }

    /// Blocking mirror of [`DbClient::execute_script`].
    ///
    /// # Errors
    ///
    /// The driver's classified error if any statement of the script fails.
    pub fn execute_script(&mut self, script: &str) -> Result<(), DbError> {
        let Self { runtime, client } = self;
        runtime.block_on(client.execute_script(script))
    }

    /// Blocking mirror of [`DbClient::execute_transaction`].
    ///
    /// # Errors
    ///
    /// [`DbError::TransactionAborted`] naming the failing group and set.
    pub fn execute_transaction(
        &mut self,
        groups: &[TransactionGroup],
    ) -> Result<Vec<usize>, DbError> {
        let Self { runtime, client } = self;
        runtime.block_on(client.execute_transaction(groups))
    }

    /// Whether the underlying connection has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

/// A [`Statement`] whose terminal operations block on the session runtime.
pub struct BlockingStatement<'c, 'q> {
    runtime: &'c Runtime,
    statement: Statement<'c, 'q>,
}

impl<'c, 'q> BlockingStatement<'c, 'q> {
    /// Bind `@name` to a value; see [`Statement::bind`].
    #[must_use]
    pub fn bind(self, name: impl Into<String>, value: impl Into<DbValue>) -> Self {
        let Self { runtime, statement } = self;
        Self {
            runtime,
            statement: statement.bind(name, value),
        }
    }

    /// See [`Statement::prepare`].
    #[must_use]
    pub fn prepare(self, prepare: bool) -> Self {
        let Self { runtime, statement } = self;
        Self {
            runtime,
            statement: statement.prepare(prepare),
        }
    }

    /// See [`Statement::timeout`].
    #[must_use]
    pub fn timeout(self, timeout: std::time::Duration) -> Self {
        let Self { runtime, statement } = self;
        Self {
            runtime,
            statement: statement.timeout(timeout),
        }
    }

    /// See [`Statement::options`].
    #[must_use]
    pub fn options(self, options: crate::StatementOptions) -> Self {
        let Self { runtime, statement } = self;
        Self {
            runtime,
            statement: statement.options(options),
        }
    }

    /// Blocking mirror of [`Statement::execute`].
    ///
    /// # Errors
    ///
    /// Same as the async operation.
    pub fn execute(self) -> Result<usize, DbError> {
        let Self { runtime, statement } = self;
        runtime.block_on(statement.execute())
    }

    /// Blocking mirror of [`Statement::query_scalar`].
    ///
    /// # Errors
    ///
    /// Same as the async operation.
    pub fn query_scalar(self) -> Result<DbValue, DbError> {
        let Self { runtime, statement } = self;
        runtime.block_on(statement.query_scalar())
    }

    /// Blocking mirror of [`Statement::query_table`].
    ///
    /// # Errors
    ///
    /// Same as the async operation.
    pub fn query_table(self) -> Result<Table, DbError> {
        let Self { runtime, statement } = self;
        runtime.block_on(statement.query_table())
    }

    /// Blocking mirror of [`Statement::query_mapped`].
    ///
    /// # Errors
    ///
    /// Same as the async operation.
    pub fn query_mapped<T, F>(self, map: F) -> Result<Vec<T>, DbError>
    where
        F: FnMut(&RowReader<'_>) -> Result<T, DbError>,
    {
        let Self { runtime, statement } = self;
        runtime.block_on(statement.query_mapped(map))
    }

    /// Blocking mirror of [`Statement::query_as`].
    ///
    /// # Errors
    ///
    /// Same as the async operation.
    pub fn query_as<T: FromRow>(self) -> Result<Vec<T>, DbError> {
        let Self { runtime, statement } = self;
        runtime.block_on(statement.query_as::<T>())
    }

    /// Visit each row as it arrives, without buffering the result.
    ///
    /// The blocking counterpart of [`Statement::query_stream`]: rows are
    /// fetched and handed to `visit` one at a time, and the first visitor
    /// or driver failure ends the read with that error.
    ///
    /// # Errors
    ///
    /// Same as the async streaming operation.
    pub fn query_each<F>(self, mut visit: F) -> Result<(), DbError>
    where
        F: FnMut(&RowReader<'_>) -> Result<(), DbError>,
    {
        let Self { runtime, statement } = self;
        runtime.block_on(async move {
            let stream = statement.query_stream(move |reader| visit(reader));
            let mut stream = pin!(stream);
            while (stream.try_next().await?).is_some() {}
            Ok(())
        })
    }
}
