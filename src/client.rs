//! The connection handle.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use tokio_postgres::types::{Oid, Type};
use tokio_postgres::{NoTls, Statement as PgStatement};
use tracing::{debug, warn};

use crate::binder::bind_statement;
use crate::config::ConnectConfig;
use crate::decode::DecodePolicy;
use crate::error::DbError;
use crate::executor::{self, ExecContext};
use crate::row::Table;
use crate::statement::Statement;

/// Prepared statements are reused per (rewritten text, declared parameter
/// types); the same text bound with different value kinds prepares again.
type StatementKey = (String, Vec<Oid>);

/// One database connection.
///
/// Wraps the driver client and its spawned background connection task. All
/// execution goes through `&mut self`, so a connection runs one statement at
/// a time and completions observe program order. The connection closes when
/// the client is dropped.
pub struct DbClient {
    pub(crate) client: tokio_postgres::Client,
    pub(crate) policy: DecodePolicy,
    statements: HashMap<StatementKey, PgStatement>,
}

impl DbClient {
    /// Connect with the given settings. The only network-touching
    /// constructor; everything else operates on the established connection.
    ///
    /// # Errors
    ///
    /// `Config` when required settings are missing, `Connection` when the
    /// server cannot be reached or refuses the credentials.
    pub async fn connect(config: &ConnectConfig) -> Result<Self, DbError> {
        let pg_config = config.build_pg_config()?;
        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await
                && !e.is_closed()
            {
                warn!(error = %e, "connection task ended with error");
            }
        });
        debug!("connection established");
        Ok(Self {
            client,
            policy: config.decode_policy(),
            statements: HashMap::new(),
        })
    }

    /// Start building a statement against this connection. The builder
    /// borrows the connection exclusively until a terminal call consumes it.
    pub fn statement<'c, 'q>(&'c mut self, sql: impl Into<Cow<'q, str>>) -> Statement<'c, 'q> {
        Statement::new(self, sql.into())
    }

    /// Run statements sequentially, one implicit transaction each, and
    /// return their results in order.
    ///
    /// Statement *i + 1* starts only after *i* completes. The first failure
    /// stops the run and is returned; earlier statements stay committed.
    /// There is no rollback here — that is what
    /// [`execute_transaction`](Self::execute_transaction) is for.
    ///
    /// # Errors
    ///
    /// The first failing statement's error, or `Parameter` if any text
    /// carries placeholders (this path takes no bindings).
    pub async fn execute_many(&mut self, statements: &[&str]) -> Result<Vec<Table>, DbError> {
        let ctx = self.exec_context(None);
        debug!(count = statements.len(), "running statement sequence");
        let mut tables = Vec::with_capacity(statements.len());
        for sql in statements {
            let bound = bind_statement(sql, &[])?;
            let prepared = executor::prepare(&self.client, &ctx, &bound.sql, &[]).await?;
            tables.push(executor::fetch_table(&self.client, &ctx, &prepared, &[]).await?);
        }
        Ok(tables)
    }

    /// Run a multi-statement SQL script in a single round trip (simple
    /// protocol, one implicit transaction). Useful for schema setup; no
    /// parameters and no results.
    ///
    /// # Errors
    ///
    /// `Statement` when the server rejects any part of the script.
    pub async fn execute_script(&mut self, script: &str) -> Result<(), DbError> {
        let ctx = self.exec_context(None);
        ctx.driver_call(self.client.batch_execute(script)).await
    }

    /// True when the server connection is gone; every operation will fail
    /// with `Connection` from here on.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    pub(crate) fn exec_context(&self, timeout: Option<Duration>) -> ExecContext {
        ExecContext {
            cancel: self.client.cancel_token(),
            timeout,
            policy: self.policy,
        }
    }

    /// Prepare `sql` with declared types, reusing the connection-local cache
    /// when `reuse` is set.
    pub(crate) async fn prepared(
        &mut self,
        ctx: &ExecContext,
        sql: &str,
        types: &[Type],
        reuse: bool,
    ) -> Result<PgStatement, DbError> {
        if !reuse {
            return executor::prepare(&self.client, ctx, sql, types).await;
        }
        let key = (sql.to_string(), types.iter().map(Type::oid).collect());
        if let Some(statement) = self.statements.get(&key) {
            return Ok(statement.clone());
        }
        let statement = executor::prepare(&self.client, ctx, sql, types).await?;
        self.statements.insert(key, statement.clone());
        Ok(statement)
    }
}
