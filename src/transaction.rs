//! Transaction coordinator: several statements, several parameter sets,
//! one atomic outcome.

use tracing::{debug, warn};

use crate::binder::bind_statement;
use crate::client::DbClient;
use crate::error::DbError;
use crate::executor::{self, ExecContext};
use crate::params::param_types;
use crate::value::DbValue;

/// One set of named bindings for a statement inside a transaction. Same
/// rules as the statement builder: the `@` sigil on names is optional and
/// duplicates are rejected when the transaction runs.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    pub(crate) bindings: Vec<(String, DbValue)>,
}

impl ParamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<DbValue>) -> Self {
        self.bindings.push((name.into(), value.into()));
        self
    }
}

/// One statement and the parameter sets to run it with.
///
/// The statement is prepared once per group; the first set fixes the
/// declared parameter types, so every set of a group should bind the same
/// value kinds. A group with no sets runs once with no bindings.
#[derive(Debug, Clone)]
pub struct TransactionGroup {
    pub(crate) sql: String,
    pub(crate) sets: Vec<ParamSet>,
}

impl TransactionGroup {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            sets: Vec::new(),
        }
    }

    /// Add a parameter set; the statement runs once per set, in order.
    #[must_use]
    pub fn with_set(mut self, set: ParamSet) -> Self {
        self.sets.push(set);
        self
    }
}

/// Coordinator lifecycle. Committed and RolledBack are the only terminal
/// states; there is no partial commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Started,
    Executing { group: usize, set: usize },
    Committed,
    RolledBack,
}

impl TxState {
    fn is_terminal(self) -> bool {
        matches!(self, TxState::Committed | TxState::RolledBack)
    }
}

fn transition(state: &mut TxState, next: TxState) {
    debug!(from = ?state, to = ?next, "transaction state");
    *state = next;
}

impl DbClient {
    /// Run every group, in order, inside one database transaction.
    ///
    /// For each group the statement is prepared once and executed once per
    /// parameter set, in order. On commit, every execution's affected-row
    /// count is returned flattened in execution order. Any failure rolls
    /// the whole transaction back and surfaces
    /// [`DbError::TransactionAborted`] naming the failing group and set.
    ///
    /// The connection is exclusively the coordinator's while the
    /// transaction is open; there is no interleaving.
    ///
    /// # Errors
    ///
    /// `TransactionAborted` for any failure during the groups; a commit
    /// that fails server-side returns its classified error directly (the
    /// transaction is gone either way).
    pub async fn execute_transaction(
        &mut self,
        groups: &[TransactionGroup],
    ) -> Result<Vec<usize>, DbError> {
        let ctx = self.exec_context(None);
        let tx = ctx.driver_call(self.client.transaction()).await?;
        let mut state = TxState::Started;
        debug!(groups = groups.len(), "transaction started");

        let outcome = match run_groups(&tx, &ctx, groups, &mut state).await {
            Ok(counts) => {
                ctx.driver_call(tx.commit()).await?;
                transition(&mut state, TxState::Committed);
                debug!(executions = counts.len(), "transaction committed");
                Ok(counts)
            }
            Err((group, set, source)) => {
                transition(&mut state, TxState::RolledBack);
                warn!(group, set, error = %source, "transaction rolled back");
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "explicit rollback failed; the aborted transaction ends with the connection");
                }
                Err(DbError::TransactionAborted {
                    statement_index: group,
                    param_set_index: set,
                    source: Box::new(source),
                })
            }
        };
        debug_assert!(state.is_terminal());
        outcome
    }
}

async fn run_groups(
    tx: &tokio_postgres::Transaction<'_>,
    ctx: &ExecContext,
    groups: &[TransactionGroup],
    state: &mut TxState,
) -> Result<Vec<usize>, (usize, usize, DbError)> {
    let mut counts = Vec::new();
    for (group_index, group) in groups.iter().enumerate() {
        let first = group
            .sets
            .first()
            .map_or(&[][..], |set| set.bindings.as_slice());
        let bound = bind_statement(&group.sql, first).map_err(|e| (group_index, 0, e))?;
        let types = param_types(&bound.values);
        let prepared = executor::prepare(tx, ctx, &bound.sql, &types)
            .await
            .map_err(|e| (group_index, 0, e))?;

        if group.sets.is_empty() {
            transition(
                state,
                TxState::Executing {
                    group: group_index,
                    set: 0,
                },
            );
            let count = executor::execute_prepared(tx, ctx, &prepared, &bound.values)
                .await
                .map_err(|e| (group_index, 0, e))?;
            counts.push(count);
            continue;
        }

        for (set_index, set) in group.sets.iter().enumerate() {
            transition(
                state,
                TxState::Executing {
                    group: group_index,
                    set: set_index,
                },
            );
            let bound = bind_statement(&group.sql, &set.bindings)
                .map_err(|e| (group_index, set_index, e))?;
            let count = executor::execute_prepared(tx, ctx, &prepared, &bound.values)
                .await
                .map_err(|e| (group_index, set_index, e))?;
            counts.push(count);
        }
    }
    Ok(counts)
}
