// SPDX-License-Identifier: Apache-2.0

//! Transaction runtime.
//!
//! A [`Transaction`] exposes the same model-query surface as the driver but
//! routes every statement through a dedicated connection holding the open
//! transaction. States progress `Open → Committed | RolledBack`; both end
//! states are terminal.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;

use crate::context::Context;
use crate::dialect::Dialect;
use crate::driver::executor::SqlExecutor;
use crate::error::{Error, Result};
use crate::query::builder::ModelQuery;
use crate::schema::mapper::FieldMapper;
use crate::schema::SchemaRegistry;

/// Driver-side handle to one open transaction.
#[async_trait]
pub trait TxHandle: SqlExecutor {
    async fn commit(&self, ctx: &Context) -> Result<()>;
    async fn rollback(&self, ctx: &Context) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Open,
    Committed,
    RolledBack,
}

/// An open transaction bound to the driver's schema registry.
pub struct Transaction {
    handle: Arc<dyn TxHandle>,
    dialect: Arc<dyn Dialect>,
    registry: SchemaRegistry,
    mapper: FieldMapper,
    state: Mutex<TxState>,
}

impl Transaction {
    pub(crate) fn new(
        handle: Arc<dyn TxHandle>,
        dialect: Arc<dyn Dialect>,
        registry: SchemaRegistry,
        mapper: FieldMapper,
    ) -> Self {
        Self {
            handle,
            dialect,
            registry,
            mapper,
            state: Mutex::new(TxState::Open),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match *self.state.lock() {
            TxState::Open => Ok(()),
            TxState::Committed => Err(Error::tx_aborted("transaction already committed")),
            TxState::RolledBack => Err(Error::tx_aborted("transaction already rolled back")),
        }
    }

    /// A query against one model, executing inside this transaction.
    pub fn model(&self, name: impl Into<String>) -> ModelQuery {
        ModelQuery::new(
            self.handle.clone(),
            self.dialect.clone(),
            self.registry.clone(),
            self.mapper.clone(),
            name,
        )
    }

    /// The transaction's raw executor, for statements outside the model
    /// surface.
    pub fn executor(&self) -> Arc<dyn SqlExecutor> {
        self.handle.clone()
    }

    /// A raw parameterized statement executing inside this transaction.
    pub fn raw(&self, sql: impl Into<String>, args: Vec<crate::value::Value>) -> crate::driver::RawQuery {
        crate::driver::RawQuery::on_executor(self.handle.clone(), sql.into(), args)
    }

    pub async fn commit(&self, ctx: &Context) -> Result<()> {
        self.ensure_open()?;
        self.handle
            .commit(ctx)
            .await
            .map_err(|e| Error::commit_failed(e.to_string()))?;
        *self.state.lock() = TxState::Committed;
        Ok(())
    }

    pub async fn rollback(&self, ctx: &Context) -> Result<()> {
        self.ensure_open()?;
        self.handle.rollback(ctx).await?;
        *self.state.lock() = TxState::RolledBack;
        Ok(())
    }

    /// Marks a named savepoint inside the transaction.
    pub async fn savepoint(&self, ctx: &Context, name: &str) -> Result<()> {
        self.ensure_open()?;
        let sql = format!("SAVEPOINT {}", self.dialect.quote_ident(name));
        self.handle.exec(ctx, &sql, &[]).await?;
        Ok(())
    }

    /// Rewinds to a previously marked savepoint; the transaction stays open.
    pub async fn rollback_to(&self, ctx: &Context, name: &str) -> Result<()> {
        self.ensure_open()?;
        let sql = format!("ROLLBACK TO SAVEPOINT {}", self.dialect.quote_ident(name));
        self.handle.exec(ctx, &sql, &[]).await?;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        *self.state.lock() == TxState::Open
    }

    /// Runs `body`, committing on success and rolling back on error or
    /// panic. A panic is resumed after the rollback attempt.
    pub(crate) async fn scope<T, F>(self, ctx: &Context, body: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t Transaction) -> futures::future::BoxFuture<'t, Result<T>>,
    {
        let outcome = std::panic::AssertUnwindSafe(body(&self)).catch_unwind().await;
        match outcome {
            Ok(Ok(value)) => {
                self.commit(ctx).await?;
                Ok(value)
            }
            Ok(Err(cause)) => match self.rollback(ctx).await {
                Ok(()) => Err(cause),
                Err(rollback_err) => Err(Error::tx_aborted(format!(
                    "{cause}; rollback also failed: {rollback_err}"
                ))),
            },
            Err(panic) => {
                if let Err(e) = self.rollback(ctx).await {
                    tracing::warn!(error = %e, "rollback after panic failed");
                }
                std::panic::resume_unwind(panic);
            }
        }
    }
}
