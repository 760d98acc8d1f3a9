// SPDX-License-Identifier: Apache-2.0

//! Wire-level executor abstraction.
//!
//! The core never talks to a database driver directly; everything funnels
//! through [`SqlExecutor`], implemented by each adapter's pool wrapper and by
//! open transactions. That is what lets the query compiler, introspectors and
//! the migrator run unchanged on either.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::Result;
use crate::value::Value;

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Auto-generated key, where the driver reports one (MySQL, SQLite).
    pub last_insert_id: Option<i64>,
}

/// Column-ordered result rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn first(&self) -> Option<&Vec<Value>> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Runs a driver future under the context's deadline, if any.
pub(crate) async fn with_deadline<T>(
    ctx: &Context,
    fut: impl std::future::Future<Output = T>,
) -> Result<T> {
    match ctx.remaining() {
        Some(remaining) => tokio::time::timeout(remaining, fut)
            .await
            .map_err(|_| crate::error::Error::DeadlineExceeded),
        None => Ok(fut.await),
    }
}

/// Parameterized SQL execution against a connection or open transaction.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Executes a statement, returning affected rows and any generated key.
    async fn exec(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult>;

    /// Runs a query and materializes all rows.
    async fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ResultSet>;

    /// Runs a query expected to yield at most one row.
    async fn query_row(
        &self,
        ctx: &Context,
        sql: &str,
        args: &[Value],
    ) -> Result<Option<Vec<Value>>> {
        let rs = self.query(ctx, sql, args).await?;
        Ok(rs.rows.into_iter().next())
    }
}
