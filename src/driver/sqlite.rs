// SPDX-License-Identifier: Apache-2.0

//! SQLite adapter, built on SQLx.
//!
//! ## Specifics
//!
//! - File-based: the connection URI carries a path (`sqlite:///srv/app.db`)
//!   or `sqlite::memory:` for an in-memory database.
//! - WAL mode and a busy timeout are applied to every connection.
//! - In-memory databases pin the pool to a single connection; each pooled
//!   connection would otherwise see its own empty database.
//!
//! ## Transactions
//!
//! A dedicated connection is acquired from the pool on BEGIN and released on
//! COMMIT/ROLLBACK.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row};
use tokio::sync::Mutex;

use crate::context::Context;
use crate::dialect::SqliteDialect;
use crate::driver::executor::{with_deadline, ExecResult, ResultSet, SqlExecutor};
use crate::driver::registry::{parse_pool_options, DriverFactory, PoolOptions};
use crate::driver::transaction::TxHandle;
use crate::driver::{Connection, Driver};
use crate::error::{ConstraintKind, Error, Result};
use crate::migrate::inspect::SqliteIntrospector;
use crate::value::Value;

/// Registers `sqlite:` / `file:` URIs.
pub struct SqliteFactory;

#[async_trait]
impl DriverFactory for SqliteFactory {
    fn schemes(&self) -> &'static [&'static str] {
        &["sqlite", "file"]
    }

    async fn connect(&self, url: &str) -> Result<Driver> {
        let (path, options) = parse_url(url)?;
        let memory = path == ":memory:";

        let connect_options = if memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| Error::connection_failed(e.to_string()))?
        } else {
            SqliteConnectOptions::new().filename(&path)
        }
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30))
        // Referential actions are opt-in per connection.
        .foreign_keys(true);

        let (max, min) = if memory {
            (1, 1)
        } else {
            (options.max_connections, options.min_connections)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .min_connections(min)
            .acquire_timeout(std::time::Duration::from_secs(options.acquire_timeout_secs))
            .connect_with(connect_options)
            .await
            .map_err(|e| Error::connection_failed(e.to_string()))?;

        Ok(Driver::new(
            Arc::new(SqliteExecutor { pool }),
            Arc::new(SqliteDialect),
            Arc::new(SqliteIntrospector),
        ))
    }
}

/// Extracts the file path and pool options from a connection URI.
fn parse_url(url: &str) -> Result<(String, PoolOptions)> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .or_else(|| url.strip_prefix("file://"))
        .or_else(|| url.strip_prefix("file:"))
        .ok_or_else(|| Error::connection_failed(format!("not a SQLite URI: {url}")))?;

    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    let options = parse_pool_options(query);

    if path.is_empty() {
        return Err(Error::connection_failed("SQLite path cannot be empty"));
    }
    Ok((path.to_string(), options))
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Bytes(b) => query.bind(b.as_slice()),
        Value::DateTime(dt) => query.bind(*dt),
        // SQLite has no decimal type; stored as canonical text.
        Value::Decimal(d) => query.bind(d.to_string()),
        Value::Json(j) => query.bind(j.to_string()),
        Value::Array(arr) => {
            query.bind(serde_json::to_string(arr).unwrap_or_else(|_| "[]".to_string()))
        }
    }
}

/// SQLite types are dynamic per cell, so decoding tries the likely types in
/// order.
fn extract_value(row: &SqliteRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::Text).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(Value::Bytes).unwrap_or(Value::Null);
    }
    Value::Null
}

fn convert_rows(rows: &[SqliteRow]) -> ResultSet {
    let Some(first) = rows.first() else {
        return ResultSet::empty();
    };
    let columns: Vec<String> = first.columns().iter().map(|c| c.name().to_string()).collect();
    let rows = rows
        .iter()
        .map(|row| {
            (0..columns.len())
                .map(|idx| extract_value(row, idx))
                .collect()
        })
        .collect();
    ResultSet { columns, rows }
}

fn translate_error(sql: &str, e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        let message = db.message();
        if message.contains("UNIQUE constraint failed") {
            return Error::constraint(ConstraintKind::Unique, message.to_string());
        }
        if message.contains("FOREIGN KEY constraint failed") {
            return Error::constraint(ConstraintKind::ForeignKey, message.to_string());
        }
        if message.contains("NOT NULL constraint failed") {
            return Error::constraint(ConstraintKind::NotNull, message.to_string());
        }
    }
    Error::sql_exec(sql, e.to_string())
}

fn log_statement(sql: &str, args: &[Value], started: Instant) {
    tracing::debug!(
        target: "ferrite_orm::sql",
        %sql,
        args = args.len(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "executed"
    );
}

/// Pool-backed executor; one connection per outstanding call.
pub struct SqliteExecutor {
    pool: SqlitePool,
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn exec(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult> {
        ctx.check()?;
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in args {
            query = bind_value(query, value);
        }
        let result = with_deadline(ctx, query.execute(&self.pool))
            .await?
            .map_err(|e| translate_error(sql, e))?;
        log_statement(sql, args, started);
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ResultSet> {
        ctx.check()?;
        let started = Instant::now();
        let mut query = sqlx::query(sql);
        for value in args {
            query = bind_value(query, value);
        }
        let rows: Vec<SqliteRow> = with_deadline(ctx, query.fetch_all(&self.pool))
            .await?
            .map_err(|e| translate_error(sql, e))?;
        log_statement(sql, args, started);
        Ok(convert_rows(&rows))
    }
}

#[async_trait]
impl Connection for SqliteExecutor {
    async fn begin(&self, ctx: &Context) -> Result<Arc<dyn TxHandle>> {
        ctx.check()?;
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::connection_failed(e.to_string()))?;
        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| translate_error("BEGIN", e))?;
        Ok(Arc::new(SqliteTransaction {
            conn: Mutex::new(Some(conn)),
        }))
    }

    async fn ping(&self, ctx: &Context) -> Result<()> {
        self.query(ctx, "SELECT 1", &[]).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Holds the dedicated transaction connection until commit or rollback.
pub struct SqliteTransaction {
    conn: Mutex<Option<PoolConnection<Sqlite>>>,
}

impl SqliteTransaction {
    async fn finish(&self, ctx: &Context, sql: &str) -> Result<()> {
        ctx.check()?;
        let mut guard = self.conn.lock().await;
        let mut conn = guard
            .take()
            .ok_or_else(|| Error::tx_aborted("transaction connection already released"))?;
        sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| translate_error(sql, e))?;
        Ok(())
    }
}

#[async_trait]
impl SqlExecutor for SqliteTransaction {
    async fn exec(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult> {
        ctx.check()?;
        let started = Instant::now();
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::tx_aborted("transaction connection already released"))?;
        let mut query = sqlx::query(sql);
        for value in args {
            query = bind_value(query, value);
        }
        let result = with_deadline(ctx, query.execute(&mut **conn))
            .await?
            .map_err(|e| translate_error(sql, e))?;
        log_statement(sql, args, started);
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ResultSet> {
        ctx.check()?;
        let started = Instant::now();
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::tx_aborted("transaction connection already released"))?;
        let mut query = sqlx::query(sql);
        for value in args {
            query = bind_value(query, value);
        }
        let rows: Vec<SqliteRow> = with_deadline(ctx, query.fetch_all(&mut **conn))
            .await?
            .map_err(|e| translate_error(sql, e))?;
        log_statement(sql, args, started);
        Ok(convert_rows(&rows))
    }
}

#[async_trait]
impl TxHandle for SqliteTransaction {
    async fn commit(&self, ctx: &Context) -> Result<()> {
        self.finish(ctx, "COMMIT").await
    }

    async fn rollback(&self, ctx: &Context) -> Result<()> {
        self.finish(ctx, "ROLLBACK").await
    }
}
