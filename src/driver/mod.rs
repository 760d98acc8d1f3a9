// SPDX-License-Identifier: Apache-2.0

//! Driver facade.
//!
//! A [`Driver`] bundles the SQL executor, the dialect capability object, the
//! introspector, and the schema registry behind one surface: register
//! schemas, synchronize them, build model queries, run raw SQL, open
//! transactions.

pub mod executor;
pub mod mysql;
pub mod postgres;
pub mod registry;
pub mod sqlite;
pub mod transaction;

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::migrate::inspect::Introspector;
use crate::migrate::sync::{SchemaSync, SyncReport};
use crate::query::builder::ModelQuery;
use crate::schema::mapper::FieldMapper;
use crate::schema::model::Schema;
use crate::schema::{SchemaParser, SchemaRegistry};
use crate::value::Value;

use executor::{ExecResult, ResultSet, SqlExecutor};
use transaction::{Transaction, TxHandle};

pub use registry::{connect, DriverFactory};

/// Pool-level capability of a concrete adapter: execution plus lifecycle.
#[async_trait]
pub trait Connection: SqlExecutor {
    /// Opens a transaction on a dedicated connection.
    async fn begin(&self, ctx: &Context) -> Result<Arc<dyn TxHandle>>;

    /// Issues the dialect's liveness probe.
    async fn ping(&self, ctx: &Context) -> Result<()>;

    /// Closes the underlying pool.
    async fn close(&self) -> Result<()>;
}

/// A connected database with its registered schemas.
pub struct Driver {
    conn: Arc<dyn Connection>,
    dialect: Arc<dyn Dialect>,
    introspector: Arc<dyn Introspector>,
    registry: SchemaRegistry,
    mapper: FieldMapper,
    parser: Option<Arc<dyn SchemaParser>>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver").finish_non_exhaustive()
    }
}

impl Driver {
    pub(crate) fn new(
        conn: Arc<dyn Connection>,
        dialect: Arc<dyn Dialect>,
        introspector: Arc<dyn Introspector>,
    ) -> Self {
        let registry = SchemaRegistry::new();
        let mapper = FieldMapper::new(registry.clone());
        Self {
            conn,
            dialect,
            introspector,
            registry,
            mapper,
            parser: None,
        }
    }

    /// Installs a schema-text parser, enabling [`load_schema`](Self::load_schema).
    pub fn with_schema_parser(mut self, parser: Arc<dyn SchemaParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Validates and registers one schema.
    pub fn register_schema(&self, schema: Schema) -> Result<()> {
        self.registry.register(schema)
    }

    /// Parses schema text through the installed parser and registers every
    /// model it defines.
    pub fn load_schema(&self, source: &str) -> Result<()> {
        let parser = self.parser.as_ref().ok_or_else(|| {
            Error::not_supported("no schema parser installed; use register_schema")
        })?;
        for schema in parser.parse(source)? {
            self.registry.register(schema)?;
        }
        Ok(())
    }

    pub fn load_schema_from(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let source = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::schema_invalid(format!("cannot read schema file: {e}")))?;
        self.load_schema(&source)
    }

    /// Reconciles every registered schema against the live database.
    pub async fn sync_schemas(&self, ctx: &Context) -> Result<SyncReport> {
        let sync = SchemaSync::new(
            self.conn.as_ref(),
            self.dialect.as_ref(),
            self.introspector.as_ref(),
            &self.registry,
        );
        sync.run(ctx).await
    }

    /// A query against one registered model.
    pub fn model(&self, name: impl Into<String>) -> ModelQuery {
        ModelQuery::new(
            self.conn.clone(),
            self.dialect.clone(),
            self.registry.clone(),
            self.mapper.clone(),
            name,
        )
    }

    /// A raw parameterized statement, bypassing the model layer.
    pub fn raw(&self, sql: impl Into<String>, args: Vec<Value>) -> RawQuery {
        RawQuery {
            exec: self.conn.clone(),
            sql: sql.into(),
            args,
        }
    }

    /// Opens a transaction sharing this driver's schema registry.
    pub async fn begin(&self, ctx: &Context) -> Result<Transaction> {
        let handle = self.conn.begin(ctx).await?;
        Ok(Transaction::new(
            handle,
            self.dialect.clone(),
            self.registry.clone(),
            self.mapper.clone(),
        ))
    }

    /// Runs `body` inside a transaction: commit on `Ok`, rollback on `Err`
    /// or panic.
    pub async fn transaction<T, F>(&self, ctx: &Context, body: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t Transaction) -> futures::future::BoxFuture<'t, Result<T>>,
    {
        let tx = self.begin(ctx).await?;
        tx.scope(ctx, body).await
    }

    pub async fn ping(&self, ctx: &Context) -> Result<()> {
        self.conn.ping(ctx).await
    }

    pub async fn close(&self) -> Result<()> {
        self.conn.close().await
    }
}

/// A raw SQL statement with bound arguments.
pub struct RawQuery {
    exec: Arc<dyn SqlExecutor>,
    sql: String,
    args: Vec<Value>,
}

impl RawQuery {
    pub(crate) fn on_executor(exec: Arc<dyn SqlExecutor>, sql: String, args: Vec<Value>) -> Self {
        Self { exec, sql, args }
    }

    pub async fn fetch(&self, ctx: &Context) -> Result<ResultSet> {
        self.exec.query(ctx, &self.sql, &self.args).await
    }

    pub async fn fetch_one(&self, ctx: &Context) -> Result<Option<Vec<Value>>> {
        self.exec.query_row(ctx, &self.sql, &self.args).await
    }

    pub async fn exec(&self, ctx: &Context) -> Result<ExecResult> {
        self.exec.exec(ctx, &self.sql, &self.args).await
    }
}
