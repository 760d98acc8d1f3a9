// SPDX-License-Identifier: Apache-2.0

//! # ferrite-orm
//!
//! A schema-synchronizing ORM core for MySQL, PostgreSQL and SQLite.
//!
//! Declarative model schemas are registered with a [`Driver`], reconciled
//! against the live database by [`Driver::sync_schemas`], and queried through
//! a fluent, dialect-aware compiler:
//!
//! ```no_run
//! use ferrite_orm::{connect, Condition, Context, Field, FieldType, Schema, SortDirection};
//!
//! # async fn demo() -> ferrite_orm::Result<()> {
//! let db = connect("sqlite::memory:").await?;
//! db.register_schema(
//!     Schema::new("User")
//!         .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
//!         .add_field(Field::new("name", FieldType::String))
//!         .add_field(Field::new("age", FieldType::Int).nullable()),
//! )?;
//!
//! let ctx = Context::background();
//! db.sync_schemas(&ctx).await?;
//!
//! let adults = db
//!     .model("User")
//!     .filter(Condition::gte("age", 18))
//!     .order_by("name", SortDirection::Asc)
//!     .find_many(&ctx)
//!     .await?;
//! # let _ = adults;
//! # Ok(())
//! # }
//! ```
//!
//! The crate splits along the same seams as its runtime behavior: `schema`
//! holds the model IR and dependency graph, `dialect` the per-database
//! capability objects, `migrate` the introspect/diff/render pipeline,
//! `query` the condition tree and statement compiler, and `driver` the
//! executors, transactions and the scheme registry.

pub mod context;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod migrate;
pub mod query;
pub mod schema;
pub mod value;

pub use context::Context;
pub use dialect::{Dialect, DialectKind};
pub use driver::executor::{ExecResult, ResultSet, SqlExecutor};
pub use driver::transaction::Transaction;
pub use driver::{connect, Driver, DriverFactory, RawQuery};
pub use error::{ConstraintKind, Error, Result};
pub use migrate::{MigrationPlan, SyncReport, TableInfo};
pub use query::{AggregateFunc, CompareOp, Condition, ModelQuery, SortDirection};
pub use schema::{
    DefaultValue, Field, FieldType, Index, Relation, RelationKind, Schema, SchemaParser,
};
pub use value::{Record, RowData, Value};
