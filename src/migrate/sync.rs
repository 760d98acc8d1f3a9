// SPDX-License-Identifier: Apache-2.0

//! Schema synchronization.
//!
//! Orders registered models by their dependency graph, introspects the live
//! database, and applies the planned DDL model by model. A detected cycle
//! falls back to a two-phase pass: create every missing table first (with
//! foreign keys to not-yet-created tables suppressed), then diff-update the
//! rest. Execution stops at the first failing statement; already-applied
//! statements stay applied — there is no DDL rollback on MySQL.

use std::collections::HashSet;

use chrono::Utc;

use crate::context::Context;
use crate::dialect::Dialect;
use crate::driver::executor::SqlExecutor;
use crate::error::{Error, Result};
use crate::migrate::ddl::DdlRenderer;
use crate::migrate::inspect::Introspector;
use crate::migrate::planner::Planner;
use crate::schema::graph::toposort;
use crate::schema::model::{Field, FieldType, Schema};
use crate::schema::SchemaRegistry;

/// Default name of the applied-migrations log table.
pub const MIGRATION_LOG_TABLE: &str = "_migrations";

/// What a sync run did, per table.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub tables_created: Vec<String>,
    pub tables_updated: Vec<String>,
    pub statements_executed: usize,
}

/// One schema-synchronization run.
pub struct SchemaSync<'a> {
    exec: &'a dyn SqlExecutor,
    dialect: &'a dyn Dialect,
    introspector: &'a dyn Introspector,
    registry: &'a SchemaRegistry,
}

impl<'a> SchemaSync<'a> {
    pub fn new(
        exec: &'a dyn SqlExecutor,
        dialect: &'a dyn Dialect,
        introspector: &'a dyn Introspector,
        registry: &'a SchemaRegistry,
    ) -> Self {
        Self {
            exec,
            dialect,
            introspector,
            registry,
        }
    }

    pub async fn run(&self, ctx: &Context) -> Result<SyncReport> {
        let snapshot = self.registry.snapshot();
        if snapshot.is_empty() {
            return Ok(SyncReport::default());
        }

        let mut report = SyncReport::default();
        match toposort(&snapshot) {
            Ok(order) => {
                for name in &order {
                    ctx.check()?;
                    let schema = self.registry.get(name)?;
                    self.sync_model(ctx, &schema, None, &mut report).await?;
                }
            }
            Err(Error::CircularDependency { model }) => {
                tracing::warn!(model = %model, "relation cycle detected, using two-phase sync");
                self.run_two_phase(ctx, &snapshot, &mut report).await?;
            }
            Err(e) => return Err(e),
        }

        if report.statements_executed > 0 {
            self.record_migrations(ctx, &report).await;
        }
        Ok(report)
    }

    /// Create-all-missing first, then diff the tables that already existed.
    async fn run_two_phase(
        &self,
        ctx: &Context,
        snapshot: &[std::sync::Arc<Schema>],
        report: &mut SyncReport,
    ) -> Result<()> {
        let mut missing: HashSet<String> = HashSet::new();
        for schema in snapshot {
            if !self
                .introspector
                .table_exists(ctx, self.exec, &schema.table_name())
                .await?
            {
                missing.insert(schema.name.clone());
            }
        }

        let mut pending = missing.clone();
        for schema in snapshot {
            ctx.check()?;
            if missing.contains(&schema.name) {
                pending.remove(&schema.name);
                self.sync_model(ctx, schema, Some(&pending), report).await?;
            }
        }
        for schema in snapshot {
            ctx.check()?;
            if !missing.contains(&schema.name) {
                self.sync_model(ctx, schema, None, report).await?;
            }
        }
        Ok(())
    }

    async fn sync_model(
        &self,
        ctx: &Context,
        schema: &Schema,
        skip_fk_targets: Option<&HashSet<String>>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let table = schema.table_name();
        let planner = Planner::new(self.dialect);
        let renderer = DdlRenderer::new(self.dialect);

        let exists = self
            .introspector
            .table_exists(ctx, self.exec, &table)
            .await?;

        let statements = if exists {
            let existing = self
                .introspector
                .describe_table(ctx, self.exec, &table)
                .await
                .map_err(|e| Error::plan_failed(&schema.name, e.to_string()))?;
            let plan = planner
                .plan_table(&existing, schema)
                .map_err(|e| Error::plan_failed(&schema.name, e.to_string()))?;
            renderer.render_plan(&plan, schema, self.registry)
        } else {
            let mut stmts = vec![renderer.generate_create_table_filtered(
                schema,
                self.registry,
                skip_fk_targets,
            )];
            let plan = planner.plan_create(schema);
            for add in &plan.add_indexes {
                stmts.push(renderer.generate_create_index(&add.table, &add.index));
            }
            stmts
        };

        let executed = self.execute(ctx, &schema.name, &statements).await?;
        report.statements_executed += executed;
        if executed > 0 {
            if exists {
                report.tables_updated.push(table);
            } else {
                report.tables_created.push(table);
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, model: &str, statements: &[String]) -> Result<usize> {
        let mut executed = 0;
        for sql in statements {
            let trimmed = sql.trim();
            if trimmed.is_empty() || trimmed.starts_with("--") {
                continue;
            }
            ctx.check()?;
            tracing::debug!(target: "ferrite_orm::migrate", %model, sql = %trimmed, "applying");
            self.exec
                .exec(ctx, trimmed, &[])
                .await
                .map_err(|e| Error::migration_failed(model, trimmed, e.to_string()))?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Appends one log row per affected table, creating the log table on
    /// first use. Best-effort: a failure here never fails the sync.
    async fn record_migrations(&self, ctx: &Context, report: &SyncReport) {
        if let Err(e) = self.try_record_migrations(ctx, report).await {
            tracing::warn!(error = %e, "failed to record applied migrations");
        }
    }

    async fn try_record_migrations(&self, ctx: &Context, report: &SyncReport) -> Result<()> {
        let exists = self
            .introspector
            .table_exists(ctx, self.exec, MIGRATION_LOG_TABLE)
            .await?;
        if !exists {
            let log_schema = Schema::new("MigrationLog")
                .table(MIGRATION_LOG_TABLE)
                .add_field(Field::new("name", FieldType::String).primary_key())
                .add_field(Field::new("applied_at", FieldType::DateTime));
            let sql = DdlRenderer::new(self.dialect)
                .generate_create_table(&log_schema, &SchemaRegistry::new());
            self.exec.exec(ctx, &sql, &[]).await?;
        }

        let stamp = Utc::now();
        let sql = format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            self.dialect.quote_ident(MIGRATION_LOG_TABLE),
            self.dialect.quote_ident("name"),
            self.dialect.quote_ident("applied_at"),
            self.dialect.placeholder(1),
            self.dialect.placeholder(2),
        );
        for table in report
            .tables_created
            .iter()
            .chain(report.tables_updated.iter())
        {
            let name = format!("{}_{}", table, stamp.format("%Y%m%d%H%M%S%3f"));
            self.exec
                .exec(
                    ctx,
                    &sql,
                    &[
                        crate::value::Value::Text(name),
                        crate::value::Value::DateTime(stamp),
                    ],
                )
                .await?;
        }
        Ok(())
    }
}
