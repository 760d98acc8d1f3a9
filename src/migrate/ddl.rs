// SPDX-License-Identifier: Apache-2.0

//! Plan-to-SQL rendering.
//!
//! One generic algorithm parameterized by the dialect capability object.
//! Statement order follows the plan's bucket order; each bucket delegates
//! its column definitions to the dialect's single column-rendering hook.

use std::collections::HashSet;

use crate::dialect::Dialect;
use crate::migrate::inspect::IndexInfo;
use crate::migrate::planner::{desired_columns, MigrationPlan};
use crate::schema::model::Schema;
use crate::schema::SchemaRegistry;

pub struct DdlRenderer<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> DdlRenderer<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Renders the full `CREATE TABLE` statement for a schema.
    ///
    /// Foreign-key clauses are emitted for owning relations whose target is
    /// registered; unresolvable targets are skipped, which is what lets the
    /// two-phase circular-dependency path create tables at all.
    pub fn generate_create_table(&self, schema: &Schema, registry: &SchemaRegistry) -> String {
        self.generate_create_table_filtered(schema, registry, None)
    }

    /// `CREATE TABLE` with FK clauses additionally suppressed for the given
    /// targets (tables that do not exist yet during a two-phase sync).
    pub fn generate_create_table_filtered(
        &self,
        schema: &Schema,
        registry: &SchemaRegistry,
        skip_fk_targets: Option<&HashSet<String>>,
    ) -> String {
        let table = schema.table_name();
        let columns = desired_columns(self.dialect, schema);
        let pk_count = columns.iter().filter(|c| c.primary_key).count();
        let inline_pk = pk_count <= 1;

        let mut parts: Vec<String> = columns
            .iter()
            .map(|c| self.dialect.render_column(c, inline_pk))
            .collect();

        if !inline_pk {
            let pk_cols: Vec<String> = columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| self.dialect.quote_ident(&c.name))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
        }

        for relation in schema.relations.iter().filter(|r| r.is_owning()) {
            if let Some(skip) = skip_fk_targets {
                if skip.contains(&relation.target) {
                    continue;
                }
            }
            let Ok(target) = registry.get(&relation.target) else {
                continue;
            };
            let Some(fk_field) = &relation.foreign_key else {
                continue;
            };
            let Some(local_col) = schema.field(fk_field).map(|f| f.column_name().to_string())
            else {
                continue;
            };
            let referenced_col = match &relation.references {
                Some(field) => target.field(field).map(|f| f.column_name().to_string()),
                None => target
                    .single_primary_key()
                    .map(|f| f.column_name().to_string()),
            };
            let Some(referenced_col) = referenced_col else {
                tracing::warn!(
                    relation = %relation.name,
                    target = %relation.target,
                    "skipping foreign key with unresolvable referenced column"
                );
                continue;
            };

            let mut clause = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                self.dialect.quote_ident(&local_col),
                self.dialect.quote_ident(&target.table_name()),
                self.dialect.quote_ident(&referenced_col)
            );
            if let Some(action) = &relation.on_delete {
                clause.push_str(&format!(" ON DELETE {action}"));
            }
            if let Some(action) = &relation.on_update {
                clause.push_str(&format!(" ON UPDATE {action}"));
            }
            parts.push(clause);
        }

        format!(
            "CREATE TABLE {} ({}){}",
            self.dialect.quote_ident(&table),
            parts.join(", "),
            self.dialect.create_table_suffix()
        )
    }

    pub fn generate_add_column(
        &self,
        table: &str,
        column: &crate::migrate::inspect::ColumnInfo,
    ) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.dialect.quote_ident(table),
            self.dialect.render_column(column, false)
        )
    }

    pub fn generate_create_index(&self, table: &str, index: &IndexInfo) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| self.dialect.quote_ident(c))
            .collect();
        format!(
            "CREATE {unique}INDEX {} ON {} ({})",
            self.dialect.quote_ident(&index.name),
            self.dialect.quote_ident(table),
            columns.join(", ")
        )
    }

    pub fn generate_drop_index(&self, table: &str, index: &str) -> String {
        self.dialect.render_drop_index(table, index)
    }

    /// Renders a plan into its ordered statement list.
    ///
    /// `schema` is the desired schema of the (single) table the plan covers;
    /// rebuild-style dialects need the full target column list.
    pub fn render_plan(
        &self,
        plan: &MigrationPlan,
        schema: &Schema,
        registry: &SchemaRegistry,
    ) -> Vec<String> {
        let desired = desired_columns(self.dialect, schema);
        let mut stmts = Vec::new();

        for _table in &plan.create_tables {
            stmts.push(self.generate_create_table(schema, registry));
        }
        for add in &plan.add_columns {
            stmts.push(self.generate_add_column(&add.table, &add.column));
        }
        for modify in &plan.modify_columns {
            stmts.extend(
                self.dialect
                    .render_modify_column(&modify.table, &desired, &modify.change),
            );
        }
        for drop in &plan.drop_columns {
            stmts.extend(
                self.dialect
                    .render_drop_column(&drop.table, &desired, &drop.column),
            );
        }
        for add in &plan.add_indexes {
            stmts.push(self.generate_create_index(&add.table, &add.index));
        }
        for drop in &plan.drop_indexes {
            stmts.push(self.generate_drop_index(&drop.table, &drop.index));
        }
        stmts
    }
}
