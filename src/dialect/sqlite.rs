// SPDX-License-Identifier: Apache-2.0

//! SQLite dialect.
//!
//! Many in-place ALTERs are historically unavailable, so column modification
//! and removal render a create-new/copy/drop/rename sequence that callers
//! treat as one logical step.

use crate::dialect::{quote_with, ColumnChange, Dialect, DialectKind};
use crate::migrate::inspect::ColumnInfo;
use crate::schema::model::{Field, FieldType};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn base_type(field_type: &FieldType) -> String {
        match field_type {
            FieldType::String => "TEXT".to_string(),
            FieldType::Int => "INTEGER".to_string(),
            FieldType::Int64 => "BIGINT".to_string(),
            FieldType::Float => "REAL".to_string(),
            FieldType::Bool => "BOOLEAN".to_string(),
            FieldType::DateTime => "DATETIME".to_string(),
            FieldType::Decimal => "DECIMAL".to_string(),
            // JSON and arrays are stored as serialized text.
            FieldType::Json | FieldType::Array(_) => "TEXT".to_string(),
        }
    }

    /// CREATE TABLE body used by the rebuild sequence.
    fn build_create(&self, table: &str, columns: &[ColumnInfo]) -> String {
        let pk_count = columns.iter().filter(|c| c.primary_key).count();
        let inline_pk = pk_count <= 1;

        let mut parts: Vec<String> = columns
            .iter()
            .map(|c| self.render_column(c, inline_pk))
            .collect();
        if !inline_pk {
            let pk_cols: Vec<String> = columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| self.quote_ident(&c.name))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
        }
        format!(
            "CREATE TABLE {} ({})",
            self.quote_ident(table),
            parts.join(", ")
        )
    }

    /// The four-statement table rebuild shared by modify and drop.
    fn rebuild(&self, table: &str, desired_columns: &[ColumnInfo]) -> Vec<String> {
        let staging = format!("__new_{table}");
        let copy_list: Vec<String> = desired_columns
            .iter()
            .map(|c| self.quote_ident(&c.name))
            .collect();
        let copy_list = copy_list.join(", ");
        vec![
            self.build_create(&staging, desired_columns),
            format!(
                "INSERT INTO {} ({copy_list}) SELECT {copy_list} FROM {}",
                self.quote_ident(&staging),
                self.quote_ident(table)
            ),
            format!("DROP TABLE {}", self.quote_ident(table)),
            format!(
                "ALTER TABLE {} RENAME TO {}",
                self.quote_ident(&staging),
                self.quote_ident(table)
            ),
        ]
    }
}

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["sqlite", "file"]
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_with(name, '`')
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn supports_default_values(&self) -> bool {
        true
    }

    fn requires_limit_for_offset(&self) -> bool {
        false
    }

    fn supports_distinct_on(&self) -> bool {
        false
    }

    fn nulls_ordering(&self, nulls_first: bool) -> Option<&'static str> {
        Some(if nulls_first {
            "NULLS FIRST"
        } else {
            "NULLS LAST"
        })
    }

    fn is_system_index(&self, name: &str) -> bool {
        name.starts_with("sqlite_")
    }

    fn is_system_table(&self, name: &str) -> bool {
        name.starts_with("sqlite_")
    }

    fn column_type(&self, field: &Field) -> String {
        match &field.native_type {
            Some(native) => native.clone(),
            None => Self::base_type(&field.field_type),
        }
    }

    fn current_timestamp_expr(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn render_column(&self, col: &ColumnInfo, inline_pk: bool) -> String {
        if col.primary_key && col.auto_increment && inline_pk {
            return format!(
                "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                self.quote_ident(&col.name)
            );
        }
        let mut out = format!("{} {}", self.quote_ident(&col.name), col.sql_type);
        if !col.nullable && !col.primary_key {
            out.push_str(" NOT NULL");
        }
        if col.primary_key && inline_pk {
            out.push_str(" PRIMARY KEY");
        }
        if col.unique && !col.primary_key {
            out.push_str(" UNIQUE");
        }
        if let Some(default) = &col.default {
            if !col.auto_increment {
                out.push_str(" DEFAULT ");
                out.push_str(default);
            }
        }
        out
    }

    fn render_modify_column(
        &self,
        table: &str,
        desired_columns: &[ColumnInfo],
        _change: &ColumnChange,
    ) -> Vec<String> {
        self.rebuild(table, desired_columns)
    }

    fn render_drop_column(
        &self,
        table: &str,
        desired_columns: &[ColumnInfo],
        _column: &str,
    ) -> Vec<String> {
        self.rebuild(table, desired_columns)
    }

    fn render_drop_index(&self, _table: &str, index: &str) -> String {
        format!("DROP INDEX {}", self.quote_ident(index))
    }
}
