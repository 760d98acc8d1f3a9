// SPDX-License-Identifier: Apache-2.0

//! MySQL dialect.

use crate::dialect::{quote_with, ColumnChange, Dialect, DialectKind};
use crate::migrate::inspect::ColumnInfo;
use crate::schema::model::{Field, FieldType};

/// Sentinel emitted when the caller paginates with OFFSET but no LIMIT.
pub const OFFSET_SENTINEL_LIMIT: &str = "18446744073709551615";

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    fn base_type(field_type: &FieldType) -> String {
        match field_type {
            FieldType::String => "VARCHAR(255)".to_string(),
            FieldType::Int => "INT".to_string(),
            FieldType::Int64 => "BIGINT".to_string(),
            FieldType::Float => "DOUBLE".to_string(),
            FieldType::Bool => "TINYINT(1)".to_string(),
            FieldType::DateTime => "DATETIME(3)".to_string(),
            FieldType::Decimal => "DECIMAL(65,30)".to_string(),
            // Arrays have no native representation; stored as JSON documents.
            FieldType::Json | FieldType::Array(_) => "JSON".to_string(),
        }
    }
}

impl Dialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["mysql", "mariadb"]
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
        false
    }

    fn supports_default_values(&self) -> bool {
        false
    }

    fn requires_limit_for_offset(&self) -> bool {
        true
    }

    fn supports_distinct_on(&self) -> bool {
        false
    }

    fn is_system_index(&self, name: &str) -> bool {
        name == "PRIMARY"
    }

    fn is_system_table(&self, name: &str) -> bool {
        matches!(
            name,
            "information_schema" | "mysql" | "performance_schema" | "sys"
        )
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

    fn create_table_suffix(&self) -> &'static str {
        " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"
    }

    fn render_column(&self, col: &ColumnInfo, inline_pk: bool) -> String {
        let mut out = format!("{} {}", self.quote_ident(&col.name), col.sql_type);
        if !col.nullable || col.primary_key {
            out.push_str(" NOT NULL");
        }
        // AUTO_INCREMENT must precede PRIMARY KEY.
        if col.auto_increment {
            out.push_str(" AUTO_INCREMENT");
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
        _desired_columns: &[ColumnInfo],
        change: &ColumnChange,
    ) -> Vec<String> {
        // Primary-key status is never re-declared by MODIFY COLUMN; the
        // remaining attributes are restated wholesale.
        vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_ident(table),
            self.render_column(&change.new, false)
        )]
    }

    fn render_drop_index(&self, table: &str, index: &str) -> String {
        format!(
            "ALTER TABLE {} DROP INDEX {}",
            self.quote_ident(table),
            self.quote_ident(index)
        )
    }
}
