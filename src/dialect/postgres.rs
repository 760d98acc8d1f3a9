// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL dialect.

use crate::dialect::{quote_with, ColumnChange, Dialect, DialectKind};
use crate::migrate::inspect::{normalize_default, normalize_type, ColumnInfo};
use crate::schema::model::{Field, FieldType};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn base_type(field_type: &FieldType) -> String {
        match field_type {
            FieldType::String => "VARCHAR(255)".to_string(),
            FieldType::Int => "INT".to_string(),
            FieldType::Int64 => "BIGINT".to_string(),
            FieldType::Float => "DOUBLE PRECISION".to_string(),
            FieldType::Bool => "BOOLEAN".to_string(),
            FieldType::DateTime => "TIMESTAMPTZ".to_string(),
            FieldType::Decimal => "DECIMAL(65,30)".to_string(),
            FieldType::Json => "JSONB".to_string(),
            FieldType::Array(inner) => format!("{}[]", Self::array_element_type(inner)),
        }
    }

    /// Array elements use the bare catalog names so the introspected
    /// `udt_name` round-trips.
    fn array_element_type(field_type: &FieldType) -> &'static str {
        match field_type {
            FieldType::String => "TEXT",
            FieldType::Int => "INT",
            FieldType::Int64 => "BIGINT",
            FieldType::Float => "DOUBLE PRECISION",
            FieldType::Bool => "BOOLEAN",
            FieldType::DateTime => "TIMESTAMPTZ",
            FieldType::Decimal => "DECIMAL",
            FieldType::Json => "JSONB",
            FieldType::Array(_) => "TEXT",
        }
    }

    fn serial_type(sql_type: &str) -> &'static str {
        if normalize_type(sql_type) == "BIGINT" {
            "BIGSERIAL"
        } else {
            "SERIAL"
        }
    }
}

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["postgres", "postgresql"]
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
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
        true
    }

    fn nulls_ordering(&self, nulls_first: bool) -> Option<&'static str> {
        Some(if nulls_first {
            "NULLS FIRST"
        } else {
            "NULLS LAST"
        })
    }

    fn is_system_index(&self, name: &str) -> bool {
        name.starts_with("pg_") || name.ends_with("_pkey") || name.ends_with("_key")
    }

    fn is_system_table(&self, name: &str) -> bool {
        name.starts_with("pg_") || name == "information_schema"
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
        let type_sql = if col.auto_increment {
            Self::serial_type(&col.sql_type).to_string()
        } else {
            col.sql_type.clone()
        };
        let mut out = format!("{} {}", self.quote_ident(&col.name), type_sql);
        if !col.nullable && !col.primary_key && !col.auto_increment {
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
        _desired_columns: &[ColumnInfo],
        change: &ColumnChange,
    ) -> Vec<String> {
        let table_ident = self.quote_ident(table);
        let col_ident = self.quote_ident(&change.new.name);
        let mut stmts = Vec::new();

        if normalize_type(&change.old.sql_type) != normalize_type(&change.new.sql_type) {
            stmts.push(format!(
                "ALTER TABLE {table_ident} ALTER COLUMN {col_ident} SET DATA TYPE {}",
                change.new.sql_type
            ));
        }
        if change.old.nullable != change.new.nullable {
            let verb = if change.new.nullable { "DROP" } else { "SET" };
            stmts.push(format!(
                "ALTER TABLE {table_ident} ALTER COLUMN {col_ident} {verb} NOT NULL"
            ));
        }
        if normalize_default(change.old.default.as_deref())
            != normalize_default(change.new.default.as_deref())
        {
            match &change.new.default {
                Some(default) => stmts.push(format!(
                    "ALTER TABLE {table_ident} ALTER COLUMN {col_ident} SET DEFAULT {default}"
                )),
                None => stmts.push(format!(
                    "ALTER TABLE {table_ident} ALTER COLUMN {col_ident} DROP DEFAULT"
                )),
            }
        }
        if change.old.unique != change.new.unique {
            let constraint = self.quote_ident(&format!("{}_{}_key", table, change.new.name));
            if change.new.unique {
                stmts.push(format!(
                    "ALTER TABLE {table_ident} ADD CONSTRAINT {constraint} UNIQUE ({col_ident})"
                ));
            } else {
                stmts.push(format!(
                    "ALTER TABLE {table_ident} DROP CONSTRAINT {constraint}"
                ));
            }
        }
        stmts
    }

    fn render_drop_index(&self, _table: &str, index: &str) -> String {
        format!("DROP INDEX {}", self.quote_ident(index))
    }

    fn bytes_literal(&self, bytes: &[u8]) -> String {
        format!("'\\x{}'", crate::dialect::hex_string(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, sql_type: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            nullable: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
        }
    }

    #[test]
    fn positional_placeholders() {
        let d = PostgresDialect;
        assert_eq!(d.placeholder(1), "$1");
        assert_eq!(d.placeholder(12), "$12");
        assert_eq!(d.quote_ident("users"), "\"users\"");
        assert_eq!(d.bool_literal(false), "FALSE");
    }

    #[test]
    fn auto_increment_renders_serial() {
        let d = PostgresDialect;
        let mut id = column("id", "INT");
        id.primary_key = true;
        id.auto_increment = true;
        assert_eq!(d.render_column(&id, true), "\"id\" SERIAL PRIMARY KEY");

        let mut big = column("id", "BIGINT");
        big.primary_key = true;
        big.auto_increment = true;
        assert_eq!(d.render_column(&big, true), "\"id\" BIGSERIAL PRIMARY KEY");
    }

    #[test]
    fn modify_emits_one_statement_per_change() {
        let d = PostgresDialect;
        let mut old = column("age", "INT");
        old.nullable = true;
        old.default = Some("0".to_string());
        let mut new = column("age", "BIGINT");
        new.default = Some("1".to_string());

        let stmts = d.render_modify_column("users", &[], &ColumnChange { old, new });
        assert_eq!(
            stmts,
            [
                "ALTER TABLE \"users\" ALTER COLUMN \"age\" SET DATA TYPE BIGINT",
                "ALTER TABLE \"users\" ALTER COLUMN \"age\" SET NOT NULL",
                "ALTER TABLE \"users\" ALTER COLUMN \"age\" SET DEFAULT 1",
            ]
        );
    }

    #[test]
    fn drop_index_is_unscoped() {
        let d = PostgresDialect;
        assert_eq!(
            d.render_drop_index("users", "idx_users_email"),
            "DROP INDEX \"idx_users_email\""
        );
    }

    #[test]
    fn constraint_implicit_indexes_are_system() {
        let d = PostgresDialect;
        assert!(d.is_system_index("users_pkey"));
        assert!(d.is_system_index("users_email_key"));
        assert!(!d.is_system_index("idx_users_email"));
    }
}
