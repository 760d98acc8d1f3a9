// SPDX-License-Identifier: Apache-2.0

//! Per-dialect SQL capabilities.
//!
//! Everything the dialect-agnostic core needs to know about syntactic
//! variation lives behind the [`Dialect`] trait: identifier quoting,
//! placeholder style, literals, NULL ordering, RETURNING support, and the
//! column-definition hooks used by the DDL renderer. All methods are pure.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use serde::{Deserialize, Serialize};

use crate::migrate::inspect::ColumnInfo;
use crate::schema::model::{DefaultValue, Field};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    MySql,
    Postgres,
    Sqlite,
}

/// A change to one column, carrying both sides for the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnChange {
    pub old: ColumnInfo,
    pub new: ColumnInfo,
}

/// Capability object exposing one dialect's SQL variation to the core.
pub trait Dialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    /// URI schemes handled by this dialect's driver.
    fn schemes(&self) -> &'static [&'static str];

    fn quote_ident(&self, name: &str) -> String;

    /// Placeholder for the 1-based argument position.
    fn placeholder(&self, index: usize) -> String;

    fn bool_literal(&self, value: bool) -> &'static str;

    fn supports_returning(&self) -> bool;

    fn supports_default_values(&self) -> bool;

    /// True when `OFFSET` is only valid after an explicit `LIMIT`.
    fn requires_limit_for_offset(&self) -> bool;

    fn supports_distinct_on(&self) -> bool;

    /// `NULLS FIRST` / `NULLS LAST`, or `None` where unsupported.
    fn nulls_ordering(&self, nulls_first: bool) -> Option<&'static str> {
        let _ = nulls_first;
        None
    }

    /// Catalog or constraint-implicit indexes that must never enter a plan.
    fn is_system_index(&self, name: &str) -> bool;

    fn is_system_table(&self, name: &str) -> bool;

    // ---- DDL hooks -------------------------------------------------------

    /// Canonical column type for a logical field type.
    fn column_type(&self, field: &Field) -> String;

    fn current_timestamp_expr(&self) -> &'static str;

    /// Trailing clause appended to `CREATE TABLE` statements.
    fn create_table_suffix(&self) -> &'static str {
        ""
    }

    /// One column definition in the dialect's required token order.
    ///
    /// `inline_pk` is false when the primary key is emitted as a separate
    /// table-level clause (composite keys).
    fn render_column(&self, col: &ColumnInfo, inline_pk: bool) -> String;

    /// Statements realizing one column modification.
    ///
    /// `desired_columns` is the full target column list, for dialects that
    /// rebuild the table instead of altering in place.
    fn render_modify_column(
        &self,
        table: &str,
        desired_columns: &[ColumnInfo],
        change: &ColumnChange,
    ) -> Vec<String>;

    /// Statements realizing one column drop.
    fn render_drop_column(
        &self,
        table: &str,
        desired_columns: &[ColumnInfo],
        column: &str,
    ) -> Vec<String> {
        let _ = desired_columns;
        vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_ident(table),
            self.quote_ident(column)
        )]
    }

    fn render_drop_index(&self, table: &str, index: &str) -> String;

    /// Renders a default clause expression.
    fn format_default(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Now => self.current_timestamp_expr().to_string(),
            DefaultValue::Value(v) => self.literal(v),
        }
    }

    /// Renders a value as an inline SQL literal (defaults, DDL only; runtime
    /// queries always bind parameters instead).
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => self.bool_literal(*b).to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => quote_string(s),
            Value::Bytes(b) => self.bytes_literal(b),
            Value::DateTime(dt) => quote_string(&dt.to_rfc3339()),
            Value::Decimal(d) => d.to_string(),
            Value::Json(j) => quote_string(&j.to_string()),
            Value::Array(arr) => {
                let json = serde_json::to_string(arr).unwrap_or_else(|_| "[]".to_string());
                quote_string(&json)
            }
        }
    }

    fn bytes_literal(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex_string(bytes))
    }
}

/// Single-quotes a string, doubling embedded quotes.
pub(crate) fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub(crate) fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Shared helper: quote with a given character, doubling embedded quotes.
pub(crate) fn quote_with(name: &str, quote: char) -> String {
    let doubled = name.replace(quote, &format!("{quote}{quote}"));
    format!("{quote}{doubled}{quote}")
}
