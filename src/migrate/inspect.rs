// SPDX-License-Identifier: Apache-2.0

//! Live-catalog introspection.
//!
//! Each dialect reads its catalog into the physical-side [`TableInfo`]
//! mirror of a schema. The normalized type string produced here is the
//! comparison key the migration planner diffs against.
//!
//! Introspectors run their catalog SQL through the abstract executor, so the
//! same code paths work on a pool connection or inside an open transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::driver::executor::SqlExecutor;
use crate::error::{Error, Result};
use crate::value::Value;

/// Physical column, as read from the catalog or derived from a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Uppercased, whitespace-trimmed type string (`TYPE`, `TYPE(N)`,
    /// `TYPE(P,S)`).
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub default: Option<String>,
}

/// Physical index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Physical foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub name: Option<String>,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

/// Physical table: the introspected mirror of a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Reads the live catalog for one dialect.
#[async_trait]
pub trait Introspector: Send + Sync {
    async fn list_tables(&self, ctx: &Context, exec: &dyn SqlExecutor) -> Result<Vec<String>>;

    async fn table_exists(
        &self,
        ctx: &Context,
        exec: &dyn SqlExecutor,
        table: &str,
    ) -> Result<bool>;

    async fn describe_table(
        &self,
        ctx: &Context,
        exec: &dyn SqlExecutor,
        table: &str,
    ) -> Result<TableInfo>;
}

/// Normalizes a raw column type string into the planner's comparison key.
///
/// Uppercases and trims, folds cross-dialect aliases (`INTEGER` → `INT`,
/// `CHARACTER VARYING` → `VARCHAR`, `NUMERIC` → `DECIMAL`, …) and strips
/// integer display widths so `INT(11)` compares equal to `INT`.
pub fn normalize_type(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let collapsed: String = upper.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(base) = collapsed.strip_suffix("[]") {
        return format!("{}[]", normalize_type(base));
    }

    let (base, params) = match collapsed.find('(') {
        Some(pos) => {
            let (b, p) = collapsed.split_at(pos);
            (b.trim().to_string(), Some(p.to_string()))
        }
        None => (collapsed.clone(), None),
    };

    // Boolean spellings first: the parameter is part of the alias.
    if base == "TINYINT" {
        if let Some(p) = &params {
            if p == "(1)" {
                return "BOOL".to_string();
            }
        }
    }
    if base == "BOOLEAN" || base == "BOOL" {
        return "BOOL".to_string();
    }

    let folded = match base.as_str() {
        "INTEGER" | "INT4" | "MEDIUMINT" => "INT",
        "INT8" => "BIGINT",
        "INT2" => "SMALLINT",
        "SERIAL" => "INT",
        "BIGSERIAL" => "BIGINT",
        "CHARACTER VARYING" => "VARCHAR",
        "CHARACTER" => "CHAR",
        "NUMERIC" => "DECIMAL",
        "DOUBLE PRECISION" | "FLOAT8" => "DOUBLE",
        "FLOAT4" => "REAL",
        "TIMESTAMP WITHOUT TIME ZONE" => "TIMESTAMP",
        "TIMESTAMP WITH TIME ZONE" => "TIMESTAMPTZ",
        other => other,
    };

    // Integer display widths are presentation only.
    let drop_params = matches!(
        folded,
        "INT" | "BIGINT" | "SMALLINT" | "TINYINT" | "INTEGER"
    );

    match (params, drop_params) {
        (Some(p), false) => format!("{folded}{p}"),
        _ => folded.to_string(),
    }
}

/// Normalizes a default expression for portable string comparison.
///
/// Strips surrounding quotes and Postgres `::type` casts, folds the
/// current-timestamp spellings into one token, and erases sequence defaults
/// (those are carried by the auto-increment flag instead).
pub fn normalize_default(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let mut s = raw.trim().to_string();

    if let Some(pos) = s.find("::") {
        s.truncate(pos);
        s = s.trim().to_string();
    }
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        s = s[1..s.len() - 1].replace("''", "'");
    }

    let upper = s.to_uppercase();
    if upper == "CURRENT_TIMESTAMP"
        || upper.starts_with("CURRENT_TIMESTAMP(")
        || upper == "NOW()"
    {
        return "CURRENT_TIMESTAMP".to_string();
    }
    if upper.starts_with("NEXTVAL(") {
        return String::new();
    }
    if upper == "TRUE" {
        return "TRUE".to_string();
    }
    if upper == "FALSE" {
        return "FALSE".to_string();
    }
    if upper == "NULL" {
        return String::new();
    }
    s
}

// ---- row accessors -------------------------------------------------------
//
// Catalog queries come back through the generic executor, so cell types vary
// by driver. These accessors take the lenient view.

fn text_at(row: &[Value], idx: usize) -> String {
    match row.get(idx) {
        Some(Value::Text(s)) => s.clone(),
        Some(Value::Int(i)) => i.to_string(),
        Some(Value::Bytes(b)) => String::from_utf8_lossy(b).into_owned(),
        _ => String::new(),
    }
}

fn opt_text_at(row: &[Value], idx: usize) -> Option<String> {
    match row.get(idx) {
        Some(Value::Text(s)) => Some(s.clone()),
        Some(Value::Int(i)) => Some(i.to_string()),
        Some(Value::Bytes(b)) => Some(String::from_utf8_lossy(b).into_owned()),
        _ => None,
    }
}

fn int_at(row: &[Value], idx: usize) -> i64 {
    match row.get(idx) {
        Some(Value::Int(i)) => *i,
        Some(Value::Bool(b)) => *b as i64,
        Some(Value::Text(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn bool_at(row: &[Value], idx: usize) -> bool {
    match row.get(idx) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Int(i)) => *i != 0,
        Some(Value::Text(s)) => {
            matches!(s.as_str(), "t" | "true" | "TRUE" | "YES" | "yes" | "1")
        }
        _ => false,
    }
}

/// Marks columns backed by a constraint-implicit unique index as unique.
///
/// Only constraint-implicit names count; a user-created unique index stays
/// an index and must not flip the column flag.
fn apply_constraint_unique(
    columns: &mut [ColumnInfo],
    indexes: &[IndexInfo],
    is_implicit: impl Fn(&str) -> bool,
) {
    for index in indexes {
        if index.unique && index.columns.len() == 1 && is_implicit(&index.name) {
            if let Some(col) = columns.iter_mut().find(|c| c.name == index.columns[0]) {
                if !col.primary_key {
                    col.unique = true;
                }
            }
        }
    }
}

// ---- MySQL ---------------------------------------------------------------

/// Introspector for MySQL-family catalogs.
///
/// Reads `information_schema` scoped to the connection's current database.
pub struct MySqlIntrospector;

#[async_trait]
impl Introspector for MySqlIntrospector {
    async fn list_tables(&self, ctx: &Context, exec: &dyn SqlExecutor) -> Result<Vec<String>> {
        let rs = exec
            .query(
                ctx,
                "SELECT CAST(TABLE_NAME AS CHAR) \
                 FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY TABLE_NAME",
                &[],
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;
        Ok(rs.rows.iter().map(|r| text_at(r, 0)).collect())
    }

    async fn table_exists(
        &self,
        ctx: &Context,
        exec: &dyn SqlExecutor,
        table: &str,
    ) -> Result<bool> {
        let rs = exec
            .query(
                ctx,
                "SELECT COUNT(*) FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
                &[Value::Text(table.to_string())],
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;
        Ok(rs.rows.first().map(|r| int_at(r, 0) > 0).unwrap_or(false))
    }

    async fn describe_table(
        &self,
        ctx: &Context,
        exec: &dyn SqlExecutor,
        table: &str,
    ) -> Result<TableInfo> {
        let table_arg = Value::Text(table.to_string());

        // CHAR casts avoid BINARY type mismatches in the driver.
        let columns_rs = exec
            .query(
                ctx,
                "SELECT CAST(c.COLUMN_NAME AS CHAR), CAST(c.COLUMN_TYPE AS CHAR), \
                        CAST(c.IS_NULLABLE AS CHAR), CAST(c.COLUMN_DEFAULT AS CHAR), \
                        CAST(c.COLUMN_KEY AS CHAR), CAST(c.EXTRA AS CHAR) \
                 FROM information_schema.COLUMNS c \
                 WHERE c.TABLE_SCHEMA = DATABASE() AND c.TABLE_NAME = ? \
                 ORDER BY c.ORDINAL_POSITION",
                std::slice::from_ref(&table_arg),
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;

        let columns: Vec<ColumnInfo> = columns_rs
            .rows
            .iter()
            .map(|row| {
                let column_key = text_at(row, 4);
                let extra = text_at(row, 5).to_lowercase();
                ColumnInfo {
                    name: text_at(row, 0),
                    sql_type: normalize_type(&text_at(row, 1)),
                    nullable: text_at(row, 2) == "YES",
                    primary_key: column_key == "PRI",
                    auto_increment: extra.contains("auto_increment"),
                    unique: column_key == "UNI",
                    default: opt_text_at(row, 3),
                }
            })
            .collect();

        let index_rs = exec
            .query(
                ctx,
                "SELECT CAST(INDEX_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR), NON_UNIQUE \
                 FROM information_schema.STATISTICS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                 ORDER BY INDEX_NAME, SEQ_IN_INDEX",
                std::slice::from_ref(&table_arg),
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;

        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in &index_rs.rows {
            let name = text_at(row, 0);
            if name == "PRIMARY" {
                continue;
            }
            let column = text_at(row, 1);
            let unique = int_at(row, 2) == 0;
            match indexes.iter_mut().find(|i| i.name == name) {
                Some(index) => index.columns.push(column),
                None => indexes.push(IndexInfo {
                    name,
                    columns: vec![column],
                    unique,
                }),
            }
        }

        let fk_rs = exec
            .query(
                ctx,
                "SELECT CAST(kcu.CONSTRAINT_NAME AS CHAR), CAST(kcu.COLUMN_NAME AS CHAR), \
                        CAST(kcu.REFERENCED_TABLE_NAME AS CHAR), \
                        CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR), \
                        CAST(rc.UPDATE_RULE AS CHAR), CAST(rc.DELETE_RULE AS CHAR) \
                 FROM information_schema.KEY_COLUMN_USAGE kcu \
                 JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
                   ON rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
                  AND rc.CONSTRAINT_SCHEMA = kcu.TABLE_SCHEMA \
                 WHERE kcu.TABLE_SCHEMA = DATABASE() AND kcu.TABLE_NAME = ? \
                   AND kcu.REFERENCED_TABLE_NAME IS NOT NULL",
                std::slice::from_ref(&table_arg),
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;

        let foreign_keys = fk_rs
            .rows
            .iter()
            .map(|row| ForeignKeyInfo {
                name: opt_text_at(row, 0),
                column: text_at(row, 1),
                referenced_table: text_at(row, 2),
                referenced_column: text_at(row, 3),
                on_update: opt_text_at(row, 4),
                on_delete: opt_text_at(row, 5),
            })
            .collect();

        Ok(TableInfo {
            name: table.to_string(),
            columns,
            indexes,
            foreign_keys,
        })
    }
}

// ---- PostgreSQL ----------------------------------------------------------

/// Introspector for PostgreSQL catalogs, scoped to one schema.
pub struct PostgresIntrospector {
    pub schema: String,
}

impl PostgresIntrospector {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    /// Formats `TYPE(N)` / `TYPE(P,S)` from information_schema metadata.
    fn format_type(row: &[Value]) -> String {
        let data_type = text_at(row, 1).to_uppercase();
        let udt_name = text_at(row, 2);
        if data_type == "ARRAY" {
            let elem = udt_name.trim_start_matches('_').to_uppercase();
            return format!("{}[]", normalize_type(&elem));
        }
        let char_len = opt_text_at(row, 5).and_then(|v| v.parse::<i64>().ok());
        let precision = opt_text_at(row, 6).and_then(|v| v.parse::<i64>().ok());
        let scale = opt_text_at(row, 7).and_then(|v| v.parse::<i64>().ok());

        let base = normalize_type(&data_type);
        match base.as_str() {
            "VARCHAR" | "CHAR" => match char_len {
                Some(n) => format!("{base}({n})"),
                None => base,
            },
            "DECIMAL" => match (precision, scale) {
                (Some(p), Some(s)) => format!("{base}({p},{s})"),
                (Some(p), None) => format!("{base}({p})"),
                _ => base,
            },
            _ => base,
        }
    }
}

#[async_trait]
impl Introspector for PostgresIntrospector {
    async fn list_tables(&self, ctx: &Context, exec: &dyn SqlExecutor) -> Result<Vec<String>> {
        let rs = exec
            .query(
                ctx,
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[Value::Text(self.schema.clone())],
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;
        Ok(rs.rows.iter().map(|r| text_at(r, 0)).collect())
    }

    async fn table_exists(
        &self,
        ctx: &Context,
        exec: &dyn SqlExecutor,
        table: &str,
    ) -> Result<bool> {
        let rs = exec
            .query(
                ctx,
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2",
                &[
                    Value::Text(self.schema.clone()),
                    Value::Text(table.to_string()),
                ],
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;
        Ok(rs.rows.first().map(|r| int_at(r, 0) > 0).unwrap_or(false))
    }

    async fn describe_table(
        &self,
        ctx: &Context,
        exec: &dyn SqlExecutor,
        table: &str,
    ) -> Result<TableInfo> {
        let args = [
            Value::Text(self.schema.clone()),
            Value::Text(table.to_string()),
        ];

        let columns_rs = exec
            .query(
                ctx,
                "SELECT column_name::text, data_type::text, udt_name::text, \
                        is_nullable::text, column_default::text, \
                        character_maximum_length::text, numeric_precision::text, \
                        numeric_scale::text \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY ordinal_position",
                &args,
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;

        let pk_rs = exec
            .query(
                ctx,
                "SELECT a.attname::text \
                 FROM pg_index i \
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
                 JOIN pg_class c ON c.oid = i.indrelid \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE i.indisprimary AND n.nspname = $1 AND c.relname = $2 \
                 ORDER BY array_position(i.indkey, a.attnum)",
                &args,
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;
        let pk_columns: Vec<String> = pk_rs.rows.iter().map(|r| text_at(r, 0)).collect();

        let mut columns: Vec<ColumnInfo> = columns_rs
            .rows
            .iter()
            .map(|row| {
                let name = text_at(row, 0);
                let default = opt_text_at(row, 4);
                let auto_increment = default
                    .as_deref()
                    .map(|d| d.to_lowercase().starts_with("nextval("))
                    .unwrap_or(false);
                ColumnInfo {
                    sql_type: Self::format_type(row),
                    nullable: text_at(row, 3) == "YES",
                    primary_key: pk_columns.contains(&name),
                    auto_increment,
                    unique: false,
                    default,
                    name,
                }
            })
            .collect();

        let index_rs = exec
            .query(
                ctx,
                "SELECT i.relname::text, a.attname::text, ix.indisunique, ix.indisprimary \
                 FROM pg_index ix \
                 JOIN pg_class i ON i.oid = ix.indexrelid \
                 JOIN pg_class t ON t.oid = ix.indrelid \
                 JOIN pg_namespace n ON n.oid = t.relnamespace \
                 CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS x(attnum, ordinality) \
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = x.attnum \
                 WHERE n.nspname = $1 AND t.relname = $2 \
                 ORDER BY i.relname, x.ordinality",
                &args,
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;

        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in &index_rs.rows {
            if bool_at(row, 3) {
                continue;
            }
            let name = text_at(row, 0);
            let column = text_at(row, 1);
            let unique = bool_at(row, 2);
            match indexes.iter_mut().find(|i| i.name == name) {
                Some(index) => index.columns.push(column),
                None => indexes.push(IndexInfo {
                    name,
                    columns: vec![column],
                    unique,
                }),
            }
        }

        apply_constraint_unique(&mut columns, &indexes, |name| name.ends_with("_key"));

        let fk_rs = exec
            .query(
                ctx,
                "SELECT tc.constraint_name::text, kcu.column_name::text, \
                        ccu.table_name::text, ccu.column_name::text, \
                        rc.update_rule::text, rc.delete_rule::text \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                 JOIN information_schema.constraint_column_usage ccu \
                   ON ccu.constraint_name = tc.constraint_name \
                  AND ccu.table_schema = tc.table_schema \
                 JOIN information_schema.referential_constraints rc \
                   ON rc.constraint_name = tc.constraint_name \
                  AND rc.constraint_schema = tc.table_schema \
                 WHERE tc.constraint_type = 'FOREIGN KEY' \
                   AND tc.table_schema = $1 AND tc.table_name = $2",
                &args,
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;

        let foreign_keys = fk_rs
            .rows
            .iter()
            .map(|row| ForeignKeyInfo {
                name: opt_text_at(row, 0),
                column: text_at(row, 1),
                referenced_table: text_at(row, 2),
                referenced_column: text_at(row, 3),
                on_update: opt_text_at(row, 4),
                on_delete: opt_text_at(row, 5),
            })
            .collect();

        Ok(TableInfo {
            name: table.to_string(),
            columns,
            indexes,
            foreign_keys,
        })
    }
}

// ---- SQLite --------------------------------------------------------------

/// Introspector for SQLite, built on the PRAGMA family.
pub struct SqliteIntrospector;

impl SqliteIntrospector {
    fn quote_ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }
}

#[async_trait]
impl Introspector for SqliteIntrospector {
    async fn list_tables(&self, ctx: &Context, exec: &dyn SqlExecutor) -> Result<Vec<String>> {
        let rs = exec
            .query(
                ctx,
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
                &[],
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;
        Ok(rs.rows.iter().map(|r| text_at(r, 0)).collect())
    }

    async fn table_exists(
        &self,
        ctx: &Context,
        exec: &dyn SqlExecutor,
        table: &str,
    ) -> Result<bool> {
        let rs = exec
            .query(
                ctx,
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[Value::Text(table.to_string())],
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;
        Ok(rs.rows.first().map(|r| int_at(r, 0) > 0).unwrap_or(false))
    }

    async fn describe_table(
        &self,
        ctx: &Context,
        exec: &dyn SqlExecutor,
        table: &str,
    ) -> Result<TableInfo> {
        let table_ident = Self::quote_ident(table);

        // PRAGMA table_info: (cid, name, type, notnull, dflt_value, pk).
        let columns_rs = exec
            .query(ctx, &format!("PRAGMA table_info({table_ident})"), &[])
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;

        // AUTOINCREMENT is only visible in the stored CREATE TABLE text.
        let sql_rs = exec
            .query(
                ctx,
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[Value::Text(table.to_string())],
            )
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;
        let create_sql = sql_rs
            .rows
            .first()
            .map(|r| text_at(r, 0).to_uppercase())
            .unwrap_or_default();
        let has_autoincrement = create_sql.contains("AUTOINCREMENT");

        let mut columns: Vec<ColumnInfo> = columns_rs
            .rows
            .iter()
            .map(|row| {
                let primary_key = int_at(row, 5) > 0;
                let sql_type = normalize_type(&text_at(row, 2));
                ColumnInfo {
                    name: text_at(row, 1),
                    auto_increment: primary_key && sql_type == "INT" && has_autoincrement,
                    sql_type,
                    nullable: int_at(row, 3) == 0,
                    primary_key,
                    unique: false,
                    default: opt_text_at(row, 4),
                }
            })
            .collect();

        // PRAGMA index_list: (seq, name, unique, origin, partial).
        let index_list_rs = exec
            .query(ctx, &format!("PRAGMA index_list({table_ident})"), &[])
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;

        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in &index_list_rs.rows {
            let name = text_at(row, 1);
            let unique = int_at(row, 2) != 0;
            let origin = text_at(row, 3);
            if origin == "pk" {
                continue;
            }

            let info_rs = exec
                .query(
                    ctx,
                    &format!("PRAGMA index_info({})", Self::quote_ident(&name)),
                    &[],
                )
                .await
                .map_err(|e| Error::introspection_failed(e.to_string()))?;
            let columns: Vec<String> = info_rs.rows.iter().map(|r| text_at(r, 2)).collect();
            indexes.push(IndexInfo {
                name,
                columns,
                unique,
            });
        }

        apply_constraint_unique(&mut columns, &indexes, |name| {
            name.starts_with("sqlite_autoindex_")
        });

        // PRAGMA foreign_key_list:
        // (id, seq, table, from, to, on_update, on_delete, match).
        let fk_rs = exec
            .query(ctx, &format!("PRAGMA foreign_key_list({table_ident})"), &[])
            .await
            .map_err(|e| Error::introspection_failed(e.to_string()))?;

        let foreign_keys = fk_rs
            .rows
            .iter()
            .map(|row| ForeignKeyInfo {
                name: None,
                column: text_at(row, 3),
                referenced_table: text_at(row, 2),
                referenced_column: text_at(row, 4),
                on_update: opt_text_at(row, 5),
                on_delete: opt_text_at(row, 6),
            })
            .collect();

        Ok(TableInfo {
            name: table.to_string(),
            columns,
            indexes,
            foreign_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_normalization_folds_aliases() {
        assert_eq!(normalize_type("integer"), "INT");
        assert_eq!(normalize_type("int(11)"), "INT");
        assert_eq!(normalize_type("bigint(20)"), "BIGINT");
        assert_eq!(normalize_type("tinyint(1)"), "BOOL");
        assert_eq!(normalize_type("boolean"), "BOOL");
        assert_eq!(normalize_type("character varying(255)"), "VARCHAR(255)");
        assert_eq!(normalize_type("varchar(255)"), "VARCHAR(255)");
        assert_eq!(normalize_type("numeric(10,2)"), "DECIMAL(10,2)");
        assert_eq!(normalize_type("double precision"), "DOUBLE");
        assert_eq!(normalize_type("timestamp without time zone"), "TIMESTAMP");
        assert_eq!(normalize_type("timestamp with time zone"), "TIMESTAMPTZ");
        assert_eq!(normalize_type("BIGSERIAL"), "BIGINT");
        assert_eq!(normalize_type("  text "), "TEXT");
        assert_eq!(normalize_type("double precision[]"), "DOUBLE[]");
        assert_eq!(normalize_type("TEXT[]"), "TEXT[]");
    }

    #[test]
    fn default_normalization_is_portable() {
        assert_eq!(normalize_default(None), "");
        assert_eq!(normalize_default(Some("0")), "0");
        assert_eq!(normalize_default(Some("'draft'")), "draft");
        assert_eq!(normalize_default(Some("'draft'::text")), "draft");
        assert_eq!(normalize_default(Some("now()")), "CURRENT_TIMESTAMP");
        assert_eq!(
            normalize_default(Some("CURRENT_TIMESTAMP(3)")),
            "CURRENT_TIMESTAMP"
        );
        assert_eq!(
            normalize_default(Some("nextval('users_id_seq'::regclass)")),
            ""
        );
        assert_eq!(normalize_default(Some("true")), "TRUE");
        assert_eq!(normalize_default(Some("NULL")), "");
        assert_eq!(normalize_default(Some("'it''s'")), "it's");
    }
}
