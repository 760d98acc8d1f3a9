// SPDX-License-Identifier: Apache-2.0

//! Schema diffing.
//!
//! The planner compares an introspected [`TableInfo`] against a desired
//! [`Schema`] and produces a deterministic [`MigrationPlan`]: six ordered
//! buckets, emitted in bucket order by the DDL renderer. Plans are pure
//! data; nothing here touches the database.

use serde::{Deserialize, Serialize};

use crate::dialect::{ColumnChange, Dialect};
use crate::error::Result;
use crate::migrate::inspect::{normalize_default, normalize_type, ColumnInfo, IndexInfo, TableInfo};
use crate::schema::model::{Field, Schema};

/// A column addition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddColumn {
    pub table: String,
    pub column: ColumnInfo,
}

/// A column modification, carrying both descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyColumn {
    pub table: String,
    pub change: ColumnChange,
}

/// A column removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropColumn {
    pub table: String,
    pub column: String,
}

/// An index addition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddIndex {
    pub table: String,
    pub index: IndexInfo,
}

/// An index removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropIndex {
    pub table: String,
    pub index: String,
}

/// The structured diff between live tables and desired schemas.
///
/// Bucket order is emission order: created tables first, dropped indexes
/// last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub create_tables: Vec<String>,
    pub add_columns: Vec<AddColumn>,
    pub modify_columns: Vec<ModifyColumn>,
    pub drop_columns: Vec<DropColumn>,
    pub add_indexes: Vec<AddIndex>,
    pub drop_indexes: Vec<DropIndex>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.create_tables.is_empty()
            && self.add_columns.is_empty()
            && self.modify_columns.is_empty()
            && self.drop_columns.is_empty()
            && self.add_indexes.is_empty()
            && self.drop_indexes.is_empty()
    }

    pub fn merge(&mut self, other: MigrationPlan) {
        self.create_tables.extend(other.create_tables);
        self.add_columns.extend(other.add_columns);
        self.modify_columns.extend(other.modify_columns);
        self.drop_columns.extend(other.drop_columns);
        self.add_indexes.extend(other.add_indexes);
        self.drop_indexes.extend(other.drop_indexes);
    }
}

/// Derives the physical column descriptor for one schema field.
pub fn field_to_column(dialect: &dyn Dialect, schema: &Schema, field: &Field) -> ColumnInfo {
    let composite = schema
        .composite_key
        .as_ref()
        .map(|keys| keys.contains(&field.name))
        .unwrap_or(false);
    let primary_key = field.primary_key || composite;
    ColumnInfo {
        name: field.column_name().to_string(),
        sql_type: dialect.column_type(field),
        // Primary-key fields are implicitly NOT NULL.
        nullable: field.nullable && !primary_key,
        primary_key,
        auto_increment: field.auto_increment,
        unique: field.unique && !primary_key,
        default: field
            .default
            .as_ref()
            .map(|d| dialect.format_default(d)),
    }
}

/// All columns of a schema, in declaration order.
pub fn desired_columns(dialect: &dyn Dialect, schema: &Schema) -> Vec<ColumnInfo> {
    schema
        .fields
        .iter()
        .map(|f| field_to_column(dialect, schema, f))
        .collect()
}

/// All indexes a schema asks for: explicit `@@index`/`@@unique` entries plus
/// field-level `index` flags (skipped when the field is already primary or
/// unique — those are constraint-backed).
pub fn desired_indexes(schema: &Schema) -> Vec<IndexInfo> {
    let table = schema.table_name();
    let mut out = Vec::new();

    for index in &schema.indexes {
        let columns = index
            .fields
            .iter()
            .map(|f| {
                schema
                    .field(f)
                    .map(|fld| fld.column_name().to_string())
                    .unwrap_or_else(|| f.clone())
            })
            .collect();
        out.push(IndexInfo {
            name: index.effective_name(&table),
            columns,
            unique: index.unique,
        });
    }

    for field in &schema.fields {
        if field.indexed && !field.primary_key && !field.unique {
            let column = field.column_name().to_string();
            let name = format!("idx_{}_{}", table, column);
            if out.iter().any(|i: &IndexInfo| i.name == name) {
                continue;
            }
            out.push(IndexInfo {
                name,
                columns: vec![column],
                unique: false,
            });
        }
    }

    out
}

/// Strips conventional affixes and lowercases, so `idx_users_email`,
/// `users_email_idx` and `IDX_USERS_EMAIL` all compare equal.
fn normalize_index_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let stripped = lower
        .strip_prefix("idx_")
        .or_else(|| lower.strip_prefix("index_"))
        .unwrap_or(&lower);
    let stripped = stripped
        .strip_suffix("_idx")
        .or_else(|| stripped.strip_suffix("_index"))
        .unwrap_or(stripped);
    stripped.to_string()
}

fn columns_need_modification(existing: &ColumnInfo, desired: &ColumnInfo) -> bool {
    normalize_type(&existing.sql_type) != normalize_type(&desired.sql_type)
        || existing.nullable != desired.nullable
        || existing.primary_key != desired.primary_key
        || existing.auto_increment != desired.auto_increment
        || existing.unique != desired.unique
        || normalize_default(existing.default.as_deref())
            != normalize_default(desired.default.as_deref())
}

fn index_columns_equal(a: &IndexInfo, b: &IndexInfo) -> bool {
    a.columns.len() == b.columns.len()
        && a.columns
            .iter()
            .zip(&b.columns)
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Diffs one live table against one desired schema.
pub struct Planner<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> Planner<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Plans creation of a table that does not exist yet.
    pub fn plan_create(&self, schema: &Schema) -> MigrationPlan {
        MigrationPlan {
            create_tables: vec![schema.table_name()],
            add_indexes: desired_indexes(schema)
                .into_iter()
                .map(|index| AddIndex {
                    table: schema.table_name(),
                    index,
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Diffs an existing table against the desired schema.
    pub fn plan_table(&self, existing: &TableInfo, desired: &Schema) -> Result<MigrationPlan> {
        let table = desired.table_name();
        let mut plan = MigrationPlan::default();

        let desired_cols = desired_columns(self.dialect, desired);

        for col in &desired_cols {
            match existing.column(&col.name) {
                None => plan.add_columns.push(AddColumn {
                    table: table.clone(),
                    column: col.clone(),
                }),
                Some(existing_col) => {
                    if columns_need_modification(existing_col, col) {
                        plan.modify_columns.push(ModifyColumn {
                            table: table.clone(),
                            change: ColumnChange {
                                old: existing_col.clone(),
                                new: col.clone(),
                            },
                        });
                    }
                }
            }
        }

        for col in &existing.columns {
            if !desired_cols.iter().any(|c| c.name == col.name) {
                plan.drop_columns.push(DropColumn {
                    table: table.clone(),
                    column: col.name.clone(),
                });
            }
        }

        self.plan_indexes(existing, desired, &desired_cols, &mut plan);
        Ok(plan)
    }

    fn plan_indexes(
        &self,
        existing: &TableInfo,
        desired: &Schema,
        desired_cols: &[ColumnInfo],
        plan: &mut MigrationPlan,
    ) {
        let table = desired.table_name();
        let wanted = desired_indexes(desired);

        // Existing indexes that are catalog artifacts or back a declared
        // unique column are constraint-implicit; the diff never touches them.
        let relevant_existing: Vec<&IndexInfo> = existing
            .indexes
            .iter()
            .filter(|i| !self.dialect.is_system_index(&i.name))
            .filter(|i| {
                !(i.unique
                    && i.columns.len() == 1
                    && desired_cols
                        .iter()
                        .any(|c| c.name == i.columns[0] && c.unique))
            })
            .collect();

        for want in &wanted {
            let key = normalize_index_name(&want.name);
            match relevant_existing
                .iter()
                .find(|e| normalize_index_name(&e.name) == key)
            {
                None => plan.add_indexes.push(AddIndex {
                    table: table.clone(),
                    index: want.clone(),
                }),
                Some(have) => {
                    if have.unique != want.unique || !index_columns_equal(have, want) {
                        plan.drop_indexes.push(DropIndex {
                            table: table.clone(),
                            index: have.name.clone(),
                        });
                        plan.add_indexes.push(AddIndex {
                            table: table.clone(),
                            index: want.clone(),
                        });
                    }
                }
            }
        }

        for have in &relevant_existing {
            let key = normalize_index_name(&have.name);
            if !wanted
                .iter()
                .any(|w| normalize_index_name(&w.name) == key)
            {
                plan.drop_indexes.push(DropIndex {
                    table: table.clone(),
                    index: have.name.clone(),
                });
            }
        }

        // Deterministic ordering for drops discovered out of declaration
        // order.
        plan.drop_indexes
            .sort_by(|a, b| normalize_index_name(&a.index).cmp(&normalize_index_name(&b.index)));
        plan.drop_indexes.dedup_by(|a, b| a.index == b.index);
    }
}
