// SPDX-License-Identifier: Apache-2.0

//! Fluent model queries.
//!
//! A [`ModelQuery`] accumulates projection, filters, ordering, pagination
//! and includes as plain state; compilation happens once, at the terminal
//! operation, against the dialect in effect. The same builder runs against
//! a driver's pool executor or an open transaction.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::Context;
use crate::dialect::Dialect;
use crate::driver::executor::SqlExecutor;
use crate::error::{Error, Result};
use crate::query::condition::{ArgList, Condition, ConditionContext};
use crate::query::include::{plan_includes, BatchInclude, IncludePlan};
use crate::schema::mapper::FieldMapper;
use crate::schema::model::Schema;
use crate::schema::SchemaRegistry;
use crate::value::{Record, RowData, Value};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
    /// NULL placement, where the dialect can express it.
    pub nulls_first: Option<bool>,
}

/// Aggregate functions available in projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    fn sql(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }
}

/// An aggregate projection entry.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub func: AggregateFunc,
    /// `None` aggregates over `*` (COUNT only).
    pub field: Option<String>,
    pub alias: String,
}

/// Outcome of a bulk insert.
#[derive(Debug, Clone, Default)]
pub struct CreateManyResult {
    pub rows_affected: u64,
    /// Generated keys, populated on dialects with RETURNING.
    pub keys: Vec<Value>,
}

/// A fluent query over one model.
pub struct ModelQuery {
    exec: Arc<dyn SqlExecutor>,
    dialect: Arc<dyn Dialect>,
    registry: SchemaRegistry,
    mapper: FieldMapper,
    model: String,
    select: Vec<String>,
    condition: Option<Condition>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
    distinct_on: Vec<String>,
    includes: Vec<String>,
    group_by: Vec<String>,
    having: Option<Condition>,
    aggregates: Vec<Aggregate>,
    allow_unfiltered: bool,
}

impl ModelQuery {
    pub(crate) fn new(
        exec: Arc<dyn SqlExecutor>,
        dialect: Arc<dyn Dialect>,
        registry: SchemaRegistry,
        mapper: FieldMapper,
        model: impl Into<String>,
    ) -> Self {
        Self {
            exec,
            dialect,
            registry,
            mapper,
            model: model.into(),
            select: Vec::new(),
            condition: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            distinct_on: Vec::new(),
            includes: Vec::new(),
            group_by: Vec::new(),
            having: None,
            aggregates: Vec::new(),
            allow_unfiltered: false,
        }
    }

    // ---- builder surface -------------------------------------------------

    /// Projects specific fields instead of `*`.
    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the filter; subsequent calls AND onto the existing tree.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn order_by(self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by_nulls(field, direction, None)
    }

    pub fn order_by_nulls(
        mut self,
        field: impl Into<String>,
        direction: SortDirection,
        nulls_first: Option<bool>,
    ) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
            nulls_first,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// `DISTINCT ON` columns; falls back to GROUP BY where unsupported.
    pub fn distinct_on<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.distinct_on = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Eagerly loads a relation, or a dot path of to-one relations.
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.includes.push(relation.into());
        self
    }

    pub fn group_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn aggregate(
        mut self,
        func: AggregateFunc,
        field: Option<&str>,
        alias: impl Into<String>,
    ) -> Self {
        self.aggregates.push(Aggregate {
            func,
            field: field.map(String::from),
            alias: alias.into(),
        });
        self
    }

    /// Opts into a full-table UPDATE/DELETE without a predicate.
    pub fn allow_unfiltered(mut self) -> Self {
        self.allow_unfiltered = true;
        self
    }

    // ---- compilation -----------------------------------------------------

    fn schema(&self) -> Result<Arc<Schema>> {
        self.registry.get(&self.model)
    }

    /// Compiles the SELECT; also returns the include plan for assembly.
    pub(crate) fn compile_select(&self) -> Result<(String, Vec<Value>, IncludePlan)> {
        let schema = self.schema()?;
        let dialect = self.dialect.as_ref();
        let table = schema.table_name();

        let include_plan = plan_includes(&self.registry, &schema, &self.includes)?;
        let has_joins = !include_plan.joins.is_empty();
        let alias = if has_joins { Some("t0") } else { None };

        let ctx = ConditionContext {
            schema: &schema,
            alias,
            dialect,
        };
        let mut args = ArgList::new(dialect);

        let qualify = |column: &str| -> String {
            let quoted = dialect.quote_ident(column);
            match alias {
                Some(a) => format!("{}.{quoted}", dialect.quote_ident(a)),
                None => quoted,
            }
        };

        // Projection.
        let mut projection: Vec<String> = Vec::new();
        if !self.aggregates.is_empty() {
            for field in &self.group_by {
                projection.push(qualify(schema.column_name(field)?));
            }
            for agg in &self.aggregates {
                let target = match &agg.field {
                    Some(field) => qualify(schema.column_name(field)?),
                    None => "*".to_string(),
                };
                projection.push(format!(
                    "{}({target}) AS {}",
                    agg.func.sql(),
                    dialect.quote_ident(&agg.alias)
                ));
            }
        } else if self.select.is_empty() {
            projection.push(match alias {
                Some(a) => format!("{}.*", dialect.quote_ident(a)),
                None => "*".to_string(),
            });
        } else {
            for field in &self.select {
                projection.push(qualify(schema.column_name(field)?));
            }
        }

        // Joined columns are aliased `<join alias>__<field name>` so result
        // assembly can split them back out.
        for join in &include_plan.joins {
            let target = self.registry.get(&join.target_model)?;
            for field in &target.fields {
                projection.push(format!(
                    "{}.{} AS {}",
                    dialect.quote_ident(&join.alias),
                    dialect.quote_ident(field.column_name()),
                    dialect.quote_ident(&format!("{}__{}", join.alias, field.name))
                ));
            }
        }

        // DISTINCT ON falls back to grouping on the projection.
        let mut group_by = self.group_by.clone();
        let distinct_clause = if !self.distinct_on.is_empty() {
            if dialect.supports_distinct_on() {
                let cols = self
                    .distinct_on
                    .iter()
                    .map(|f| Ok(qualify(schema.column_name(f)?)))
                    .collect::<Result<Vec<_>>>()?;
                format!("DISTINCT ON ({}) ", cols.join(", "))
            } else {
                if group_by.is_empty() {
                    group_by = self.distinct_on.clone();
                }
                String::new()
            }
        } else if self.distinct {
            "DISTINCT ".to_string()
        } else {
            String::new()
        };

        let mut sql = format!(
            "SELECT {distinct_clause}{} FROM {}",
            projection.join(", "),
            dialect.quote_ident(&table)
        );
        if let Some(a) = alias {
            sql.push_str(&format!(" AS {}", dialect.quote_ident(a)));
        }

        for join in &include_plan.joins {
            let target = self.registry.get(&join.target_model)?;
            sql.push_str(&format!(
                " LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                dialect.quote_ident(&target.table_name()),
                dialect.quote_ident(&join.alias),
                dialect.quote_ident(&join.alias),
                dialect.quote_ident(&join.target_column),
                dialect.quote_ident(&join.parent_alias),
                dialect.quote_ident(&join.parent_column),
            ));
        }

        if let Some(condition) = &self.condition {
            let fragment = condition.compile(&ctx, &mut args)?;
            sql.push_str(" WHERE ");
            sql.push_str(&fragment);
        }

        if !group_by.is_empty() {
            let cols = group_by
                .iter()
                .map(|f| Ok(qualify(schema.column_name(f)?)))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" GROUP BY {}", cols.join(", ")));
        }

        if let Some(having) = &self.having {
            let fragment = having.compile(&ctx, &mut args)?;
            sql.push_str(" HAVING ");
            sql.push_str(&fragment);
        }

        if !self.order_by.is_empty() {
            let mut parts = Vec::with_capacity(self.order_by.len());
            for order in &self.order_by {
                let column = qualify(schema.column_name(&order.field)?);
                let mut part = format!("{column} {}", order.direction.sql());
                if let Some(nulls_first) = order.nulls_first {
                    if let Some(clause) = dialect.nulls_ordering(nulls_first) {
                        part.push(' ');
                        part.push_str(clause);
                    }
                }
                parts.push(part);
            }
            sql.push_str(&format!(" ORDER BY {}", parts.join(", ")));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => {
                if dialect.requires_limit_for_offset() {
                    sql.push_str(&format!(
                        " LIMIT {} OFFSET {offset}",
                        crate::dialect::mysql::OFFSET_SENTINEL_LIMIT
                    ));
                } else {
                    sql.push_str(&format!(" OFFSET {offset}"));
                }
            }
            (None, None) => {}
        }

        Ok((sql, args.into_values(), include_plan))
    }

    fn compile_insert(&self, data: &RowData) -> Result<(String, Vec<Value>)> {
        let schema = self.schema()?;
        let dialect = self.dialect.as_ref();
        let table = dialect.quote_ident(&schema.table_name());
        let mapped = self.mapper.map_data(&self.model, data)?;

        if mapped.is_empty() {
            let sql = if dialect.supports_default_values() {
                format!("INSERT INTO {table} DEFAULT VALUES")
            } else {
                format!("INSERT INTO {table} () VALUES ()")
            };
            return Ok((sql, Vec::new()));
        }

        let mut args = ArgList::new(dialect);
        let mut columns = Vec::with_capacity(mapped.len());
        let mut placeholders = Vec::with_capacity(mapped.len());
        for (column, value) in &mapped.fields {
            columns.push(dialect.quote_ident(column));
            placeholders.push(args.push(value.clone()));
        }
        let mut sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        if dialect.supports_returning() {
            if let Some(pk) = schema.single_primary_key() {
                sql.push_str(&format!(
                    " RETURNING {}",
                    dialect.quote_ident(pk.column_name())
                ));
            }
        }
        Ok((sql, args.into_values()))
    }

    fn compile_insert_many(&self, rows: &[RowData]) -> Result<(String, Vec<Value>)> {
        let schema = self.schema()?;
        let dialect = self.dialect.as_ref();
        let table = dialect.quote_ident(&schema.table_name());

        let first = self.mapper.map_data(&self.model, &rows[0])?;
        if first.is_empty() {
            return Err(Error::sql_compile("create_many with empty rows"));
        }
        let columns: Vec<String> = first.fields.keys().cloned().collect();

        let mut args = ArgList::new(dialect);
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let mapped = self.mapper.map_data(&self.model, row)?;
            let mut placeholders = Vec::with_capacity(columns.len());
            for column in &columns {
                let value = mapped.get(column).cloned().unwrap_or(Value::Null);
                placeholders.push(args.push(value));
            }
            tuples.push(format!("({})", placeholders.join(", ")));
        }

        let quoted: Vec<String> = columns.iter().map(|c| dialect.quote_ident(c)).collect();
        let mut sql = format!(
            "INSERT INTO {table} ({}) VALUES {}",
            quoted.join(", "),
            tuples.join(", ")
        );
        if dialect.supports_returning() {
            if let Some(pk) = schema.single_primary_key() {
                sql.push_str(&format!(
                    " RETURNING {}",
                    dialect.quote_ident(pk.column_name())
                ));
            }
        }
        Ok((sql, args.into_values()))
    }

    fn compile_update(&self, data: &RowData) -> Result<(String, Vec<Value>)> {
        let schema = self.schema()?;
        let dialect = self.dialect.as_ref();
        let mapped = self.mapper.map_data(&self.model, data)?;
        if mapped.is_empty() {
            return Err(Error::sql_compile("update with empty SET list"));
        }
        if self.condition.is_none() && !self.allow_unfiltered {
            return Err(Error::sql_compile(
                "update without a predicate; call allow_unfiltered() for a full-table update",
            ));
        }

        let mut args = ArgList::new(dialect);
        let mut assignments = Vec::with_capacity(mapped.len());
        for (column, value) in &mapped.fields {
            let placeholder = args.push(value.clone());
            assignments.push(format!("{} = {placeholder}", dialect.quote_ident(column)));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_ident(&schema.table_name()),
            assignments.join(", ")
        );
        if let Some(condition) = &self.condition {
            let ctx = ConditionContext {
                schema: &schema,
                alias: None,
                dialect,
            };
            let fragment = condition.compile(&ctx, &mut args)?;
            sql.push_str(" WHERE ");
            sql.push_str(&fragment);
        }
        Ok((sql, args.into_values()))
    }

    fn compile_delete(&self) -> Result<(String, Vec<Value>)> {
        let schema = self.schema()?;
        let dialect = self.dialect.as_ref();
        if self.condition.is_none() && !self.allow_unfiltered {
            return Err(Error::sql_compile(
                "delete without a predicate; call allow_unfiltered() for a full-table delete",
            ));
        }

        let mut args = ArgList::new(dialect);
        let mut sql = format!("DELETE FROM {}", dialect.quote_ident(&schema.table_name()));
        if let Some(condition) = &self.condition {
            let ctx = ConditionContext {
                schema: &schema,
                alias: None,
                dialect,
            };
            let fragment = condition.compile(&ctx, &mut args)?;
            sql.push_str(" WHERE ");
            sql.push_str(&fragment);
        }
        Ok((sql, args.into_values()))
    }

    // ---- terminals -------------------------------------------------------

    /// Runs the SELECT and materializes all matching records.
    pub async fn find_many(&self, ctx: &Context) -> Result<Vec<Record>> {
        let (sql, args, include_plan) = self.compile_select()?;
        let rs = self.exec.query(ctx, &sql, &args).await?;

        let schema = self.schema()?;
        let mut records = self.assemble(&schema, &include_plan, rs)?;

        for batch in &include_plan.batched {
            self.attach_batched(ctx, batch, &mut records).await?;
        }
        Ok(records)
    }

    /// Runs the SELECT with `LIMIT 1` and returns the first record.
    pub async fn find_first(mut self, ctx: &Context) -> Result<Option<Record>> {
        self.limit = Some(1);
        Ok(self.find_many(ctx).await?.into_iter().next())
    }

    /// `SELECT COUNT(*)` honoring the current filter.
    pub async fn count(&self, ctx: &Context) -> Result<u64> {
        let schema = self.schema()?;
        let dialect = self.dialect.as_ref();
        let mut args = ArgList::new(dialect);
        let mut sql = format!(
            "SELECT COUNT(*) FROM {}",
            dialect.quote_ident(&schema.table_name())
        );
        if let Some(condition) = &self.condition {
            let ctx_c = ConditionContext {
                schema: &schema,
                alias: None,
                dialect,
            };
            let fragment = condition.compile(&ctx_c, &mut args)?;
            sql.push_str(" WHERE ");
            sql.push_str(&fragment);
        }
        let row = self.exec.query_row(ctx, &sql, &args.into_values()).await?;
        Ok(row
            .and_then(|r| r.first().and_then(|v| v.as_int()))
            .unwrap_or(0) as u64)
    }

    /// Inserts one record; returns its primary-key value.
    pub async fn create(&self, ctx: &Context, data: RowData) -> Result<Value> {
        let (sql, args) = self.compile_insert(&data)?;
        let schema = self.schema()?;

        if self.dialect.supports_returning() && schema.single_primary_key().is_some() {
            let row = self.exec.query_row(ctx, &sql, &args).await?;
            return Ok(row
                .and_then(|r| r.into_iter().next())
                .unwrap_or(Value::Null));
        }

        let result = self.exec.exec(ctx, &sql, &args).await?;
        if let Some(id) = result.last_insert_id {
            return Ok(Value::Int(id));
        }
        // No generated key reported; fall back to a caller-supplied key.
        Ok(schema
            .single_primary_key()
            .and_then(|pk| data.get(&pk.name).cloned())
            .unwrap_or(Value::Null))
    }

    /// Inserts many records with a single multi-row statement.
    pub async fn create_many(&self, ctx: &Context, rows: &[RowData]) -> Result<CreateManyResult> {
        if rows.is_empty() {
            return Ok(CreateManyResult::default());
        }
        let (sql, args) = self.compile_insert_many(rows)?;
        let schema = self.schema()?;

        if self.dialect.supports_returning() && schema.single_primary_key().is_some() {
            let rs = self.exec.query(ctx, &sql, &args).await?;
            let keys: Vec<Value> = rs
                .rows
                .into_iter()
                .filter_map(|r| r.into_iter().next())
                .collect();
            return Ok(CreateManyResult {
                rows_affected: keys.len() as u64,
                keys,
            });
        }

        let result = self.exec.exec(ctx, &sql, &args).await?;
        Ok(CreateManyResult {
            rows_affected: result.rows_affected,
            keys: Vec::new(),
        })
    }

    /// Updates all rows matching the filter; returns the affected count.
    pub async fn update_many(&self, ctx: &Context, data: RowData) -> Result<u64> {
        let (sql, args) = self.compile_update(&data)?;
        let result = self.exec.exec(ctx, &sql, &args).await?;
        Ok(result.rows_affected)
    }

    /// Deletes all rows matching the filter; returns the affected count.
    pub async fn delete_many(&self, ctx: &Context) -> Result<u64> {
        let (sql, args) = self.compile_delete()?;
        let result = self.exec.exec(ctx, &sql, &args).await?;
        Ok(result.rows_affected)
    }

    // ---- result assembly -------------------------------------------------

    /// Splits joined columns off the base row and nests them by path.
    fn assemble(
        &self,
        schema: &Schema,
        include_plan: &IncludePlan,
        rs: crate::driver::executor::ResultSet,
    ) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(rs.rows.len());
        for row in rs.rows {
            let mut base = Record::new();
            let mut joined: IndexMap<&str, Record> = IndexMap::new();

            for (column, value) in rs.columns.iter().zip(row) {
                match include_plan
                    .joins
                    .iter()
                    .find(|j| column.starts_with(&format!("{}__", j.alias)))
                {
                    Some(join) => {
                        let field = column[join.alias.len() + 2..].to_string();
                        joined
                            .entry(join.alias.as_str())
                            .or_default()
                            .fields
                            .insert(field, value);
                    }
                    None => {
                        let field = schema
                            .field_by_column(column)
                            .map(|f| f.name.clone())
                            .unwrap_or_else(|| column.clone());
                        base.fields.insert(field, value);
                    }
                }
            }

            // Attach join records along their paths; joins are ordered so a
            // parent path always precedes its extensions.
            for join in &include_plan.joins {
                let Some(record) = joined.shift_remove(join.alias.as_str()) else {
                    continue;
                };
                if record.fields.values().all(Value::is_null) {
                    continue;
                }
                // If an intermediate parent was NULL (LEFT JOIN miss), the
                // deeper record is dropped with it.
                let mut target = Some(&mut base);
                for segment in &join.path[..join.path.len() - 1] {
                    target = target
                        .and_then(|t| t.related.get_mut(segment))
                        .and_then(|children| children.first_mut());
                }
                if let Some(parent) = target {
                    let leaf = join.path.last().expect("join path is never empty");
                    parent.related.insert(leaf.clone(), vec![record]);
                }
            }

            records.push(base);
        }
        Ok(records)
    }

    /// Loads a to-many relation with one keyed query and stitches children
    /// onto their parents.
    async fn attach_batched(
        &self,
        ctx: &Context,
        batch: &BatchInclude,
        parents: &mut [Record],
    ) -> Result<()> {
        let mut keys: Vec<Value> = Vec::new();
        for parent in parents.iter() {
            if let Some(value) = parent.get(&batch.parent_key_field) {
                if !value.is_null() && !keys.contains(value) {
                    keys.push(value.clone());
                }
            }
        }
        if keys.is_empty() {
            return Ok(());
        }

        let mut child_query = ModelQuery::new(
            self.exec.clone(),
            self.dialect.clone(),
            self.registry.clone(),
            self.mapper.clone(),
            batch.target_model.clone(),
        )
        .filter(Condition::in_list(batch.child_key_field.clone(), keys));
        for nested in &batch.nested {
            child_query = child_query.include(nested.clone());
        }
        let children = Box::pin(child_query.find_many(ctx)).await?;

        for parent in parents.iter_mut() {
            let Some(parent_key) = parent.get(&batch.parent_key_field).cloned() else {
                continue;
            };
            let matching: Vec<Record> = children
                .iter()
                .filter(|c| c.get(&batch.child_key_field) == Some(&parent_key))
                .cloned()
                .collect();
            parent.related.insert(batch.relation.clone(), matching);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect, SqliteDialect};
    use crate::driver::executor::{ExecResult, ResultSet};
    use crate::schema::model::{Field, FieldType, Relation, RelationKind};
    use async_trait::async_trait;

    /// Executor stub; compile-focused tests never reach it.
    struct NullExecutor;

    #[async_trait]
    impl SqlExecutor for NullExecutor {
        async fn exec(&self, _: &Context, _: &str, _: &[Value]) -> Result<ExecResult> {
            Ok(ExecResult::default())
        }

        async fn query(&self, _: &Context, _: &str, _: &[Value]) -> Result<ResultSet> {
            Ok(ResultSet::empty())
        }
    }

    fn registry() -> SchemaRegistry {
        let registry = SchemaRegistry::new();
        registry
            .register(
                Schema::new("User")
                    .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
                    .add_field(Field::new("name", FieldType::String))
                    .add_field(Field::new("age", FieldType::Int).nullable())
                    .add_relation(Relation::new("posts", RelationKind::OneToMany, "Post")),
            )
            .unwrap();
        registry
            .register(
                Schema::new("Post")
                    .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
                    .add_field(Field::new("title", FieldType::String))
                    .add_field(Field::new("authorId", FieldType::Int).column("author_id"))
                    .add_relation(
                        Relation::new("author", RelationKind::ManyToOne, "User")
                            .foreign_key("authorId"),
                    ),
            )
            .unwrap();
        registry
    }

    fn query(model: &str, dialect: Arc<dyn Dialect>) -> ModelQuery {
        let registry = registry();
        let mapper = FieldMapper::new(registry.clone());
        ModelQuery::new(Arc::new(NullExecutor), dialect, registry, mapper, model)
    }

    #[test]
    fn select_with_filter_order_limit_on_postgres() {
        let q = query("User", Arc::new(PostgresDialect))
            .filter(Condition::contains("name", "li").and(Condition::gte("age", 25)))
            .order_by_nulls("age", SortDirection::Asc, Some(false))
            .limit(10);
        let (sql, args, _) = q.compile_select().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" WHERE \"name\" LIKE $1 AND \"age\" >= $2 \
             ORDER BY \"age\" ASC NULLS LAST LIMIT 10"
        );
        assert_eq!(args, vec![Value::Text("%li%".into()), Value::Int(25)]);
    }

    #[test]
    fn offset_without_limit_gets_sentinel_on_mysql() {
        let q = query("User", Arc::new(MySqlDialect)).offset(20);
        let (sql, _, _) = q.compile_select().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `users` LIMIT 18446744073709551615 OFFSET 20"
        );
    }

    #[test]
    fn offset_without_limit_is_plain_on_postgres() {
        let q = query("User", Arc::new(PostgresDialect)).offset(20);
        let (sql, _, _) = q.compile_select().unwrap();
        assert_eq!(sql, "SELECT * FROM \"users\" OFFSET 20");
    }

    #[test]
    fn explicit_projection_resolves_columns() {
        let q = query("Post", Arc::new(PostgresDialect)).select(["title", "authorId"]);
        let (sql, _, _) = q.compile_select().unwrap();
        assert_eq!(sql, "SELECT \"title\", \"author_id\" FROM \"posts\"");
    }

    #[test]
    fn distinct_on_postgres_vs_fallback() {
        let pg = query("User", Arc::new(PostgresDialect)).distinct_on(["name"]);
        let (sql, _, _) = pg.compile_select().unwrap();
        assert_eq!(sql, "SELECT DISTINCT ON (\"name\") * FROM \"users\"");

        let my = query("User", Arc::new(MySqlDialect)).distinct_on(["name"]);
        let (sql, _, _) = my.compile_select().unwrap();
        assert_eq!(sql, "SELECT * FROM `users` GROUP BY `name`");
    }

    #[test]
    fn aggregates_and_group_by() {
        let q = query("User", Arc::new(PostgresDialect))
            .group_by(["name"])
            .aggregate(AggregateFunc::Count, None, "n")
            .aggregate(AggregateFunc::Avg, Some("age"), "avg_age");
        let (sql, _, _) = q.compile_select().unwrap();
        assert_eq!(
            sql,
            "SELECT \"name\", COUNT(*) AS \"n\", AVG(\"age\") AS \"avg_age\" \
             FROM \"users\" GROUP BY \"name\""
        );
    }

    #[test]
    fn to_one_include_joins_and_aliases() {
        let q = query("Post", Arc::new(PostgresDialect)).include("author");
        let (sql, _, plan) = q.compile_select().unwrap();
        assert!(sql.starts_with("SELECT \"t0\".*, "));
        assert!(sql.contains("\"t1\".\"id\" AS \"t1__id\""));
        assert!(sql.contains(
            "FROM \"posts\" AS \"t0\" LEFT JOIN \"users\" AS \"t1\" \
             ON \"t1\".\"id\" = \"t0\".\"author_id\""
        ));
        assert_eq!(plan.joins.len(), 1);
    }

    #[test]
    fn insert_compiles_in_payload_order() {
        let q = query("Post", Arc::new(PostgresDialect));
        let data = RowData::new().with("title", "Hello").with("authorId", 7);
        let (sql, args) = q.compile_insert(&data).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"posts\" (\"title\", \"author_id\") VALUES ($1, $2) RETURNING \"id\""
        );
        assert_eq!(args, vec![Value::Text("Hello".into()), Value::Int(7)]);
    }

    #[test]
    fn insert_without_returning_on_mysql() {
        let q = query("Post", Arc::new(MySqlDialect));
        let data = RowData::new().with("title", "Hello");
        let (sql, _) = q.compile_insert(&data).unwrap();
        assert_eq!(sql, "INSERT INTO `posts` (`title`) VALUES (?)");
    }

    #[test]
    fn empty_insert_uses_default_values_where_supported() {
        let q = query("User", Arc::new(SqliteDialect));
        let (sql, args) = q.compile_insert(&RowData::new()).unwrap();
        assert_eq!(sql, "INSERT INTO `users` DEFAULT VALUES");
        assert!(args.is_empty());

        let q = query("User", Arc::new(MySqlDialect));
        let (sql, _) = q.compile_insert(&RowData::new()).unwrap();
        assert_eq!(sql, "INSERT INTO `users` () VALUES ()");
    }

    #[test]
    fn create_many_emits_one_tuple_per_row() {
        let q = query("Post", Arc::new(MySqlDialect));
        let rows = vec![
            RowData::new().with("title", "a").with("authorId", 1),
            RowData::new().with("title", "b").with("authorId", 2),
            RowData::new().with("title", "c").with("authorId", 3),
        ];
        let (sql, args) = q.compile_insert_many(&rows).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `posts` (`title`, `author_id`) VALUES (?, ?), (?, ?), (?, ?)"
        );
        assert_eq!(args.len(), 6);
    }

    #[test]
    fn create_many_fills_missing_columns_with_null() {
        let q = query("Post", Arc::new(MySqlDialect));
        let rows = vec![
            RowData::new().with("title", "a").with("authorId", 1),
            RowData::new().with("title", "b"),
        ];
        let (_, args) = q.compile_insert_many(&rows).unwrap();
        assert_eq!(args[3], Value::Null);
    }

    #[test]
    fn update_without_predicate_is_rejected() {
        let q = query("User", Arc::new(PostgresDialect));
        let err = q
            .compile_update(&RowData::new().with("name", "x"))
            .unwrap_err();
        assert!(matches!(err, Error::SqlCompile { .. }));

        let q = query("User", Arc::new(PostgresDialect)).allow_unfiltered();
        let (sql, _) = q.compile_update(&RowData::new().with("name", "x")).unwrap();
        assert_eq!(sql, "UPDATE \"users\" SET \"name\" = $1");
    }

    #[test]
    fn update_with_predicate_reuses_condition_compiler() {
        let q = query("User", Arc::new(PostgresDialect)).filter(Condition::eq("id", 5));
        let (sql, args) = q
            .compile_update(&RowData::new().with("name", "x").with("age", 30))
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE \"users\" SET \"name\" = $1, \"age\" = $2 WHERE \"id\" = $3"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn delete_without_predicate_is_rejected() {
        let q = query("User", Arc::new(SqliteDialect));
        assert!(q.compile_delete().is_err());

        let q = query("User", Arc::new(SqliteDialect)).allow_unfiltered();
        let (sql, _) = q.compile_delete().unwrap();
        assert_eq!(sql, "DELETE FROM `users`");
    }

    #[test]
    fn update_with_empty_set_is_rejected() {
        let q = query("User", Arc::new(PostgresDialect)).filter(Condition::eq("id", 1));
        let err = q.compile_update(&RowData::new()).unwrap_err();
        assert!(matches!(err, Error::SqlCompile { .. }));
    }

    #[test]
    fn placeholders_are_contiguous() {
        let q = query("User", Arc::new(PostgresDialect))
            .filter(
                Condition::in_list("age", [1, 2, 3])
                    .and(Condition::between("age", 10, 20))
                    .and(Condition::eq("name", "x")),
            );
        let (sql, args, _) = q.compile_select().unwrap();
        for i in 1..=args.len() {
            assert!(sql.contains(&format!("${i}")), "missing ${i} in {sql}");
        }
        assert!(!sql.contains(&format!("${}", args.len() + 1)));
    }
}
