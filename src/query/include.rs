// SPDX-License-Identifier: Apache-2.0

//! Eager loading of related records.
//!
//! A to-one relation is materialized with a LEFT JOIN in the primary query;
//! a to-many relation would multiply rows, so it runs as a second query
//! keyed by the parent primary keys and the children are stitched onto the
//! parents in memory.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::model::{Relation, Schema};
use crate::schema::SchemaRegistry;

/// One LEFT JOIN produced by a to-one include.
#[derive(Debug, Clone)]
pub(crate) struct JoinSpec {
    /// Relation path from the root, e.g. `["author", "profile"]`.
    pub path: Vec<String>,
    /// Table alias of the joined side (`t1`, `t2`, …).
    pub alias: String,
    /// Alias of the parent side of the join.
    pub parent_alias: String,
    pub target_model: String,
    /// Join columns: parent-side and joined-side column names.
    pub parent_column: String,
    pub target_column: String,
}

/// One keyed second query produced by a to-many include.
#[derive(Debug, Clone)]
pub(crate) struct BatchInclude {
    pub relation: String,
    pub target_model: String,
    /// Field on the child holding the key.
    pub child_key_field: String,
    /// Field on the parent providing the key values.
    pub parent_key_field: String,
    /// Remaining include path, forwarded to the child query.
    pub nested: Vec<String>,
}

/// Join and batch work derived from the builder's include list.
#[derive(Debug, Clone, Default)]
pub(crate) struct IncludePlan {
    pub joins: Vec<JoinSpec>,
    pub batched: Vec<BatchInclude>,
}

/// Resolves the join columns of a to-one relation.
///
/// The owning side holds the key locally; the inverse side of a one-to-one
/// finds the owning relation on the target.
fn to_one_columns(
    schema: &Schema,
    relation: &Relation,
    target: &Schema,
) -> Result<(String, String)> {
    if relation.is_owning() {
        let fk = relation.foreign_key.as_ref().ok_or_else(|| {
            Error::sql_compile(format!(
                "relation {} on {} has no foreign key",
                relation.name, schema.name
            ))
        })?;
        let local = schema.column_name(fk)?.to_string();
        let referenced = match &relation.references {
            Some(field) => target.column_name(field)?.to_string(),
            None => target
                .single_primary_key()
                .map(|f| f.column_name().to_string())
                .ok_or_else(|| {
                    Error::sql_compile(format!(
                        "relation {} on {}: target {} has no single primary key",
                        relation.name, schema.name, target.name
                    ))
                })?,
        };
        Ok((local, referenced))
    } else {
        let inverse = target
            .relations
            .iter()
            .find(|r| r.target == schema.name && r.is_owning())
            .ok_or_else(|| {
                Error::sql_compile(format!(
                    "relation {} on {}: no owning side found on {}",
                    relation.name, schema.name, target.name
                ))
            })?;
        let target_fk = inverse.foreign_key.as_ref().ok_or_else(|| {
            Error::sql_compile(format!(
                "relation {} on {} has no foreign key",
                inverse.name, target.name
            ))
        })?;
        let target_col = target.column_name(target_fk)?.to_string();
        let local = match &inverse.references {
            Some(field) => schema.column_name(field)?.to_string(),
            None => schema
                .single_primary_key()
                .map(|f| f.column_name().to_string())
                .ok_or_else(|| {
                    Error::sql_compile(format!(
                        "model {} has no single primary key to join on",
                        schema.name
                    ))
                })?,
        };
        Ok((local, target_col))
    }
}

/// Resolves the key fields of a to-many relation for batched loading.
///
/// Looks for the owning inverse on the child; falls back to the declared
/// `foreign_key`/`references` pair (many-to-many without junction metadata
/// degrades to the same keyed query).
fn to_many_fields(schema: &Schema, relation: &Relation, target: &Schema) -> Result<(String, String)> {
    if let Some(inverse) = target
        .relations
        .iter()
        .find(|r| r.target == schema.name && r.is_owning())
    {
        let child_field = inverse.foreign_key.clone().ok_or_else(|| {
            Error::sql_compile(format!(
                "relation {} on {} has no foreign key",
                inverse.name, target.name
            ))
        })?;
        let parent_field = match &inverse.references {
            Some(field) => field.clone(),
            None => schema
                .single_primary_key()
                .map(|f| f.name.clone())
                .ok_or_else(|| {
                    Error::sql_compile(format!(
                        "model {} has no single primary key to batch on",
                        schema.name
                    ))
                })?,
        };
        return Ok((child_field, parent_field));
    }

    if let Some(child_field) = &relation.foreign_key {
        let parent_field = match &relation.references {
            Some(field) => field.clone(),
            None => schema
                .single_primary_key()
                .map(|f| f.name.clone())
                .ok_or_else(|| {
                    Error::sql_compile(format!(
                        "model {} has no single primary key to batch on",
                        schema.name
                    ))
                })?,
        };
        return Ok((child_field.clone(), parent_field));
    }

    Err(Error::sql_compile(format!(
        "relation {} on {}: cannot resolve the child key field",
        relation.name, schema.name
    )))
}

/// Builds the include plan for a root schema and its include paths.
///
/// Dot paths chain to-one joins (`"author.profile"`). A to-many relation is
/// only valid as the first segment; its remaining path is forwarded to the
/// child query.
pub(crate) fn plan_includes(
    registry: &SchemaRegistry,
    root: &Arc<Schema>,
    includes: &[String],
) -> Result<IncludePlan> {
    let mut plan = IncludePlan::default();
    let mut next_alias = 1usize;

    for include in includes {
        let segments: Vec<&str> = include.split('.').collect();
        let first = segments[0];
        let relation = root
            .relation(first)
            .ok_or_else(|| Error::sql_compile(format!(
                "unknown relation {} on model {}",
                first, root.name
            )))?;

        if relation.kind.is_to_one() {
            let mut current_schema = root.clone();
            let mut current_alias = "t0".to_string();
            let mut path: Vec<String> = Vec::new();

            for segment in &segments {
                let relation = current_schema.relation(segment).ok_or_else(|| {
                    Error::sql_compile(format!(
                        "unknown relation {} on model {}",
                        segment, current_schema.name
                    ))
                })?;
                if !relation.kind.is_to_one() {
                    return Err(Error::sql_compile(format!(
                        "include path {include}: to-many relation {segment} must be the first \
                         segment",
                    )));
                }
                let target = registry.get(&relation.target)?;
                let (parent_column, target_column) =
                    to_one_columns(&current_schema, relation, &target)?;
                path.push(segment.to_string());

                // The same prefix may already be joined by another path.
                let existing = plan.joins.iter().find(|j| j.path == path);
                let alias = match existing {
                    Some(join) => join.alias.clone(),
                    None => {
                        let alias = format!("t{next_alias}");
                        next_alias += 1;
                        plan.joins.push(JoinSpec {
                            path: path.clone(),
                            alias: alias.clone(),
                            parent_alias: current_alias.clone(),
                            target_model: target.name.clone(),
                            parent_column,
                            target_column,
                        });
                        alias
                    }
                };

                current_alias = alias;
                current_schema = target;
            }
        } else {
            let target = registry.get(&relation.target)?;
            let (child_key_field, parent_key_field) = to_many_fields(root, relation, &target)?;
            plan.batched.push(BatchInclude {
                relation: first.to_string(),
                target_model: relation.target.clone(),
                child_key_field,
                parent_key_field,
                nested: segments[1..].iter().map(|s| s.to_string()).collect(),
            });
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{Field, FieldType, RelationKind};

    fn registry() -> SchemaRegistry {
        let registry = SchemaRegistry::new();
        registry
            .register(
                Schema::new("User")
                    .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
                    .add_field(Field::new("name", FieldType::String))
                    .add_relation(Relation::new("posts", RelationKind::OneToMany, "Post")),
            )
            .unwrap();
        registry
            .register(
                Schema::new("Post")
                    .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
                    .add_field(Field::new("authorId", FieldType::Int).column("author_id"))
                    .add_relation(
                        Relation::new("author", RelationKind::ManyToOne, "User")
                            .foreign_key("authorId"),
                    ),
            )
            .unwrap();
        registry
    }

    #[test]
    fn to_one_include_becomes_a_join() {
        let registry = registry();
        let post = registry.get("Post").unwrap();
        let plan = plan_includes(&registry, &post, &["author".to_string()]).unwrap();
        assert_eq!(plan.joins.len(), 1);
        assert!(plan.batched.is_empty());
        let join = &plan.joins[0];
        assert_eq!(join.alias, "t1");
        assert_eq!(join.parent_alias, "t0");
        assert_eq!(join.parent_column, "author_id");
        assert_eq!(join.target_column, "id");
        assert_eq!(join.target_model, "User");
    }

    #[test]
    fn to_many_include_becomes_a_batch() {
        let registry = registry();
        let user = registry.get("User").unwrap();
        let plan = plan_includes(&registry, &user, &["posts".to_string()]).unwrap();
        assert!(plan.joins.is_empty());
        assert_eq!(plan.batched.len(), 1);
        let batch = &plan.batched[0];
        assert_eq!(batch.child_key_field, "authorId");
        assert_eq!(batch.parent_key_field, "id");
        assert_eq!(batch.target_model, "Post");
    }

    #[test]
    fn to_many_after_to_one_is_rejected() {
        let registry = registry();
        let post = registry.get("Post").unwrap();
        let err = plan_includes(&registry, &post, &["author.posts".to_string()]).unwrap_err();
        assert!(matches!(err, Error::SqlCompile { .. }));
    }

    #[test]
    fn nested_to_many_path_is_forwarded() {
        let registry = registry();
        let user = registry.get("User").unwrap();
        let plan = plan_includes(&registry, &user, &["posts.author".to_string()]).unwrap();
        assert_eq!(plan.batched[0].nested, ["author"]);
    }
}
