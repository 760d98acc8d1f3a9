// SPDX-License-Identifier: Apache-2.0

//! In-memory schema representation: models, fields, relations and indexes.
//!
//! A [`Schema`] is built by the external schema-language parser or
//! programmatically through the fluent builder, validated once, and then
//! registered with a driver. After registration it is immutable.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::naming::{DefaultNaming, NamingPolicy};
use crate::value::Value;

/// Logical field types, mapped to dialect column types by the DDL layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    String,
    Int,
    Int64,
    Float,
    Bool,
    DateTime,
    Decimal,
    Json,
    Array(Box<FieldType>),
}

impl FieldType {
    /// True for types that may carry an auto-increment flag.
    pub fn is_integer(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Int64)
    }
}

/// A field default: a literal value or a recognized function token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultValue {
    Value(Value),
    /// `now()` / `CURRENT_TIMESTAMP`, rendered per dialect.
    Now,
}

impl DefaultValue {
    /// Parses the recognized function tokens, falling back to a literal.
    pub fn from_token(token: &str) -> Self {
        let trimmed = token.trim();
        if trimmed.eq_ignore_ascii_case("now()") || trimmed.eq_ignore_ascii_case("current_timestamp")
        {
            DefaultValue::Now
        } else {
            DefaultValue::Value(Value::Text(trimmed.to_string()))
        }
    }
}

/// A single model field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Column name override (`@map`); derived from the field name otherwise.
    pub column: Option<String>,
    pub field_type: FieldType,
    /// Dialect-specific column type override (`@db.*`-style).
    pub native_type: Option<String>,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub indexed: bool,
    pub default: Option<DefaultValue>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            column: None,
            field_type,
            native_type: None,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            indexed: false,
            default: None,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn native_type(mut self, native: impl Into<String>) -> Self {
        self.native_type = Some(native.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// The physical column name for this field.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Relation cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    /// True when the related side yields at most one row.
    pub fn is_to_one(&self) -> bool {
        matches!(self, RelationKind::OneToOne | RelationKind::ManyToOne)
    }
}

/// A named relation to another model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub target: String,
    /// Local foreign-key field; present on the owning side.
    pub foreign_key: Option<String>,
    /// Referenced field on the target; defaults to the target's primary key.
    pub references: Option<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

impl Relation {
    pub fn new(name: impl Into<String>, kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            foreign_key: None,
            references: None,
            on_delete: None,
            on_update: None,
        }
    }

    pub fn foreign_key(mut self, field: impl Into<String>) -> Self {
        self.foreign_key = Some(field.into());
        self
    }

    pub fn references(mut self, field: impl Into<String>) -> Self {
        self.references = Some(field.into());
        self
    }

    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = Some(action.into());
        self
    }

    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.on_update = Some(action.into());
        self
    }

    /// True when this side holds the foreign key.
    ///
    /// Only owning relations contribute dependency edges and FK clauses.
    pub fn is_owning(&self) -> bool {
        match self.kind {
            RelationKind::ManyToOne => true,
            RelationKind::OneToOne => self.foreign_key.is_some(),
            _ => false,
        }
    }
}

/// A named index over one or more fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Empty name means "generate `idx_<table>_<cols>` / `uniq_<table>_<cols>`".
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

impl Index {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            name: String::new(),
            fields,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The effective index name for `table`, generating one if unset.
    pub fn effective_name(&self, table: &str) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        let prefix = if self.unique { "uniq" } else { "idx" };
        format!("{}_{}_{}", prefix, table, self.fields.join("_"))
    }
}

/// Declarative description of one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    /// Table name override (`@@map`); derived by the naming policy otherwise.
    pub table: Option<String>,
    pub fields: Vec<Field>,
    pub relations: Vec<Relation>,
    pub indexes: Vec<Index>,
    /// Ordered field names of a composite primary key (`@@id`).
    pub composite_key: Option<Vec<String>>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: Vec::new(),
            relations: Vec::new(),
            indexes: Vec::new(),
            composite_key: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn add_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn add_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn set_composite_key(mut self, fields: Vec<String>) -> Self {
        self.composite_key = Some(fields);
        self
    }

    /// The physical table name, via the default naming policy.
    pub fn table_name(&self) -> String {
        self.table_name_with(&DefaultNaming)
    }

    /// The physical table name under a caller-supplied policy.
    pub fn table_name_with(&self, policy: &dyn NamingPolicy) -> String {
        match &self.table {
            Some(t) => t.clone(),
            None => policy.table_name(&self.name),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.column_name() == column)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Column name for a schema field, or `UnknownField`.
    pub fn column_name(&self, field: &str) -> Result<&str> {
        self.field(field)
            .map(|f| f.column_name())
            .ok_or_else(|| Error::unknown_field(&self.name, field))
    }

    /// Fields forming the primary key: composite key order if declared,
    /// otherwise the `primary_key`-flagged fields in declaration order.
    pub fn primary_key_fields(&self) -> Vec<&Field> {
        if let Some(composite) = &self.composite_key {
            composite.iter().filter_map(|n| self.field(n)).collect()
        } else {
            self.fields.iter().filter(|f| f.primary_key).collect()
        }
    }

    /// The single primary-key field, if there is exactly one.
    pub fn single_primary_key(&self) -> Option<&Field> {
        let pks = self.primary_key_fields();
        if pks.len() == 1 {
            Some(pks[0])
        } else {
            None
        }
    }

    /// Validates structural invariants prior to registration.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::schema_invalid("model name must not be empty"));
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::schema_invalid(format!(
                    "duplicate field {} on model {}",
                    field.name, self.name
                )));
            }
            if field.auto_increment && !field.field_type.is_integer() {
                return Err(Error::schema_invalid(format!(
                    "auto-increment field {} on model {} must be an integer type",
                    field.name, self.name
                )));
            }
        }

        if let Some(composite) = &self.composite_key {
            for name in composite {
                if self.field(name).is_none() {
                    return Err(Error::schema_invalid(format!(
                        "composite key references unknown field {} on model {}",
                        name, self.name
                    )));
                }
            }
        }
        if self.primary_key_fields().is_empty() {
            return Err(Error::schema_invalid(format!(
                "model {} must declare a primary key or composite key",
                self.name
            )));
        }

        for index in &self.indexes {
            for name in &index.fields {
                if self.field(name).is_none() {
                    return Err(Error::schema_invalid(format!(
                        "index {} references unknown field {} on model {}",
                        index.effective_name(&self.table_name()),
                        name,
                        self.name
                    )));
                }
            }
        }

        for relation in &self.relations {
            if let Some(fk) = &relation.foreign_key {
                if self.field(fk).is_none() {
                    return Err(Error::schema_invalid(format!(
                        "relation {} references unknown foreign-key field {} on model {}",
                        relation.name, fk, self.name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> Schema {
        Schema::new("User")
            .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
            .add_field(Field::new("name", FieldType::String))
            .add_field(Field::new("email", FieldType::String).unique())
    }

    #[test]
    fn derives_table_name() {
        assert_eq!(user_schema().table_name(), "users");
        assert_eq!(
            Schema::new("BlogPost").table("posts").table_name(),
            "posts"
        );
    }

    #[test]
    fn validate_accepts_well_formed_schema() {
        assert!(user_schema().validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_field() {
        let schema = user_schema().add_field(Field::new("name", FieldType::String));
        assert!(matches!(
            schema.validate(),
            Err(Error::SchemaInvalid { .. })
        ));
    }

    #[test]
    fn validate_rejects_missing_primary_key() {
        let schema = Schema::new("Orphan").add_field(Field::new("name", FieldType::String));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn validate_rejects_auto_increment_on_text() {
        let schema = Schema::new("Bad")
            .add_field(Field::new("id", FieldType::String).primary_key().auto_increment());
        assert!(schema.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_index_field() {
        let schema = user_schema().add_index(Index::new(vec!["missing".into()]));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn composite_key_counts_as_primary_key() {
        let schema = Schema::new("Membership")
            .add_field(Field::new("userId", FieldType::Int))
            .add_field(Field::new("teamId", FieldType::Int))
            .set_composite_key(vec!["userId".into(), "teamId".into()]);
        assert!(schema.validate().is_ok());
        let pk: Vec<&str> = schema
            .primary_key_fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(pk, ["userId", "teamId"]);
    }

    #[test]
    fn owning_side_detection() {
        let owning = Relation::new("author", RelationKind::ManyToOne, "User")
            .foreign_key("authorId");
        assert!(owning.is_owning());

        let inverse = Relation::new("posts", RelationKind::OneToMany, "Post");
        assert!(!inverse.is_owning());

        let one_owning =
            Relation::new("profile", RelationKind::OneToOne, "Profile").foreign_key("profileId");
        assert!(one_owning.is_owning());

        let one_inverse = Relation::new("user", RelationKind::OneToOne, "User");
        assert!(!one_inverse.is_owning());
    }

    #[test]
    fn generated_index_names() {
        let idx = Index::new(vec!["email".into()]);
        assert_eq!(idx.effective_name("users"), "idx_users_email");
        let uniq = Index::new(vec!["email".into()]).unique();
        assert_eq!(uniq.effective_name("users"), "uniq_users_email");
        let named = Index::new(vec!["email".into()]).named("custom");
        assert_eq!(named.effective_name("users"), "custom");
    }

    #[test]
    fn default_value_token_parsing() {
        assert_eq!(DefaultValue::from_token("now()"), DefaultValue::Now);
        assert_eq!(
            DefaultValue::from_token("CURRENT_TIMESTAMP"),
            DefaultValue::Now
        );
        assert_eq!(
            DefaultValue::from_token("draft"),
            DefaultValue::Value(Value::Text("draft".into()))
        );
    }
}
