// SPDX-License-Identifier: Apache-2.0

//! Model/table and field/column name resolution.
//!
//! The mapper is the single place where schema-space identifiers (model and
//! field names) are translated to database-space identifiers (tables and
//! columns) and back. Payload mapping silently drops unknown keys; callers
//! that need strictness validate the payload up front.

use crate::error::Result;
use crate::schema::SchemaRegistry;
use crate::value::{Record, RowData};

/// Resolves names against the driver's shared schema registry.
#[derive(Clone)]
pub struct FieldMapper {
    registry: SchemaRegistry,
}

impl FieldMapper {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Table name for a model.
    pub fn model_to_table(&self, model: &str) -> Result<String> {
        Ok(self.registry.get(model)?.table_name())
    }

    /// Column name for a schema field.
    pub fn schema_to_column(&self, model: &str, field: &str) -> Result<String> {
        let schema = self.registry.get(model)?;
        Ok(schema.column_name(field)?.to_string())
    }

    /// Schema field name for a column; columns without a mapped field come
    /// back unchanged (raw projections, aggregate aliases).
    pub fn column_to_schema(&self, model: &str, column: &str) -> Result<String> {
        let schema = self.registry.get(model)?;
        Ok(schema
            .field_by_column(column)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| column.to_string()))
    }

    /// Batch variant of [`schema_to_column`](Self::schema_to_column).
    pub fn schema_fields_to_columns(&self, model: &str, fields: &[String]) -> Result<Vec<String>> {
        let schema = self.registry.get(model)?;
        fields
            .iter()
            .map(|f| Ok(schema.column_name(f)?.to_string()))
            .collect()
    }

    /// Converts a field-keyed payload to column space.
    ///
    /// Unknown keys are skipped ("skip" policy); order is preserved.
    pub fn map_data(&self, model: &str, data: &RowData) -> Result<RowData> {
        let schema = self.registry.get(model)?;
        let mut mapped = RowData::new();
        for (field, value) in &data.fields {
            if let Some(f) = schema.field(field) {
                mapped.set(f.column_name(), value.clone());
            }
        }
        Ok(mapped)
    }

    /// Converts a column-keyed result row back into a field-keyed record.
    pub fn unmap_row(
        &self,
        model: &str,
        columns: &[String],
        values: Vec<crate::value::Value>,
    ) -> Result<Record> {
        let schema = self.registry.get(model)?;
        let mut record = Record::new();
        for (column, value) in columns.iter().zip(values) {
            let field = schema
                .field_by_column(column)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| column.clone());
            record.fields.insert(field, value);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::model::{Field, FieldType, Schema};
    use crate::value::Value;

    fn mapper() -> FieldMapper {
        let registry = SchemaRegistry::new();
        registry
            .register(
                Schema::new("User")
                    .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
                    .add_field(Field::new("firstName", FieldType::String).column("first_name"))
                    .add_field(Field::new("email", FieldType::String)),
            )
            .unwrap();
        FieldMapper::new(registry)
    }

    #[test]
    fn resolves_tables_and_columns() {
        let mapper = mapper();
        assert_eq!(mapper.model_to_table("User").unwrap(), "users");
        assert_eq!(
            mapper.schema_to_column("User", "firstName").unwrap(),
            "first_name"
        );
        assert_eq!(mapper.schema_to_column("User", "email").unwrap(), "email");
        assert_eq!(
            mapper.column_to_schema("User", "first_name").unwrap(),
            "firstName"
        );
    }

    #[test]
    fn unknown_lookups_error() {
        let mapper = mapper();
        assert!(matches!(
            mapper.model_to_table("Ghost"),
            Err(Error::UnknownModel { .. })
        ));
        assert!(matches!(
            mapper.schema_to_column("User", "ghost"),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn map_data_skips_unknown_keys() {
        let mapper = mapper();
        let data = RowData::new()
            .with("firstName", "Ada")
            .with("ghost", 1)
            .with("email", "ada@example.com");
        let mapped = mapper.map_data("User", &data).unwrap();
        let keys: Vec<&String> = mapped.fields.keys().collect();
        assert_eq!(keys, ["first_name", "email"]);
    }

    #[test]
    fn unmap_row_restores_field_names() {
        let mapper = mapper();
        let record = mapper
            .unmap_row(
                "User",
                &["first_name".to_string(), "email".to_string()],
                vec![Value::Text("Ada".into()), Value::Text("a@b.c".into())],
            )
            .unwrap();
        assert_eq!(record.get("firstName"), Some(&Value::Text("Ada".into())));
        assert_eq!(record.get("email"), Some(&Value::Text("a@b.c".into())));
    }
}
