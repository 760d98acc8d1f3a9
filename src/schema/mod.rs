// SPDX-License-Identifier: Apache-2.0

//! Schema IR: models, naming, name mapping and the dependency graph.

pub mod graph;
pub mod mapper;
pub mod model;
pub mod naming;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

pub use mapper::FieldMapper;
pub use model::{DefaultValue, Field, FieldType, Index, Relation, RelationKind, Schema};
pub use naming::{DefaultNaming, NamingPolicy};

/// External boundary for the schema-language parser.
///
/// The Prisma-like text grammar is parsed outside the core; installing a
/// parser enables `Driver::load_schema`.
pub trait SchemaParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<Vec<Schema>>;
}

/// Shared registry of validated schemas, guarded by a read-write lock.
///
/// Reads (query compilation, sync snapshots) are shared; writes (register)
/// are exclusive. Schemas are immutable once registered.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<Schema>>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a schema. Re-registering a name replaces it.
    pub fn register(&self, schema: Schema) -> Result<()> {
        schema.validate()?;
        let mut inner = self.inner.write();
        inner.insert(schema.name.clone(), Arc::new(schema));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Schema>> {
        self.inner
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_model(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Stable snapshot of all registered schemas, sorted by model name.
    pub fn snapshot(&self) -> Vec<Arc<Schema>> {
        let mut all: Vec<Arc<Schema>> = self.inner.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
