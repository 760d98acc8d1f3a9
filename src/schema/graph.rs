// SPDX-License-Identifier: Apache-2.0

//! Dependency ordering for DDL.
//!
//! Models are sorted so that every referenced model is created before its
//! referrers. An edge exists only where a foreign key is locally held;
//! non-owning relation sides do not constrain ordering.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::model::Schema;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Topologically sorts `schemas` by owning-relation dependencies.
///
/// Returns model names with dependencies first. Self-references and targets
/// outside the given set are skipped. A cycle yields `CircularDependency`
/// naming the model where the cycle was detected; ties between independent
/// models break deterministically by name.
pub fn toposort(schemas: &[Arc<Schema>]) -> Result<Vec<String>> {
    let by_name: HashMap<&str, &Arc<Schema>> =
        schemas.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut names: Vec<&str> = by_name.keys().copied().collect();
    names.sort_unstable();

    let mut marks: HashMap<&str, Mark> = names.iter().map(|n| (*n, Mark::Unvisited)).collect();
    let mut order: Vec<String> = Vec::with_capacity(names.len());

    fn visit<'a>(
        name: &'a str,
        by_name: &HashMap<&'a str, &'a Arc<Schema>>,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks[name] {
            Mark::Done => return Ok(()),
            Mark::OnStack => return Err(Error::circular_dependency(name)),
            Mark::Unvisited => {}
        }
        marks.insert(name, Mark::OnStack);

        let schema = by_name[name];
        let mut targets: Vec<&str> = schema
            .relations
            .iter()
            .filter(|r| r.is_owning())
            .map(|r| r.target.as_str())
            .filter(|t| *t != name && by_name.contains_key(t))
            .collect();
        targets.sort_unstable();
        targets.dedup();

        for target in targets {
            visit(target, by_name, marks, order)?;
        }

        marks.insert(name, Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    for name in names.iter().copied() {
        visit(name, &by_name, &mut marks, &mut order)?;
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{Field, FieldType, Relation, RelationKind};

    fn schema(name: &str) -> Schema {
        Schema::new(name)
            .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
    }

    fn arcs(schemas: Vec<Schema>) -> Vec<Arc<Schema>> {
        schemas.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn linear_chain_orders_dependencies_first() {
        let user = schema("User");
        let post = schema("Post").add_relation(
            Relation::new("author", RelationKind::ManyToOne, "User").foreign_key("id"),
        );
        let order = toposort(&arcs(vec![post, user])).unwrap();
        assert_eq!(order, ["User", "Post"]);
    }

    #[test]
    fn three_level_chain() {
        let user = schema("User");
        let post = schema("Post").add_relation(
            Relation::new("author", RelationKind::ManyToOne, "User").foreign_key("id"),
        );
        let comment = schema("Comment").add_relation(
            Relation::new("post", RelationKind::ManyToOne, "Post").foreign_key("id"),
        );
        let order = toposort(&arcs(vec![comment, user, post])).unwrap();
        assert_eq!(order, ["User", "Post", "Comment"]);
    }

    #[test]
    fn independent_models_sort_by_name() {
        let order = toposort(&arcs(vec![schema("Zebra"), schema("Apple")])).unwrap();
        assert_eq!(order, ["Apple", "Zebra"]);
    }

    #[test]
    fn cycle_is_reported() {
        let user = schema("User").add_relation(
            Relation::new("profile", RelationKind::OneToOne, "Profile").foreign_key("id"),
        );
        let profile = schema("Profile").add_relation(
            Relation::new("user", RelationKind::ManyToOne, "User").foreign_key("id"),
        );
        let err = toposort(&arcs(vec![user, profile])).unwrap_err();
        assert!(matches!(err, Error::CircularDependency { .. }));
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        let node = schema("Category").add_relation(
            Relation::new("parent", RelationKind::ManyToOne, "Category").foreign_key("id"),
        );
        let order = toposort(&arcs(vec![node])).unwrap();
        assert_eq!(order, ["Category"]);
    }

    #[test]
    fn external_target_is_skipped() {
        let post = schema("Post").add_relation(
            Relation::new("author", RelationKind::ManyToOne, "User").foreign_key("id"),
        );
        let order = toposort(&arcs(vec![post])).unwrap();
        assert_eq!(order, ["Post"]);
    }

    #[test]
    fn non_owning_relations_create_no_edge() {
        // User -> posts (oneToMany) must not force Post before User.
        let user = schema("User")
            .add_relation(Relation::new("posts", RelationKind::OneToMany, "Post"));
        let post = schema("Post").add_relation(
            Relation::new("author", RelationKind::ManyToOne, "User").foreign_key("id"),
        );
        let order = toposort(&arcs(vec![user, post])).unwrap();
        assert_eq!(order, ["User", "Post"]);
    }
}
