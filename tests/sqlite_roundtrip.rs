// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests against in-memory SQLite: schema sync round-trips,
//! CRUD through the query compiler, transactions, and eager loading.

use ferrite_orm::{
    connect, Condition, Context, Driver, Error, Field, FieldType, Relation, RelationKind, RowData,
    Schema, SortDirection, Value,
};

async fn blog_driver() -> Driver {
    let db = connect("sqlite::memory:").await.expect("connect");
    db.register_schema(
        Schema::new("User")
            .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
            .add_field(Field::new("name", FieldType::String))
            .add_field(Field::new("age", FieldType::Int).nullable())
            .add_relation(Relation::new("posts", RelationKind::OneToMany, "Post")),
    )
    .expect("register User");
    db.register_schema(
        Schema::new("Post")
            .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
            .add_field(Field::new("title", FieldType::String))
            .add_field(Field::new("authorId", FieldType::Int).column("author_id").indexed())
            .add_relation(
                Relation::new("author", RelationKind::ManyToOne, "User").foreign_key("authorId"),
            ),
    )
    .expect("register Post");
    db
}

#[tokio::test]
async fn sync_is_idempotent() {
    let db = blog_driver().await;
    let ctx = Context::background();

    let first = db.sync_schemas(&ctx).await.expect("first sync");
    assert_eq!(first.tables_created, ["users", "posts"]);
    assert!(first.statements_executed > 0);

    // A second sync against the freshly created tables must plan nothing.
    let second = db.sync_schemas(&ctx).await.expect("second sync");
    assert!(second.tables_created.is_empty());
    assert!(second.tables_updated.is_empty());
    assert_eq!(second.statements_executed, 0);
}

#[tokio::test]
async fn sync_records_applied_migrations() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    let rows = db
        .raw("SELECT name FROM _migrations ORDER BY name", vec![])
        .fetch(&ctx)
        .await
        .expect("read log");
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn schema_evolution_adds_column() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    db.register_schema(
        Schema::new("User")
            .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
            .add_field(Field::new("name", FieldType::String))
            .add_field(Field::new("age", FieldType::Int).nullable())
            .add_field(Field::new("email", FieldType::String).nullable()),
    )
    .expect("re-register");

    let report = db.sync_schemas(&ctx).await.expect("evolve");
    assert_eq!(report.tables_updated, ["users"]);

    db.model("User")
        .create(
            &ctx,
            RowData::new().with("name", "Ada").with("email", "ada@example.com"),
        )
        .await
        .expect("insert with new column");
}

#[tokio::test]
async fn crud_round_trip() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    let id = db
        .model("User")
        .create(&ctx, RowData::new().with("name", "Alice").with("age", 30))
        .await
        .expect("create");
    assert_eq!(id, Value::Int(1));

    db.model("User")
        .create(&ctx, RowData::new().with("name", "Bob").with("age", 17))
        .await
        .expect("create second");

    let adults = db
        .model("User")
        .filter(Condition::gte("age", 18))
        .order_by("name", SortDirection::Asc)
        .find_many(&ctx)
        .await
        .expect("find");
    assert_eq!(adults.len(), 1);
    assert_eq!(adults[0].get("name"), Some(&Value::Text("Alice".into())));

    let updated = db
        .model("User")
        .filter(Condition::eq("name", "Bob"))
        .update_many(&ctx, RowData::new().with("age", 18))
        .await
        .expect("update");
    assert_eq!(updated, 1);
    assert_eq!(db.model("User").count(&ctx).await.unwrap(), 2);

    let deleted = db
        .model("User")
        .filter(Condition::lt("age", 25))
        .delete_many(&ctx)
        .await
        .expect("delete");
    assert_eq!(deleted, 1);
    assert_eq!(db.model("User").count(&ctx).await.unwrap(), 1);
}

#[tokio::test]
async fn find_first_and_string_filters() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    for name in ["Alice", "Bob", "Charlie"] {
        db.model("User")
            .create(&ctx, RowData::new().with("name", name))
            .await
            .expect("seed");
    }

    let found = db
        .model("User")
        .filter(Condition::contains("name", "li"))
        .order_by("name", SortDirection::Asc)
        .find_first(&ctx)
        .await
        .expect("find_first");
    assert_eq!(
        found.and_then(|r| r.get("name").cloned()),
        Some(Value::Text("Alice".into()))
    );

    let c_names = db
        .model("User")
        .filter(Condition::starts_with("name", "C"))
        .count(&ctx)
        .await
        .unwrap();
    assert_eq!(c_names, 1);

    let in_set = db
        .model("User")
        .filter(Condition::in_list("name", ["Bob", "Charlie", "Zed"]))
        .count(&ctx)
        .await
        .unwrap();
    assert_eq!(in_set, 2);
}

#[tokio::test]
async fn create_many_returns_keys() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    let rows: Vec<RowData> = (1..=3)
        .map(|i| RowData::new().with("name", format!("user-{i}")))
        .collect();
    let result = db
        .model("User")
        .create_many(&ctx, &rows)
        .await
        .expect("create_many");
    assert_eq!(result.rows_affected, 3);
    assert_eq!(
        result.keys,
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[tokio::test]
async fn unfiltered_mutations_require_opt_in() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    db.model("User")
        .create(&ctx, RowData::new().with("name", "x"))
        .await
        .unwrap();

    let err = db
        .model("User")
        .update_many(&ctx, RowData::new().with("name", "y"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SqlCompile { .. }));

    let affected = db
        .model("User")
        .allow_unfiltered()
        .delete_many(&ctx)
        .await
        .expect("opt-in delete");
    assert_eq!(affected, 1);
}

#[tokio::test]
async fn transaction_rollback_leaves_no_rows() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    let result: ferrite_orm::Result<()> = db
        .transaction(&ctx, |tx: &ferrite_orm::Transaction| {
            Box::pin(async move {
                tx.model("User")
                    .create(&Context::background(), RowData::new().with("name", "ghost"))
                    .await?;
                Err(Error::sql_compile("user code failed"))
            })
        })
        .await;
    assert!(result.is_err());

    assert_eq!(db.model("User").count(&ctx).await.unwrap(), 0);
}

#[tokio::test]
async fn transaction_commit_persists() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    db.transaction(&ctx, |tx: &ferrite_orm::Transaction| {
        Box::pin(async move {
            tx.model("User")
                .create(&Context::background(), RowData::new().with("name", "kept"))
                .await?;
            Ok(())
        })
    })
    .await
    .expect("tx");

    assert_eq!(db.model("User").count(&ctx).await.unwrap(), 1);
}

#[tokio::test]
async fn savepoint_partial_rollback() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    let tx = db.begin(&ctx).await.expect("begin");
    tx.model("User")
        .create(&ctx, RowData::new().with("name", "first"))
        .await
        .unwrap();
    tx.savepoint(&ctx, "sp1").await.unwrap();
    tx.model("User")
        .create(&ctx, RowData::new().with("name", "second"))
        .await
        .unwrap();
    tx.rollback_to(&ctx, "sp1").await.unwrap();
    tx.commit(&ctx).await.unwrap();

    let names = db.model("User").find_many(&ctx).await.unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].get("name"), Some(&Value::Text("first".into())));
}

#[tokio::test]
async fn to_one_include_attaches_parent() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    let author_id = db
        .model("User")
        .create(&ctx, RowData::new().with("name", "Ada"))
        .await
        .unwrap();
    db.model("Post")
        .create(
            &ctx,
            RowData::new()
                .with("title", "Hello")
                .with("authorId", author_id.clone()),
        )
        .await
        .unwrap();

    let posts = db
        .model("Post")
        .include("author")
        .find_many(&ctx)
        .await
        .expect("include author");
    assert_eq!(posts.len(), 1);
    let author = posts[0].related("author").expect("author attached");
    assert_eq!(author.len(), 1);
    assert_eq!(author[0].get("name"), Some(&Value::Text("Ada".into())));
}

#[tokio::test]
async fn to_many_include_batches_children() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    let ada = db
        .model("User")
        .create(&ctx, RowData::new().with("name", "Ada"))
        .await
        .unwrap();
    let bob = db
        .model("User")
        .create(&ctx, RowData::new().with("name", "Bob"))
        .await
        .unwrap();
    for (title, author) in [("a1", &ada), ("a2", &ada), ("b1", &bob)] {
        db.model("Post")
            .create(
                &ctx,
                RowData::new().with("title", title).with("authorId", author.clone()),
            )
            .await
            .unwrap();
    }

    let users = db
        .model("User")
        .include("posts")
        .order_by("name", SortDirection::Asc)
        .find_many(&ctx)
        .await
        .expect("include posts");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].related("posts").unwrap().len(), 2);
    assert_eq!(users[1].related("posts").unwrap().len(), 1);
}

#[tokio::test]
async fn circular_dependency_falls_back_to_two_phase() {
    let db = connect("sqlite::memory:").await.expect("connect");
    db.register_schema(
        Schema::new("User")
            .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
            .add_field(Field::new("profileId", FieldType::Int).column("profile_id").nullable())
            .add_relation(
                Relation::new("profile", RelationKind::OneToOne, "Profile")
                    .foreign_key("profileId"),
            ),
    )
    .unwrap();
    db.register_schema(
        Schema::new("Profile")
            .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
            .add_field(Field::new("userId", FieldType::Int).column("user_id"))
            .add_relation(
                Relation::new("user", RelationKind::ManyToOne, "User").foreign_key("userId"),
            ),
    )
    .unwrap();

    let ctx = Context::background();
    let report = db.sync_schemas(&ctx).await.expect("two-phase sync");
    assert_eq!(report.tables_created.len(), 2);
}

#[tokio::test]
async fn constraint_violations_are_translated() {
    let db = connect("sqlite::memory:").await.expect("connect");
    db.register_schema(
        Schema::new("Account")
            .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
            .add_field(Field::new("email", FieldType::String).unique()),
    )
    .unwrap();
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    db.model("Account")
        .create(&ctx, RowData::new().with("email", "a@b.c"))
        .await
        .unwrap();
    let err = db
        .model("Account")
        .create(&ctx, RowData::new().with("email", "a@b.c"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ConstraintViolation {
            kind: ferrite_orm::ConstraintKind::Unique,
            ..
        }
    ));
}

#[tokio::test]
async fn pagination_and_projection() {
    let db = blog_driver().await;
    let ctx = Context::background();
    db.sync_schemas(&ctx).await.expect("sync");

    for i in 0..10 {
        db.model("User")
            .create(&ctx, RowData::new().with("name", format!("u{i:02}")).with("age", i))
            .await
            .unwrap();
    }

    let page = db
        .model("User")
        .select(["name"])
        .order_by("name", SortDirection::Asc)
        .limit(3)
        .offset(4)
        .find_many(&ctx)
        .await
        .unwrap();
    assert_eq!(page.len(), 3);
    assert_eq!(page[0].get("name"), Some(&Value::Text("u04".into())));
    assert!(page[0].get("age").is_none());
}
