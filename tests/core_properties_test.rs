//! Offline integration tests across the rowmap crates
//!
//! Everything here runs without a database: registry validation, SQL
//! compilation determinism, injection safety, and flush-plan ordering.

use rowmap::prelude::*;
use session::unit_of_work::{plan_flush, PendingChanges, PlannedKind};
use session::IdentityMap;

fn blog_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            EntityDefinition::new("author", "authors")
                .field(FieldDef::new("id", ColumnType::Integer).primary_key())
                .field(FieldDef::new("name", ColumnType::Text))
                .relationship(Relationship::one_to_many("posts", "post", "author_id")),
        )
        .unwrap();
    registry
        .register(
            EntityDefinition::new("post", "posts")
                .field(FieldDef::new("id", ColumnType::Integer).primary_key())
                .field(FieldDef::new("author_id", ColumnType::Integer))
                .field(FieldDef::new("title", ColumnType::Text))
                .field(FieldDef::new("rating", ColumnType::Integer).nullable())
                .relationship(Relationship::many_to_one("author", "author", "author_id")),
        )
        .unwrap();
    registry.finalize().unwrap();
    registry
}

#[test]
fn registry_is_sealed_after_finalize() {
    let mut registry = blog_registry();
    let err = registry.register(
        EntityDefinition::new("author", "authors")
            .field(FieldDef::new("id", ColumnType::BigInt).primary_key()),
    );
    assert!(matches!(err, Err(SchemaError::Finalized)));
}

#[test]
fn compiled_sql_is_reproducible() {
    let registry = blog_registry();
    let build = || {
        QueryExpression::new("post", "p")
            .filter(Filter::eq("title", "First"))
            .order_by(OrderBy::asc("p.id"))
            .limit(5)
    };
    let first = query_builder::compile_select(&registry, &build()).unwrap();
    let second = query_builder::compile_select(&registry, &build()).unwrap();
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.binds, second.binds);
}

#[test]
fn adversarial_filter_value_only_changes_binds() {
    let registry = blog_registry();
    let benign = query_builder::compile_select(
        &registry,
        &QueryExpression::new("post", "p").filter(Filter::eq("title", "x")),
    )
    .unwrap();
    let hostile = query_builder::compile_select(
        &registry,
        &QueryExpression::new("post", "p")
            .filter(Filter::eq("title", "x' OR '1'='1; DROP TABLE posts; --")),
    )
    .unwrap();
    assert_eq!(benign.sql, hostile.sql);
    assert_ne!(benign.binds, hostile.binds);
}

#[test]
fn flush_plan_orders_inserts_by_dependency() {
    let registry = blog_registry();
    let identity = IdentityMap::new();
    let mut pending = PendingChanges::new();

    let post = InstanceRef::new("post");
    post.set("id", 10).set("author_id", 1).set("title", "t");
    let author = InstanceRef::new("author");
    author.set("id", 1).set("name", "A");

    // Referencing entity queued first; the plan must still insert the
    // referenced author before the post.
    pending.inserts.push(post);
    pending.inserts.push(author);

    let plan = plan_flush(&registry, &identity, &pending).unwrap();
    let order: Vec<&str> = plan.statements.iter().map(|s| s.entity.as_str()).collect();
    assert_eq!(order, vec!["author", "post"]);
}

#[test]
fn flush_plan_orders_deletes_in_reverse() {
    let registry = blog_registry();
    let mut identity = IdentityMap::new();
    let mut pending = PendingChanges::new();

    let author = InstanceRef::new("author");
    author.set("id", 1).set("name", "A");
    author.clear_dirty();
    let post = InstanceRef::new("post");
    post.set("id", 10).set("author_id", 1).set("title", "t");
    post.clear_dirty();

    identity.insert(IdentityKey::new("author", KeyValue::Int(1)), author.clone());
    identity.insert(IdentityKey::new("post", KeyValue::Int(10)), post.clone());
    pending.deletes.push(author);
    pending.deletes.push(post);

    let plan = plan_flush(&registry, &identity, &pending).unwrap();
    let deletes: Vec<&str> = plan
        .statements
        .iter()
        .filter(|s| s.kind == PlannedKind::Delete)
        .map(|s| s.entity.as_str())
        .collect();
    assert_eq!(deletes, vec!["post", "author"]);
}

#[test]
fn migration_plan_is_additive_only() {
    let registry = blog_registry();
    let live = rowmap::migration::DatabaseSchema::default();
    let plan = rowmap::migration::migration_plan(&registry, &live).unwrap();
    // Two CREATE TABLEs, no drops anywhere in the emitted SQL.
    assert_eq!(plan.operations.len(), 2);
    for operation in &plan.operations {
        assert!(operation.sql().starts_with("CREATE TABLE"));
        assert!(!operation.sql().contains("DROP"));
    }
}

#[test]
fn identity_map_returns_same_handle() {
    let mut identity = IdentityMap::new();
    let author = InstanceRef::new("author");
    author.set("id", 1);
    let key = IdentityKey::new("author", KeyValue::Int(1));
    identity.insert(key.clone(), author.clone());

    let first = identity.get(&key).unwrap().clone();
    let second = identity.get(&key).unwrap().clone();
    assert!(first.same_instance(&second));

    // A mutation through one handle is visible through the other.
    first.set("name", "renamed");
    assert_eq!(second.get("name"), Some(PgValue::Text("renamed".into())));
}
