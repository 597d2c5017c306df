//! Integration tests against a live PostgreSQL
//!
//! These exercise the end-to-end contract: transaction atomicity,
//! identity mapping across sessions, constraint translation, and
//! savepoint scoping. They are ignored by default; point
//! ROWMAP_TEST_DATABASE_URL at a disposable database and run with
//! `cargo test -- --ignored --test-threads=1` (the tests share one
//! table).

use rowmap::prelude::*;

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            EntityDefinition::new("user", "rowmap_it_users")
                .field(FieldDef::new("id", ColumnType::Integer).primary_key())
                .field(FieldDef::new("email", ColumnType::Text).unique()),
        )
        .unwrap();
    registry
}

async fn connect() -> Rowmap {
    let url = std::env::var("ROWMAP_TEST_DATABASE_URL")
        .expect("set ROWMAP_TEST_DATABASE_URL to run ignored tests");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect to test database");
    let rowmap = Rowmap::from_pool(pool, registry()).expect("finalize registry");
    // Fresh table per run.
    sqlx::query("DROP TABLE IF EXISTS rowmap_it_users")
        .execute(rowmap.pool())
        .await
        .expect("drop test table");
    rowmap.apply_migrations().await.expect("apply migrations");
    rowmap
}

fn new_user(id: i32, email: &str) -> InstanceRef {
    let user = InstanceRef::new("user");
    user.set("id", id).set("email", email);
    user
}

#[tokio::test]
#[ignore = "requires PostgreSQL (ROWMAP_TEST_DATABASE_URL)"]
async fn commit_then_read_in_second_session() {
    let rowmap = connect().await;

    let mut s1 = rowmap.session().await.unwrap();
    s1.add(new_user(1, "a@x.com")).unwrap();
    s1.commit().await.unwrap();

    let mut s2 = rowmap.session().await.unwrap();
    let found = s2.get("user", 1).await.unwrap().expect("user exists");
    assert_eq!(found.get("email"), Some(PgValue::Text("a@x.com".into())));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (ROWMAP_TEST_DATABASE_URL)"]
async fn unique_violation_names_the_constraint() {
    let rowmap = connect().await;

    let mut s1 = rowmap.session().await.unwrap();
    s1.add(new_user(1, "a@x.com")).unwrap();
    s1.commit().await.unwrap();

    let mut s2 = rowmap.session().await.unwrap();
    s2.add(new_user(2, "a@x.com")).unwrap();
    let err = s2.commit().await.expect_err("duplicate email must fail");
    match err {
        SessionError::ConstraintViolation {
            kind, constraint, ..
        } => {
            assert_eq!(kind, ConstraintKind::Unique);
            assert_eq!(
                constraint.as_deref(),
                Some("rowmap_it_users_email_key"),
            );
        }
        other => panic!("expected ConstraintViolation, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (ROWMAP_TEST_DATABASE_URL)"]
async fn failed_flush_leaves_nothing_behind() {
    let rowmap = connect().await;

    let mut s1 = rowmap.session().await.unwrap();
    s1.add(new_user(1, "a@x.com")).unwrap();
    s1.commit().await.unwrap();

    // Second session: one valid insert plus one that violates the
    // unique constraint. Neither row may survive.
    let mut s2 = rowmap.session().await.unwrap();
    s2.add(new_user(2, "b@x.com")).unwrap();
    s2.add(new_user(3, "a@x.com")).unwrap();
    assert!(s2.commit().await.is_err());

    let mut s3 = rowmap.session().await.unwrap();
    assert!(s3.get("user", 2).await.unwrap().is_none());
    assert!(s3.get("user", 3).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL (ROWMAP_TEST_DATABASE_URL)"]
async fn identity_map_is_stable_within_a_session() {
    let rowmap = connect().await;

    let mut s1 = rowmap.session().await.unwrap();
    s1.add(new_user(1, "a@x.com")).unwrap();
    s1.commit().await.unwrap();

    let mut s2 = rowmap.session().await.unwrap();
    let first = s2.get("user", 1).await.unwrap().unwrap();
    let second = s2.get("user", 1).await.unwrap().unwrap();
    assert!(first.same_instance(&second));

    first.set("email", "changed@x.com");
    let third = s2.get("user", 1).await.unwrap().unwrap();
    assert_eq!(
        third.get("email"),
        Some(PgValue::Text("changed@x.com".into()))
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL (ROWMAP_TEST_DATABASE_URL)"]
async fn dirty_instance_is_updated_on_commit() {
    let rowmap = connect().await;

    let mut s1 = rowmap.session().await.unwrap();
    s1.add(new_user(1, "a@x.com")).unwrap();
    s1.commit().await.unwrap();

    let mut s2 = rowmap.session().await.unwrap();
    let user = s2.get("user", 1).await.unwrap().unwrap();
    user.set("email", "b@x.com");
    s2.commit().await.unwrap();

    let mut s3 = rowmap.session().await.unwrap();
    let reloaded = s3.get("user", 1).await.unwrap().unwrap();
    assert_eq!(reloaded.get("email"), Some(PgValue::Text("b@x.com".into())));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (ROWMAP_TEST_DATABASE_URL)"]
async fn rollback_discards_pending_writes() {
    let rowmap = connect().await;

    let mut s1 = rowmap.session().await.unwrap();
    s1.add(new_user(1, "a@x.com")).unwrap();
    s1.flush().await.unwrap();
    s1.rollback().await.unwrap();

    let mut s2 = rowmap.session().await.unwrap();
    assert!(s2.get("user", 1).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL (ROWMAP_TEST_DATABASE_URL)"]
async fn savepoint_rollback_is_partial() {
    let rowmap = connect().await;

    let mut session = rowmap.session().await.unwrap();
    session.add(new_user(1, "a@x.com")).unwrap();
    session.flush().await.unwrap();

    let savepoint = session.begin_nested().await.unwrap();
    session
        .raw_execute(
            "INSERT INTO rowmap_it_users (id, email) VALUES (:id, :email)",
            &[
                ("id", PgValue::Integer(2)),
                ("email", PgValue::Text("b@x.com".into())),
            ],
        )
        .await
        .unwrap();
    session.rollback_to(&savepoint).await.unwrap();
    session.commit().await.unwrap();

    let mut check = rowmap.session().await.unwrap();
    assert!(check.get("user", 1).await.unwrap().is_some());
    assert!(check.get("user", 2).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL (ROWMAP_TEST_DATABASE_URL)"]
async fn query_filters_and_paginates() {
    let rowmap = connect().await;

    let mut s1 = rowmap.session().await.unwrap();
    for id in 1..=5 {
        s1.add(new_user(id, &format!("user{}@x.com", id))).unwrap();
    }
    s1.commit().await.unwrap();

    let mut s2 = rowmap.session().await.unwrap();
    let page = s2
        .query("user", "u")
        .order_by_column("u.id", SortOrder::Asc)
        .paginate(2, 2)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.has_previous_page);
    assert!(page.has_next_page);
    assert_eq!(page.items[0].get("id"), Some(PgValue::Integer(3)));
}
