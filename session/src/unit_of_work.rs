//! Flush planning
//!
//! Computes the ordered statement sequence a flush will execute:
//! inserts of referenced entities before inserts of referencing ones,
//! updates of dirty instances, then deletes in reverse dependency
//! order, with opted-in cascades ahead of their parent delete. The
//! plan is pure data; execution happens in the session.

use schema_registry::{DeleteRule, IdentityKey, RelationshipKind, SchemaRegistry};

use query_builder::{
    compile_delete, compile_delete_by_fk, compile_delete_join_rows, compile_insert,
    compile_update, CompiledQuery,
};

use crate::errors::SessionError;
use crate::hydrate::dehydrate;
use crate::identity::IdentityMap;
use crate::instance::InstanceRef;

/// Instances waiting to be written at the next flush.
#[derive(Debug, Default)]
pub struct PendingChanges {
    pub inserts: Vec<InstanceRef>,
    pub deletes: Vec<InstanceRef>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }

    pub fn clear(&mut self) {
        self.inserts.clear();
        self.deletes.clear();
    }

    fn contains_instance(list: &[InstanceRef], instance: &InstanceRef) -> bool {
        list.iter().any(|i| i.same_instance(instance))
    }

    pub fn is_pending_insert(&self, instance: &InstanceRef) -> bool {
        Self::contains_instance(&self.inserts, instance)
    }

    pub fn is_pending_delete(&self, instance: &InstanceRef) -> bool {
        Self::contains_instance(&self.deletes, instance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedKind {
    Insert,
    Update,
    Delete,
    CascadeDelete,
}

/// One statement of a flush, with the bookkeeping the session needs
/// after it executes.
#[derive(Debug)]
pub struct PlannedStatement {
    pub entity: String,
    pub kind: PlannedKind,
    pub query: CompiledQuery,
    /// The instance to write the RETURNING row back into (inserts and
    /// updates) or to drop from the identity map (deletes).
    pub instance: Option<InstanceRef>,
    /// Identity of the affected row, where it is known up front.
    pub identity: Option<IdentityKey>,
}

#[derive(Debug, Default)]
pub struct FlushPlan {
    pub statements: Vec<PlannedStatement>,
}

impl FlushPlan {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Compute the full flush plan. Fails fast (before anything executes)
/// on detached instances, unknown entities, or uncompilable writes.
pub fn plan_flush(
    registry: &SchemaRegistry,
    identity: &IdentityMap,
    pending: &PendingChanges,
) -> Result<FlushPlan, SessionError> {
    let mut plan = FlushPlan::default();
    let order = registry.dependency_order()?;

    // Inserts: dependency order across entities, insertion order within.
    for descriptor in &order {
        for instance in &pending.inserts {
            if instance.entity() != descriptor.entity {
                continue;
            }
            let record = dehydrate(instance, descriptor)?;
            let query = compile_insert(descriptor, &record)?;
            plan.statements.push(PlannedStatement {
                entity: descriptor.entity.clone(),
                kind: PlannedKind::Insert,
                query,
                instance: Some(instance.clone()),
                identity: None,
            });
        }
    }

    // Updates: tracked instances with a non-empty change-set, keyed by
    // the identity they were loaded under.
    for (key, instance) in identity.iter() {
        if !instance.is_dirty()
            || pending.is_pending_delete(instance)
            || pending.is_pending_insert(instance)
        {
            continue;
        }
        let descriptor = registry.resolve(&key.entity)?;
        let record = dehydrate(instance, descriptor)?;
        let dirty = instance.dirty_fields();
        let query = compile_update(descriptor, &key.key, &record, &dirty)?;
        plan.statements.push(PlannedStatement {
            entity: key.entity.clone(),
            kind: PlannedKind::Update,
            query,
            instance: Some(instance.clone()),
            identity: Some(key.clone()),
        });
    }

    // Deletes: reverse dependency order across entities, reverse
    // insertion order within. Cascades only where configured.
    for descriptor in order.iter().rev() {
        for instance in pending.deletes.iter().rev() {
            if instance.entity() != descriptor.entity {
                continue;
            }
            let record = instance.snapshot();
            let key = descriptor.identify_record(&record).ok_or_else(|| {
                SessionError::MissingPrimaryKey {
                    entity: descriptor.entity.clone(),
                }
            })?;

            for rel in &descriptor.relationships {
                if rel.delete_rule != DeleteRule::Cascade {
                    continue;
                }
                match &rel.kind {
                    RelationshipKind::OneToMany { fk_field } => {
                        let child = registry.resolve(&rel.target)?;
                        let query = compile_delete_by_fk(child, fk_field, &key)?;
                        plan.statements.push(PlannedStatement {
                            entity: child.entity.clone(),
                            kind: PlannedKind::CascadeDelete,
                            query,
                            instance: None,
                            identity: None,
                        });
                    }
                    RelationshipKind::ManyToMany {
                        join_table,
                        left_fk,
                        ..
                    } => {
                        let query = compile_delete_join_rows(join_table, left_fk, &key)?;
                        plan.statements.push(PlannedStatement {
                            entity: descriptor.entity.clone(),
                            kind: PlannedKind::CascadeDelete,
                            query,
                            instance: None,
                            identity: None,
                        });
                    }
                    RelationshipKind::ManyToOne { .. } => {
                        // Deleting the referencing side never cascades
                        // upward.
                    }
                }
            }

            let query = compile_delete(descriptor, &key)?;
            plan.statements.push(PlannedStatement {
                entity: descriptor.entity.clone(),
                kind: PlannedKind::Delete,
                query,
                instance: Some(instance.clone()),
                identity: Some(IdentityKey::new(&descriptor.entity, key)),
            });
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_registry::{EntityDefinition, FieldDef, KeyValue, Relationship};
    use type_coercion::ColumnType;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                EntityDefinition::new("author", "authors")
                    .field(FieldDef::new("id", ColumnType::Integer).primary_key())
                    .field(FieldDef::new("name", ColumnType::Text))
                    .relationship(
                        Relationship::one_to_many("posts", "post", "author_id")
                            .on_delete(DeleteRule::Cascade),
                    ),
            )
            .unwrap();
        registry
            .register(
                EntityDefinition::new("post", "posts")
                    .field(FieldDef::new("id", ColumnType::Integer).primary_key())
                    .field(FieldDef::new("author_id", ColumnType::Integer))
                    .field(FieldDef::new("title", ColumnType::Text))
                    .relationship(Relationship::many_to_one("author", "author", "author_id")),
            )
            .unwrap();
        registry.finalize().unwrap();
        registry
    }

    fn new_author(id: i32) -> InstanceRef {
        let author = InstanceRef::new("author");
        author.set("id", id).set("name", format!("author {}", id));
        author
    }

    fn new_post(id: i32, author_id: i32) -> InstanceRef {
        let post = InstanceRef::new("post");
        post.set("id", id)
            .set("author_id", author_id)
            .set("title", "t");
        post
    }

    #[test]
    fn test_insert_order_referenced_before_referencing() {
        let registry = registry();
        let identity = IdentityMap::new();
        let mut pending = PendingChanges::new();
        // Queue the referencing entity first on purpose.
        pending.inserts.push(new_post(10, 1));
        pending.inserts.push(new_author(1));

        let plan = plan_flush(&registry, &identity, &pending).unwrap();
        let entities: Vec<&str> = plan.statements.iter().map(|s| s.entity.as_str()).collect();
        assert_eq!(entities, vec!["author", "post"]);
        assert!(plan
            .statements
            .iter()
            .all(|s| s.kind == PlannedKind::Insert));
    }

    #[test]
    fn test_delete_order_is_reversed() {
        let registry = registry();
        let mut identity = IdentityMap::new();
        let author = new_author(1);
        let post = new_post(10, 1);
        identity.insert(IdentityKey::new("author", KeyValue::Int(1)), author.clone());
        identity.insert(IdentityKey::new("post", KeyValue::Int(10)), post.clone());
        // Flushed state: nothing dirty.
        author.clear_dirty();
        post.clear_dirty();

        let mut pending = PendingChanges::new();
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
    fn test_cascade_delete_precedes_parent() {
        let registry = registry();
        let mut identity = IdentityMap::new();
        let author = new_author(1);
        identity.insert(IdentityKey::new("author", KeyValue::Int(1)), author.clone());
        author.clear_dirty();

        let mut pending = PendingChanges::new();
        pending.deletes.push(author);

        let plan = plan_flush(&registry, &identity, &pending).unwrap();
        assert_eq!(plan.statements.len(), 2);
        assert_eq!(plan.statements[0].kind, PlannedKind::CascadeDelete);
        assert_eq!(plan.statements[0].entity, "post");
        assert_eq!(
            plan.statements[0].query.sql,
            "DELETE FROM \"posts\" WHERE \"author_id\" = $1"
        );
        assert_eq!(plan.statements[1].kind, PlannedKind::Delete);
        assert_eq!(plan.statements[1].entity, "author");
    }

    #[test]
    fn test_dirty_instances_become_updates() {
        let registry = registry();
        let mut identity = IdentityMap::new();
        let author = new_author(1);
        author.clear_dirty();
        identity.insert(IdentityKey::new("author", KeyValue::Int(1)), author.clone());
        author.set("name", "renamed");

        let plan = plan_flush(&registry, &identity, &PendingChanges::new()).unwrap();
        assert_eq!(plan.statements.len(), 1);
        assert_eq!(plan.statements[0].kind, PlannedKind::Update);
        assert!(plan.statements[0].query.sql.starts_with("UPDATE \"authors\" SET \"name\" = $1"));
    }

    #[test]
    fn test_clean_session_plans_nothing() {
        let registry = registry();
        let plan = plan_flush(&registry, &IdentityMap::new(), &PendingChanges::new()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_delete_without_key_is_detected_up_front() {
        let registry = registry();
        let mut pending = PendingChanges::new();
        let ghost = InstanceRef::new("author");
        ghost.set("name", "no id");
        pending.deletes.push(ghost);
        assert!(matches!(
            plan_flush(&registry, &IdentityMap::new(), &pending),
            Err(SessionError::MissingPrimaryKey { .. })
        ));
    }
}
