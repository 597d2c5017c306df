//! The schema registry
//!
//! Validates entity definitions once at startup and serves pure
//! metadata lookups thereafter. The registry is append-only while the
//! process warms up and read-only after `finalize`.

use std::collections::{BTreeMap, HashSet};

use crate::descriptor::{EntityDefinition, EntityDescriptor};
use crate::errors::{SchemaError, UnknownEntityError};
use crate::relationship::RelationshipKind;

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, EntityDescriptor>,
    /// Entity names in foreign-key dependency order (referenced before
    /// referencing), computed at finalization.
    order: Vec<String>,
    finalized: bool,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a definition and add it to the registry.
    ///
    /// Re-registering an identical definition is a no-op; registering a
    /// conflicting one, or registering after `finalize`, is an error.
    pub fn register(&mut self, definition: EntityDefinition) -> Result<(), SchemaError> {
        if self.finalized {
            return Err(SchemaError::Finalized);
        }

        let name = definition.entity_name().to_string();
        let descriptor = definition.build()?;

        if let Some(existing) = self.entities.get(&name) {
            if *existing == descriptor {
                return Ok(());
            }
            return Err(SchemaError::ConflictingRedefinition { entity: name });
        }

        if let Some(other) = self
            .entities
            .values()
            .find(|e| e.table.qualified() == descriptor.table.qualified())
        {
            return Err(SchemaError::DuplicateTable {
                table: descriptor.table.qualified(),
                entity: other.entity.clone(),
            });
        }

        tracing::debug!(entity = %name, table = %descriptor.table.qualified(), "registered entity");
        self.entities.insert(name, descriptor);
        Ok(())
    }

    /// Cross-entity validation and dependency ordering. After this the
    /// registry serves lookups only.
    pub fn finalize(&mut self) -> Result<(), SchemaError> {
        if self.finalized {
            return Ok(());
        }
        self.validate_relationships()?;
        self.order = self.compute_dependency_order()?;
        self.finalized = true;
        tracing::debug!(entities = self.entities.len(), "schema registry finalized");
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Look up an entity descriptor by name.
    pub fn resolve(&self, entity: &str) -> Result<&EntityDescriptor, UnknownEntityError> {
        self.entities
            .get(entity)
            .ok_or_else(|| UnknownEntityError(entity.to_string()))
    }

    /// All descriptors, in name order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Descriptors in foreign-key dependency order: every entity comes
    /// after the entities it references through many-to-one
    /// relationships. Requires a finalized registry.
    pub fn dependency_order(&self) -> Result<Vec<&EntityDescriptor>, SchemaError> {
        if !self.finalized {
            return Err(SchemaError::NotFinalized);
        }
        Ok(self
            .order
            .iter()
            .filter_map(|name| self.entities.get(name))
            .collect())
    }

    fn validate_relationships(&self) -> Result<(), SchemaError> {
        for descriptor in self.entities.values() {
            for rel in &descriptor.relationships {
                let target = self.entities.get(&rel.target).ok_or_else(|| {
                    SchemaError::UnknownRelationshipTarget {
                        entity: descriptor.entity.clone(),
                        relationship: rel.name.clone(),
                        target: rel.target.clone(),
                    }
                })?;

                if target.primary_key_fields().len() != 1 {
                    return Err(SchemaError::CompositeKeyRelationship {
                        entity: descriptor.entity.clone(),
                        relationship: rel.name.clone(),
                        target: rel.target.clone(),
                    });
                }

                match &rel.kind {
                    RelationshipKind::ManyToOne { fk_field } => {
                        if descriptor.field(fk_field).is_none() {
                            return Err(SchemaError::UnknownRelationshipField {
                                entity: descriptor.entity.clone(),
                                relationship: rel.name.clone(),
                                field: fk_field.clone(),
                            });
                        }
                    }
                    RelationshipKind::OneToMany { fk_field } => {
                        if target.field(fk_field).is_none() {
                            return Err(SchemaError::UnknownRelationshipField {
                                entity: descriptor.entity.clone(),
                                relationship: rel.name.clone(),
                                field: fk_field.clone(),
                            });
                        }
                    }
                    RelationshipKind::ManyToMany { .. } => {
                        // Join-table columns live outside any registered
                        // entity; nothing further to check here.
                    }
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm over many-to-one edges. Self-references are
    /// ignored (rows of a self-referencing table are flushed in
    /// insertion order); a cycle across distinct entities is an error.
    fn compute_dependency_order(&self) -> Result<Vec<String>, SchemaError> {
        let mut remaining: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
        for descriptor in self.entities.values() {
            let deps: HashSet<&str> = descriptor
                .relationships
                .iter()
                .filter(|r| matches!(r.kind, RelationshipKind::ManyToOne { .. }))
                .filter(|r| r.target != descriptor.entity)
                .map(|r| r.target.as_str())
                .collect();
            remaining.insert(descriptor.entity.as_str(), deps);
        }

        let mut order = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| *name)
                .collect();

            if ready.is_empty() {
                let cycle: Vec<&str> = remaining.keys().copied().collect();
                return Err(SchemaError::CircularReference {
                    entities: cycle.join(", "),
                });
            }

            for name in &ready {
                remaining.remove(name);
                order.push(name.to_string());
            }
            for deps in remaining.values_mut() {
                for name in &ready {
                    deps.remove(name);
                }
            }
        }

        Ok(order)
    }
}
