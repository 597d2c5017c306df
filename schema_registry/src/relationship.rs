//! Relationship metadata
//!
//! Directed references between entities, used for join compilation,
//! flush ordering, and lazy traversal.

/// What a flush does with dependent rows when their parent is deleted.
///
/// `Restrict` leaves enforcement to the database foreign key, which
/// surfaces as a constraint violation if dependents still exist.
/// `Cascade` must be opted into per relationship; there is no implicit
/// cascade anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRule {
    Restrict,
    Cascade,
}

impl Default for DeleteRule {
    fn default() -> Self {
        DeleteRule::Restrict
    }
}

/// Shape of a relationship between two entities.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipKind {
    /// This entity holds `fk_field` referencing the target's primary key.
    ManyToOne { fk_field: String },
    /// The target entity holds `fk_field` referencing this entity's
    /// primary key.
    OneToMany { fk_field: String },
    /// Rows relate through a join table carrying one foreign key to
    /// each side.
    ManyToMany {
        join_table: String,
        left_fk: String,
        right_fk: String,
    },
}

/// A named, directed reference from one entity to another.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub target: String,
    pub kind: RelationshipKind,
    pub delete_rule: DeleteRule,
}

impl Relationship {
    pub fn many_to_one(name: &str, target: &str, fk_field: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            kind: RelationshipKind::ManyToOne {
                fk_field: fk_field.to_string(),
            },
            delete_rule: DeleteRule::Restrict,
        }
    }

    pub fn one_to_many(name: &str, target: &str, fk_field: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            kind: RelationshipKind::OneToMany {
                fk_field: fk_field.to_string(),
            },
            delete_rule: DeleteRule::Restrict,
        }
    }

    pub fn many_to_many(
        name: &str,
        target: &str,
        join_table: &str,
        left_fk: &str,
        right_fk: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            kind: RelationshipKind::ManyToMany {
                join_table: join_table.to_string(),
                left_fk: left_fk.to_string(),
                right_fk: right_fk.to_string(),
            },
            delete_rule: DeleteRule::Restrict,
        }
    }

    /// Opt this relationship into cascading deletes at flush time.
    pub fn on_delete(mut self, rule: DeleteRule) -> Self {
        self.delete_rule = rule;
        self
    }
}
