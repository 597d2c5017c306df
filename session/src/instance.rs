//! Live entity instances
//!
//! An instance holds the current field values of one row plus the set
//! of fields mutated since it was loaded or last flushed. Mutation
//! goes through [`InstanceRef::set`], which records dirtiness as an
//! observable side effect; there is no attribute interception.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use type_coercion::PgValue;

/// The raw state of one entity instance.
#[derive(Debug, Clone)]
pub struct Instance {
    entity: String,
    values: BTreeMap<String, PgValue>,
    dirty: BTreeSet<String>,
}

impl Instance {
    pub fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            values: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Build from a hydrated record; the result starts clean.
    pub fn from_record(entity: &str, values: BTreeMap<String, PgValue>) -> Self {
        Self {
            entity: entity.to_string(),
            values,
            dirty: BTreeSet::new(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn get(&self, field: &str) -> Option<&PgValue> {
        self.values.get(field)
    }

    pub fn values(&self) -> &BTreeMap<String, PgValue> {
        &self.values
    }

    pub fn set(&mut self, field: &str, value: PgValue) {
        self.values.insert(field.to_string(), value);
        self.dirty.insert(field.to_string());
    }

    pub fn dirty_fields(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Replace all values with a freshly returned database record and
    /// reset the change-set.
    pub fn reset_to(&mut self, values: BTreeMap<String, PgValue>) {
        self.values = values;
        self.dirty.clear();
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}

/// Shared handle to an instance. The session keeps one in its identity
/// map and hands out clones; all of them observe the same state.
///
/// A session and its instances belong to one task; the lock only
/// guards against accidental cross-thread reads, it is not an
/// invitation to share a session concurrently.
#[derive(Debug, Clone)]
pub struct InstanceRef(Arc<Mutex<Instance>>);

impl InstanceRef {
    pub fn new(entity: &str) -> Self {
        Self(Arc::new(Mutex::new(Instance::new(entity))))
    }

    pub fn from_record(entity: &str, values: BTreeMap<String, PgValue>) -> Self {
        Self(Arc::new(Mutex::new(Instance::from_record(entity, values))))
    }

    fn lock(&self) -> MutexGuard<'_, Instance> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entity(&self) -> String {
        self.lock().entity.clone()
    }

    /// Set one field, recording it as dirty.
    pub fn set(&self, field: &str, value: impl Into<PgValue>) -> &Self {
        self.lock().set(field, value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<PgValue> {
        self.lock().get(field).cloned()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().is_dirty()
    }

    pub fn dirty_fields(&self) -> BTreeSet<String> {
        self.lock().dirty_fields().clone()
    }

    /// Snapshot of the current values.
    pub fn snapshot(&self) -> BTreeMap<String, PgValue> {
        self.lock().values().clone()
    }

    pub fn reset_to(&self, values: BTreeMap<String, PgValue>) {
        self.lock().reset_to(values);
    }

    pub fn clear_dirty(&self) {
        self.lock().clear_dirty();
    }

    /// Whether two handles refer to the same instance.
    pub fn same_instance(&self, other: &InstanceRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_records_dirty() {
        let user = InstanceRef::new("user");
        assert!(!user.is_dirty());
        user.set("email", "a@x.com");
        assert!(user.is_dirty());
        assert_eq!(
            user.dirty_fields().into_iter().collect::<Vec<_>>(),
            vec!["email".to_string()]
        );
        assert_eq!(user.get("email"), Some(PgValue::Text("a@x.com".into())));
    }

    #[test]
    fn test_from_record_starts_clean() {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), PgValue::Integer(1));
        let user = InstanceRef::from_record("user", values);
        assert!(!user.is_dirty());
        assert_eq!(user.get("id"), Some(PgValue::Integer(1)));
    }

    #[test]
    fn test_reset_clears_dirty() {
        let user = InstanceRef::new("user");
        user.set("email", "a@x.com");
        let mut fresh = BTreeMap::new();
        fresh.insert("email".to_string(), PgValue::Text("b@x.com".into()));
        user.reset_to(fresh);
        assert!(!user.is_dirty());
        assert_eq!(user.get("email"), Some(PgValue::Text("b@x.com".into())));
    }

    #[test]
    fn test_clones_share_state() {
        let user = InstanceRef::new("user");
        let alias = user.clone();
        alias.set("name", "A");
        assert_eq!(user.get("name"), Some(PgValue::Text("A".into())));
        assert!(user.same_instance(&alias));
        assert!(!user.same_instance(&InstanceRef::new("user")));
    }
}
