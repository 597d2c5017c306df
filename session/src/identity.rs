//! Identity map
//!
//! Guarantees at most one live instance per (entity, primary key)
//! within a session. Insertion order is kept so flush plans and
//! iteration stay deterministic.

use std::collections::HashMap;

use schema_registry::IdentityKey;

use crate::instance::InstanceRef;

#[derive(Debug, Default)]
pub struct IdentityMap {
    map: HashMap<IdentityKey, InstanceRef>,
    order: Vec<IdentityKey>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&InstanceRef> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.map.contains_key(key)
    }

    /// Track an instance under its key. Returns the handle already
    /// tracked under that key, if any, leaving the map unchanged.
    pub fn insert(&mut self, key: IdentityKey, instance: InstanceRef) -> Option<InstanceRef> {
        if let Some(existing) = self.map.get(&key) {
            return Some(existing.clone());
        }
        self.order.push(key.clone());
        self.map.insert(key, instance);
        None
    }

    pub fn remove(&mut self, key: &IdentityKey) -> Option<InstanceRef> {
        let removed = self.map.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    /// Key of a tracked instance, found by handle identity.
    pub fn key_of(&self, instance: &InstanceRef) -> Option<&IdentityKey> {
        self.order
            .iter()
            .find(|key| {
                self.map
                    .get(key)
                    .is_some_and(|tracked| tracked.same_instance(instance))
            })
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &InstanceRef)> {
        self.order
            .iter()
            .filter_map(|key| self.map.get(key).map(|instance| (key, instance)))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_registry::KeyValue;

    fn key(n: i64) -> IdentityKey {
        IdentityKey::new("user", KeyValue::Int(n))
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = IdentityMap::new();
        let user = InstanceRef::new("user");
        assert!(map.insert(key(1), user.clone()).is_none());
        assert!(map.get(&key(1)).unwrap().same_instance(&user));
    }

    #[test]
    fn test_duplicate_insert_returns_existing() {
        let mut map = IdentityMap::new();
        let first = InstanceRef::new("user");
        let second = InstanceRef::new("user");
        map.insert(key(1), first.clone());
        let existing = map.insert(key(1), second).unwrap();
        assert!(existing.same_instance(&first));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_iteration_order_is_insertion_order() {
        let mut map = IdentityMap::new();
        for n in [3, 1, 2] {
            map.insert(key(n), InstanceRef::new("user"));
        }
        let keys: Vec<_> = map.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![key(3), key(1), key(2)]);
    }

    #[test]
    fn test_remove() {
        let mut map = IdentityMap::new();
        map.insert(key(1), InstanceRef::new("user"));
        assert!(map.remove(&key(1)).is_some());
        assert!(map.is_empty());
        assert!(map.remove(&key(1)).is_none());
    }

    #[test]
    fn test_key_of() {
        let mut map = IdentityMap::new();
        let user = InstanceRef::new("user");
        map.insert(key(7), user.clone());
        assert_eq!(map.key_of(&user), Some(&key(7)));
        assert_eq!(map.key_of(&InstanceRef::new("user")), None);
    }
}
