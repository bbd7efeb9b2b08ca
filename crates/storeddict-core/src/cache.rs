//! In-memory working set of a StoredDict
//!
//! An insertion-ordered map. Overwriting a key keeps its position, deleting a
//! key closes the gap, and `pop_last` removes the most recently inserted
//! entry. The cache does no I/O; the store wraps it in a lock and shares it
//! with the sync thread.

use serde_yaml::Value;

use crate::codec::Mapping;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cache {
    entries: Mapping,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already loaded mapping.
    pub fn from_mapping(entries: Mapping) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> StoreResult<&Value> {
        self.entries
            .get(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite. Returns the previous value, if any.
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    /// Remove `key`, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> StoreResult<Value> {
        self.entries
            .shift_remove(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Remove and return the last inserted entry (LIFO).
    pub fn pop_last(&mut self) -> StoreResult<(String, Value)> {
        self.entries.pop().ok_or(StoreError::EmptyStore)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Borrow the underlying mapping (used by the codec).
    pub fn as_mapping(&self) -> &Mapping {
        &self.entries
    }

    /// Swap in freshly loaded contents, returning the old ones.
    pub fn replace(&mut self, entries: Mapping) -> Mapping {
        std::mem::replace(&mut self.entries, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Cache {
        let mut cache = Cache::new();
        cache.insert("a".into(), Value::from(1));
        cache.insert("b".into(), Value::from(2));
        cache.insert("c".into(), Value::from(3));
        cache
    }

    #[test]
    fn test_get_missing_key() {
        let cache = Cache::new();
        match cache.get("nope") {
            Err(StoreError::KeyNotFound(key)) => assert_eq!(key, "nope"),
            other => panic!("Expected KeyNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_overwrite_keeps_position() {
        let mut cache = abc();
        let old = cache.insert("a".into(), Value::from(99));
        assert_eq!(old, Some(Value::from(1)));
        assert_eq!(cache.get("a").unwrap(), &Value::from(99));

        let keys: Vec<&str> = cache.keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut cache = abc();
        assert_eq!(cache.remove("b").unwrap(), Value::from(2));
        let keys: Vec<&str> = cache.keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "c"]);

        assert!(matches!(cache.remove("b"), Err(StoreError::KeyNotFound(_))));
    }

    #[test]
    fn test_pop_last_is_lifo() {
        let mut cache = abc();
        assert_eq!(cache.pop_last().unwrap().0, "c");
        assert_eq!(cache.pop_last().unwrap().0, "b");
        assert_eq!(cache.pop_last().unwrap().0, "a");
        assert!(matches!(cache.pop_last(), Err(StoreError::EmptyStore)));
    }

    #[test]
    fn test_pop_after_delete_and_reinsert() {
        let mut cache = abc();
        cache.remove("a").unwrap();
        cache.insert("a".into(), Value::from(10));
        let (key, value) = cache.pop_last().unwrap();
        assert_eq!(key, "a");
        assert_eq!(value, Value::from(10));
    }

    #[test]
    fn test_replace_and_clear() {
        let mut cache = abc();
        let mut fresh = Mapping::new();
        fresh.insert("z".into(), Value::Null);

        let old = cache.replace(fresh);
        assert_eq!(old.len(), 3);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key("z"));

        cache.clear();
        assert!(cache.is_empty());
    }
}
