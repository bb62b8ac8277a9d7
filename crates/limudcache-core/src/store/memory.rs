use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Collection, Store, StoreError};

/// In-process store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .and_then(|c| c.get(key))
            .cloned())
    }

    async fn put(&self, collection: Collection, key: &str, entry: Value) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        if let Some(c) = self.collections.write().await.get_mut(&collection) {
            c.remove(key);
        }
        Ok(())
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        self.collections.write().await.remove(&collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_collections_are_independent() {
        let store = MemoryStore::new();
        store.put(Collection::Texts, "a", json!(1)).await.unwrap();
        store.put(Collection::Meta, "a", json!(2)).await.unwrap();

        store.clear(Collection::Texts).await.unwrap();

        assert_eq!(store.len(Collection::Texts).await, 0);
        assert_eq!(store.get(Collection::Meta, "a").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_scan_is_ordered() {
        let store = MemoryStore::new();
        for key in ["c", "a", "b"] {
            store.put(Collection::Calendar, key, json!(key)).await.unwrap();
        }
        let keys: Vec<_> = store
            .scan(Collection::Calendar)
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        store.delete(Collection::Calendar, "b").await.unwrap();
        assert_eq!(store.len(Collection::Calendar).await, 2);
    }
}
