use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LookupStore, StoreError};

/// In-process stand-in for Redis holding plain keys and sets.
#[derive(Default)]
pub struct MemoryStore {
    keys: RwLock<HashSet<String>>,
    sets: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `SET key ""`
    pub async fn set_key(&self, key: impl Into<String>) {
        self.keys.write().await.insert(key.into());
    }

    /// `DEL key`. Returns true if the key existed.
    pub async fn remove_key(&self, key: &str) -> bool {
        self.keys.write().await.remove(key)
    }

    /// `SADD key member`
    pub async fn add_member(&self, key: impl Into<String>, member: impl Into<String>) {
        self.sets
            .write()
            .await
            .entry(key.into())
            .or_default()
            .insert(member.into());
    }

    /// `SREM key member`. Returns true if the member was present.
    pub async fn remove_member(&self, key: &str, member: &str) -> bool {
        let mut sets = self.sets.write().await;
        let Some(set) = sets.get_mut(key) else {
            return false;
        };
        let removed = set.remove(member);
        if set.is_empty() {
            sets.remove(key);
        }
        removed
    }
}

#[async_trait]
impl LookupStore for MemoryStore {
    async fn is_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .sets
            .read()
            .await
            .get(key)
            .is_some_and(|set| set.contains(member)))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        // Like Redis, a non-empty set is also an existing key.
        if self.keys.read().await.contains(key) {
            return Ok(true);
        }
        Ok(self.sets.read().await.contains_key(key))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
