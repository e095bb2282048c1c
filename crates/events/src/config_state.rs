//! Process-wide configuration mapping.
//!
//! Any session may update it; there is no merge logic beyond per-key
//! replacement, so concurrent writers to the same key resolve as last
//! writer wins.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tokio::sync::RwLock;

pub struct ConfigState {
    values: RwLock<HashMap<String, Value>>,
}

impl ConfigState {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Replace every key present in `update`. Returns the number of keys written.
    pub async fn apply(&self, update: &Map<String, Value>) -> usize {
        let mut values = self.values.write().await;
        for (key, value) in update {
            values.insert(key.clone(), value.clone());
        }
        update.len()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.values.read().await.get(key).cloned()
    }

    /// Copy of the whole mapping.
    pub async fn snapshot(&self) -> Map<String, Value> {
        self.values
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

impl Default for ConfigState {
    fn default() -> Self {
        Self::new()
    }
}
