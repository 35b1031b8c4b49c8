// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::KeyValStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemStore {
    db: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.db.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.db.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValStore for InMemStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.read().await.get(key).cloned())
    }

    async fn insert(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.db.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.db.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.db.write().await.clear();
        Ok(())
    }
}
