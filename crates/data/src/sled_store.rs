// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    sled_utils::{clear_all_caches, get_or_open_db_tree},
    KeyValStore,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sled::Tree;
use std::path::Path;
use tracing::info;

pub const DEFAULT_TREE: &str = "signatures";

/// Persistent store on a sled tree
pub struct SledStore {
    tree: Tree,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_tree(path, DEFAULT_TREE)
    }

    pub fn open_tree(path: &Path, tree: &str) -> Result<Self> {
        info!("Opening SledStore with {:?}", path);
        let tree = get_or_open_db_tree(path, tree)?;
        Ok(Self { tree })
    }

    pub fn close_all_connections() {
        clear_all_caches()
    }

    pub async fn flush(&self) -> Result<()> {
        self.tree
            .flush_async()
            .await
            .context("Could not flush db")?;
        Ok(())
    }
}

#[async_trait]
impl KeyValStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let res = self
            .tree
            .get(key.as_bytes())
            .with_context(|| format!("Failed to fetch {}", key))?;
        Ok(res.map(|v| v.to_vec()))
    }

    async fn insert(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.tree
            .insert(key.as_bytes(), value)
            .context("Could not insert data into db")?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.tree
            .remove(key.as_bytes())
            .context("Could not remove data from db")?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.tree.clear().context("Could not clear db")?;
        Ok(())
    }
}
