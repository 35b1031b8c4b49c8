// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::Cipher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fdt_data::KeyValStore;
use std::sync::Arc;
use tracing::error;

/// Encrypts every value on its way into the wrapped store.
///
/// Keys are stored in the clear; they carry no secret material.
pub struct SealedStore<S> {
    inner: S,
    cipher: Arc<Cipher>,
}

impl<S: KeyValStore> SealedStore<S> {
    pub fn new(inner: S, cipher: Arc<Cipher>) -> Self {
        Self { inner, cipher }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: KeyValStore> KeyValStore for SealedStore<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(sealed) = self.inner.get(key).await? else {
            return Ok(None);
        };
        let value = self.cipher.decrypt_data(&sealed).map_err(|e| {
            error!("Could not unseal value at {}: {}", key, e);
            e
        })?;
        Ok(Some(value))
    }

    async fn insert(&self, key: &str, mut value: Vec<u8>) -> Result<()> {
        let sealed = self
            .cipher
            .encrypt_data(&mut value)
            .with_context(|| format!("Could not seal value for {}", key))?;
        self.inner.insert(key, sealed).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
}
