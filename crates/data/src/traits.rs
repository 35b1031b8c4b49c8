// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Narrow byte-oriented store the signature cache persists through.
///
/// Implementations use interior mutability so one store can be shared behind an `Arc`. Writes
/// to a single key are atomic: readers observe either the old or the new value, never a mix.
#[async_trait]
pub trait KeyValStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn insert(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    /// Drop every entry
    async fn clear(&self) -> Result<()>;
}

pub type SharedStore = Arc<dyn KeyValStore>;

#[async_trait]
impl<S: KeyValStore + ?Sized> KeyValStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn insert(&self, key: &str, value: Vec<u8>) -> Result<()> {
        (**self).insert(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}
