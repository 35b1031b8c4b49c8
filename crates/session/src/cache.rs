// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{CacheKey, CacheScope, DecryptionSignature, Result, SessionError};
use alloy::primitives::Address;
use anyhow::Context;
use fdt_data::{InMemStore, KeyValStore};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// Persistent map from [`CacheKey`] to [`DecryptionSignature`].
///
/// Each scope (chain, public key id, user) also gets an index entry listing the contract sets
/// stored under it, so a request for a subset of contracts can find a signature created for a
/// larger set. Only the signature manager writes.
pub struct SignatureCache {
    store: Arc<dyn KeyValStore>,
    // serializes read-modify-write of scope indexes
    index_lock: Mutex<()>,
}

impl SignatureCache {
    pub fn new(store: Arc<dyn KeyValStore>) -> Self {
        Self {
            store,
            index_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemStore::new()))
    }

    pub async fn get(&self, key: &CacheKey) -> Result<Option<DecryptionSignature>> {
        let Some(bytes) = self
            .store
            .get(&key.storage_key())
            .await
            .map_err(SessionError::storage)?
        else {
            return Ok(None);
        };
        let signature = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt signature record for {key}"))
            .map_err(|e| {
                error!("{:#}", e);
                SessionError::storage(e)
            })?;
        Ok(Some(signature))
    }

    pub(crate) async fn put(&self, key: &CacheKey, signature: &DecryptionSignature) -> Result<()> {
        let bytes = serde_json::to_vec(signature)
            .context("Could not serialize signature")
            .map_err(SessionError::storage)?;

        let _guard = self.index_lock.lock().await;
        self.store
            .insert(&key.storage_key(), bytes)
            .await
            .map_err(SessionError::storage)?;

        let mut index = self.read_index(key.scope()).await?;
        if !index.iter().any(|c| c.as_slice() == key.contracts()) {
            index.push(key.contracts().to_vec());
            self.write_index(key.scope(), &index).await?;
        }
        debug!("Stored signature for {}", key);
        Ok(())
    }

    pub(crate) async fn remove(&self, key: &CacheKey) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        self.store
            .remove(&key.storage_key())
            .await
            .map_err(SessionError::storage)?;

        let mut index = self.read_index(key.scope()).await?;
        let before = index.len();
        index.retain(|c| c.as_slice() != key.contracts());
        if index.len() != before {
            self.write_index(key.scope(), &index).await?;
        }
        debug!("Removed signature for {}", key);
        Ok(())
    }

    /// Every readable signature in `scope`. Index entries whose record has gone, or no longer
    /// deserializes or unseals, are skipped.
    pub async fn entries(&self, scope: &CacheScope) -> Result<Vec<(CacheKey, DecryptionSignature)>> {
        let index = self.read_index(scope).await?;
        let mut entries = Vec::with_capacity(index.len());
        for contracts in index {
            let key = CacheKey::in_scope(scope.clone(), &contracts);
            match self.get(&key).await {
                Ok(Some(signature)) => entries.push((key, signature)),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable signature record {}: {}", key, e),
            }
        }
        Ok(entries)
    }

    /// Drop every record and index from the backing store
    pub async fn purge(&self) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        self.store.clear().await.map_err(SessionError::storage)
    }

    async fn read_index(&self, scope: &CacheScope) -> Result<Vec<Vec<Address>>> {
        let Some(bytes) = self
            .store
            .get(&scope.storage_key())
            .await
            .map_err(SessionError::storage)?
        else {
            return Ok(Vec::new());
        };
        // an unreadable index only loses the subset lookup; the next put rewrites it
        match serde_json::from_slice(&bytes) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!(
                    "Discarding corrupt signature index for {}: {}",
                    scope.serialized(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn write_index(&self, scope: &CacheScope, index: &[Vec<Address>]) -> Result<()> {
        let bytes = serde_json::to_vec(index)
            .context("Could not serialize signature index")
            .map_err(SessionError::storage)?;
        self.store
            .insert(&scope.storage_key(), bytes)
            .await
            .map_err(SessionError::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypedDataSigner;
    use alloy::{primitives::address, signers::local::PrivateKeySigner};
    use fdt_fhevm::{FhevmInstance, MockCoprocessor, MockInstance};
    use fdt_utils::ManualClock;

    const A: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const B: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");

    async fn signature_for(
        instance: &MockInstance,
        signer: &PrivateKeySigner,
        contracts: &[Address],
    ) -> DecryptionSignature {
        let keypair = instance.generate_keypair().unwrap();
        let payload = instance
            .create_eip712(&keypair.public_key, contracts, 1_700_000_000, 1)
            .unwrap();
        let signature = signer.sign_typed_data(&payload).await.unwrap();
        DecryptionSignature::new(keypair, signature, TypedDataSigner::address(signer), payload)
    }

    fn instance() -> MockInstance {
        MockInstance::new(
            Arc::new(MockCoprocessor::new(fdt_fhevm::ChainParams::hardhat())),
            Arc::new(ManualClock::new(1_700_000_000)),
        )
    }

    #[tokio::test]
    async fn test_put_get_remove() -> Result<()> {
        let cache = SignatureCache::in_memory();
        let instance = instance();
        let signer = PrivateKeySigner::random();
        let key = CacheKey::new(31337, "mock-31337", signer.address(), &[B, A]);
        assert!(cache.get(&key).await?.is_none());

        let sig = signature_for(&instance, &signer, key.contracts()).await;
        cache.put(&key, &sig).await?;
        assert_eq!(cache.get(&key).await?, Some(sig.clone()));
        assert_eq!(cache.entries(key.scope()).await?.len(), 1);

        // same record twice does not duplicate the index
        cache.put(&key, &sig).await?;
        assert_eq!(cache.entries(key.scope()).await?.len(), 1);

        cache.remove(&key).await?;
        assert!(cache.get(&key).await?.is_none());
        assert!(cache.entries(key.scope()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_entries_are_scoped() -> Result<()> {
        let cache = SignatureCache::in_memory();
        let instance = instance();
        let signer = PrivateKeySigner::random();
        let user = signer.address();
        let small = CacheKey::new(31337, "mock-31337", user, &[A]);
        let large = CacheKey::new(31337, "mock-31337", user, &[A, B]);
        let other_key_id = CacheKey::new(31337, "rotated", user, &[A]);

        cache.put(&small, &signature_for(&instance, &signer, &[A]).await).await?;
        cache.put(&large, &signature_for(&instance, &signer, &[A, B]).await).await?;
        cache
            .put(&other_key_id, &signature_for(&instance, &signer, &[A]).await)
            .await?;

        let entries = cache.entries(small.scope()).await?;
        let mut keys: Vec<_> = entries.into_iter().map(|(k, _)| k).collect();
        keys.sort_by_key(|k| k.contracts().len());
        assert_eq!(keys, vec![small, large]);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_storage_error() -> Result<()> {
        let store = Arc::new(InMemStore::new());
        let cache = SignatureCache::new(store.clone());
        let key = CacheKey::new(1, "k", A, &[B]);
        store
            .insert(&key.storage_key(), b"{not json".to_vec())
            .await
            .map_err(SessionError::storage)?;
        assert!(matches!(cache.get(&key).await, Err(SessionError::Storage(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_entries_skip_unreadable_records() -> Result<()> {
        let store = Arc::new(InMemStore::new());
        let cache = SignatureCache::new(store.clone());
        let instance = instance();
        let signer = PrivateKeySigner::random();
        let user = signer.address();
        let good = CacheKey::new(31337, "mock-31337", user, &[A, B]);
        let bad = CacheKey::new(31337, "mock-31337", user, &[B]);
        cache.put(&good, &signature_for(&instance, &signer, &[A, B]).await).await?;
        cache.put(&bad, &signature_for(&instance, &signer, &[B]).await).await?;
        store
            .insert(&bad.storage_key(), b"{garbage".to_vec())
            .await
            .map_err(SessionError::storage)?;

        let entries = cache.entries(good.scope()).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, good);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_index_is_rebuilt_on_put() -> Result<()> {
        let store = Arc::new(InMemStore::new());
        let cache = SignatureCache::new(store.clone());
        let instance = instance();
        let signer = PrivateKeySigner::random();
        let key = CacheKey::new(31337, "mock-31337", signer.address(), &[A]);
        store
            .insert(&key.scope().storage_key(), b"[[".to_vec())
            .await
            .map_err(SessionError::storage)?;
        assert!(cache.entries(key.scope()).await?.is_empty());

        cache.put(&key, &signature_for(&instance, &signer, &[A]).await).await?;
        assert_eq!(cache.entries(key.scope()).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_purge_clears_everything() -> Result<()> {
        let cache = SignatureCache::in_memory();
        let instance = instance();
        let signer = PrivateKeySigner::random();
        let key = CacheKey::new(31337, "mock-31337", signer.address(), &[A]);
        cache.put(&key, &signature_for(&instance, &signer, &[A]).await).await?;
        cache.purge().await?;
        assert!(cache.get(&key).await?.is_none());
        assert!(cache.entries(key.scope()).await?.is_empty());
        Ok(())
    }
}
