// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    CacheKey, DecryptionSignature, MismatchReason, Result, SessionError, SignatureCache,
    TypedDataSigner,
};
use alloy::primitives::Address;
use fdt_fhevm::{FhevmInstance, MAX_USER_DECRYPT_DURATION_DAYS};
use fdt_utils::{short_hex, Clock};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Validity of a newly created signature; the manager default applies when unset
    pub duration_days: Option<u64>,
}

/// Creates, validates and reuses decryption signatures.
///
/// A still valid signature covering the request is always returned without prompting the
/// wallet. Concurrent requests for the same key wait on each other so that at most one of them
/// prompts.
pub struct SignatureManager {
    cache: Arc<SignatureCache>,
    clock: Arc<dyn Clock>,
    default_duration_days: u64,
    locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl SignatureManager {
    pub fn new(cache: Arc<SignatureCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            clock,
            default_duration_days: MAX_USER_DECRYPT_DURATION_DAYS,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_duration(mut self, days: u64) -> Self {
        self.default_duration_days = days;
        self
    }

    pub fn cache(&self) -> &Arc<SignatureCache> {
        &self.cache
    }

    pub fn cache_key(
        &self,
        instance: &dyn FhevmInstance,
        user: Address,
        contracts: &[Address],
    ) -> CacheKey {
        CacheKey::new(
            instance.chain_id(),
            instance.public_key_id(),
            user,
            contracts,
        )
    }

    /// Return a valid cached signature covering `contracts`, if any, without creating one
    pub async fn load(
        &self,
        instance: &dyn FhevmInstance,
        contracts: &[Address],
        user: Address,
    ) -> Result<Option<DecryptionSignature>> {
        let key = self.cache_key(instance, user, contracts);
        self.find_valid(&key).await
    }

    pub async fn load_or_create(
        &self,
        instance: &dyn FhevmInstance,
        contracts: &[Address],
        signer: &dyn TypedDataSigner,
        user: Address,
        options: LoadOptions,
    ) -> Result<DecryptionSignature> {
        if contracts.is_empty() {
            return Err(SessionError::InvalidOptions(
                "at least one contract address is required".to_string(),
            ));
        }
        let duration_days = options.duration_days.unwrap_or(self.default_duration_days);
        if duration_days == 0 || duration_days > MAX_USER_DECRYPT_DURATION_DAYS {
            return Err(SessionError::InvalidOptions(format!(
                "duration of {duration_days} days is outside 1..={MAX_USER_DECRYPT_DURATION_DAYS}"
            )));
        }
        if signer.address() != user {
            return Err(SessionError::AuthorizationMismatch(
                MismatchReason::UserMismatch {
                    expected: user,
                    actual: signer.address(),
                },
            ));
        }

        let key = self.cache_key(instance, user, contracts);
        let lock = self.key_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.find_or_create(instance, &key, signer, duration_days).await
        };
        self.release_key_lock(&key, lock);
        result
    }

    async fn find_or_create(
        &self,
        instance: &dyn FhevmInstance,
        key: &CacheKey,
        signer: &dyn TypedDataSigner,
        duration_days: u64,
    ) -> Result<DecryptionSignature> {
        if let Some(signature) = self.find_valid(key).await? {
            return Ok(signature);
        }

        info!(
            "No usable decryption signature for {} on chain {}, requesting one",
            short_hex(key.user().as_slice()),
            key.scope().chain_id
        );
        let signature = self.create(instance, key, signer, duration_days).await?;
        self.cache.put(key, &signature).await?;
        Ok(signature)
    }

    /// Drop the record stored under `key`
    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        info!("Invalidating decryption signature {}", key);
        self.cache.remove(key).await
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(key.clone()).or_default().clone()
    }

    /// Forget the lock for `key` once no other request holds or waits on it
    fn release_key_lock(&self, key: &CacheKey, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        // one reference in the map, one in `lock`
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    fn validate(
        &self,
        key: &CacheKey,
        signature: &DecryptionSignature,
        now: u64,
    ) -> std::result::Result<(), MismatchReason> {
        signature.check(key.user(), key.contracts(), now)
    }

    async fn find_valid(&self, key: &CacheKey) -> Result<Option<DecryptionSignature>> {
        let now = self.clock.now();

        let exact = match self.cache.get(key).await {
            Ok(exact) => exact,
            Err(e) => {
                // put overwrites the record once a new signature exists
                warn!("Treating unreadable signature record {} as absent: {}", key, e);
                None
            }
        };
        if let Some(signature) = exact {
            if !signature.is_consistent() {
                warn!("Cached signature for {} does not match its payload", key);
            } else {
                match self.validate(key, &signature, now) {
                    Ok(()) => {
                        info!("Reusing cached decryption signature for {}", key);
                        return Ok(Some(signature));
                    }
                    Err(reason) => warn!("Ignoring cached signature for {}: {}", key, reason),
                }
            }
        }

        let covering = self
            .cache
            .entries(key.scope())
            .await?
            .into_iter()
            .filter(|(candidate, _)| candidate != key)
            .map(|(_, signature)| signature)
            .filter(|s| s.is_consistent() && self.validate(key, s, now).is_ok())
            .max_by_key(|s| s.expires_at());

        if let Some(signature) = &covering {
            info!(
                "Reusing decryption signature over {} contracts for {}",
                signature.contract_addresses().len(),
                key
            );
        }
        Ok(covering)
    }

    async fn create(
        &self,
        instance: &dyn FhevmInstance,
        key: &CacheKey,
        signer: &dyn TypedDataSigner,
        duration_days: u64,
    ) -> Result<DecryptionSignature> {
        let keypair = instance.generate_keypair()?;
        let start = self.clock.now();
        let payload = instance.create_eip712(
            &keypair.public_key,
            key.contracts(),
            start,
            duration_days,
        )?;
        let signature = signer.sign_typed_data(&payload).await.map_err(|e| {
            warn!("Wallet did not sign decryption authorization: {:#}", e);
            SessionError::SigningRejected(format!("{e:#}"))
        })?;
        Ok(DecryptionSignature::new(keypair, signature, key.user(), payload))
    }
}
