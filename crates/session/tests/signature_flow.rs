// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{address, Address, U256};
use anyhow::Result;
use fdt_crypto::{Cipher, SealedStore};
use fdt_data::SledStore;
use fdt_fhevm::{ClearValue, HandleContractPair};
use fdt_session::{
    LoadOptions, MismatchReason, SessionError, SignatureCache, SignatureManager, TypedDataSigner,
};
use fdt_test_helpers::{test_tracing, CountingSigner, MockEnv};
use fdt_utils::{Clock, SECONDS_PER_DAY};
use std::{sync::Arc, time::Duration};

const B: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
const C: Address = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");

#[tokio::test]
async fn test_cached_signature_is_reused_without_prompting() -> Result<()> {
    let _guard = test_tracing();
    let env = MockEnv::new()?;
    let instance = env.instance().await?;
    let signer = CountingSigner::random();
    let user = signer.address();
    let contracts = [env.contract()];

    let first = env
        .manager
        .load_or_create(&*instance, &contracts, &signer, user, LoadOptions::default())
        .await?;
    env.clock.advance_days(100);
    let second = env
        .manager
        .load_or_create(&*instance, &contracts, &signer, user, LoadOptions::default())
        .await?;

    assert_eq!(first, second);
    assert_eq!(signer.prompts(), 1);
    Ok(())
}

#[tokio::test]
async fn test_expired_signature_prompts_again() -> Result<()> {
    let env = MockEnv::new()?;
    let instance = env.instance().await?;
    let signer = CountingSigner::random();
    let user = signer.address();
    let contracts = [env.contract()];
    let options = LoadOptions {
        duration_days: Some(7),
    };

    let first = env
        .manager
        .load_or_create(&*instance, &contracts, &signer, user, options)
        .await?;
    env.clock.advance(7 * SECONDS_PER_DAY);
    let second = env
        .manager
        .load_or_create(&*instance, &contracts, &signer, user, options)
        .await?;

    assert_eq!(signer.prompts(), 2);
    assert_ne!(first, second);
    assert!(second.is_valid_at(env.clock.now()));
    Ok(())
}

#[tokio::test]
async fn test_superset_request_creates_covering_signature() -> Result<()> {
    let env = MockEnv::new()?;
    let instance = env.instance().await?;
    let signer = CountingSigner::random();
    let user = signer.address();
    let a = env.contract();

    let ab = env
        .manager
        .load_or_create(&*instance, &[a, B], &signer, user, LoadOptions::default())
        .await?;
    let only_b = env
        .manager
        .load_or_create(&*instance, &[B], &signer, user, LoadOptions::default())
        .await?;
    assert_eq!(ab, only_b);
    assert_eq!(signer.prompts(), 1);

    let abc = env
        .manager
        .load_or_create(&*instance, &[C, a, B], &signer, user, LoadOptions::default())
        .await?;
    assert_eq!(signer.prompts(), 2);
    assert!(abc.covers(&[a, B, C]));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_share_one_prompt() -> Result<()> {
    let env = MockEnv::new()?;
    let instance = env.instance().await?;
    let signer = CountingSigner::random().with_delay(Duration::from_millis(50));
    let user = signer.address();
    let contracts = [env.contract()];

    let (a, b) = tokio::join!(
        env.manager
            .load_or_create(&*instance, &contracts, &signer, user, LoadOptions::default()),
        env.manager
            .load_or_create(&*instance, &contracts, &signer, user, LoadOptions::default()),
    );

    assert_eq!(a?, b?);
    assert_eq!(signer.prompts(), 1);
    Ok(())
}

#[tokio::test]
async fn test_rejected_signature_is_not_cached() -> Result<()> {
    let env = MockEnv::new()?;
    let instance = env.instance().await?;
    let signer = CountingSigner::rejecting();
    let user = signer.address();
    let contracts = [env.contract()];

    let err = env
        .manager
        .load_or_create(&*instance, &contracts, &signer, user, LoadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SigningRejected(_)));
    assert!(env.manager.load(&*instance, &contracts, user).await?.is_none());

    let err = env
        .manager
        .load_or_create(&*instance, &contracts, &signer, user, LoadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SigningRejected(_)));
    assert_eq!(signer.prompts(), 2);

    signer.set_rejecting(false);
    env.manager
        .load_or_create(&*instance, &contracts, &signer, user, LoadOptions::default())
        .await?;
    assert_eq!(signer.prompts(), 3);
    assert!(env.manager.load(&*instance, &contracts, user).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_encrypt_then_decrypt_round_trip() -> Result<()> {
    let env = MockEnv::new()?;
    let instance = env.instance().await?;
    let signer = CountingSigner::random();
    let user = signer.address();
    let contract = env.contract();
    let coprocessor = env.factory.coprocessor(env.chain_id())?;

    let mut input = instance.create_encrypted_input(contract, user);
    input.add32(1500)?;
    input.add64(7)?;
    let encrypted = input.encrypt().await?;
    for handle in &encrypted.handles {
        coprocessor.verify_input(*handle, user, contract, &encrypted.input_proof)?;
        coprocessor.allow(*handle, user)?;
    }

    let signature = env
        .manager
        .load_or_create(&*instance, &[contract], &signer, user, LoadOptions::default())
        .await?;
    let pairs: Vec<_> = encrypted
        .handles
        .iter()
        .map(|h| HandleContractPair::new(*h, contract))
        .collect();
    let results = env.batcher.decrypt(&pairs, &signature, &*instance).await?;

    assert_eq!(results.len(), 2);
    assert_eq!(
        results[&encrypted.handles[0]],
        ClearValue::Uint(U256::from(1500))
    );
    assert_eq!(results[&encrypted.handles[1]], ClearValue::Uint(U256::from(7)));
    Ok(())
}

#[tokio::test]
async fn test_decrypt_for_unsigned_contract_fails_whole_batch() -> Result<()> {
    let env = MockEnv::new()?;
    let instance = env.instance().await?;
    let signer = CountingSigner::random();
    let user = signer.address();
    let contract = env.contract();

    let signature = env
        .manager
        .load_or_create(&*instance, &[contract], &signer, user, LoadOptions::default())
        .await?;
    let pairs = [
        HandleContractPair::new(Default::default(), contract),
        HandleContractPair::new(Default::default(), C),
    ];
    let err = env
        .batcher
        .decrypt(&pairs, &signature, &*instance)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::AuthorizationMismatch(MismatchReason::ContractNotAuthorized(c)) if c == C
    ));
    Ok(())
}

#[tokio::test]
async fn test_mock_chain_resolves_without_fetching() -> Result<()> {
    let env = MockEnv::new()?;
    assert!(!env.resolver.state().is_ready());
    let instance = env.instance().await?;
    assert_eq!(instance.chain_id(), env.chain_id());
    assert!(env.resolver.state().is_ready());
    Ok(())
}

#[tokio::test]
async fn test_sealed_sled_cache_survives_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("signatures.db");
    let cipher = Arc::new(Cipher::from_password("correct horse battery staple").await?);
    let store = Arc::new(SealedStore::new(SledStore::open(&path)?, cipher.clone()));

    let env = MockEnv::with_cache(SignatureCache::new(store.clone()))?;
    let instance = env.instance().await?;
    let signer = CountingSigner::random();
    let user = signer.address();
    let contracts = [env.contract()];
    let created = env
        .manager
        .load_or_create(&*instance, &contracts, &signer, user, LoadOptions::default())
        .await?;

    // a fresh manager over the same store finds the record
    let manager = SignatureManager::new(Arc::new(SignatureCache::new(store)), env.clock.clone());
    let loaded = manager.load(&*instance, &contracts, user).await?;
    assert_eq!(loaded, Some(created));
    Ok(())
}
