// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::Address;
use anyhow::Result;
use fdt_config::ChainConfig;
use fdt_evm::MockDietTracker;
use fdt_fhevm::FhevmInstance;
use fdt_session::{
    ConfiguredFactory, DecryptBatcher, InstanceResolver, SignatureCache, SignatureManager,
};
use fdt_utils::ManualClock;
use std::sync::Arc;

pub const MOCK_START_TIMESTAMP: u64 = 1_700_000_000;

/// A hardhat mock chain with the whole session stack wired up around a manual clock
pub struct MockEnv {
    pub chain: ChainConfig,
    pub clock: Arc<ManualClock>,
    pub factory: Arc<ConfiguredFactory>,
    pub resolver: Arc<InstanceResolver>,
    pub cache: Arc<SignatureCache>,
    pub manager: Arc<SignatureManager>,
    pub batcher: Arc<DecryptBatcher>,
    tracker: MockDietTracker,
}

impl MockEnv {
    pub fn new() -> Result<Self> {
        Self::with_cache(SignatureCache::in_memory())
    }

    pub fn with_cache(cache: SignatureCache) -> Result<Self> {
        let chain = ChainConfig::hardhat();
        let clock = Arc::new(ManualClock::new(MOCK_START_TIMESTAMP));
        let factory = Arc::new(ConfiguredFactory::new(vec![chain.clone()], clock.clone()));
        let resolver = Arc::new(InstanceResolver::new(factory.clone()));
        let cache = Arc::new(cache);
        let manager = Arc::new(SignatureManager::new(cache.clone(), clock.clone()));
        let batcher = Arc::new(DecryptBatcher::new(clock.clone()));
        let tracker = MockDietTracker::new(
            chain.diet_tracker_address()?,
            factory.coprocessor(chain.chain_id)?,
            clock.clone(),
            Address::ZERO,
        );
        Ok(Self {
            chain,
            clock,
            factory,
            resolver,
            cache,
            manager,
            batcher,
            tracker,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain.chain_id
    }

    pub fn provider_identity(&self) -> Result<String> {
        Ok(self.chain.rpc()?.identity())
    }

    /// Resolve the mock chain's instance
    pub async fn instance(&self) -> Result<Arc<dyn FhevmInstance>> {
        let state = self
            .resolver
            .resolve(
                self.chain.chain_id,
                &self.provider_identity()?,
                &[self.chain.chain_id],
            )
            .await;
        Ok(state.into_result()?)
    }

    /// The DietTracker deployment, acting as `sender`
    pub fn diet_tracker(&self, sender: Address) -> MockDietTracker {
        self.tracker.connect(sender)
    }

    pub fn contract(&self) -> Address {
        use fdt_evm::DietTrackerRead;
        self.tracker.address()
    }
}
