// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use super::wallet::Wallet;
use anyhow::{anyhow, Result};
use fdt_config::{AppConfig, ChainConfig, StorageConfig};
use fdt_crypto::{Cipher, SealedStore};
use fdt_data::SledStore;
use fdt_evm::{DietTrackerContract, DietTrackerWrite, MockDietTracker};
use fdt_fhevm::FhevmInstance;
use fdt_session::{
    ConfiguredFactory, DecryptBatcher, InstanceResolver, LoadOptions, SignatureCache,
    SignatureManager,
};
use fdt_tracker::DecryptServices;
use fdt_utils::{Clock, SystemClock};
use std::sync::Arc;
use tracing::info;

/// Pick the chain named on the command line, or the first configured one
pub fn select_chain(config: &AppConfig, name: Option<&str>) -> Result<ChainConfig> {
    match name {
        Some(name) => config
            .chain_by_name(name)
            .cloned()
            .ok_or_else(|| anyhow!("No chain named '{}' in {:?}", name, config.config_file())),
        None => config
            .chains()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("No chains configured")),
    }
}

/// Open the signature store the configuration asks for
pub async fn open_signature_cache(config: &AppConfig) -> Result<SignatureCache> {
    match config.storage() {
        StorageConfig::Memory => Ok(SignatureCache::in_memory()),
        StorageConfig::Sled { password_env, .. } => {
            let store = SledStore::open(&config.db_file())?;
            match password_env {
                Some(var) => {
                    let cipher = Arc::new(Cipher::from_env(var).await?);
                    Ok(SignatureCache::new(Arc::new(SealedStore::new(store, cipher))))
                }
                None => Ok(SignatureCache::new(Arc::new(store))),
            }
        }
    }
}

/// Everything a session on one chain needs
pub struct ClientStack {
    pub chain: ChainConfig,
    pub clock: Arc<dyn Clock>,
    pub factory: Arc<ConfiguredFactory>,
    pub resolver: Arc<InstanceResolver>,
    pub services: DecryptServices,
}

impl ClientStack {
    pub async fn build(config: &AppConfig, chain: ChainConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let factory = Arc::new(ConfiguredFactory::new(
            config.chains().clone(),
            clock.clone(),
        ));
        let resolver = Arc::new(InstanceResolver::new(factory.clone()));
        let cache = Arc::new(open_signature_cache(config).await?);
        let manager = Arc::new(
            SignatureManager::new(cache, clock.clone())
                .with_default_duration(config.signature().duration_days),
        );
        let batcher = Arc::new(DecryptBatcher::new(clock.clone()));

        Ok(Self {
            chain,
            clock,
            factory,
            resolver,
            services: DecryptServices {
                manager,
                batcher,
                options: LoadOptions::default(),
            },
        })
    }

    /// Resolve the encryption instance for the selected chain
    pub async fn instance(&self, mock_chains: &[u64]) -> Result<Arc<dyn FhevmInstance>> {
        let provider = self.chain.rpc()?.identity();
        let state = self
            .resolver
            .resolve(self.chain.chain_id, &provider, mock_chains)
            .await;
        Ok(state.into_result()?)
    }

    /// DietTracker deployment on the selected chain, acting as the wallet's account
    pub async fn ledger(&self, wallet: &Wallet) -> Result<Arc<dyn DietTrackerWrite>> {
        let address = self.chain.diet_tracker_address()?;
        if self.chain.mock {
            info!("Using the in-process DietTracker for {}", self.chain.name);
            let coprocessor = self.factory.coprocessor(self.chain.chain_id)?;
            return Ok(Arc::new(MockDietTracker::new(
                address,
                coprocessor,
                self.clock.clone(),
                wallet.signer.address(),
            )));
        }

        let rpc = self.chain.rpc()?;
        let contract = DietTrackerContract::new(
            &rpc.as_http_url()?,
            &wallet.private_key,
            &address.to_string(),
        )
        .await
        .map_err(|e| anyhow!("Could not connect to {}: {}", self.chain.name, e))?;
        Ok(Arc::new(contract))
    }
}
