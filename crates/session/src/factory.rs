// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::InstanceError;
use async_trait::async_trait;
use fdt_config::ChainConfig;
use fdt_fhevm::{
    relayer::{PublicParams, RelayerClient},
    ChainParams, FheCrypto, FhevmInstance, MockCoprocessor, MockInstance, RelayerInstance,
};
use fdt_utils::{retry_with_backoff, Clock, RetryError, BACKOFF_DELAY, BACKOFF_MAX_RETRIES};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::info;
use url::Url;

/// Builds instances for the resolver. Mock construction is synchronous; network construction
/// is split so the resolver can run the fetch as a shared future.
#[async_trait]
pub trait InstanceFactory: Send + Sync + 'static {
    fn create_mock(&self, chain_id: u64) -> Result<Arc<dyn FhevmInstance>, InstanceError>;

    async fn fetch_public_params(&self, chain_id: u64) -> Result<PublicParams, InstanceError>;

    fn create_network(
        &self,
        chain_id: u64,
        params: PublicParams,
    ) -> Result<Arc<dyn FhevmInstance>, InstanceError>;
}

/// Factory over the chains in the application configuration
pub struct ConfiguredFactory {
    chains: Vec<ChainConfig>,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    crypto: Option<Arc<dyn FheCrypto>>,
    coprocessors: Mutex<HashMap<u64, Arc<MockCoprocessor>>>,
    max_attempts: u32,
    initial_delay_ms: u64,
}

impl ConfiguredFactory {
    pub fn new(chains: Vec<ChainConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            chains,
            clock,
            http: reqwest::Client::new(),
            crypto: None,
            coprocessors: Mutex::new(HashMap::new()),
            max_attempts: BACKOFF_MAX_RETRIES,
            initial_delay_ms: BACKOFF_DELAY,
        }
    }

    /// Cryptography backend for network chains. Without one only mock chains can be served.
    pub fn with_crypto(mut self, crypto: Arc<dyn FheCrypto>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, initial_delay_ms: u64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_delay_ms = initial_delay_ms;
        self
    }

    fn chain(&self, chain_id: u64) -> Result<&ChainConfig, InstanceError> {
        self.chains
            .iter()
            .find(|c| c.chain_id == chain_id)
            .ok_or(InstanceError::UnsupportedChain(chain_id))
    }

    /// The in-process coprocessor backing a mock chain; one per chain for the factory's lifetime
    pub fn coprocessor(&self, chain_id: u64) -> Result<Arc<MockCoprocessor>, InstanceError> {
        let chain = self.chain(chain_id)?;
        if !chain.mock {
            return Err(InstanceError::Construction(format!(
                "chain {chain_id} is not a mock chain"
            )));
        }
        let mut coprocessors = match self.coprocessors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(coprocessors
            .entry(chain_id)
            .or_insert_with(|| Arc::new(MockCoprocessor::new(ChainParams::from(chain))))
            .clone())
    }

    fn relayer_client(&self, chain: &ChainConfig) -> Result<RelayerClient, InstanceError> {
        let Some(relayer_url) = &chain.relayer_url else {
            return Err(InstanceError::Construction(format!(
                "chain {} has no relayer_url",
                chain.chain_id
            )));
        };
        let base = Url::parse(relayer_url)
            .map_err(|e| InstanceError::Construction(format!("bad relayer_url: {e}")))?;
        Ok(RelayerClient::new(self.http.clone(), base))
    }
}

#[async_trait]
impl InstanceFactory for ConfiguredFactory {
    fn create_mock(&self, chain_id: u64) -> Result<Arc<dyn FhevmInstance>, InstanceError> {
        let coprocessor = self.coprocessor(chain_id)?;
        Ok(Arc::new(MockInstance::new(coprocessor, self.clock.clone())))
    }

    async fn fetch_public_params(&self, chain_id: u64) -> Result<PublicParams, InstanceError> {
        let chain = self.chain(chain_id)?;
        let client = self.relayer_client(chain)?;
        info!("Fetching public parameters for chain {}", chain.name);
        retry_with_backoff(
            || {
                let client = client.clone();
                async move {
                    client.fetch_public_params().await.map_err(|e| {
                        if e.is_transient() {
                            RetryError::Retry(e)
                        } else {
                            RetryError::Failure(e)
                        }
                    })
                }
            },
            self.max_attempts,
            self.initial_delay_ms,
        )
        .await
        .map_err(|e| InstanceError::Fetch(e.to_string()))
    }

    fn create_network(
        &self,
        chain_id: u64,
        params: PublicParams,
    ) -> Result<Arc<dyn FhevmInstance>, InstanceError> {
        let chain = self.chain(chain_id)?;
        let Some(crypto) = &self.crypto else {
            return Err(InstanceError::Construction(format!(
                "no FHE crypto backend configured for chain {}",
                chain.name
            )));
        };
        let client = self.relayer_client(chain)?;
        Ok(Arc::new(RelayerInstance::new(
            ChainParams::from(chain),
            client,
            params,
            crypto.clone(),
        )))
    }
}
