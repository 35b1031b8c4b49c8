// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::EncryptedRecord;
use alloy::providers::fillers::BlobGasFiller;
use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, Bytes, TxHash, B256, U256},
    providers::fillers::{
        ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
    },
    providers::{Identity, Provider, ProviderBuilder, RootProvider},
    signers::local::PrivateKeySigner,
    sol,
};
use async_trait::async_trait;
use eyre::{eyre, Result};
use once_cell::sync::Lazy;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

static NONCE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub async fn next_pending_nonce<P>(provider: &P, from: Address) -> eyre::Result<u64>
where
    P: Provider<Ethereum> + Send + Sync,
{
    provider
        .get_transaction_count(from)
        .pending()
        .await
        .map_err(Into::into)
}

sol! {
    #[derive(Debug)]
    #[sol(rpc)]
    contract DietTracker {
        error ZamaProtocolUnsupported();

        function submitDailyData(bytes32 encCaloriesIn, bytes32 encCaloriesOut, bytes calldata inputProof) external;
        function getLatestRecord() external view returns (bytes32 caloriesIn, bytes32 caloriesOut, bytes32 balance, uint256 timestamp);
        function getRecord(uint256 index) external view returns (bytes32 caloriesIn, bytes32 caloriesOut, bytes32 balance, uint256 timestamp);
        function getRecordCount() external view returns (uint256 count);
        function getAllTimestamps() external view returns (uint256[] memory timestamps);
        function calculateAverageBalance(uint256 numRecords) external returns (bytes32 avgBalance);
        function confidentialProtocolId() external view returns (uint256);
    }
}

fn to_u64(value: U256, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| eyre!("{what} {value} does not fit in u64"))
}

/// Read-only view of the caller's records. Records are per sender: every call reads the
/// records of the account the contract is connected with.
#[async_trait]
pub trait DietTrackerRead: Send + Sync {
    /// Address of the contract; the one encrypted inputs and decryptions are bound to
    fn address(&self) -> Address;

    /// Account whose records this handle reads and writes
    fn sender(&self) -> Address;

    /// Most recent record of the sender
    async fn get_latest_record(&self) -> Result<EncryptedRecord>;

    async fn get_record(&self, index: u64) -> Result<EncryptedRecord>;

    async fn get_record_count(&self) -> Result<u64>;

    async fn get_all_timestamps(&self) -> Result<Vec<u64>>;

    /// Identifier of the confidential protocol configuration the contract was deployed against
    async fn confidential_protocol_id(&self) -> Result<U256>;
}

#[async_trait]
pub trait DietTrackerWrite: DietTrackerRead {
    /// Store one day's encrypted intake and expenditure; the contract derives the balance
    async fn submit_daily_data(
        &self,
        enc_calories_in: B256,
        enc_calories_out: B256,
        input_proof: Bytes,
    ) -> Result<TxHash>;

    /// Compute the encrypted average balance of the last `num_records` records and return its
    /// handle
    async fn calculate_average_balance(&self, num_records: u64) -> Result<B256>;
}

/// Generic type to represent different provider types
pub trait ProviderType: Send {
    type Provider: Provider + Send + Sync + 'static;
}

/// Marker type for read-only provider
#[derive(Clone)]
pub struct ReadOnly;
impl ProviderType for ReadOnly {
    type Provider = DietTrackerReadOnlyProvider;
}

/// Marker type for read-write provider
#[derive(Clone)]
pub struct ReadWrite;
impl ProviderType for ReadWrite {
    type Provider = DietTrackerWriteProvider;
}

/// DietTracker deployment reached over JSON-RPC
#[derive(Clone)]
pub struct DietTrackerContract<T: ProviderType> {
    pub provider: Arc<T::Provider>,
    pub contract_address: Address,
    sender: Address,
    _marker: PhantomData<T>,
}

impl DietTrackerContract<ReadWrite> {
    pub async fn new(
        http_rpc_url: &str,
        private_key: &str,
        contract_address: &str,
    ) -> Result<DietTrackerContract<ReadWrite>> {
        DietTrackerContractFactory::create_write(http_rpc_url, contract_address, private_key)
            .await
    }

    pub fn get_provider(&self) -> Arc<DietTrackerWriteProvider> {
        self.provider.clone()
    }
}

impl DietTrackerContract<ReadOnly> {
    /// Reads go out with `from` set to `sender`, so the contract returns that account's records
    pub async fn read_only(
        http_rpc_url: &str,
        contract_address: &str,
        sender: Address,
    ) -> Result<DietTrackerContract<ReadOnly>> {
        DietTrackerContractFactory::create_read(http_rpc_url, contract_address, sender).await
    }

    pub fn get_provider(&self) -> Arc<DietTrackerReadOnlyProvider> {
        self.provider.clone()
    }
}

/// Type alias for read-only provider
pub type DietTrackerReadOnlyProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
>;

/// Type alias for read-write provider
pub type DietTrackerWriteProvider = FillProvider<
    JoinFill<
        JoinFill<
            JoinFill<
                Identity,
                JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
            >,
            WalletFiller<EthereumWallet>,
        >,
        NonceFiller,
    >,
    RootProvider<Ethereum>,
    Ethereum,
>;

pub type DietTrackerReadContract = DietTrackerContract<ReadOnly>;
pub type DietTrackerWriteContract = DietTrackerContract<ReadWrite>;

pub struct DietTrackerContractFactory;

impl DietTrackerContractFactory {
    pub async fn create_write(
        http_rpc_url: &str,
        contract_address: &str,
        private_key: &str,
    ) -> Result<DietTrackerContract<ReadWrite>> {
        let contract_address = contract_address.parse()?;

        let signer: PrivateKeySigner = private_key.parse()?;
        let sender = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .with_cached_nonce_management()
            .connect(http_rpc_url)
            .await?;

        Ok(DietTrackerContract::<ReadWrite> {
            provider: Arc::new(provider),
            contract_address,
            sender,
            _marker: PhantomData,
        })
    }

    pub async fn create_read(
        http_rpc_url: &str,
        contract_address: &str,
        sender: Address,
    ) -> Result<DietTrackerContract<ReadOnly>> {
        let contract_address = contract_address.parse()?;

        let provider = ProviderBuilder::new().connect(http_rpc_url).await?;

        Ok(DietTrackerContract::<ReadOnly> {
            provider: Arc::new(provider),
            contract_address,
            sender,
            _marker: PhantomData,
        })
    }
}

fn record_from(
    calories_in: B256,
    calories_out: B256,
    balance: B256,
    timestamp: U256,
) -> Result<EncryptedRecord> {
    Ok(EncryptedRecord {
        calories_in,
        calories_out,
        balance,
        timestamp: to_u64(timestamp, "timestamp")?,
    })
}

#[async_trait]
impl<T: Send + Sync> DietTrackerRead for DietTrackerContract<T>
where
    T: ProviderType,
{
    fn address(&self) -> Address {
        self.contract_address
    }

    fn sender(&self) -> Address {
        self.sender
    }

    async fn get_latest_record(&self) -> Result<EncryptedRecord> {
        let contract = DietTracker::new(self.contract_address, &self.provider);
        let r = contract.getLatestRecord().from(self.sender).call().await?;
        record_from(r.caloriesIn, r.caloriesOut, r.balance, r.timestamp)
    }

    async fn get_record(&self, index: u64) -> Result<EncryptedRecord> {
        let contract = DietTracker::new(self.contract_address, &self.provider);
        let r = contract
            .getRecord(U256::from(index))
            .from(self.sender)
            .call()
            .await?;
        record_from(r.caloriesIn, r.caloriesOut, r.balance, r.timestamp)
    }

    async fn get_record_count(&self) -> Result<u64> {
        let contract = DietTracker::new(self.contract_address, &self.provider);
        let count = contract.getRecordCount().from(self.sender).call().await?;
        to_u64(count, "record count")
    }

    async fn get_all_timestamps(&self) -> Result<Vec<u64>> {
        let contract = DietTracker::new(self.contract_address, &self.provider);
        let timestamps = contract.getAllTimestamps().from(self.sender).call().await?;
        timestamps
            .into_iter()
            .map(|t| to_u64(t, "timestamp"))
            .collect()
    }

    async fn confidential_protocol_id(&self) -> Result<U256> {
        let contract = DietTracker::new(self.contract_address, &self.provider);
        let id = contract.confidentialProtocolId().call().await?;
        Ok(id)
    }
}

#[async_trait]
impl DietTrackerWrite for DietTrackerContract<ReadWrite> {
    async fn submit_daily_data(
        &self,
        enc_calories_in: B256,
        enc_calories_out: B256,
        input_proof: Bytes,
    ) -> Result<TxHash> {
        let _guard = NONCE_LOCK.lock().await;
        let nonce = next_pending_nonce(&*self.provider, self.sender).await?;

        let contract = DietTracker::new(self.contract_address, &self.provider);
        let builder = contract
            .submitDailyData(enc_calories_in, enc_calories_out, input_proof)
            .nonce(nonce);
        let receipt = builder.send().await?.get_receipt().await?;
        if !receipt.status() {
            return Err(eyre!(
                "submitDailyData reverted in {}",
                receipt.transaction_hash
            ));
        }
        info!("Daily data submitted in {}", receipt.transaction_hash);
        Ok(receipt.transaction_hash)
    }

    async fn calculate_average_balance(&self, num_records: u64) -> Result<B256> {
        let num_records = U256::from(num_records);
        {
            let _guard = NONCE_LOCK.lock().await;
            let nonce = next_pending_nonce(&*self.provider, self.sender).await?;

            let contract = DietTracker::new(self.contract_address, &self.provider);
            let builder = contract.calculateAverageBalance(num_records).nonce(nonce);
            let receipt = builder.send().await?.get_receipt().await?;
            if !receipt.status() {
                return Err(eyre!(
                    "calculateAverageBalance reverted in {}",
                    receipt.transaction_hash
                ));
            }
        }
        // the handle is a pure function of the records, so a call after the transaction
        // returns the one the transaction granted access to
        let contract = DietTracker::new(self.contract_address, &self.provider);
        let handle = contract
            .calculateAverageBalance(num_records)
            .from(self.sender)
            .call()
            .await?;
        Ok(handle)
    }
}
