// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{Result, SessionContext, TrackerError};
use alloy::primitives::{TxHash, B256};
use fdt_evm::{DietTrackerWrite, EncryptedRecord};
use fdt_fhevm::{is_zero_handle, FhevmInstance, HandleContractPair, Int32View};
use fdt_session::{
    DecryptBatcher, DecryptionSignature, LoadOptions, SignatureManager, TypedDataSigner,
};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::watch;
use tracing::{info, warn};

/// Clear view of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecryptedRecord {
    pub calories_in: u32,
    pub calories_out: u32,
    pub balance: Int32View,
    pub timestamp: u64,
}

/// What the client has read from the ledger so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub latest: Option<EncryptedRecord>,
    pub decrypted_latest: Option<DecryptedRecord>,
    pub average: Option<B256>,
    pub decrypted_average: Option<Int32View>,
}

/// The session services a tracker decrypts through
#[derive(Clone)]
pub struct DecryptServices {
    pub manager: Arc<SignatureManager>,
    pub batcher: Arc<DecryptBatcher>,
    pub options: LoadOptions,
}

pub struct DietTracker {
    ledger: Arc<dyn DietTrackerWrite>,
    instance: Arc<dyn FhevmInstance>,
    services: DecryptServices,
    signer: Arc<dyn TypedDataSigner>,
    context: watch::Receiver<SessionContext>,
    snapshot: Mutex<TrackerSnapshot>,
}

impl DietTracker {
    pub fn new(
        ledger: Arc<dyn DietTrackerWrite>,
        instance: Arc<dyn FhevmInstance>,
        services: DecryptServices,
        signer: Arc<dyn TypedDataSigner>,
        context: watch::Receiver<SessionContext>,
    ) -> Self {
        Self {
            ledger,
            instance,
            services,
            signer,
            context,
            snapshot: Mutex::new(TrackerSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.lock().clone()
    }

    pub fn contract(&self) -> alloy::primitives::Address {
        self.ledger.address()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerSnapshot> {
        match self.snapshot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn capture(&self) -> SessionContext {
        *self.context.borrow()
    }

    fn ensure_current(&self, started: &SessionContext, operation: &'static str) -> Result<()> {
        let current = self.capture();
        if current != *started {
            warn!(
                "Session changed during {}: {:?} -> {:?}",
                operation, started, current
            );
            return Err(TrackerError::Stale(operation));
        }
        Ok(())
    }

    /// Encrypt and submit one day's values, then refresh the latest record
    pub async fn submit(&self, calories_in: u32, calories_out: u32) -> Result<TxHash> {
        if calories_in == 0 {
            return Err(TrackerError::InvalidInput(
                "calories in must be positive".to_string(),
            ));
        }
        let started = self.capture();

        let mut input = self
            .instance
            .create_encrypted_input(self.ledger.address(), self.signer.address());
        input.add32(calories_in)?;
        input.add32(calories_out)?;
        let encrypted = input.encrypt().await?;
        let &[enc_in, enc_out] = &encrypted.handles[..] else {
            return Err(TrackerError::Fhevm(fdt_fhevm::FhevmError::MalformedResponse(
                format!("expected 2 input handles, got {}", encrypted.handles.len()),
            )));
        };

        self.ensure_current(&started, "submit")?;
        let tx_hash = self
            .ledger
            .submit_daily_data(enc_in, enc_out, encrypted.input_proof)
            .await?;
        info!("Submitted daily data in {}", tx_hash);

        // the transaction stands either way; only the local refresh is skipped
        if self.ensure_current(&started, "submit").is_ok() {
            self.refresh_latest_record().await?;
        }
        Ok(tx_hash)
    }

    /// Re-read the latest record. `None` when the account has not submitted anything.
    pub async fn refresh_latest_record(&self) -> Result<Option<EncryptedRecord>> {
        let started = self.capture();
        let record = self.ledger.get_latest_record().await?;
        self.ensure_current(&started, "refresh")?;

        let latest = (!record.is_empty()).then_some(record);
        let mut snapshot = self.lock();
        if snapshot.latest != latest {
            snapshot.decrypted_latest = None;
        }
        snapshot.latest = latest;
        Ok(latest)
    }

    async fn signature(&self) -> Result<DecryptionSignature> {
        let signature = self
            .services
            .manager
            .load_or_create(
                &*self.instance,
                &[self.ledger.address()],
                &*self.signer,
                self.signer.address(),
                self.services.options,
            )
            .await?;
        Ok(signature)
    }

    /// Decrypt `handles` in one request. Zero handles are uninitialized values and read as 0
    /// without a round trip.
    async fn decrypt_handles(&self, handles: &[B256]) -> Result<HashMap<B256, Int32View>> {
        let mut clear: HashMap<B256, Int32View> = HashMap::new();
        let contract = self.ledger.address();
        let pairs: Vec<HandleContractPair> = handles
            .iter()
            .filter(|h| !is_zero_handle(h))
            .map(|h| HandleContractPair::new(*h, contract))
            .collect();
        if !pairs.is_empty() {
            let signature = self.signature().await?;
            let results = self
                .services
                .batcher
                .decrypt(&pairs, &signature, &*self.instance)
                .await?;
            for (handle, value) in results {
                clear.insert(handle, value.to_int32()?);
            }
        }
        for handle in handles.iter().filter(|h| is_zero_handle(h)) {
            clear.insert(*handle, Int32View::from(0));
        }
        Ok(clear)
    }

    pub async fn decrypt_latest_record(&self) -> Result<DecryptedRecord> {
        let started = self.capture();
        let Some(record) = self.lock().latest else {
            return Err(TrackerError::NothingToDecrypt("no record loaded"));
        };

        let clear = self.decrypt_handles(&record.handles()).await?;
        self.ensure_current(&started, "decrypt")?;

        let value = |h: &B256| {
            clear.get(h).copied().ok_or_else(|| {
                TrackerError::Session(fdt_session::SessionError::ResponseShape { missing: *h })
            })
        };
        let decrypted = DecryptedRecord {
            calories_in: value(&record.calories_in)?.raw,
            calories_out: value(&record.calories_out)?.raw,
            balance: value(&record.balance)?,
            timestamp: record.timestamp,
        };

        let mut snapshot = self.lock();
        // a refresh that replaced the record meanwhile wins
        if snapshot.latest == Some(record) {
            snapshot.decrypted_latest = Some(decrypted);
        }
        Ok(decrypted)
    }

    /// Ask the contract for the encrypted average of the last `num_records` balances
    pub async fn calculate_average_balance(&self, num_records: u64) -> Result<B256> {
        if num_records == 0 {
            return Err(TrackerError::InvalidInput(
                "number of records must be positive".to_string(),
            ));
        }
        let started = self.capture();
        let handle = self.ledger.calculate_average_balance(num_records).await?;
        self.ensure_current(&started, "average")?;

        let mut snapshot = self.lock();
        snapshot.average = Some(handle);
        snapshot.decrypted_average = None;
        Ok(handle)
    }

    pub async fn decrypt_average_balance(&self) -> Result<Int32View> {
        let started = self.capture();
        let Some(handle) = self.lock().average else {
            return Err(TrackerError::NothingToDecrypt("no average computed"));
        };
        let clear = self.decrypt_handles(&[handle]).await?;
        self.ensure_current(&started, "decrypt")?;

        let average = clear.get(&handle).copied().ok_or(TrackerError::Session(
            fdt_session::SessionError::ResponseShape { missing: handle },
        ))?;
        let mut snapshot = self.lock();
        if snapshot.average == Some(handle) {
            snapshot.decrypted_average = Some(average);
        }
        Ok(average)
    }

    pub async fn record_count(&self) -> Result<u64> {
        Ok(self.ledger.get_record_count().await?)
    }

    pub async fn timestamps(&self) -> Result<Vec<u64>> {
        Ok(self.ledger.get_all_timestamps().await?)
    }

    /// Whether the contract answers as a DietTracker deployment
    pub async fn is_deployed(&self) -> bool {
        match self.ledger.confidential_protocol_id().await {
            Ok(id) => {
                info!("DietTracker at {} reports protocol {}", self.contract(), id);
                true
            }
            Err(e) => {
                warn!("DietTracker at {} is not reachable: {:#}", self.contract(), e);
                false
            }
        }
    }
}
