// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{DietTrackerRead, DietTrackerWrite, EncryptedRecord};
use alloy::primitives::{keccak256, Address, Bytes, TxHash, B256, U256};
use async_trait::async_trait;
use eyre::{bail, eyre, Result};
use fdt_fhevm::MockCoprocessor;
use fdt_utils::Clock;
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::{debug, info};

#[derive(Default)]
struct Ledger {
    records: HashMap<Address, Vec<EncryptedRecord>>,
    transactions: u64,
}

/// DietTracker running in process on a mock chain's coprocessor.
///
/// Handles share one ledger; [`connect`](Self::connect) gives another account its own view of
/// it, the way connecting a contract instance to a different signer does.
#[derive(Clone)]
pub struct MockDietTracker {
    address: Address,
    sender: Address,
    coprocessor: Arc<MockCoprocessor>,
    clock: Arc<dyn Clock>,
    ledger: Arc<RwLock<Ledger>>,
    protocol_id: U256,
}

impl MockDietTracker {
    pub fn new(
        address: Address,
        coprocessor: Arc<MockCoprocessor>,
        clock: Arc<dyn Clock>,
        sender: Address,
    ) -> Self {
        info!(
            "Mock DietTracker at {} on chain {}",
            address,
            coprocessor.chain().chain_id
        );
        Self {
            address,
            sender,
            coprocessor,
            clock,
            ledger: Arc::new(RwLock::new(Ledger::default())),
            protocol_id: U256::from(1),
        }
    }

    pub fn with_protocol_id(mut self, protocol_id: U256) -> Self {
        self.protocol_id = protocol_id;
        self
    }

    /// Same deployment, acting as `sender`
    pub fn connect(&self, sender: Address) -> Self {
        Self {
            sender,
            ..self.clone()
        }
    }

    pub fn coprocessor(&self) -> &Arc<MockCoprocessor> {
        &self.coprocessor
    }

    fn records(&self) -> Vec<EncryptedRecord> {
        self.ledger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .get(&self.sender)
            .cloned()
            .unwrap_or_default()
    }

    fn next_tx_hash(&self) -> TxHash {
        let mut ledger = self.ledger.write().unwrap_or_else(PoisonError::into_inner);
        ledger.transactions += 1;
        keccak256(
            [
                self.sender.as_slice(),
                &ledger.transactions.to_be_bytes()[..],
            ]
            .concat(),
        )
    }

    fn allow_both(&self, handle: B256) -> Result<()> {
        self.coprocessor.allow(handle, self.address)?;
        self.coprocessor.allow(handle, self.sender)?;
        Ok(())
    }
}

#[async_trait]
impl DietTrackerRead for MockDietTracker {
    fn address(&self) -> Address {
        self.address
    }

    fn sender(&self) -> Address {
        self.sender
    }

    /// An account without records reads the zero record
    async fn get_latest_record(&self) -> Result<EncryptedRecord> {
        Ok(self.records().last().copied().unwrap_or_default())
    }

    async fn get_record(&self, index: u64) -> Result<EncryptedRecord> {
        let records = self.records();
        usize::try_from(index)
            .ok()
            .and_then(|i| records.get(i).copied())
            .ok_or_else(|| eyre!("Record index {index} out of bounds ({})", records.len()))
    }

    async fn get_record_count(&self) -> Result<u64> {
        Ok(self.records().len() as u64)
    }

    async fn get_all_timestamps(&self) -> Result<Vec<u64>> {
        Ok(self.records().iter().map(|r| r.timestamp).collect())
    }

    async fn confidential_protocol_id(&self) -> Result<U256> {
        Ok(self.protocol_id)
    }
}

#[async_trait]
impl DietTrackerWrite for MockDietTracker {
    async fn submit_daily_data(
        &self,
        enc_calories_in: B256,
        enc_calories_out: B256,
        input_proof: Bytes,
    ) -> Result<TxHash> {
        let calories_in =
            self.coprocessor
                .verify_input(enc_calories_in, self.sender, self.address, &input_proof)?;
        let calories_out =
            self.coprocessor
                .verify_input(enc_calories_out, self.sender, self.address, &input_proof)?;
        let balance = self.coprocessor.sub(calories_in, calories_out)?;
        for handle in [calories_in, calories_out, balance] {
            self.allow_both(handle)?;
        }

        let record = EncryptedRecord {
            calories_in,
            calories_out,
            balance,
            timestamp: self.clock.now(),
        };
        self.ledger
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .entry(self.sender)
            .or_default()
            .push(record);

        let tx_hash = self.next_tx_hash();
        debug!("submitDailyData from {} in {}", self.sender, tx_hash);
        Ok(tx_hash)
    }

    /// Averages over the last `min(num_records, count)` records
    async fn calculate_average_balance(&self, num_records: u64) -> Result<B256> {
        let records = self.records();
        if num_records == 0 {
            bail!("calculateAverageBalance reverted: numRecords must be positive");
        }
        if records.is_empty() {
            bail!("calculateAverageBalance reverted: no records");
        }
        let count = records.len().min(num_records as usize);
        let mut window = records[records.len() - count..].iter();
        let first = window
            .next()
            .map(|r| r.balance)
            .ok_or_else(|| eyre!("empty averaging window"))?;
        let sum = window.try_fold(first, |acc, r| self.coprocessor.add(acc, r.balance))?;
        let average = self.coprocessor.div_scalar(sum, U256::from(count))?;
        self.allow_both(average)?;
        self.next_tx_hash();
        Ok(average)
    }
}
