// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{DecryptionSignature, MismatchReason, Result, SessionError};
use fdt_fhevm::{FhevmInstance, HandleContractPair, UserDecryptRequest, UserDecryptResults};
use fdt_utils::Clock;
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info};

/// Sends a set of (handle, contract) pairs to the instance as a single user decryption
pub struct DecryptBatcher {
    clock: Arc<dyn Clock>,
}

impl DecryptBatcher {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Decrypt every pair under `signature`.
    ///
    /// The result holds exactly one entry per distinct requested handle.
    pub async fn decrypt(
        &self,
        pairs: &[HandleContractPair],
        signature: &DecryptionSignature,
        instance: &dyn FhevmInstance,
    ) -> Result<UserDecryptResults> {
        if pairs.is_empty() {
            return Ok(UserDecryptResults::new());
        }

        let mut seen = HashSet::new();
        let pairs: Vec<HandleContractPair> = pairs
            .iter()
            .filter(|p| seen.insert((p.handle, p.contract_address)))
            .copied()
            .collect();

        if let Some(pair) = pairs.iter().find(|p| !signature.covers(&[p.contract_address])) {
            return Err(SessionError::AuthorizationMismatch(
                MismatchReason::ContractNotAuthorized(pair.contract_address),
            ));
        }
        let now = self.clock.now();
        if !signature.is_valid_at(now) {
            return Err(SessionError::AuthorizationMismatch(
                MismatchReason::OutsideValidityWindow {
                    now,
                    start: signature.start_timestamp(),
                    end: signature.expires_at(),
                },
            ));
        }

        info!("Decrypting {} handle(s) in one request", pairs.len());
        let mut response = instance
            .user_decrypt(UserDecryptRequest {
                pairs: &pairs,
                private_key: signature.private_key(),
                public_key: signature.public_key(),
                signature: signature.signature(),
                contract_addresses: signature.contract_addresses(),
                user_address: signature.user_address(),
                start_timestamp: signature.start_timestamp(),
                duration_days: signature.duration_days(),
            })
            .await
            .map_err(SessionError::DecryptFailed)?;

        let mut results = UserDecryptResults::with_capacity(pairs.len());
        for pair in &pairs {
            if results.contains_key(&pair.handle) {
                continue;
            }
            let value = response
                .remove(&pair.handle)
                .ok_or(SessionError::ResponseShape {
                    missing: pair.handle,
                })?;
            results.insert(pair.handle, value);
        }
        if !response.is_empty() {
            debug!("Dropping {} unrequested value(s)", response.len());
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Address, Bytes, B256, U256};
    use async_trait::async_trait;
    use fdt_fhevm::{
        ChainParams, ClearValue, Eip712Payload, EncryptedInput, EphemeralSecret, FhevmError,
        KeyPair, UserDecryptMessage,
    };
    use fdt_utils::ManualClock;
    use std::sync::Mutex;

    const A: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const B: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
    const USER: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    const START: u64 = 1_700_000_000;

    /// Answers every decryption with a canned response and records what it was asked
    struct CannedInstance {
        response: UserDecryptResults,
        calls: Mutex<Vec<Vec<HandleContractPair>>>,
    }

    impl CannedInstance {
        fn new(entries: &[(B256, u64)]) -> Self {
            Self {
                response: entries
                    .iter()
                    .map(|(h, v)| (*h, ClearValue::Uint(U256::from(*v))))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<HandleContractPair>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FhevmInstance for CannedInstance {
        fn chain_id(&self) -> u64 {
            31337
        }

        fn public_key_id(&self) -> &str {
            "canned"
        }

        fn generate_keypair(&self) -> Result<KeyPair, FhevmError> {
            Ok(KeyPair {
                public_key: Bytes::from(vec![2u8; 32]),
                private_key: EphemeralSecret::new(vec![3u8; 32]),
            })
        }

        fn create_eip712(
            &self,
            public_key: &Bytes,
            contract_addresses: &[Address],
            start_timestamp: u64,
            duration_days: u64,
        ) -> Result<Eip712Payload, FhevmError> {
            let chain = ChainParams::hardhat();
            Eip712Payload::new(
                chain.gateway_chain_id,
                chain.verifying_contract_decryption,
                UserDecryptMessage {
                    public_key: public_key.clone(),
                    contract_addresses: contract_addresses.to_vec(),
                    start_timestamp,
                    duration_days,
                    extra_data: Bytes::from(vec![0]),
                },
            )
        }

        fn create_encrypted_input(&self, _: Address, _: Address) -> Box<dyn EncryptedInput> {
            unimplemented!("not used by the batcher")
        }

        async fn user_decrypt(
            &self,
            request: UserDecryptRequest<'_>,
        ) -> Result<UserDecryptResults, FhevmError> {
            self.calls.lock().unwrap().push(request.pairs.to_vec());
            Ok(self.response.clone())
        }
    }

    fn signature(instance: &CannedInstance, contracts: &[Address]) -> DecryptionSignature {
        let keypair = instance.generate_keypair().unwrap();
        let payload = instance
            .create_eip712(&keypair.public_key, contracts, START, 1)
            .unwrap();
        DecryptionSignature::new(keypair, Bytes::from(vec![0u8; 65]), USER, payload)
    }

    fn handle(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    #[tokio::test]
    async fn test_one_call_per_batch() -> Result<()> {
        let instance = CannedInstance::new(&[(handle(1), 10), (handle(2), 20), (handle(9), 90)]);
        let sig = signature(&instance, &[A, B]);
        let batcher = DecryptBatcher::new(Arc::new(ManualClock::new(START)));

        let pairs = [
            HandleContractPair::new(handle(1), A),
            HandleContractPair::new(handle(2), B),
            HandleContractPair::new(handle(1), A),
        ];
        let results = batcher.decrypt(&pairs, &sig, &instance).await?;

        assert_eq!(instance.calls().len(), 1);
        assert_eq!(instance.calls()[0].len(), 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[&handle(1)], ClearValue::Uint(U256::from(10)));
        assert!(!results.contains_key(&handle(9)));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_call() -> Result<()> {
        let instance = CannedInstance::new(&[]);
        let sig = signature(&instance, &[A]);
        let batcher = DecryptBatcher::new(Arc::new(ManualClock::new(START)));
        assert!(batcher.decrypt(&[], &sig, &instance).await?.is_empty());
        assert!(instance.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unauthorized_contract_fails_whole_batch() {
        let instance = CannedInstance::new(&[(handle(1), 1), (handle(2), 2)]);
        let sig = signature(&instance, &[A]);
        let batcher = DecryptBatcher::new(Arc::new(ManualClock::new(START)));
        let pairs = [
            HandleContractPair::new(handle(1), A),
            HandleContractPair::new(handle(2), B),
        ];
        let err = batcher.decrypt(&pairs, &sig, &instance).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::AuthorizationMismatch(MismatchReason::ContractNotAuthorized(c)) if c == B
        ));
        assert!(instance.calls().is_empty());
    }

    #[tokio::test]
    async fn test_expired_signature_is_rejected_before_the_call() {
        let instance = CannedInstance::new(&[(handle(1), 1)]);
        let sig = signature(&instance, &[A]);
        let clock = Arc::new(ManualClock::new(START));
        clock.advance_days(1);
        let batcher = DecryptBatcher::new(clock);
        let err = batcher
            .decrypt(&[HandleContractPair::new(handle(1), A)], &sig, &instance)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::AuthorizationMismatch(MismatchReason::OutsideValidityWindow { .. })
        ));
        assert!(instance.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_handle_is_a_shape_error() {
        let instance = CannedInstance::new(&[(handle(1), 1)]);
        let sig = signature(&instance, &[A]);
        let batcher = DecryptBatcher::new(Arc::new(ManualClock::new(START)));
        let pairs = [
            HandleContractPair::new(handle(1), A),
            HandleContractPair::new(handle(2), A),
        ];
        let err = batcher.decrypt(&pairs, &sig, &instance).await.unwrap_err();
        assert!(matches!(err, SessionError::ResponseShape { missing } if missing == handle(2)));
    }
}
