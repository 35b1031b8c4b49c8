// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use super::MockCoprocessor;
use crate::{
    ChainParams, ClearValue, Eip712Payload, EncryptedInput, EncryptedInputs, EphemeralSecret,
    FhevmError, FhevmInstance, InputValues, KeyPair, UserDecryptMessage, UserDecryptRequest,
    UserDecryptResults, MAX_USER_DECRYPT_DURATION_DAYS,
};
use alloy::primitives::{keccak256, Address, Bytes, Signature};
use async_trait::async_trait;
use fdt_utils::{Clock, SECONDS_PER_DAY};
use rand::{rngs::OsRng, RngCore};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tracing::{debug, info};

const MOCK_PUBLIC_KEY_DOMAIN: &[u8] = b"fdt-mock-user-decrypt-key";

fn mock_public_key(secret: &[u8]) -> Bytes {
    Bytes::from(keccak256([MOCK_PUBLIC_KEY_DOMAIN, secret].concat()).to_vec())
}

/// Instance for a local mock chain. Decryption returns values straight from the coprocessor,
/// after enforcing every check the gateway and KMS would.
pub struct MockInstance {
    chain: ChainParams,
    public_key_id: String,
    coprocessor: Arc<MockCoprocessor>,
    clock: Arc<dyn Clock>,
    decrypt_calls: AtomicUsize,
}

impl MockInstance {
    pub fn new(coprocessor: Arc<MockCoprocessor>, clock: Arc<dyn Clock>) -> Self {
        let chain = coprocessor.chain().clone();
        info!("Creating mock FHEVM instance for chain {}", chain.chain_id);
        Self {
            public_key_id: format!("mock-{}", chain.chain_id),
            chain,
            coprocessor,
            clock,
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    pub fn coprocessor(&self) -> &Arc<MockCoprocessor> {
        &self.coprocessor
    }

    /// Number of `user_decrypt` round trips served so far
    pub fn user_decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn check_window(&self, start: u64, days: u64) -> Result<(), FhevmError> {
        if days == 0 || days > MAX_USER_DECRYPT_DURATION_DAYS {
            return Err(FhevmError::InvalidDuration(days));
        }
        let now = self.clock.now();
        let end = start.saturating_add(days * SECONDS_PER_DAY);
        if now < start || now >= end {
            return Err(FhevmError::RequestExpired);
        }
        Ok(())
    }

    fn check_signature(&self, request: &UserDecryptRequest<'_>) -> Result<(), FhevmError> {
        let payload = self.create_eip712(
            request.public_key,
            request.contract_addresses,
            request.start_timestamp,
            request.duration_days,
        )?;
        let signature = Signature::try_from(&request.signature[..])
            .map_err(|e| FhevmError::InvalidSignature(e.to_string()))?;
        let recovered = signature
            .recover_address_from_prehash(&payload.signing_hash())
            .map_err(|e| FhevmError::InvalidSignature(e.to_string()))?;
        if recovered != request.user_address {
            return Err(FhevmError::SignerMismatch {
                recovered,
                user: request.user_address,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FhevmInstance for MockInstance {
    fn chain_id(&self) -> u64 {
        self.chain.chain_id
    }

    fn public_key_id(&self) -> &str {
        &self.public_key_id
    }

    fn generate_keypair(&self) -> Result<KeyPair, FhevmError> {
        let mut secret = vec![0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Ok(KeyPair {
            public_key: mock_public_key(&secret),
            private_key: EphemeralSecret::new(secret),
        })
    }

    fn create_eip712(
        &self,
        public_key: &Bytes,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<Eip712Payload, FhevmError> {
        Eip712Payload::new(
            self.chain.gateway_chain_id,
            self.chain.verifying_contract_decryption,
            UserDecryptMessage {
                public_key: public_key.clone(),
                contract_addresses: contract_addresses.to_vec(),
                start_timestamp,
                duration_days,
                extra_data: Bytes::from(vec![0]),
            },
        )
    }

    fn create_encrypted_input(&self, contract: Address, user: Address) -> Box<dyn EncryptedInput> {
        Box::new(MockEncryptedInput {
            coprocessor: self.coprocessor.clone(),
            contract,
            user,
            values: InputValues::new(),
        })
    }

    async fn user_decrypt(
        &self,
        request: UserDecryptRequest<'_>,
    ) -> Result<UserDecryptResults, FhevmError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.check_window(request.start_timestamp, request.duration_days)?;
        if mock_public_key(request.private_key.expose()) != *request.public_key {
            return Err(FhevmError::KeypairMismatch);
        }
        self.check_signature(&request)?;

        let mut results = UserDecryptResults::with_capacity(request.pairs.len());
        for pair in request.pairs {
            if !request.contract_addresses.contains(&pair.contract_address) {
                return Err(FhevmError::ContractNotSigned(pair.contract_address));
            }
            for account in [&request.user_address, &pair.contract_address] {
                if !self.coprocessor.is_allowed(&pair.handle, account) {
                    return Err(FhevmError::NotAllowed {
                        handle: pair.handle,
                        account: *account,
                    });
                }
            }
            let clear = self
                .coprocessor
                .plaintext(&pair.handle)
                .ok_or(FhevmError::UnknownHandle(pair.handle))?;
            results.insert(pair.handle, ClearValue::from(clear));
        }
        debug!("mock user decrypt served {} handle(s)", results.len());
        Ok(results)
    }
}

struct MockEncryptedInput {
    coprocessor: Arc<MockCoprocessor>,
    contract: Address,
    user: Address,
    values: InputValues,
}

#[async_trait]
impl EncryptedInput for MockEncryptedInput {
    fn add_bool(&mut self, value: bool) -> Result<(), FhevmError> {
        self.values.add_bool(value)
    }

    fn add32(&mut self, value: u32) -> Result<(), FhevmError> {
        self.values.add32(value)
    }

    fn add64(&mut self, value: u64) -> Result<(), FhevmError> {
        self.values.add64(value)
    }

    async fn encrypt(&mut self) -> Result<EncryptedInputs, FhevmError> {
        let values = std::mem::take(&mut self.values);
        self.coprocessor
            .encrypt_input(self.contract, self.user, &values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HandleContractPair, TypedClear};
    use alloy::{
        primitives::{address, U256},
        signers::{local::PrivateKeySigner, SignerSync},
    };
    use fdt_utils::ManualClock;

    const CONTRACT: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const NOW: u64 = 1_700_000_000;

    struct Fixture {
        instance: MockInstance,
        clock: Arc<ManualClock>,
        wallet: PrivateKeySigner,
        keypair: KeyPair,
        signature: Bytes,
        handle: alloy::primitives::B256,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(NOW));
        let cop = Arc::new(MockCoprocessor::new(ChainParams::hardhat()));
        let instance = MockInstance::new(cop.clone(), clock.clone());
        let wallet = PrivateKeySigner::random();

        let handle = cop.trivial_encrypt(TypedClear::u32(1500));
        cop.allow(handle, CONTRACT).unwrap();
        cop.allow(handle, wallet.address()).unwrap();

        let keypair = instance.generate_keypair().unwrap();
        let payload = instance
            .create_eip712(&keypair.public_key, &[CONTRACT], NOW, 365)
            .unwrap();
        let signature = wallet.sign_hash_sync(&payload.signing_hash()).unwrap();
        Fixture {
            instance,
            clock,
            signature: Bytes::from(signature.as_bytes().to_vec()),
            wallet,
            keypair,
            handle,
        }
    }

    fn request<'a>(f: &'a Fixture, pairs: &'a [HandleContractPair]) -> UserDecryptRequest<'a> {
        UserDecryptRequest {
            pairs,
            private_key: &f.keypair.private_key,
            public_key: &f.keypair.public_key,
            signature: &f.signature,
            contract_addresses: std::slice::from_ref(&CONTRACT),
            user_address: f.wallet.address(),
            start_timestamp: NOW,
            duration_days: 365,
        }
    }

    #[tokio::test]
    async fn test_authorized_decrypt() {
        let f = fixture();
        let pairs = [HandleContractPair::new(f.handle, CONTRACT)];
        let results = f.instance.user_decrypt(request(&f, &pairs)).await.unwrap();
        assert_eq!(results[&f.handle], ClearValue::Uint(U256::from(1500)));
        assert_eq!(f.instance.user_decrypt_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejects_other_user() {
        let f = fixture();
        let pairs = [HandleContractPair::new(f.handle, CONTRACT)];
        let mut req = request(&f, &pairs);
        req.user_address = address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");
        assert!(matches!(
            f.instance.user_decrypt(req).await,
            Err(FhevmError::SignerMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_expired_window() {
        let f = fixture();
        f.clock.advance_days(365);
        let pairs = [HandleContractPair::new(f.handle, CONTRACT)];
        assert!(matches!(
            f.instance.user_decrypt(request(&f, &pairs)).await,
            Err(FhevmError::RequestExpired)
        ));
    }

    #[tokio::test]
    async fn test_rejects_unsigned_contract_and_foreign_key() {
        let f = fixture();
        let other = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
        let pairs = [HandleContractPair::new(f.handle, other)];
        assert!(matches!(
            f.instance.user_decrypt(request(&f, &pairs)).await,
            Err(FhevmError::ContractNotSigned(_))
        ));

        let pairs = [HandleContractPair::new(f.handle, CONTRACT)];
        let foreign = f.instance.generate_keypair().unwrap();
        let mut req = request(&f, &pairs);
        req.private_key = &foreign.private_key;
        assert!(matches!(
            f.instance.user_decrypt(req).await,
            Err(FhevmError::KeypairMismatch)
        ));
    }

    #[tokio::test]
    async fn test_requires_acl_for_user() {
        let f = fixture();
        let private = f.instance.coprocessor().trivial_encrypt(TypedClear::u32(9));
        f.instance.coprocessor().allow(private, CONTRACT).unwrap();
        let pairs = [HandleContractPair::new(private, CONTRACT)];
        assert!(matches!(
            f.instance.user_decrypt(request(&f, &pairs)).await,
            Err(FhevmError::NotAllowed { .. })
        ));
    }

    #[tokio::test]
    async fn test_encrypted_input_round_trip() {
        let f = fixture();
        let user = f.wallet.address();
        let mut input = f.instance.create_encrypted_input(CONTRACT, user);
        input.add32(2000).unwrap();
        let enc = input.encrypt().await.unwrap();
        let cop = f.instance.coprocessor();
        let handle = cop
            .verify_input(enc.handles[0], user, CONTRACT, &enc.input_proof)
            .unwrap();
        cop.allow(handle, user).unwrap();

        let pairs = [HandleContractPair::new(handle, CONTRACT)];
        let results = f.instance.user_decrypt(request(&f, &pairs)).await.unwrap();
        assert_eq!(results[&handle], ClearValue::Uint(U256::from(2000)));

        assert!(matches!(input.encrypt().await, Err(FhevmError::EmptyInput)));
    }
}
