// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    EncryptedInputs, EphemeralSecret, Eip712Payload, FhevmError, HandleContractPair, KeyPair,
    UserDecryptResults,
};
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;

/// Everything a user decryption needs, borrowed from the caller's signature record
#[derive(Debug, Clone, Copy)]
pub struct UserDecryptRequest<'a> {
    pub pairs: &'a [HandleContractPair],
    pub private_key: &'a EphemeralSecret,
    pub public_key: &'a Bytes,
    pub signature: &'a Bytes,
    pub contract_addresses: &'a [Address],
    pub user_address: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

/// Builder for one encrypted input bound to a (contract, user) pair
#[async_trait]
pub trait EncryptedInput: Send {
    fn add_bool(&mut self, value: bool) -> Result<(), FhevmError>;
    fn add32(&mut self, value: u32) -> Result<(), FhevmError>;
    fn add64(&mut self, value: u64) -> Result<(), FhevmError>;
    /// Encrypt the queued values. The builder is drained.
    async fn encrypt(&mut self) -> Result<EncryptedInputs, FhevmError>;
}

/// An encryption client bound to one chain and one network public key
#[async_trait]
pub trait FhevmInstance: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Identifier of the network public key; signatures are only reusable under the same id
    fn public_key_id(&self) -> &str;

    fn generate_keypair(&self) -> Result<KeyPair, FhevmError>;

    fn create_eip712(
        &self,
        public_key: &Bytes,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<Eip712Payload, FhevmError>;

    fn create_encrypted_input(&self, contract: Address, user: Address) -> Box<dyn EncryptedInput>;

    async fn user_decrypt(
        &self,
        request: UserDecryptRequest<'_>,
    ) -> Result<UserDecryptResults, FhevmError>;
}
