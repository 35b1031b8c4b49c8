// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{EphemeralSecret, FhevmError, InputValues, KeyPair, TypedClear};
use alloy::primitives::{Address, Bytes, B256};

/// Network key material fetched from the relayer
#[derive(Clone)]
pub struct PublicParams {
    pub public_key_id: String,
    pub public_key: Bytes,
    pub crs_id: String,
    pub crs: Bytes,
}

impl std::fmt::Debug for PublicParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicParams")
            .field("public_key_id", &self.public_key_id)
            .field("public_key_len", &self.public_key.len())
            .field("crs_id", &self.crs_id)
            .field("crs_len", &self.crs.len())
            .finish()
    }
}

/// Who an input ciphertext is bound to; part of the statement its proof covers
#[derive(Debug, Clone, Copy)]
pub struct ProofContext {
    pub contract: Address,
    pub user: Address,
    pub acl: Address,
    pub chain_id: u64,
}

/// One KMS share of a user decryption, reencrypted under the user's ephemeral key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptShare {
    pub payload: Bytes,
    pub signature: Bytes,
}

/// The homomorphic primitives the relayer instance cannot do itself.
///
/// Implementations wrap a TFHE library: keypair generation for reencryption, compact encryption
/// with a proof of knowledge, and combining KMS shares into clear values.
pub trait FheCrypto: Send + Sync {
    fn generate_keypair(&self) -> Result<KeyPair, FhevmError>;

    fn encrypt_with_proof(
        &self,
        params: &PublicParams,
        values: &InputValues,
        context: &ProofContext,
    ) -> Result<Vec<u8>, FhevmError>;

    /// Combine shares into one clear value per handle, in handle order
    fn open_shares(
        &self,
        shares: &[DecryptShare],
        private_key: &EphemeralSecret,
        public_key: &Bytes,
        handles: &[B256],
    ) -> Result<Vec<TypedClear>, FhevmError>;
}
