// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::{
    primitives::{Address, Bytes},
    signers::{local::PrivateKeySigner, Signer},
};
use async_trait::async_trait;
use fdt_fhevm::Eip712Payload;

/// The wallet boundary: something that can sign a decryption authorization for one address
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign the EIP-712 digest of `payload`, returning the 65 byte `r || s || v` signature
    async fn sign_typed_data(&self, payload: &Eip712Payload) -> anyhow::Result<Bytes>;
}

#[async_trait]
impl TypedDataSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_typed_data(&self, payload: &Eip712Payload) -> anyhow::Result<Bytes> {
        let signature = self.sign_hash(&payload.signing_hash()).await?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }
}
