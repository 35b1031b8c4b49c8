// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::Address;
use fdt_config::ChainConfig;

/// Protocol addresses an instance is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    pub chain_id: u64,
    pub acl: Address,
    pub kms_verifier: Address,
    pub input_verifier: Address,
    pub verifying_contract_decryption: Address,
    pub verifying_contract_input_verification: Address,
    pub gateway_chain_id: u64,
}

impl From<&ChainConfig> for ChainParams {
    fn from(chain: &ChainConfig) -> Self {
        Self {
            chain_id: chain.chain_id,
            acl: chain.fhevm.acl,
            kms_verifier: chain.fhevm.kms_verifier,
            input_verifier: chain.fhevm.input_verifier,
            verifying_contract_decryption: chain.fhevm.verifying_contract_decryption,
            verifying_contract_input_verification: chain
                .fhevm
                .verifying_contract_input_verification,
            gateway_chain_id: chain.fhevm.gateway_chain_id,
        }
    }
}

impl ChainParams {
    /// Parameters of the local hardhat mock chain
    pub fn hardhat() -> Self {
        Self::from(&ChainConfig::hardhat())
    }
}
