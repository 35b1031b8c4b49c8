// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A contract reference in configuration. Either a bare address or an address with the block it
/// was deployed at.
#[derive(Debug, Clone, Hash, Eq, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Contract {
    Full {
        address: String,
        deploy_block: Option<u64>,
    },
    AddressOnly(String),
}

impl Contract {
    pub fn address_str(&self) -> &str {
        use Contract::*;
        match self {
            Full { address, .. } => address,
            AddressOnly(v) => v,
        }
    }

    pub fn address(&self) -> Result<Address> {
        self.address_str()
            .parse()
            .with_context(|| format!("Invalid contract address '{}'", self.address_str()))
    }

    pub fn deploy_block(&self) -> Option<u64> {
        match self {
            Contract::Full { deploy_block, .. } => *deploy_block,
            Contract::AddressOnly(_) => None,
        }
    }
}

/// Application contracts deployed on a chain
#[derive(Debug, Clone, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContractAddresses {
    pub diet_tracker: Contract,
}

/// Addresses of the FHEVM host and gateway contracts a chain's encryption instance is bound to
#[derive(Debug, Clone, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub struct FhevmAddresses {
    pub acl: Address,
    pub kms_verifier: Address,
    pub input_verifier: Address,
    /// Verifying contract of the EIP-712 domain used for user decryption
    pub verifying_contract_decryption: Address,
    /// Verifying contract of the EIP-712 domain used for input verification
    pub verifying_contract_input_verification: Address,
    /// Chain id of the gateway chain the EIP-712 domains are bound to
    pub gateway_chain_id: u64,
}
