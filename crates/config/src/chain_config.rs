// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    contract::{Contract, ContractAddresses, FhevmAddresses},
    rpc::RpcEndpoint,
};
use alloy::primitives::{address, Address};
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tracing::error;

pub const HARDHAT_CHAIN_ID: u64 = 31337;

#[derive(Debug, Clone, PartialEq, Hash, Eq, Deserialize, Serialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// Chains marked `mock` run against an in-process coprocessor and never reach a relayer
    #[serde(default)]
    pub mock: bool,
    pub contracts: ContractAddresses,
    pub fhevm: FhevmAddresses,
    pub relayer_url: Option<String>,
}

impl ChainConfig {
    pub fn rpc(&self) -> Result<RpcEndpoint> {
        RpcEndpoint::from_url(&self.rpc_url)
            .map_err(|e| anyhow!("Failed to parse RPC URL for chain {}: {}", self.name, e))
    }

    pub fn diet_tracker_address(&self) -> Result<Address> {
        self.contracts.diet_tracker.address()
    }

    pub fn validate(&self) -> Result<()> {
        self.rpc()?;
        self.diet_tracker_address()?;
        if !self.mock && self.relayer_url.is_none() {
            error!(chain = %self.name, "network chain configured without relayer_url");
            bail!(
                "Chain '{}' ({}) is not a mock chain and needs a `relayer_url`",
                self.name,
                self.chain_id
            );
        }
        if let Some(relayer) = &self.relayer_url {
            url::Url::parse(relayer)
                .map_err(|e| anyhow!("Invalid relayer_url for chain {}: {}", self.name, e))?;
        }
        Ok(())
    }

    /// Local hardhat node with the mock coprocessor and the default first deployment address
    pub fn hardhat() -> Self {
        Self {
            name: "hardhat".to_string(),
            chain_id: HARDHAT_CHAIN_ID,
            rpc_url: "http://localhost:8545".to_string(),
            mock: true,
            contracts: ContractAddresses {
                diet_tracker: Contract::AddressOnly(
                    "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
                ),
            },
            fhevm: FhevmAddresses {
                acl: address!("0x50157CFfD6bBFA2DECe204a89ec419c23ef5755D"),
                kms_verifier: address!("0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC"),
                input_verifier: address!("0x901F8942346f7AB3a01F6D7613119Bca447Bb030"),
                verifying_contract_decryption: address!(
                    "0x5ffdaAB0373E62E2ea2944776209aEf29E631A64"
                ),
                verifying_contract_input_verification: address!(
                    "0x812b06e1CDCE800494b79fFE4f925A504a9A9810"
                ),
                gateway_chain_id: 55815,
            },
            relayer_url: None,
        }
    }
}
