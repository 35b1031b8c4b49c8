// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Ciphertext handle layout.
//!
//! A handle is 32 bytes: `[0..21)` hash prefix, `[21]` index of the value inside its input
//! (0xff for computed values), `[22..30)` big-endian chain id, `[30]` FHE type, `[31]` handle
//! version.

use crate::FhevmError;
use alloy::primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const HANDLE_VERSION: u8 = 0;
pub const COMPUTED_HANDLE_INDEX: u8 = 0xff;

const HASH_PREFIX_LEN: usize = 21;
const INDEX_BYTE: usize = 21;
const CHAIN_ID_RANGE: std::ops::Range<usize> = 22..30;
const TYPE_BYTE: usize = 30;
const VERSION_BYTE: usize = 31;

const RAW_CIPHERTEXT_DOMAIN: &[u8] = b"ZK-w_rct";
const HANDLE_DOMAIN: &[u8] = b"ZK-w_hdl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FheType {
    Bool = 0,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    Uint128 = 6,
    Address = 7,
    Uint256 = 8,
}

impl FheType {
    /// Bits the type consumes from an input's budget
    pub fn bit_width(&self) -> u32 {
        match self {
            FheType::Bool => 2,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
            FheType::Address => 160,
            FheType::Uint256 => 256,
        }
    }

    /// Largest clear value the type can hold
    pub fn max_value(&self) -> U256 {
        match self {
            FheType::Bool => U256::from(1),
            t => U256::MAX >> (256 - t.bit_width() as usize),
        }
    }
}

impl TryFrom<u8> for FheType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => FheType::Bool,
            2 => FheType::Uint8,
            3 => FheType::Uint16,
            4 => FheType::Uint32,
            5 => FheType::Uint64,
            6 => FheType::Uint128,
            7 => FheType::Address,
            8 => FheType::Uint256,
            other => return Err(format!("unknown fhe type {other}")),
        })
    }
}

impl fmt::Display for FheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FheType::Bool => "ebool",
            FheType::Uint8 => "euint8",
            FheType::Uint16 => "euint16",
            FheType::Uint32 => "euint32",
            FheType::Uint64 => "euint64",
            FheType::Uint128 => "euint128",
            FheType::Address => "eaddress",
            FheType::Uint256 => "euint256",
        };
        write!(f, "{name}")
    }
}

/// Decoded view over a handle's metadata bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleInfo {
    pub index: Option<u8>,
    pub chain_id: u64,
    pub fhe_type: FheType,
    pub version: u8,
}

impl HandleInfo {
    pub fn parse(handle: &B256) -> Result<Self, FhevmError> {
        let bytes = handle.as_slice();
        let fhe_type = FheType::try_from(bytes[TYPE_BYTE])
            .map_err(|e| FhevmError::InvalidHandle(*handle, e))?;
        let mut chain_id = [0u8; 8];
        chain_id.copy_from_slice(&bytes[CHAIN_ID_RANGE]);
        let index = match bytes[INDEX_BYTE] {
            COMPUTED_HANDLE_INDEX => None,
            i => Some(i),
        };
        Ok(Self {
            index,
            chain_id: u64::from_be_bytes(chain_id),
            fhe_type,
            version: bytes[VERSION_BYTE],
        })
    }
}

/// The all-zero handle a contract returns for a value that was never set
pub fn is_zero_handle(handle: &B256) -> bool {
    handle.is_zero()
}

fn stamp(hash: B256, index: u8, chain_id: u64, fhe_type: FheType) -> B256 {
    let mut out = [0u8; 32];
    out[..HASH_PREFIX_LEN].copy_from_slice(&hash[..HASH_PREFIX_LEN]);
    out[INDEX_BYTE] = index;
    out[CHAIN_ID_RANGE].copy_from_slice(&chain_id.to_be_bytes());
    out[TYPE_BYTE] = fhe_type as u8;
    out[VERSION_BYTE] = HANDLE_VERSION;
    B256::from(out)
}

/// Handles for each value packed in an input ciphertext
pub fn compute_input_handles(
    ciphertext: &[u8],
    types: &[FheType],
    acl: Address,
    chain_id: u64,
) -> Vec<B256> {
    let blob_hash = keccak256([RAW_CIPHERTEXT_DOMAIN, ciphertext].concat());
    let chain_word = U256::from(chain_id).to_be_bytes::<32>();
    types
        .iter()
        .enumerate()
        .map(|(i, fhe_type)| {
            let index = i as u8;
            let parts: [&[u8]; 5] = [
                HANDLE_DOMAIN,
                blob_hash.as_slice(),
                &[index],
                acl.as_slice(),
                &chain_word,
            ];
            let hash = keccak256(parts.concat());
            stamp(hash, index, chain_id, *fhe_type)
        })
        .collect()
}

/// Handle of a value computed on chain from `preimage`
pub fn compute_result_handle(preimage: &[u8], fhe_type: FheType, chain_id: u64) -> B256 {
    stamp(keccak256(preimage), COMPUTED_HANDLE_INDEX, chain_id, fhe_type)
}
