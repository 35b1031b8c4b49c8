// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Relayer HTTP wire types

use crate::{FhevmError, HandleContractPair};
use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

pub const KEYURL_PATH: &str = "v1/keyurl";
pub const INPUT_PROOF_PATH: &str = "v1/input-proof";
pub const USER_DECRYPT_PATH: &str = "v1/user-decrypt";

/// Every relayer response wraps its body in `{"response": ...}`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

#[derive(Debug, Deserialize)]
pub struct KeyUrlResponse {
    pub fhe_key_info: Vec<FheKeyInfo>,
    pub crs: std::collections::HashMap<String, KeyLocation>,
}

#[derive(Debug, Deserialize)]
pub struct FheKeyInfo {
    pub fhe_public_key: KeyLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyLocation {
    pub data_id: String,
    pub urls: Vec<String>,
}

pub const CRS_BITS: &str = "2048";

impl KeyUrlResponse {
    /// Location of the public key and of the 2048 bit CRS
    pub fn locations(&self) -> Result<(KeyLocation, KeyLocation), FhevmError> {
        let key = self
            .fhe_key_info
            .first()
            .map(|info| info.fhe_public_key.clone())
            .ok_or_else(|| FhevmError::MalformedResponse("no fhe_key_info".to_string()))?;
        let crs = self
            .crs
            .get(CRS_BITS)
            .cloned()
            .ok_or_else(|| FhevmError::MalformedResponse(format!("no {CRS_BITS} bit crs")))?;
        for loc in [&key, &crs] {
            if loc.urls.is_empty() {
                return Err(FhevmError::MalformedResponse(format!(
                    "{} has no download url",
                    loc.data_id
                )));
            }
        }
        Ok((key, crs))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputProofRequest {
    pub contract_address: Address,
    pub user_address: Address,
    pub ciphertext_with_input_verification: String,
    pub contract_chain_id: String,
    pub extra_data: String,
}

#[derive(Debug, Deserialize)]
pub struct InputProofResponse {
    pub handles: Vec<String>,
    pub signatures: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestValidity {
    pub start_timestamp: String,
    pub duration_days: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDecryptBody {
    pub handle_contract_pairs: Vec<HandleContractPair>,
    pub request_validity: RequestValidity,
    pub contracts_chain_id: String,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    pub signature: String,
    pub public_key: String,
    pub extra_data: String,
}

#[derive(Debug, Deserialize)]
pub struct SharePayload {
    pub payload: String,
    pub signature: String,
}

pub(crate) fn decode_hex(value: &str) -> Result<Vec<u8>, FhevmError> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| FhevmError::MalformedResponse(format!("bad hex '{value}': {e}")))
}

pub(crate) fn decode_handle(value: &str) -> Result<B256, FhevmError> {
    let bytes = decode_hex(value)?;
    if bytes.len() != 32 {
        return Err(FhevmError::MalformedResponse(format!(
            "handle of {} bytes",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

pub(crate) fn decode_bytes(value: &str) -> Result<Bytes, FhevmError> {
    decode_hex(value).map(Bytes::from)
}
