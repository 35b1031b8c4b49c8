// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{FheType, FhevmError};
use alloy::primitives::{Address, Bytes, B256, U256};
use fdt_utils::hexf;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::HashMap, fmt};
use zeroize::Zeroizing;

pub const MAX_INPUT_HANDLES: usize = 256;
pub const MAX_INPUT_BITS: u32 = 2048;
pub const MAX_USER_DECRYPT_DURATION_DAYS: u64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleContractPair {
    pub handle: B256,
    pub contract_address: Address,
}

impl HandleContractPair {
    pub fn new(handle: B256, contract_address: Address) -> Self {
        Self {
            handle,
            contract_address,
        }
    }
}

/// A clear value together with the encrypted type it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedClear {
    pub fhe_type: FheType,
    pub value: U256,
}

impl TypedClear {
    pub fn new(fhe_type: FheType, value: U256) -> Self {
        Self { fhe_type, value }
    }

    pub fn u32(value: u32) -> Self {
        Self::new(FheType::Uint32, U256::from(value))
    }
}

impl From<TypedClear> for ClearValue {
    fn from(clear: TypedClear) -> Self {
        match clear.fhe_type {
            FheType::Bool => ClearValue::Bool(!clear.value.is_zero()),
            FheType::Address => ClearValue::Address(Address::from_word(clear.value.into())),
            _ => ClearValue::Uint(clear.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClearValue {
    Bool(bool),
    Uint(U256),
    Address(Address),
}

/// Both readings of a 32 bit clear value.
///
/// Encrypted arithmetic on `euint32` wraps, so a balance that went below zero arrives as a large
/// unsigned number. Which reading is meaningful is the caller's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Int32View {
    pub raw: u32,
    pub twos_complement: i32,
}

impl From<u32> for Int32View {
    fn from(raw: u32) -> Self {
        Self {
            raw,
            twos_complement: raw as i32,
        }
    }
}

impl ClearValue {
    pub fn as_u256(&self) -> Option<U256> {
        match self {
            ClearValue::Uint(v) => Some(*v),
            ClearValue::Bool(b) => Some(U256::from(*b as u8)),
            ClearValue::Address(_) => None,
        }
    }

    pub fn to_int32(&self) -> Result<Int32View, FhevmError> {
        let value = self
            .as_u256()
            .ok_or_else(|| FhevmError::TypeMismatch("address is not a number".to_string()))?;
        let raw: u32 = value
            .try_into()
            .map_err(|_| FhevmError::TypeMismatch(format!("{value} does not fit in 32 bits")))?;
        Ok(Int32View::from(raw))
    }
}

pub type UserDecryptResults = HashMap<B256, ClearValue>;

/// Handles and proof produced by encrypting an input for a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedInputs {
    pub handles: Vec<B256>,
    pub input_proof: Bytes,
}

/// Private half of an ephemeral decryption keypair
#[derive(Clone, PartialEq, Eq)]
pub struct EphemeralSecret(Zeroizing<Vec<u8>>);

impl EphemeralSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for EphemeralSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EphemeralSecret(<redacted>)")
    }
}

impl Serialize for EphemeralSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0.as_slice())))
    }
}

impl<'de> Deserialize<'de> for EphemeralSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(encoded.trim_start_matches("0x"))
            .map_err(serde::de::Error::custom)?;
        Ok(Self::new(bytes))
    }
}

#[derive(Clone)]
pub struct KeyPair {
    pub public_key: Bytes,
    pub private_key: EphemeralSecret,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &Hexf(&self.public_key))
            .field("private_key", &self.private_key)
            .finish()
    }
}

struct Hexf<'a>(&'a [u8]);

impl fmt::Debug for Hexf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        hexf(self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int32_view_reads_both_ways() {
        let view = ClearValue::Uint(U256::from(1500u32)).to_int32().unwrap();
        assert_eq!(view.raw, 1500);
        assert_eq!(view.twos_complement, 1500);

        let wrapped = 500u32.wrapping_sub(2000);
        let view = ClearValue::Uint(U256::from(wrapped)).to_int32().unwrap();
        assert_eq!(view.raw, 4294965796);
        assert_eq!(view.twos_complement, -1500);
    }

    #[test]
    fn test_int32_view_rejects_wide_values() {
        let too_big = ClearValue::Uint(U256::from(u64::MAX));
        assert!(too_big.to_int32().is_err());
    }

    #[test]
    fn test_secret_is_redacted() {
        let pair = KeyPair {
            public_key: Bytes::from(vec![0xab; 4]),
            private_key: EphemeralSecret::new(vec![0x11; 32]),
        };
        let debug = format!("{pair:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("1111"));
    }

    #[test]
    fn test_secret_serde_hex() {
        let secret = EphemeralSecret::new(vec![1, 2, 3]);
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"0x010203\"");
        let back: EphemeralSecret = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_typed_clear_conversion() {
        assert_eq!(
            ClearValue::from(TypedClear::new(FheType::Bool, U256::from(1))),
            ClearValue::Bool(true)
        );
        assert_eq!(
            ClearValue::from(TypedClear::u32(7)),
            ClearValue::Uint(U256::from(7))
        );
    }
}
