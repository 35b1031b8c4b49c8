// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{FheType, FhevmError, TypedClear, MAX_INPUT_BITS, MAX_INPUT_HANDLES};
use alloy::primitives::{Bytes, B256, U256};

const SIGNATURE_LEN: usize = 65;
const VALUE_LEN: usize = 33;

/// Values queued for one encrypted input, with the protocol's size limits enforced on every push
#[derive(Debug, Clone, Default)]
pub struct InputValues {
    values: Vec<TypedClear>,
    bits: u32,
}

impl InputValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clear: TypedClear) -> Result<(), FhevmError> {
        if clear.value > clear.fhe_type.max_value() {
            return Err(FhevmError::TypeMismatch(format!(
                "{} does not fit in {}",
                clear.value, clear.fhe_type
            )));
        }
        if self.values.len() + 1 > MAX_INPUT_HANDLES {
            return Err(FhevmError::TooManyInputs(self.values.len() + 1));
        }
        let bits = self.bits + clear.fhe_type.bit_width();
        if bits > MAX_INPUT_BITS {
            return Err(FhevmError::TooManyBits(bits));
        }
        self.bits = bits;
        self.values.push(clear);
        Ok(())
    }

    pub fn add_bool(&mut self, value: bool) -> Result<(), FhevmError> {
        self.push(TypedClear::new(FheType::Bool, U256::from(value as u8)))
    }

    pub fn add32(&mut self, value: u32) -> Result<(), FhevmError> {
        self.push(TypedClear::u32(value))
    }

    pub fn add64(&mut self, value: u64) -> Result<(), FhevmError> {
        self.push(TypedClear::new(FheType::Uint64, U256::from(value)))
    }

    pub fn values(&self) -> &[TypedClear] {
        &self.values
    }

    pub fn types(&self) -> Vec<FheType> {
        self.values.iter().map(|v| v.fhe_type).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total_bits(&self) -> u32 {
        self.bits
    }

    /// Flat `[type][value be32]` encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.values.len() * VALUE_LEN);
        for v in &self.values {
            out.push(v.fhe_type as u8);
            out.extend_from_slice(&v.value.to_be_bytes::<32>());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FhevmError> {
        if bytes.len() % VALUE_LEN != 0 {
            return Err(FhevmError::InvalidInputProof(format!(
                "value blob of {} bytes",
                bytes.len()
            )));
        }
        let mut values = InputValues::new();
        for chunk in bytes.chunks(VALUE_LEN) {
            let fhe_type = FheType::try_from(chunk[0]).map_err(FhevmError::InvalidInputProof)?;
            let value = U256::from_be_slice(&chunk[1..]);
            values.push(TypedClear::new(fhe_type, value))?;
        }
        Ok(values)
    }
}

/// Input proof as the input verifier consumes it:
/// `[n handles u8][n signers u8][handles][65 byte signatures][extra data]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputProof {
    pub handles: Vec<B256>,
    pub signatures: Vec<Bytes>,
    pub extra_data: Bytes,
}

impl InputProof {
    pub fn pack(&self) -> Result<Bytes, FhevmError> {
        if self.handles.len() > MAX_INPUT_HANDLES || self.signatures.len() > u8::MAX as usize {
            return Err(FhevmError::TooManyInputs(self.handles.len()));
        }
        let len = 2
            + self.handles.len() * 32
            + self.signatures.len() * SIGNATURE_LEN
            + self.extra_data.len();
        let mut out = Vec::with_capacity(len);
        // 256 handles wrap to 0 in the count byte, matching what the verifier reads back
        out.push(self.handles.len() as u8);
        out.push(self.signatures.len() as u8);
        for h in &self.handles {
            out.extend_from_slice(h.as_slice());
        }
        for sig in &self.signatures {
            if sig.len() != SIGNATURE_LEN {
                return Err(FhevmError::InvalidSignature(format!(
                    "expected {} bytes, got {}",
                    SIGNATURE_LEN,
                    sig.len()
                )));
            }
            out.extend_from_slice(sig);
        }
        out.extend_from_slice(&self.extra_data);
        Ok(Bytes::from(out))
    }

    pub fn parse(proof: &[u8]) -> Result<Self, FhevmError> {
        let short = || FhevmError::InvalidInputProof("proof is truncated".to_string());
        if proof.len() < 2 {
            return Err(short());
        }
        let num_handles = match proof[0] {
            0 => MAX_INPUT_HANDLES,
            n => n as usize,
        };
        let num_signers = proof[1] as usize;
        let handles_end = 2 + num_handles * 32;
        let sigs_end = handles_end + num_signers * SIGNATURE_LEN;
        if proof.len() < sigs_end {
            return Err(short());
        }
        let handles = proof[2..handles_end]
            .chunks(32)
            .map(B256::from_slice)
            .collect();
        let signatures = proof[handles_end..sigs_end]
            .chunks(SIGNATURE_LEN)
            .map(|c| Bytes::copy_from_slice(c))
            .collect();
        Ok(Self {
            handles,
            signatures,
            extra_data: Bytes::copy_from_slice(&proof[sigs_end..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits() {
        let mut values = InputValues::new();
        for _ in 0..32 {
            values.add64(1).unwrap();
        }
        assert_eq!(values.total_bits(), 2048);
        assert!(matches!(values.add_bool(true), Err(FhevmError::TooManyBits(2050))));

        let mut values = InputValues::new();
        for _ in 0..MAX_INPUT_HANDLES {
            values.add_bool(false).unwrap();
        }
        assert!(matches!(values.add_bool(false), Err(FhevmError::TooManyInputs(257))));
    }

    #[test]
    fn test_rejects_values_wider_than_type() {
        let mut values = InputValues::new();
        let wide = TypedClear::new(FheType::Uint32, U256::from(u64::from(u32::MAX) + 1));
        assert!(values.push(wide).is_err());
        assert!(values.is_empty());
    }

    #[test]
    fn test_value_blob_decodes() {
        let mut values = InputValues::new();
        values.add32(2000).unwrap();
        values.add_bool(true).unwrap();
        let decoded = InputValues::decode(&values.encode()).unwrap();
        assert_eq!(decoded.values(), values.values());
        assert!(InputValues::decode(&[4, 0, 0]).is_err());
    }

    #[test]
    fn test_proof_layout() {
        let proof = InputProof {
            handles: vec![B256::repeat_byte(1), B256::repeat_byte(2)],
            signatures: vec![Bytes::from(vec![9u8; 65])],
            extra_data: Bytes::from(vec![0]),
        };
        let packed = proof.pack().unwrap();
        assert_eq!(packed.len(), 2 + 64 + 65 + 1);
        assert_eq!(&packed[..2], &[2, 1]);
        assert_eq!(InputProof::parse(&packed).unwrap(), proof);
        assert!(InputProof::parse(&packed[..50]).is_err());
    }
}
