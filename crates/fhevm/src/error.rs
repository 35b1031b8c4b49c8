// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{Address, B256};
use thiserror::Error;

use crate::{MAX_INPUT_BITS, MAX_INPUT_HANDLES, MAX_USER_DECRYPT_DURATION_DAYS};

#[derive(Error, Debug)]
pub enum FhevmError {
    #[error("Too many encrypted inputs: {0} (max {max})", max = MAX_INPUT_HANDLES)]
    TooManyInputs(usize),
    #[error("Encrypted inputs exceed {max} bits (got {0})", max = MAX_INPUT_BITS)]
    TooManyBits(u32),
    #[error("Nothing to encrypt")]
    EmptyInput,
    #[error("Invalid handle {0}: {1}")]
    InvalidHandle(B256, String),
    #[error("Unknown handle {0}")]
    UnknownHandle(B256),
    #[error("Operands have mismatched types: {0}")]
    TypeMismatch(String),
    #[error("Invalid EIP-712 payload: {0}")]
    InvalidEip712(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Signature was produced by {recovered}, not {user}")]
    SignerMismatch { recovered: Address, user: Address },
    #[error("Decryption request is outside its validity window")]
    RequestExpired,
    #[error("Duration of {0} days is invalid (1..={max})", max = MAX_USER_DECRYPT_DURATION_DAYS)]
    InvalidDuration(u64),
    #[error("Contract {0} is not part of the signed contract list")]
    ContractNotSigned(Address),
    #[error("{account} is not allowed to decrypt {handle}")]
    NotAllowed { handle: B256, account: Address },
    #[error("Private key does not belong to the signed public key")]
    KeypairMismatch,
    #[error("Input proof rejected: {0}")]
    InvalidInputProof(String),
    #[error("Relayer returned {status}: {body}")]
    Relayer { status: u16, body: String },
    #[error("Malformed relayer response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("FHE crypto failure: {0}")]
    Crypto(String),
}

impl FhevmError {
    /// Failures worth another attempt with the same request
    pub fn is_transient(&self) -> bool {
        match self {
            FhevmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FhevmError::Relayer { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
