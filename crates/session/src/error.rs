// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{Address, B256};
use fdt_fhevm::FhevmError;
use std::fmt;
use thiserror::Error;

/// Why an instance could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstanceError {
    /// The connected chain is neither a configured mock nor a configured network chain
    #[error("Chain {0} is not supported")]
    UnsupportedChain(u64),
    /// Public parameters could not be fetched; retrying later may succeed
    #[error("Could not fetch public parameters: {0}")]
    Fetch(String),
    #[error("Could not construct instance: {0}")]
    Construction(String),
    /// A newer resolution replaced the one this caller was waiting on
    #[error("Resolution was superseded by a newer request")]
    Superseded,
    #[error("No instance has been resolved")]
    NotResolved,
}

impl InstanceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, InstanceError::Fetch(_) | InstanceError::Superseded)
    }

    pub fn is_wrong_network(&self) -> bool {
        matches!(self, InstanceError::UnsupportedChain(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    ContractNotAuthorized(Address),
    UserMismatch { expected: Address, actual: Address },
    OutsideValidityWindow { now: u64, start: u64, end: u64 },
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::ContractNotAuthorized(contract) => {
                write!(f, "contract {contract} is not covered by the signature")
            }
            MismatchReason::UserMismatch { expected, actual } => {
                write!(f, "signature belongs to {expected}, not {actual}")
            }
            MismatchReason::OutsideValidityWindow { now, start, end } => {
                write!(f, "time {now} is outside [{start}, {end})")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Encryption instance unavailable: {0}")]
    InstanceUnavailable(#[from] InstanceError),
    /// The wallet refused or failed to sign. Never cached; asking again prompts again.
    #[error("Signing was rejected: {0}")]
    SigningRejected(String),
    #[error("Authorization mismatch: {0}")]
    AuthorizationMismatch(MismatchReason),
    #[error("Decrypt response has no value for handle {missing}")]
    ResponseShape { missing: B256 },
    #[error("Signature storage failure: {0:#}")]
    Storage(anyhow::Error),
    #[error("Decryption failed: {0}")]
    DecryptFailed(FhevmError),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Fhevm(#[from] FhevmError),
}

impl SessionError {
    pub fn storage(err: impl Into<anyhow::Error>) -> Self {
        SessionError::Storage(err.into())
    }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
