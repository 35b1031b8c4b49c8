// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use fdt_fhevm::FhevmError;
use fdt_session::SessionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Chain, account or contract changed while the operation was running; its result was dropped
    #[error("Session changed during {0}; result discarded")]
    Stale(&'static str),
    #[error("Nothing to decrypt: {0}")]
    NothingToDecrypt(&'static str),
    #[error("Ledger call failed: {0:#}")]
    Ledger(eyre::Report),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Fhevm(#[from] FhevmError),
}

impl From<eyre::Report> for TrackerError {
    fn from(value: eyre::Report) -> Self {
        TrackerError::Ledger(value)
    }
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
