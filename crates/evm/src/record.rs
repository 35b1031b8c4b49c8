// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::B256;
use fdt_fhevm::is_zero_handle;

/// One day's entry as the contract stores it: three `euint32` handles and a block timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncryptedRecord {
    pub calories_in: B256,
    pub calories_out: B256,
    pub balance: B256,
    pub timestamp: u64,
}

impl EncryptedRecord {
    /// Handles in the order they are usually decrypted
    pub fn handles(&self) -> [B256; 3] {
        [self.calories_in, self.calories_out, self.balance]
    }

    /// True for the all-zero record a contract returns before anything was submitted
    pub fn is_empty(&self) -> bool {
        self.handles().iter().all(is_zero_handle)
    }
}
