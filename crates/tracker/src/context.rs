// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::Address;
use tokio::sync::watch;

/// Who is talking to which deployment. Results computed under one context are never applied
/// under another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionContext {
    pub chain_id: u64,
    pub user: Address,
    pub contract: Address,
}

impl SessionContext {
    pub fn new(chain_id: u64, user: Address, contract: Address) -> Self {
        Self {
            chain_id,
            user,
            contract,
        }
    }

    /// A context that never changes, for callers without a wallet connection to follow
    pub fn fixed(self) -> watch::Receiver<SessionContext> {
        watch::channel(self).1
    }
}
