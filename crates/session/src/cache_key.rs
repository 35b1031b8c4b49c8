// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{keccak256, Address};
use std::fmt;

/// Signatures are looked up per (chain, network key, user); the contract set narrows it down
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheScope {
    pub chain_id: u64,
    pub public_key_id: String,
    pub user: Address,
}

impl CacheScope {
    pub fn serialized(&self) -> String {
        format!(
            "{}:{}:{}",
            self.chain_id,
            self.public_key_id,
            hex_lower(&self.user)
        )
    }

    pub fn storage_key(&self) -> String {
        format!("scope:{}", keccak256(self.serialized().as_bytes()))
    }
}

/// Identity of a cached decryption signature.
///
/// The contract set is sorted and de-duplicated on construction, so keys built from the same
/// addresses in any order or multiplicity are equal and serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scope: CacheScope,
    contracts: Vec<Address>,
}

fn hex_lower(address: &Address) -> String {
    format!("0x{}", alloy::hex::encode(address.as_slice()))
}

impl CacheKey {
    pub fn new(
        chain_id: u64,
        public_key_id: impl Into<String>,
        user: Address,
        contracts: &[Address],
    ) -> Self {
        Self::in_scope(
            CacheScope {
                chain_id,
                public_key_id: public_key_id.into(),
                user,
            },
            contracts,
        )
    }

    pub fn in_scope(scope: CacheScope, contracts: &[Address]) -> Self {
        let mut contracts = contracts.to_vec();
        contracts.sort_unstable();
        contracts.dedup();
        Self { scope, contracts }
    }

    pub fn scope(&self) -> &CacheScope {
        &self.scope
    }

    pub fn user(&self) -> Address {
        self.scope.user
    }

    pub fn contracts(&self) -> &[Address] {
        &self.contracts
    }

    /// Normalized form: lower-case hex, contracts sorted
    pub fn serialized(&self) -> String {
        let contracts: Vec<String> = self.contracts.iter().map(hex_lower).collect();
        format!("{}:{}", self.scope.serialized(), contracts.join(","))
    }

    pub fn storage_key(&self) -> String {
        format!("sig:{}", keccak256(self.serialized().as_bytes()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use proptest::prelude::*;

    const A: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const B: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
    const USER: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");

    #[test]
    fn test_serialized_form() {
        let key = CacheKey::new(31337, "mock-31337", USER, &[B, A, B]);
        assert_eq!(
            key.serialized(),
            "31337:mock-31337:0x70997970c51812dc3a010c7d01b50e0d17dc79c8:0x5fbdb2315678afecb367f032d93f642f64180aa3,0xe7f1725e7734ce288f8367e1bb143e90bb3f0512"
        );
        assert!(key.storage_key().starts_with("sig:0x"));
    }

    #[test]
    fn test_scope_separates_keys() {
        let a = CacheKey::new(1, "k", USER, &[A]);
        let b = CacheKey::new(2, "k", USER, &[A]);
        let c = CacheKey::new(1, "other", USER, &[A]);
        assert_ne!(a.storage_key(), b.storage_key());
        assert_ne!(a.storage_key(), c.storage_key());
        assert_ne!(a.scope().storage_key(), b.scope().storage_key());
    }

    fn arb_address() -> impl Strategy<Value = Address> {
        // a small pool so duplicates show up
        (0u8..6).prop_map(|b| Address::repeat_byte(b))
    }

    proptest! {
        #[test]
        fn test_key_is_order_and_multiplicity_independent(
            contracts in prop::collection::vec(arb_address(), 1..12),
            seed in any::<u64>(),
        ) {
            let mut shuffled = contracts.clone();
            // deterministic rotation + reversal stands in for a shuffle
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            if seed % 2 == 0 {
                shuffled.reverse();
            }
            shuffled.extend_from_slice(&contracts[..len / 2]);

            let a = CacheKey::new(31337, "pk", USER, &contracts);
            let b = CacheKey::new(31337, "pk", USER, &shuffled);
            prop_assert_eq!(a.serialized(), b.serialized());
            prop_assert_eq!(a.storage_key(), b.storage_key());
            prop_assert!(a.contracts().windows(2).all(|w| w[0] < w[1]));
        }
    }
}
