// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::MismatchReason;
use alloy::primitives::{Address, Bytes};
use fdt_fhevm::{Eip712Payload, EphemeralSecret, KeyPair};
use fdt_utils::SECONDS_PER_DAY;
use serde::{Deserialize, Serialize};

/// An ephemeral keypair together with the wallet signature authorizing its use for decryption.
///
/// Records are immutable. When the contract set, the user or the validity window no longer fit a
/// request, a new record is created instead of changing this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptionSignature {
    public_key: Bytes,
    private_key: EphemeralSecret,
    signature: Bytes,
    start_timestamp: u64,
    duration_days: u64,
    user_address: Address,
    contract_addresses: Vec<Address>,
    eip712: Eip712Payload,
}

impl DecryptionSignature {
    pub(crate) fn new(
        keypair: KeyPair,
        signature: Bytes,
        user_address: Address,
        eip712: Eip712Payload,
    ) -> Self {
        let message = eip712.message();
        Self {
            public_key: keypair.public_key,
            private_key: keypair.private_key,
            signature,
            start_timestamp: message.start_timestamp,
            duration_days: message.duration_days,
            user_address,
            contract_addresses: message.contract_addresses.clone(),
            eip712,
        }
    }

    pub fn public_key(&self) -> &Bytes {
        &self.public_key
    }

    pub fn private_key(&self) -> &EphemeralSecret {
        &self.private_key
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    pub fn start_timestamp(&self) -> u64 {
        self.start_timestamp
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    pub fn user_address(&self) -> Address {
        self.user_address
    }

    pub fn contract_addresses(&self) -> &[Address] {
        &self.contract_addresses
    }

    pub fn eip712(&self) -> &Eip712Payload {
        &self.eip712
    }

    /// First second at which the signature is no longer valid
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now < self.expires_at()
    }

    pub fn covers(&self, contracts: &[Address]) -> bool {
        contracts
            .iter()
            .all(|c| self.contract_addresses.contains(c))
    }

    /// Check the record against a request for `user` over `contracts` at time `now`
    pub fn check(
        &self,
        user: Address,
        contracts: &[Address],
        now: u64,
    ) -> Result<(), MismatchReason> {
        if self.user_address != user {
            return Err(MismatchReason::UserMismatch {
                expected: self.user_address,
                actual: user,
            });
        }
        if let Some(missing) = contracts
            .iter()
            .find(|c| !self.contract_addresses.contains(c))
        {
            return Err(MismatchReason::ContractNotAuthorized(*missing));
        }
        if !self.is_valid_at(now) {
            return Err(MismatchReason::OutsideValidityWindow {
                now,
                start: self.start_timestamp,
                end: self.expires_at(),
            });
        }
        Ok(())
    }

    /// The signed payload must describe exactly this record
    pub fn is_consistent(&self) -> bool {
        let message = self.eip712.message();
        message.public_key == self.public_key
            && message.contract_addresses == self.contract_addresses
            && message.start_timestamp == self.start_timestamp
            && message.duration_days == self.duration_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use fdt_fhevm::{ChainParams, UserDecryptMessage};

    const A: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const B: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
    const USER: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    const START: u64 = 1_700_000_000;

    fn record(contracts: Vec<Address>) -> DecryptionSignature {
        let chain = ChainParams::hardhat();
        let public_key = Bytes::from(vec![7u8; 32]);
        let payload = Eip712Payload::new(
            chain.gateway_chain_id,
            chain.verifying_contract_decryption,
            UserDecryptMessage {
                public_key: public_key.clone(),
                contract_addresses: contracts,
                start_timestamp: START,
                duration_days: 2,
                extra_data: Bytes::from(vec![0]),
            },
        )
        .unwrap();
        DecryptionSignature::new(
            KeyPair {
                public_key,
                private_key: EphemeralSecret::new(vec![1u8; 32]),
            },
            Bytes::from(vec![0u8; 65]),
            USER,
            payload,
        )
    }

    #[test]
    fn test_window_is_half_open() {
        let sig = record(vec![A]);
        assert_eq!(sig.expires_at(), START + 2 * SECONDS_PER_DAY);
        assert!(!sig.is_valid_at(START - 1));
        assert!(sig.is_valid_at(START));
        assert!(sig.is_valid_at(sig.expires_at() - 1));
        assert!(!sig.is_valid_at(sig.expires_at()));
    }

    #[test]
    fn test_check_reports_first_mismatch() {
        let sig = record(vec![A]);
        assert_eq!(sig.check(USER, &[A], START), Ok(()));
        assert_eq!(
            sig.check(USER, &[A, B], START),
            Err(MismatchReason::ContractNotAuthorized(B))
        );
        assert_eq!(
            sig.check(A, &[A], START),
            Err(MismatchReason::UserMismatch {
                expected: USER,
                actual: A
            })
        );
        assert!(matches!(
            sig.check(USER, &[A], sig.expires_at()),
            Err(MismatchReason::OutsideValidityWindow { .. })
        ));
    }

    #[test]
    fn test_json_layout() {
        let sig = record(vec![A, B]);
        let json = serde_json::to_value(&sig).unwrap();
        for field in [
            "publicKey",
            "privateKey",
            "signature",
            "startTimestamp",
            "durationDays",
            "userAddress",
            "contractAddresses",
            "eip712",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        let back: DecryptionSignature = serde_json::from_value(json).unwrap();
        assert_eq!(back, sig);
        assert!(back.is_consistent());
    }

    #[test]
    fn test_tampered_record_is_inconsistent() {
        let mut sig = record(vec![A]);
        sig.contract_addresses.push(B);
        assert!(!sig.is_consistent());
    }
}
