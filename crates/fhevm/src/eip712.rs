// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::FhevmError;
use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol,
    sol_types::{Eip712Domain, SolStruct},
};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap};

pub const DECRYPTION_DOMAIN_NAME: &str = "Decryption";
pub const INPUT_VERIFICATION_DOMAIN_NAME: &str = "InputVerification";
pub const DOMAIN_VERSION: &str = "1";
pub const USER_DECRYPT_PRIMARY_TYPE: &str = "UserDecryptRequestVerification";

sol! {
    #[derive(Debug)]
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 startTimestamp;
        uint256 durationDays;
        bytes extraData;
    }

    #[derive(Debug)]
    struct CiphertextVerification {
        bytes32[] ctHandles;
        address userAddress;
        address contractAddress;
        uint256 contractChainId;
        bytes extraData;
    }
}

/// Domain of the structured data the gateway verifies
pub fn gateway_domain(
    name: &'static str,
    chain_id: u64,
    verifying_contract: Address,
) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(name)),
        Some(Cow::Borrowed(DOMAIN_VERSION)),
        Some(U256::from(chain_id)),
        Some(verifying_contract),
        None,
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712DomainFields {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl Eip712Field {
    fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDecryptMessage {
    pub public_key: Bytes,
    pub contract_addresses: Vec<Address>,
    pub start_timestamp: u64,
    pub duration_days: u64,
    pub extra_data: Bytes,
}

/// The structured data a wallet signs to authorize user decryption.
///
/// Construction and deserialization both validate that the declared types render to the
/// canonical `UserDecryptRequestVerification` encoding and that the domain is the decryption
/// domain, so a payload that exists is one the gateway would hash the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Eip712PayloadRepr")]
pub struct Eip712Payload {
    domain: Eip712DomainFields,
    primary_type: String,
    types: BTreeMap<String, Vec<Eip712Field>>,
    message: UserDecryptMessage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Eip712PayloadRepr {
    domain: Eip712DomainFields,
    primary_type: String,
    types: BTreeMap<String, Vec<Eip712Field>>,
    message: UserDecryptMessage,
}

impl TryFrom<Eip712PayloadRepr> for Eip712Payload {
    type Error = FhevmError;

    fn try_from(repr: Eip712PayloadRepr) -> Result<Self, Self::Error> {
        let payload = Eip712Payload {
            domain: repr.domain,
            primary_type: repr.primary_type,
            types: repr.types,
            message: repr.message,
        };
        payload.validate()?;
        Ok(payload)
    }
}

fn canonical_types() -> BTreeMap<String, Vec<Eip712Field>> {
    let mut types = BTreeMap::new();
    types.insert(
        "EIP712Domain".to_string(),
        vec![
            Eip712Field::new("name", "string"),
            Eip712Field::new("version", "string"),
            Eip712Field::new("chainId", "uint256"),
            Eip712Field::new("verifyingContract", "address"),
        ],
    );
    types.insert(
        USER_DECRYPT_PRIMARY_TYPE.to_string(),
        vec![
            Eip712Field::new("publicKey", "bytes"),
            Eip712Field::new("contractAddresses", "address[]"),
            Eip712Field::new("startTimestamp", "uint256"),
            Eip712Field::new("durationDays", "uint256"),
            Eip712Field::new("extraData", "bytes"),
        ],
    );
    types
}

fn render_type(name: &str, fields: &[Eip712Field]) -> String {
    let fields: Vec<String> = fields
        .iter()
        .map(|f| format!("{} {}", f.ty, f.name))
        .collect();
    format!("{}({})", name, fields.join(","))
}

impl Eip712Payload {
    pub fn new(
        gateway_chain_id: u64,
        verifying_contract: Address,
        message: UserDecryptMessage,
    ) -> Result<Self, FhevmError> {
        let payload = Self {
            domain: Eip712DomainFields {
                name: DECRYPTION_DOMAIN_NAME.to_string(),
                version: DOMAIN_VERSION.to_string(),
                chain_id: gateway_chain_id,
                verifying_contract,
            },
            primary_type: USER_DECRYPT_PRIMARY_TYPE.to_string(),
            types: canonical_types(),
            message,
        };
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<(), FhevmError> {
        let invalid = |msg: String| Err(FhevmError::InvalidEip712(msg));

        if self.primary_type != USER_DECRYPT_PRIMARY_TYPE {
            return invalid(format!("unexpected primary type {}", self.primary_type));
        }
        if self.domain.name != DECRYPTION_DOMAIN_NAME || self.domain.version != DOMAIN_VERSION {
            return invalid(format!(
                "unexpected domain {}/{}",
                self.domain.name, self.domain.version
            ));
        }
        let Some(fields) = self.types.get(USER_DECRYPT_PRIMARY_TYPE) else {
            return invalid(format!("types lack {}", USER_DECRYPT_PRIMARY_TYPE));
        };
        let rendered = render_type(USER_DECRYPT_PRIMARY_TYPE, fields);
        let canonical = UserDecryptRequestVerification::eip712_encode_type();
        if rendered != canonical {
            return invalid(format!("type {} does not match {}", rendered, canonical));
        }
        if self.message.contract_addresses.is_empty() {
            return invalid("no contract addresses".to_string());
        }
        Ok(())
    }

    pub fn domain(&self) -> &Eip712DomainFields {
        &self.domain
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn types(&self) -> &BTreeMap<String, Vec<Eip712Field>> {
        &self.types
    }

    pub fn message(&self) -> &UserDecryptMessage {
        &self.message
    }

    pub fn eip712_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Owned(self.domain.name.clone())),
            Some(Cow::Owned(self.domain.version.clone())),
            Some(U256::from(self.domain.chain_id)),
            Some(self.domain.verifying_contract),
            None,
        )
    }

    pub fn to_sol(&self) -> UserDecryptRequestVerification {
        UserDecryptRequestVerification {
            publicKey: self.message.public_key.clone(),
            contractAddresses: self.message.contract_addresses.clone(),
            startTimestamp: U256::from(self.message.start_timestamp),
            durationDays: U256::from(self.message.duration_days),
            extraData: self.message.extra_data.clone(),
        }
    }

    /// The EIP-712 digest a wallet signs for this payload
    pub fn signing_hash(&self) -> B256 {
        self.to_sol().eip712_signing_hash(&self.eip712_domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn message() -> UserDecryptMessage {
        UserDecryptMessage {
            public_key: Bytes::from(vec![1, 2, 3]),
            contract_addresses: vec![address!("0x5FbDB2315678afecb367f032d93F642f64180aa3")],
            start_timestamp: 1_700_000_000,
            duration_days: 365,
            extra_data: Bytes::from(vec![0]),
        }
    }

    fn verifying() -> Address {
        address!("0x5ffdaAB0373E62E2ea2944776209aEf29E631A64")
    }

    #[test]
    fn test_types_render_canonically() {
        let fields = &canonical_types()[USER_DECRYPT_PRIMARY_TYPE];
        assert_eq!(
            render_type(USER_DECRYPT_PRIMARY_TYPE, fields),
            "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,uint256 startTimestamp,uint256 durationDays,bytes extraData)"
        );
    }

    #[test]
    fn test_hash_binds_domain_and_message() {
        let a = Eip712Payload::new(55815, verifying(), message()).unwrap();
        let b = Eip712Payload::new(55815, verifying(), message()).unwrap();
        assert_eq!(a.signing_hash(), b.signing_hash());

        let other_chain = Eip712Payload::new(1, verifying(), message()).unwrap();
        assert_ne!(a.signing_hash(), other_chain.signing_hash());

        let mut msg = message();
        msg.duration_days = 1;
        let shorter = Eip712Payload::new(55815, verifying(), msg).unwrap();
        assert_ne!(a.signing_hash(), shorter.signing_hash());
    }

    #[test]
    fn test_json_shape_and_validation() {
        let payload = Eip712Payload::new(55815, verifying(), message()).unwrap();
        let mut json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["primaryType"], USER_DECRYPT_PRIMARY_TYPE);
        assert_eq!(json["domain"]["name"], "Decryption");
        assert_eq!(json["message"]["durationDays"], 365);

        let back: Eip712Payload = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, payload);

        json["types"][USER_DECRYPT_PRIMARY_TYPE][0]["type"] = "bytes32".into();
        assert!(serde_json::from_value::<Eip712Payload>(json).is_err());
    }

    #[test]
    fn test_rejects_empty_contract_list() {
        let mut msg = message();
        msg.contract_addresses.clear();
        assert!(Eip712Payload::new(55815, verifying(), msg).is_err());
    }
}
