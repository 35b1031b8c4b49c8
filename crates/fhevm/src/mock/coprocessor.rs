// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    compute_input_handles, compute_result_handle, gateway_domain, ChainParams,
    CiphertextVerification, EncryptedInputs, FheType, FhevmError, HandleInfo, InputProof,
    InputValues, TypedClear, INPUT_VERIFICATION_DOMAIN_NAME,
};
use alloy::{
    primitives::{Address, Bytes, Signature, B256, U256},
    signers::{local::PrivateKeySigner, SignerSync},
    sol_types::SolStruct,
};
use fdt_utils::short_hex;
use std::{
    collections::{HashMap, HashSet},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::{debug, warn};

const EXTRA_DATA: [u8; 1] = [0];

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
enum Op {
    Trivial = 1,
    Add = 2,
    Sub = 3,
    DivScalar = 4,
}

#[derive(Default)]
struct State {
    values: HashMap<B256, TypedClear>,
    acl: HashMap<B256, HashSet<Address>>,
    inputs: u64,
}

/// In-process stand-in for the coprocessor, input verifier and ACL of a mock chain.
///
/// Clear values live behind their handles. Arithmetic produces new handles deterministically
/// from the operands, so equal computations share a handle the way they do on chain.
pub struct MockCoprocessor {
    chain: ChainParams,
    signer: PrivateKeySigner,
    state: RwLock<State>,
}

impl MockCoprocessor {
    pub fn new(chain: ChainParams) -> Self {
        Self::with_signer(chain, PrivateKeySigner::random())
    }

    pub fn with_signer(chain: ChainParams, signer: PrivateKeySigner) -> Self {
        Self {
            chain,
            signer,
            state: RwLock::new(State::default()),
        }
    }

    pub fn chain(&self) -> &ChainParams {
        &self.chain
    }

    /// Address the input verifier expects input proofs to be signed by
    pub fn input_signer(&self) -> Address {
        self.signer.address()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn verification_hash(&self, handles: &[B256], user: Address, contract: Address) -> B256 {
        let verification = CiphertextVerification {
            ctHandles: handles.to_vec(),
            userAddress: user,
            contractAddress: contract,
            contractChainId: U256::from(self.chain.chain_id),
            extraData: Bytes::from(EXTRA_DATA.to_vec()),
        };
        let domain = gateway_domain(
            INPUT_VERIFICATION_DOMAIN_NAME,
            self.chain.gateway_chain_id,
            self.chain.verifying_contract_input_verification,
        );
        verification.eip712_signing_hash(&domain)
    }

    /// Register clear values as a fresh input and return its handles with a signed proof
    pub fn encrypt_input(
        &self,
        contract: Address,
        user: Address,
        values: &InputValues,
    ) -> Result<EncryptedInputs, FhevmError> {
        if values.is_empty() {
            return Err(FhevmError::EmptyInput);
        }
        let handles = {
            let mut state = self.write();
            state.inputs += 1;
            let mut ciphertext = state.inputs.to_be_bytes().to_vec();
            ciphertext.extend_from_slice(contract.as_slice());
            ciphertext.extend_from_slice(user.as_slice());
            ciphertext.extend_from_slice(&values.encode());

            let handles = compute_input_handles(
                &ciphertext,
                &values.types(),
                self.chain.acl,
                self.chain.chain_id,
            );
            for (handle, clear) in handles.iter().zip(values.values()) {
                state.values.insert(*handle, *clear);
            }
            handles
        };

        let hash = self.verification_hash(&handles, user, contract);
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| FhevmError::Crypto(e.to_string()))?;
        let input_proof = InputProof {
            handles: handles.clone(),
            signatures: vec![Bytes::from(signature.as_bytes().to_vec())],
            extra_data: Bytes::from(EXTRA_DATA.to_vec()),
        }
        .pack()?;

        debug!(
            "registered {} input value(s) for {} on {}",
            handles.len(),
            user,
            contract
        );
        Ok(EncryptedInputs {
            handles,
            input_proof,
        })
    }

    /// Check an external handle against its proof for (user, contract) and grant the contract
    /// access to it
    pub fn verify_input(
        &self,
        handle: B256,
        user: Address,
        contract: Address,
        proof: &[u8],
    ) -> Result<B256, FhevmError> {
        let proof = InputProof::parse(proof)?;
        if !proof.handles.contains(&handle) {
            return Err(FhevmError::InvalidInputProof(format!(
                "{} is not part of the proof",
                short_hex(handle.as_slice())
            )));
        }
        let info = HandleInfo::parse(&handle)?;
        if info.chain_id != self.chain.chain_id {
            return Err(FhevmError::InvalidHandle(
                handle,
                format!("bound to chain {}", info.chain_id),
            ));
        }

        let hash = self.verification_hash(&proof.handles, user, contract);
        let expected = self.input_signer();
        let signed = proof.signatures.iter().any(|raw| {
            Signature::try_from(&raw[..])
                .and_then(|sig| sig.recover_address_from_prehash(&hash))
                .map(|recovered| recovered == expected)
                .unwrap_or(false)
        });
        if !signed {
            warn!("input proof for {} is not signed for this user/contract", user);
            return Err(FhevmError::InvalidInputProof(
                "no valid coprocessor signature".to_string(),
            ));
        }

        let mut state = self.write();
        if !state.values.contains_key(&handle) {
            return Err(FhevmError::UnknownHandle(handle));
        }
        state.acl.entry(handle).or_default().insert(contract);
        Ok(handle)
    }

    fn store(&self, handle: B256, clear: TypedClear) -> B256 {
        self.write().values.insert(handle, clear);
        handle
    }

    fn operand(&self, handle: &B256) -> Result<TypedClear, FhevmError> {
        self.plaintext(handle).ok_or(FhevmError::UnknownHandle(*handle))
    }

    fn preimage(&self, op: Op, lhs: &B256, rhs: &[u8; 32]) -> Vec<u8> {
        let mut out = vec![op as u8];
        out.extend_from_slice(lhs.as_slice());
        out.extend_from_slice(rhs);
        out.extend_from_slice(self.chain.acl.as_slice());
        out
    }

    /// Encrypt a constant the way a contract's `asEuintXX` does
    pub fn trivial_encrypt(&self, clear: TypedClear) -> B256 {
        let mut preimage = vec![Op::Trivial as u8, clear.fhe_type as u8];
        preimage.extend_from_slice(&clear.value.to_be_bytes::<32>());
        let handle = compute_result_handle(&preimage, clear.fhe_type, self.chain.chain_id);
        self.store(handle, clear)
    }

    fn binary(
        &self,
        op: Op,
        lhs: B256,
        rhs: B256,
        f: impl Fn(U256, U256) -> U256,
    ) -> Result<B256, FhevmError> {
        let a = self.operand(&lhs)?;
        let b = self.operand(&rhs)?;
        if a.fhe_type != b.fhe_type || a.fhe_type == FheType::Bool {
            return Err(FhevmError::TypeMismatch(format!(
                "{:?} on {} and {}",
                op, a.fhe_type, b.fhe_type
            )));
        }
        let value = f(a.value, b.value) & a.fhe_type.max_value();
        let handle = compute_result_handle(
            &self.preimage(op, &lhs, &rhs.0),
            a.fhe_type,
            self.chain.chain_id,
        );
        Ok(self.store(handle, TypedClear::new(a.fhe_type, value)))
    }

    /// Wrapping addition
    pub fn add(&self, lhs: B256, rhs: B256) -> Result<B256, FhevmError> {
        self.binary(Op::Add, lhs, rhs, |a, b| a.wrapping_add(b))
    }

    /// Wrapping subtraction
    pub fn sub(&self, lhs: B256, rhs: B256) -> Result<B256, FhevmError> {
        self.binary(Op::Sub, lhs, rhs, |a, b| a.wrapping_sub(b))
    }

    /// Unsigned division by a clear divisor
    pub fn div_scalar(&self, lhs: B256, divisor: U256) -> Result<B256, FhevmError> {
        if divisor.is_zero() {
            return Err(FhevmError::TypeMismatch("division by zero".to_string()));
        }
        let a = self.operand(&lhs)?;
        if a.fhe_type == FheType::Bool {
            return Err(FhevmError::TypeMismatch("division of ebool".to_string()));
        }
        let handle = compute_result_handle(
            &self.preimage(Op::DivScalar, &lhs, &divisor.to_be_bytes::<32>()),
            a.fhe_type,
            self.chain.chain_id,
        );
        Ok(self.store(handle, TypedClear::new(a.fhe_type, a.value / divisor)))
    }

    pub fn allow(&self, handle: B256, account: Address) -> Result<(), FhevmError> {
        let mut state = self.write();
        if !state.values.contains_key(&handle) {
            return Err(FhevmError::UnknownHandle(handle));
        }
        state.acl.entry(handle).or_default().insert(account);
        Ok(())
    }

    pub fn is_allowed(&self, handle: &B256, account: &Address) -> bool {
        self.read()
            .acl
            .get(handle)
            .is_some_and(|accounts| accounts.contains(account))
    }

    /// The clear value behind a handle. Nothing on a real chain can do this; it exists for the
    /// mock instance's decryption and for tests.
    pub fn plaintext(&self, handle: &B256) -> Option<TypedClear> {
        self.read().values.get(handle).copied()
    }
}
