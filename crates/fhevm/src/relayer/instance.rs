// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use super::{
    api::{decode_bytes, decode_handle},
    DecryptShare, Envelope, FheCrypto, InputProofRequest, InputProofResponse, KeyUrlResponse,
    ProofContext, PublicParams, RequestValidity, SharePayload, UserDecryptBody,
    INPUT_PROOF_PATH, KEYURL_PATH, USER_DECRYPT_PATH,
};
use crate::{
    compute_input_handles, ChainParams, ClearValue, Eip712Payload, EncryptedInput,
    EncryptedInputs, FhevmError, FhevmInstance, InputProof, InputValues, KeyPair,
    UserDecryptMessage, UserDecryptRequest, UserDecryptResults, MAX_USER_DECRYPT_DURATION_DAYS,
};
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

const EXTRA_DATA: &str = "0x00";

/// Thin JSON client for the relayer endpoints
#[derive(Clone)]
pub struct RelayerClient {
    http: Client,
    base: Url,
}

impl RelayerClient {
    pub fn new(http: Client, base: Url) -> Self {
        // Url::join drops the last path segment unless it ends in a slash
        let base = if base.path().ends_with('/') {
            base
        } else {
            let mut with_slash = base;
            let path = format!("{}/", with_slash.path());
            with_slash.set_path(&path);
            with_slash
        };
        Self { http, base }
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, FhevmError> {
        self.base
            .join(path)
            .map_err(|e| FhevmError::MalformedResponse(format!("bad relayer path {path}: {e}")))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, FhevmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(FhevmError::Relayer {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, FhevmError> {
        let response = self.http.get(self.endpoint(path)?).send().await?;
        let envelope: Envelope<R> = Self::check(response).await?.json().await?;
        Ok(envelope.response)
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, FhevmError> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;
        let envelope: Envelope<R> = Self::check(response).await?.json().await?;
        Ok(envelope.response)
    }

    async fn download(&self, url: &str) -> Result<Bytes, FhevmError> {
        let response = self.http.get(url).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(Bytes::from(bytes.to_vec()))
    }

    /// Fetch the network public key and CRS the relayer advertises
    pub async fn fetch_public_params(&self) -> Result<PublicParams, FhevmError> {
        let keyurl: KeyUrlResponse = self.get_json(KEYURL_PATH).await?;
        let (key, crs) = keyurl.locations()?;
        info!("Downloading FHE public key {}", key.data_id);
        let public_key = self.download(&key.urls[0]).await?;
        let crs_bytes = self.download(&crs.urls[0]).await?;
        Ok(PublicParams {
            public_key_id: key.data_id,
            public_key,
            crs_id: crs.data_id,
            crs: crs_bytes,
        })
    }
}

/// Instance for a production chain, backed by a relayer and an [`FheCrypto`] implementation
pub struct RelayerInstance {
    chain: ChainParams,
    client: RelayerClient,
    params: Arc<PublicParams>,
    crypto: Arc<dyn FheCrypto>,
}

impl RelayerInstance {
    pub fn new(
        chain: ChainParams,
        client: RelayerClient,
        params: PublicParams,
        crypto: Arc<dyn FheCrypto>,
    ) -> Self {
        info!(
            "Creating relayer FHEVM instance for chain {} with key {}",
            chain.chain_id, params.public_key_id
        );
        Self {
            chain,
            client,
            params: Arc::new(params),
            crypto,
        }
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.params
    }
}

#[async_trait]
impl FhevmInstance for RelayerInstance {
    fn chain_id(&self) -> u64 {
        self.chain.chain_id
    }

    fn public_key_id(&self) -> &str {
        &self.params.public_key_id
    }

    fn generate_keypair(&self) -> Result<KeyPair, FhevmError> {
        self.crypto.generate_keypair()
    }

    fn create_eip712(
        &self,
        public_key: &Bytes,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<Eip712Payload, FhevmError> {
        Eip712Payload::new(
            self.chain.gateway_chain_id,
            self.chain.verifying_contract_decryption,
            UserDecryptMessage {
                public_key: public_key.clone(),
                contract_addresses: contract_addresses.to_vec(),
                start_timestamp,
                duration_days,
                extra_data: Bytes::from(vec![0]),
            },
        )
    }

    fn create_encrypted_input(&self, contract: Address, user: Address) -> Box<dyn EncryptedInput> {
        Box::new(RelayerEncryptedInput {
            client: self.client.clone(),
            params: self.params.clone(),
            crypto: self.crypto.clone(),
            context: ProofContext {
                contract,
                user,
                acl: self.chain.acl,
                chain_id: self.chain.chain_id,
            },
            values: InputValues::new(),
        })
    }

    async fn user_decrypt(
        &self,
        request: UserDecryptRequest<'_>,
    ) -> Result<UserDecryptResults, FhevmError> {
        if request.duration_days == 0 || request.duration_days > MAX_USER_DECRYPT_DURATION_DAYS {
            return Err(FhevmError::InvalidDuration(request.duration_days));
        }
        if let Some(pair) = request
            .pairs
            .iter()
            .find(|p| !request.contract_addresses.contains(&p.contract_address))
        {
            return Err(FhevmError::ContractNotSigned(pair.contract_address));
        }

        let body = user_decrypt_body(&self.chain, &request);
        let shares: Vec<SharePayload> = self.client.post_json(USER_DECRYPT_PATH, &body).await?;
        let shares = shares
            .iter()
            .map(|s| {
                Ok(DecryptShare {
                    payload: decode_bytes(&s.payload)?,
                    signature: decode_bytes(&s.signature)?,
                })
            })
            .collect::<Result<Vec<_>, FhevmError>>()?;
        debug!("relayer returned {} decryption share(s)", shares.len());

        let handles: Vec<_> = request.pairs.iter().map(|p| p.handle).collect();
        let clears = self.crypto.open_shares(
            &shares,
            request.private_key,
            request.public_key,
            &handles,
        )?;
        if clears.len() != handles.len() {
            return Err(FhevmError::MalformedResponse(format!(
                "{} clear values for {} handles",
                clears.len(),
                handles.len()
            )));
        }
        Ok(handles
            .into_iter()
            .zip(clears)
            .map(|(h, c)| (h, ClearValue::from(c)))
            .collect())
    }
}

fn user_decrypt_body(chain: &ChainParams, request: &UserDecryptRequest<'_>) -> UserDecryptBody {
    UserDecryptBody {
        handle_contract_pairs: request.pairs.to_vec(),
        request_validity: RequestValidity {
            start_timestamp: request.start_timestamp.to_string(),
            duration_days: request.duration_days.to_string(),
        },
        contracts_chain_id: chain.chain_id.to_string(),
        contract_addresses: request.contract_addresses.to_vec(),
        user_address: request.user_address,
        signature: hex::encode(request.signature),
        public_key: hex::encode(request.public_key),
        extra_data: EXTRA_DATA.to_string(),
    }
}

struct RelayerEncryptedInput {
    client: RelayerClient,
    params: Arc<PublicParams>,
    crypto: Arc<dyn FheCrypto>,
    context: ProofContext,
    values: InputValues,
}

#[async_trait]
impl EncryptedInput for RelayerEncryptedInput {
    fn add_bool(&mut self, value: bool) -> Result<(), FhevmError> {
        self.values.add_bool(value)
    }

    fn add32(&mut self, value: u32) -> Result<(), FhevmError> {
        self.values.add32(value)
    }

    fn add64(&mut self, value: u64) -> Result<(), FhevmError> {
        self.values.add64(value)
    }

    async fn encrypt(&mut self) -> Result<EncryptedInputs, FhevmError> {
        let values = std::mem::take(&mut self.values);
        if values.is_empty() {
            return Err(FhevmError::EmptyInput);
        }
        let ciphertext = self
            .crypto
            .encrypt_with_proof(&self.params, &values, &self.context)?;
        let expected = compute_input_handles(
            &ciphertext,
            &values.types(),
            self.context.acl,
            self.context.chain_id,
        );

        let body = InputProofRequest {
            contract_address: self.context.contract,
            user_address: self.context.user,
            ciphertext_with_input_verification: hex::encode(&ciphertext),
            contract_chain_id: format!("0x{:x}", self.context.chain_id),
            extra_data: EXTRA_DATA.to_string(),
        };
        let response: InputProofResponse = self.client.post_json(INPUT_PROOF_PATH, &body).await?;
        assemble_input_proof(expected, response)
    }
}

/// Check the coprocessors agree with the locally computed handles and pack their signatures
fn assemble_input_proof(
    expected: Vec<alloy::primitives::B256>,
    response: InputProofResponse,
) -> Result<EncryptedInputs, FhevmError> {
    let handles = response
        .handles
        .iter()
        .map(|h| decode_handle(h))
        .collect::<Result<Vec<_>, _>>()?;
    if handles != expected {
        return Err(FhevmError::InvalidInputProof(
            "relayer handles differ from the ciphertext's".to_string(),
        ));
    }
    let signatures = response
        .signatures
        .iter()
        .map(|s| decode_bytes(s))
        .collect::<Result<Vec<_>, _>>()?;
    let input_proof = InputProof {
        handles: handles.clone(),
        signatures,
        extra_data: Bytes::from(vec![0]),
    }
    .pack()?;
    Ok(EncryptedInputs {
        handles,
        input_proof,
    })
}
