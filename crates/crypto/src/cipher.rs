// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::password_manager::{EnvPasswordManager, InMemPasswordManager, PasswordManager};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use std::{collections::HashMap, sync::Mutex};
use zeroize::{Zeroize, Zeroizing};

// ARGON2 PARAMS
// https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html
const ARGON2_M_COST: u32 = 19 * 1024; // 19 MiB
const ARGON2_T_COST: u32 = 2;
const ARGON2_P_COST: u32 = 1;
const ARGON2_OUTPUT_LEN: usize = 32;

// AES PARAMS
const AES_SALT_LEN: usize = 32;
const AES_NONCE_LEN: usize = 12;
const AES_HEADER_LEN: usize = AES_SALT_LEN + AES_NONCE_LEN;

type Salt = [u8; AES_SALT_LEN];

fn argon2_derive_key(password: &[u8], salt: &Salt) -> Result<Zeroizing<Vec<u8>>> {
    let mut derived_key = Zeroizing::new(vec![0u8; ARGON2_OUTPUT_LEN]);
    let params = Params::new(
        ARGON2_M_COST,
        ARGON2_T_COST,
        ARGON2_P_COST,
        Some(ARGON2_OUTPUT_LEN),
    )
    .map_err(|_| anyhow!("Could not create params"))?;

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password, salt, &mut derived_key)
        .map_err(|_| anyhow!("Key derivation error"))?;

    Ok(derived_key)
}

/// AES-256-GCM with an Argon2id derived key.
///
/// Output layout is `[salt][nonce][ciphertext]`. A cipher encrypts everything under one salt
/// chosen at construction, so Argon2 runs once per process for writes; decryption derives (and
/// remembers) the key for whatever salt a record carries.
pub struct Cipher {
    password: Zeroizing<Vec<u8>>,
    salt: Salt,
    keys: Mutex<HashMap<Salt, Zeroizing<Vec<u8>>>>,
}

impl Cipher {
    pub async fn new<P>(pm: P) -> Result<Self>
    where
        P: PasswordManager + 'static,
    {
        let password = pm.get_key().await?;
        if password.is_empty() {
            return Err(anyhow!("Password must contain data"));
        }
        let mut salt = [0u8; AES_SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Ok(Self {
            password,
            salt,
            keys: Mutex::new(HashMap::new()),
        })
    }

    pub async fn from_password(value: &str) -> Result<Self> {
        Self::new(InMemPasswordManager::from_str(value)).await
    }

    pub async fn from_env(var: &str) -> Result<Self> {
        Self::new(EnvPasswordManager::new(var)?).await
    }

    fn with_key<R>(&self, salt: &Salt, op: impl FnOnce(&Aes256Gcm) -> Result<R>) -> Result<R> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| anyhow!("cipher key cache poisoned"))?;
        if !keys.contains_key(salt) {
            keys.insert(*salt, argon2_derive_key(&self.password, salt)?);
        }
        let key = keys
            .get(salt)
            .ok_or_else(|| anyhow!("derived key missing"))?;
        let cipher = Aes256Gcm::new_from_slice(key)?;
        op(&cipher)
    }

    /// Encrypt `data`, zeroizing the plaintext buffer afterwards
    pub fn encrypt_data(&self, data: &mut Vec<u8>) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; AES_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self.with_key(&self.salt, |cipher| {
            cipher
                .encrypt(nonce, data.as_ref())
                .map_err(|_| anyhow!("Could not AES Encrypt given plaintext."))
        })?;
        data.zeroize();

        let mut output = Vec::with_capacity(AES_HEADER_LEN + ciphertext.len());
        output.extend_from_slice(&self.salt);
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    pub fn decrypt_data(&self, encrypted_data: &[u8]) -> Result<Vec<u8>> {
        if encrypted_data.len() < AES_HEADER_LEN {
            return Err(anyhow!("Invalid encrypted data length"));
        }
        let mut salt = [0u8; AES_SALT_LEN];
        salt.copy_from_slice(&encrypted_data[..AES_SALT_LEN]);
        let nonce = Nonce::from_slice(&encrypted_data[AES_SALT_LEN..AES_HEADER_LEN]);
        let ciphertext = &encrypted_data[AES_HEADER_LEN..];

        self.with_key(&salt, |cipher| {
            cipher
                .decrypt(nonce, ciphertext)
                .map_err(|_| anyhow!("Could not decrypt data"))
        })
    }
}

impl Zeroize for Cipher {
    fn zeroize(&mut self) {
        self.password.zeroize();
        if let Ok(mut keys) = self.keys.lock() {
            keys.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_encrypt_decrypt() -> Result<()> {
        let cipher = Cipher::from_password("test_password").await?;
        let mut data = b"ephemeral private key".to_vec();
        let encrypted = cipher.encrypt_data(&mut data)?;
        assert!(data.iter().all(|b| *b == 0));
        assert_eq!(cipher.decrypt_data(&encrypted)?, b"ephemeral private key");
        Ok(())
    }

    #[tokio::test]
    async fn test_other_process_same_password() -> Result<()> {
        let writer = Cipher::from_password("shared").await?;
        let reader = Cipher::from_password("shared").await?;
        let encrypted = writer.encrypt_data(&mut b"payload".to_vec())?;
        assert_eq!(reader.decrypt_data(&encrypted)?, b"payload");
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_password_fails() -> Result<()> {
        let cipher = Cipher::from_password("password1").await?;
        let encrypted = cipher.encrypt_data(&mut b"secret".to_vec())?;
        let other = Cipher::from_password("password2").await?;
        assert!(other.decrypt_data(&encrypted).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_tampering_and_truncation_fail() -> Result<()> {
        let cipher = Cipher::from_password("test_password").await?;
        let mut encrypted = cipher.encrypt_data(&mut b"secret".to_vec())?;
        assert!(cipher.decrypt_data(&encrypted[..10]).is_err());
        encrypted[AES_HEADER_LEN] ^= 0xFF;
        assert!(cipher.decrypt_data(&encrypted).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_password_rejected() {
        assert!(Cipher::new(InMemPasswordManager::from_str("")).await.is_err());
    }
}
