// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Sources for the password that seals cached secrets.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::env;
use zeroize::Zeroizing;

#[async_trait]
pub trait PasswordManager: Sync + Send {
    async fn get_key(&self) -> Result<Zeroizing<Vec<u8>>>;

    fn is_set(&self) -> bool;
}

pub struct InMemPasswordManager(Option<Zeroizing<Vec<u8>>>);

impl InMemPasswordManager {
    pub fn new(value: Zeroizing<Vec<u8>>) -> Self {
        Self(Some(value))
    }

    pub fn from_str(value: &str) -> Self {
        Self::new(Zeroizing::new(value.as_bytes().to_vec()))
    }

    pub fn empty() -> Self {
        Self(None)
    }
}

#[async_trait]
impl PasswordManager for InMemPasswordManager {
    async fn get_key(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.0.clone().ok_or_else(|| anyhow!("No key found"))
    }

    fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

/// Reads the password from an environment variable once, at construction
pub struct EnvPasswordManager {
    var: String,
    value: Zeroizing<Vec<u8>>,
}

impl EnvPasswordManager {
    pub fn new(var: &str) -> Result<Self> {
        let value = env::var(var).with_context(|| format!("{} is not set", var))?;
        if value.is_empty() {
            return Err(anyhow!("{} is empty", var));
        }
        Ok(Self {
            var: var.to_string(),
            value: Zeroizing::new(value.into_bytes()),
        })
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

#[async_trait]
impl PasswordManager for EnvPasswordManager {
    async fn get_key(&self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(self.value.clone())
    }

    fn is_set(&self) -> bool {
        true
    }
}
