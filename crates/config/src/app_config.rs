// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::chain_config::ChainConfig;
use crate::locate::{find_in_parent, resolve_config_path, DEFAULT_CONFIG_NAME};
use crate::yaml::load_yaml_with_env;
use anyhow::{anyhow, bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};
use tracing::debug;

pub const MAX_SIGNATURE_DURATION_DAYS: u64 = 365;
pub const ENV_PREFIX: &str = "DIET_";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SignatureConfig {
    /// Validity window requested for new decryption signatures
    pub duration_days: u64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            duration_days: MAX_SIGNATURE_DURATION_DAYS,
        }
    }
}

/// Where decryption signatures are persisted
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Process lifetime only
    Memory,
    /// Sled database, values sealed with a password read from `password_env` when it is set
    Sled {
        path: Option<PathBuf>,
        password_env: Option<String>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sled {
            path: None,
            password_env: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WalletConfig {
    /// Environment variable holding the hex encoded signing key
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "DIET_PRIVATE_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    chains: Vec<ChainConfig>,
    #[serde(default)]
    signature: SignatureConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    wallet: WalletConfig,
    data_dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chains: vec![ChainConfig::hardhat()],
            signature: SignatureConfig::default(),
            storage: StorageConfig::default(),
            wallet: WalletConfig::default(),
            data_dir: None,
            config_file: None,
        }
    }
}

impl AppConfig {
    pub fn chains(&self) -> &Vec<ChainConfig> {
        &self.chains
    }

    pub fn chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn chain_by_name(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.name == name)
    }

    /// Chain ids the resolver may serve with the in-process mock
    pub fn mock_chains(&self) -> Vec<u64> {
        self.chains
            .iter()
            .filter(|c| c.mock)
            .map(|c| c.chain_id)
            .collect()
    }

    pub fn signature(&self) -> &SignatureConfig {
        &self.signature
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn wallet(&self) -> &WalletConfig {
        &self.wallet
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(OsDirs::data_dir)
    }

    /// Location of the signature database
    pub fn db_file(&self) -> PathBuf {
        match &self.storage {
            StorageConfig::Sled {
                path: Some(path), ..
            } => path.clone(),
            _ => self.data_dir().join("signatures"),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| OsDirs::config_dir().join(DEFAULT_CONFIG_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            bail!("At least one chain must be configured");
        }
        let days = self.signature.duration_days;
        if days == 0 || days > MAX_SIGNATURE_DURATION_DAYS {
            bail!(
                "signature.duration_days must be between 1 and {} (got {})",
                MAX_SIGNATURE_DURATION_DAYS,
                days
            );
        }
        for chain in &self.chains {
            chain.validate()?;
        }
        let mut ids: Vec<u64> = self.chains.iter().map(|c| c.chain_id).collect();
        ids.sort_unstable();
        if let Some(dup) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(anyhow!("Chain id {} is configured more than once", dup[0]));
        }
        Ok(())
    }
}

/// Value struct for passing configuration from the cli to the configuration
#[derive(Default, Serialize, Deserialize, Clone, Debug)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Load the config at `cli_file` or the nearest/default location when not provided.
///
/// A missing file is not an error; built in defaults (a local hardhat mock chain) apply. Values
/// from `DIET_` prefixed environment variables win over the file, `__` separating nested keys.
pub fn load_config(cli_file: Option<PathBuf>) -> Result<AppConfig> {
    let cwd = env::current_dir()?;
    let resolved = resolve_config_path(
        find_in_parent,
        &cwd,
        &OsDirs::config_dir(),
        DEFAULT_CONFIG_NAME,
        cli_file.as_deref(),
    );

    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if resolved.exists() {
        debug!("Loading configuration from {}", resolved.display());
        let loaded_yaml = load_yaml_with_env(&resolved)
            .with_context(|| format!("Could not read {}", resolved.display()))?;
        figment = figment.merge(Yaml::string(&loaded_yaml));
    } else if cli_file.is_some() {
        bail!("Configuration file {} not found", resolved.display());
    } else {
        debug!("No configuration file found, using defaults");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["private_key"]))
        .merge(Serialized::defaults(CliOverrides {
            config_file: Some(resolved),
        }))
        .extract()
        .context("Could not parse configuration")?;

    config.validate()?;
    Ok(config)
}

pub struct OsDirs;
impl OsDirs {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("diet")
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("diet")
    }
}
