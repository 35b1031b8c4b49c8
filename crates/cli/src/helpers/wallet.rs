// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use super::ensure_hex_zeroizing;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use fdt_config::{AppConfig, ChainConfig};
use tracing::warn;
use zeroize::Zeroizing;

/// Signing key for the session. Mock chains fall back to a throwaway key when none is set.
pub struct Wallet {
    pub signer: PrivateKeySigner,
    pub private_key: Zeroizing<String>,
}

pub fn load_wallet(config: &AppConfig, chain: &ChainConfig) -> Result<Wallet> {
    let var = &config.wallet().private_key_env;
    match std::env::var(var) {
        Ok(raw) => {
            let private_key = ensure_hex_zeroizing(&Zeroizing::new(raw))
                .with_context(|| format!("{} does not hold a hex private key", var))?;
            let signer: PrivateKeySigner = private_key
                .parse()
                .with_context(|| format!("{} does not hold a valid private key", var))?;
            Ok(Wallet {
                signer,
                private_key,
            })
        }
        Err(_) if chain.mock => {
            warn!(
                "{} is not set, signing with a random key on mock chain {}",
                var, chain.name
            );
            let signer = PrivateKeySigner::random();
            let private_key = Zeroizing::new(format!("0x{}", hex::encode(signer.to_bytes())));
            Ok(Wallet {
                signer,
                private_key,
            })
        }
        Err(_) => bail!(
            "Set {} to the private key of the account submitting to chain '{}'",
            var,
            chain.name
        ),
    }
}
