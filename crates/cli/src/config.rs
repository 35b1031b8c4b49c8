// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use fdt_config::{AppConfig, StorageConfig};

fn describe(config: &AppConfig) -> String {
    let mut out = format!("config: {}\n", config.config_file().display());
    let storage = match config.storage() {
        StorageConfig::Memory => "memory".to_string(),
        StorageConfig::Sled { password_env, .. } => match password_env {
            Some(var) => format!("sled {} (sealed with ${})", config.db_file().display(), var),
            None => format!("sled {}", config.db_file().display()),
        },
    };
    out.push_str(&format!("storage: {}\n", storage));
    out.push_str(&format!(
        "signature duration: {} days\n",
        config.signature().duration_days
    ));
    out.push_str(&format!("wallet key env: {}\n", config.wallet().private_key_env));
    out.push_str("chains:\n");
    for chain in config.chains() {
        out.push_str(&format!(
            "  {} ({}){} rpc={} diet_tracker={}\n",
            chain.name,
            chain.chain_id,
            if chain.mock { " mock" } else { "" },
            chain.rpc_url,
            chain.contracts.diet_tracker.address_str()
        ));
    }
    out
}

pub fn execute(config: &AppConfig) -> Result<()> {
    print!("{}", describe(config));
    Ok(())
}
