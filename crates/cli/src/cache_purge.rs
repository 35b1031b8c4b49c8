// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::stack::open_signature_cache;
use anyhow::Result;
use fdt_config::{AppConfig, StorageConfig};

pub async fn execute(config: &AppConfig) -> Result<()> {
    if let StorageConfig::Memory = config.storage() {
        println!("Signatures are kept in memory only. Nothing to purge.");
        return Ok(());
    }
    let cache = open_signature_cache(config).await?;
    cache.purge().await?;
    println!(
        "Decryption signatures in {} have been purged.",
        config.db_file().display()
    );
    Ok(())
}
