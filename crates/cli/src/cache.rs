// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::cache_purge;
use anyhow::Result;
use clap::Subcommand;
use fdt_config::AppConfig;

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Forget every stored decryption signature. The wallet is prompted again on the next read.
    Purge,
}

pub async fn execute(command: CacheCommands, config: &AppConfig) -> Result<()> {
    match command {
        CacheCommands::Purge => cache_purge::execute(config).await?,
    };

    Ok(())
}
