// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::stack::{select_chain, ClientStack};
use crate::helpers::wallet::load_wallet;
use anyhow::Result;
use fdt_config::AppConfig;
use fdt_evm::DietTrackerRead;
use fdt_fhevm::Int32View;
use fdt_tracker::{DietTracker, SessionContext};
use std::sync::Arc;
use tracing::info;

fn format_balance(balance: &Int32View) -> String {
    if balance.twos_complement < 0 {
        format!("{} (raw {})", balance.twos_complement, balance.raw)
    } else {
        balance.raw.to_string()
    }
}

pub async fn execute(
    config: &AppConfig,
    chain: Option<String>,
    calories_in: u32,
    calories_out: u32,
    average: Option<u64>,
) -> Result<()> {
    let chain = select_chain(config, chain.as_deref())?;
    let wallet = load_wallet(config, &chain)?;
    let user = wallet.signer.address();
    info!("Running demo on {} as {}", chain.name, user);

    let stack = ClientStack::build(config, chain).await?;
    let instance = stack.instance(&config.mock_chains()).await?;
    let ledger = stack.ledger(&wallet).await?;
    let context = SessionContext::new(stack.chain.chain_id, user, ledger.address());

    let tracker = DietTracker::new(
        ledger,
        instance,
        stack.services.clone(),
        Arc::new(wallet.signer),
        context.fixed(),
    );

    let tx = tracker.submit(calories_in, calories_out).await?;
    println!("Submitted {} in / {} out in {}", calories_in, calories_out, tx);

    let record = tracker.decrypt_latest_record().await?;
    println!("Latest record at {}", record.timestamp);
    println!("  calories in:  {}", record.calories_in);
    println!("  calories out: {}", record.calories_out);
    println!("  balance:      {}", format_balance(&record.balance));

    if let Some(num_records) = average {
        let count = tracker.record_count().await?;
        tracker.calculate_average_balance(num_records).await?;
        let balance = tracker.decrypt_average_balance().await?;
        println!(
            "Average balance over the last {} of {} records: {}",
            num_records.min(count),
            count,
            format_balance(&balance)
        );
    }

    Ok(())
}
