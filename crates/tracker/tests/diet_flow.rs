// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::Address;
use anyhow::Result;
use fdt_fhevm::Int32View;
use fdt_session::{LoadOptions, TypedDataSigner};
use fdt_test_helpers::{CountingSigner, MockEnv};
use fdt_tracker::{DecryptServices, DietTracker, SessionContext, TrackerError};
use fdt_utils::Clock;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

struct Fixture {
    env: MockEnv,
    signer: Arc<CountingSigner>,
    context: watch::Sender<SessionContext>,
    tracker: DietTracker,
}

async fn fixture(signer: CountingSigner) -> Result<Fixture> {
    let env = MockEnv::new()?;
    let signer = Arc::new(signer);
    let user = signer.address();
    let ledger = Arc::new(env.diet_tracker(user));
    let (context, rx) = watch::channel(SessionContext::new(env.chain_id(), user, env.contract()));
    let tracker = DietTracker::new(
        ledger,
        env.instance().await?,
        DecryptServices {
            manager: env.manager.clone(),
            batcher: env.batcher.clone(),
            options: LoadOptions::default(),
        },
        signer.clone(),
        rx,
    );
    Ok(Fixture {
        env,
        signer,
        context,
        tracker,
    })
}

#[tokio::test]
async fn test_positive_balance_scenario() -> Result<()> {
    let f = fixture(CountingSigner::random()).await?;
    f.tracker.submit(2000, 500).await?;
    assert!(f.tracker.snapshot().latest.is_some());

    let record = f.tracker.decrypt_latest_record().await?;
    assert_eq!(record.calories_in, 2000);
    assert_eq!(record.calories_out, 500);
    assert_eq!(record.balance.raw, 1500);
    assert_eq!(record.balance.twos_complement, 1500);
    assert_eq!(record.timestamp, f.env.clock.now());
    assert_eq!(f.tracker.snapshot().decrypted_latest, Some(record));
    assert_eq!(f.signer.prompts(), 1);
    Ok(())
}

#[tokio::test]
async fn test_negative_balance_exposes_both_readings() -> Result<()> {
    let f = fixture(CountingSigner::random()).await?;
    f.tracker.submit(500, 2000).await?;
    let record = f.tracker.decrypt_latest_record().await?;
    assert_eq!(
        record.balance,
        Int32View {
            raw: 4_294_965_796,
            twos_complement: -1500
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_average_reuses_the_signature() -> Result<()> {
    let f = fixture(CountingSigner::random()).await?;
    for (cal_in, cal_out) in [(2000, 500), (1800, 800), (2500, 1000)] {
        f.tracker.submit(cal_in, cal_out).await?;
        f.env.clock.advance_days(1);
    }
    f.tracker.decrypt_latest_record().await?;

    f.tracker.calculate_average_balance(2).await?;
    let average = f.tracker.decrypt_average_balance().await?;
    assert_eq!(average.raw, 1250);
    assert_eq!(f.tracker.snapshot().decrypted_average, Some(average));

    assert_eq!(f.tracker.record_count().await?, 3);
    assert_eq!(f.tracker.timestamps().await?.len(), 3);
    assert_eq!(f.signer.prompts(), 1);
    Ok(())
}

#[tokio::test]
async fn test_nothing_to_decrypt_before_first_submission() -> Result<()> {
    let f = fixture(CountingSigner::random()).await?;
    assert_eq!(f.tracker.refresh_latest_record().await?, None);
    assert!(matches!(
        f.tracker.decrypt_latest_record().await,
        Err(TrackerError::NothingToDecrypt(_))
    ));
    assert!(matches!(
        f.tracker.decrypt_average_balance().await,
        Err(TrackerError::NothingToDecrypt(_))
    ));
    assert_eq!(f.signer.prompts(), 0);
    assert!(f.tracker.is_deployed().await);
    Ok(())
}

#[tokio::test]
async fn test_rejects_invalid_input() -> Result<()> {
    let f = fixture(CountingSigner::random()).await?;
    assert!(matches!(
        f.tracker.submit(0, 100).await,
        Err(TrackerError::InvalidInput(_))
    ));
    assert!(matches!(
        f.tracker.calculate_average_balance(0).await,
        Err(TrackerError::InvalidInput(_))
    ));
    assert_eq!(f.tracker.record_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_result_is_dropped_when_account_changes() -> Result<()> {
    let f = fixture(CountingSigner::random().with_delay(Duration::from_millis(100))).await?;
    f.tracker.submit(2000, 500).await?;

    let switch = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        f.context.send_modify(|ctx| ctx.user = Address::repeat_byte(0x42));
    };
    let (decrypted, _) = tokio::join!(f.tracker.decrypt_latest_record(), switch);

    assert!(matches!(decrypted, Err(TrackerError::Stale(_))));
    assert_eq!(f.tracker.snapshot().decrypted_latest, None);
    Ok(())
}

#[tokio::test]
async fn test_rejected_prompt_can_be_retried() -> Result<()> {
    let f = fixture(CountingSigner::rejecting()).await?;
    f.tracker.submit(2000, 500).await?;
    assert!(matches!(
        f.tracker.decrypt_latest_record().await,
        Err(TrackerError::Session(_))
    ));

    f.signer.set_rejecting(false);
    assert_eq!(f.tracker.decrypt_latest_record().await?.balance.raw, 1500);
    assert_eq!(f.signer.prompts(), 2);
    Ok(())
}
