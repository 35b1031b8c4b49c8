// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::{
    primitives::{Address, Bytes},
    signers::local::PrivateKeySigner,
};
use anyhow::bail;
use async_trait::async_trait;
use fdt_fhevm::Eip712Payload;
use fdt_session::TypedDataSigner;
use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use tracing::debug;

/// Wallet stand-in that counts how often it was asked to sign and can be told to refuse
pub struct CountingSigner {
    inner: PrivateKeySigner,
    prompts: AtomicUsize,
    rejecting: AtomicBool,
    delay: Duration,
}

impl CountingSigner {
    pub fn new(inner: PrivateKeySigner) -> Self {
        Self {
            inner,
            prompts: AtomicUsize::new(0),
            rejecting: AtomicBool::new(false),
            delay: Duration::ZERO,
        }
    }

    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    /// A signer that rejects every prompt until told otherwise
    pub fn rejecting() -> Self {
        let signer = Self::random();
        signer.set_rejecting(true);
        signer
    }

    /// Hold every prompt open for `delay`, like a user reading the wallet popup
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &PrivateKeySigner {
        &self.inner
    }
}

#[async_trait]
impl TypedDataSigner for CountingSigner {
    fn address(&self) -> Address {
        TypedDataSigner::address(&self.inner)
    }

    async fn sign_typed_data(&self, payload: &Eip712Payload) -> anyhow::Result<Bytes> {
        let prompt = self.prompts.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("signing prompt #{}", prompt);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.rejecting.load(Ordering::SeqCst) {
            bail!("User rejected the request");
        }
        self.inner.sign_typed_data(payload).await
    }
}
