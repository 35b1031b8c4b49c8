// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Decryption authorization sessions.
//!
//! Turning an encrypted handle into a value the user can read takes an encryption instance for
//! the connected chain ([`InstanceResolver`]), a wallet-signed authorization for an ephemeral
//! keypair ([`SignatureManager`], persisted by [`SignatureCache`]) and one authorized decrypt
//! round trip ([`DecryptBatcher`]).

mod batcher;
mod cache;
mod cache_key;
mod error;
mod factory;
mod manager;
mod resolver;
mod signature;
mod signer;

pub use batcher::*;
pub use cache::*;
pub use cache_key::*;
pub use error::*;
pub use factory::*;
pub use manager::*;
pub use resolver::*;
pub use signature::*;
pub use signer::*;
