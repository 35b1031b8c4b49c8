// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Client side of the FHEVM protocol.
//!
//! [`FhevmInstance`] is the capability the session layer drives: it hands out ephemeral
//! keypairs, renders the EIP-712 authorization a wallet signs, encrypts inputs and performs user
//! decryption. [`MockInstance`] serves local development chains from an in-process
//! [`MockCoprocessor`]; [`RelayerInstance`] talks to a relayer over HTTP.

mod chain;
mod eip712;
mod error;
mod handle;
mod input;
mod instance;
pub mod mock;
pub mod relayer;
mod types;

pub use chain::*;
pub use eip712::*;
pub use error::*;
pub use handle::*;
pub use input::*;
pub use instance::*;
pub use mock::{MockCoprocessor, MockInstance};
pub use relayer::{FheCrypto, RelayerInstance};
pub use types::*;
