// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Client for the DietTracker contract.
//!
//! Calorie values are encrypted before they leave the process; reading them back goes through
//! a cached decryption signature so the wallet is prompted once per validity window.

mod context;
mod error;
mod tracker;

pub use context::*;
pub use error::*;
pub use tracker::*;
