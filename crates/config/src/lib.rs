// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod app_config;
pub mod chain_config;
pub mod contract;
pub mod locate;
pub mod rpc;
mod yaml;

pub use app_config::*;
pub use chain_config::*;
pub use contract::*;
pub use rpc::*;
