// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod api;
mod crypto;
mod instance;

pub use api::*;
pub use crypto::*;
pub use instance::*;
