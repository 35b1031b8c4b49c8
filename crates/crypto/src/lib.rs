// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod cipher;
mod password_manager;
mod sealed_store;

pub use cipher::Cipher;
pub use password_manager::*;
pub use sealed_store::*;
