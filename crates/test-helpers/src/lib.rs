// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod mock_env;
mod signers;
mod utils;

pub use mock_env::*;
pub use signers::*;
pub use utils::*;
