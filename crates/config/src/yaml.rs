// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Read a yaml file and substitute `${VAR}` references from the process environment.
///
/// Unset variables are an error rather than silently expanding to an empty string.
pub fn load_yaml_with_env(file_path: &Path) -> Result<String> {
    let content = fs::read_to_string(file_path)?;
    expand_env(&content)
}

pub fn expand_env(content: &str) -> Result<String> {
    let expanded = shellexpand::env(content)
        .with_context(|| "Could not substitute environment variables in configuration")?;
    Ok(expanded.into_owned())
}
