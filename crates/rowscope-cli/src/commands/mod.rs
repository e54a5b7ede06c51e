//! CLI command implementations for rowscope.

pub mod check;
pub mod operators;
pub mod rewrite;

use std::path::Path;

use anyhow::{Context, Result};
use rowscope_core::ScopeConfig;

/// Load configuration from `path`, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<ScopeConfig> {
    match path {
        Some(path) => ScopeConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ScopeConfig::default()),
    }
}
