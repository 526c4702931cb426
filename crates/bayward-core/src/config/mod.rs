//! Configuration loading
//!
//! Settings come from a single TOML file. A missing file at the default
//! location yields the defaults; a missing file named explicitly is an
//! error.

pub mod parser;
pub mod paths;
pub mod schema;

use std::path::Path;

use anyhow::Context;

pub use parser::{parse_bayward_toml, parse_bayward_toml_str};
pub use paths::{config_path_in, default_config_path};
pub use schema::{AllocationConfig, ApplianceConfig, BaywardConfig, SESSION_TOKEN_ENV};

/// Load configuration from `explicit`, or from the default location.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<BaywardConfig> {
    if let Some(path) = explicit {
        return parse_bayward_toml(path);
    }

    let path = default_config_path()?;
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(BaywardConfig::default());
    }

    parse_bayward_toml(&path)
        .with_context(|| format!("Failed to load default config: {}", path.display()))
}
