//! Configuration schema for bayward.toml

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::allocation::{FixedBackoff, RetryBudget};

/// Environment variable that overrides `appliance.session_token`.
pub const SESSION_TOKEN_ENV: &str = "BAYWARD_SESSION_TOKEN";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaywardConfig {
    #[serde(default)]
    pub appliance: ApplianceConfig,

    #[serde(default)]
    pub allocation: AllocationConfig,
}

/// Connection settings for the management appliance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplianceConfig {
    /// Base URL, e.g. `https://oneview.example.com`
    #[serde(default)]
    pub url: String,

    /// Value sent in the `X-API-Version` header
    #[serde(default = "default_api_version")]
    pub api_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

/// Hardware allocation retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllocationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_api_version() -> u32 {
    800
}

fn default_max_attempts() -> u32 {
    RetryBudget::DEFAULT.attempts()
}

fn default_retry_delay_ms() -> u64 {
    2000
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_version: default_api_version(),
            session_token: None,
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl BaywardConfig {
    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.appliance
            .validate()
            .context("Invalid [appliance] configuration")?;
        self.allocation
            .validate()
            .context("Invalid [allocation] configuration")?;
        Ok(())
    }
}

impl ApplianceConfig {
    /// An empty URL is accepted here and rejected when connecting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.url.is_empty() {
            self.base_url()?;
        }
        Ok(())
    }

    /// Parsed base URL of the appliance.
    pub fn base_url(&self) -> anyhow::Result<Url> {
        if self.url.is_empty() {
            anyhow::bail!("Appliance URL is not configured");
        }
        let url = Url::parse(&self.url)
            .with_context(|| format!("Invalid appliance URL: '{}'", self.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Appliance URL must use http or https: '{}'", self.url);
        }
        Ok(url)
    }

    /// Session token, preferring the environment over the file.
    pub fn session_token(&self) -> anyhow::Result<String> {
        self.session_token_with(std::env::var(SESSION_TOKEN_ENV).ok())
    }

    fn session_token_with(&self, from_env: Option<String>) -> anyhow::Result<String> {
        from_env
            .filter(|token| !token.is_empty())
            .or_else(|| self.session_token.clone().filter(|token| !token.is_empty()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No session token: set appliance.session_token or {}",
                    SESSION_TOKEN_ENV
                )
            })
    }
}

impl AllocationConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(self.max_attempts)
    }

    pub fn backoff(&self) -> FixedBackoff {
        FixedBackoff::new(Duration::from_millis(self.retry_delay_ms))
    }
}
