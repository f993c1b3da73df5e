//! Conversion from command-line flags to `AppConfig`

use crate::cli::main_impl::Cli;
use crate::config::{AppConfig, AppConfigBuilder};
use anyhow::{Context, Result};

const REDACTED: &str = "********";

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Defaults, then file, then environment, then flags
    pub(crate) fn from_cli(cli: &Cli) -> Result<AppConfig> {
        let loaded = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
        Self::apply_flags(cli, loaded)
    }

    fn apply_flags(cli: &Cli, config: AppConfig) -> Result<AppConfig> {
        let mut builder = AppConfigBuilder::from_config(config);
        if let Some(bind) = &cli.bind {
            builder = builder.bind(bind.clone());
        }
        if let Some(secs) = cli.request_timeout {
            builder = builder.request_timeout_secs(secs);
        }
        if let Some(size) = cli.page_size {
            builder = builder.page_size(size);
        }
        builder.build().context("Invalid configuration")
    }

    /// Validate flags that the config layer would otherwise clamp silently
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(secs) = cli.request_timeout {
            if !(1..=600).contains(&secs) {
                anyhow::bail!("--request-timeout must be 1-600 seconds, got {secs}");
            }
        }
        if cli.page_size == Some(0) {
            anyhow::bail!("--page-size must be at least 1");
        }
        if let Some(path) = &cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }
        Ok(())
    }

    /// Copy of `config` safe to print
    pub(crate) fn redacted(config: &AppConfig) -> AppConfig {
        let mut config = config.clone();
        for secret in [
            &mut config.hosting.api_secret,
            &mut config.removal.api_key,
            &mut config.payments.client_secret,
        ] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        config
    }
}
