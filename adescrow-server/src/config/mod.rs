//! Configuration module for adescrow-server.
//!
//! Handles loading configuration from the TOML file, CLI overrides and
//! secrets taken from the environment, and turns it into the engine's
//! runtime configuration.

pub mod file;

use crate::config::file::FileConfig;
use adescrow_core::config::{
    EngineConfig, LedgerConfig, PayoutConfig, PublisherConfig, RetryConfig,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Secrets supplied through the environment.
#[derive(Clone, Default)]
pub struct Secrets {
    pub toncenter_api_key: Option<String>,
    pub wallet_mnemonic: Option<String>,
    pub bot_token: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("toncenter_api_key", &self.toncenter_api_key.is_some())
            .field("wallet_mnemonic", &self.wallet_mnemonic.is_some())
            .field("bot_token", &self.bot_token.is_some())
            .finish()
    }
}

/// Loaded configuration result containing all parts.
#[derive(Debug)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub engine: EngineConfig,
    /// Present whenever the publisher is enabled.
    pub bot_token: Option<String>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration together with the secrets
    /// 4. Build the loaded configuration
    pub fn load(&self, secrets: Secrets) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content, secrets)
    }

    fn load_str(&self, content: &str, secrets: Secrets) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config, &secrets)?;
        self.build_loaded_config(file_config, secrets)
    }

    fn validate(&self, config: &FileConfig, secrets: &Secrets) -> Result<(), ConfigError> {
        if config.ledger.custodial_address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ledger.custodial_address must not be empty".to_string(),
            ));
        }
        if !(1..=100).contains(&config.ledger.scan_limit) {
            return Err(ConfigError::ValidationError(format!(
                "ledger.scan_limit must be between 1 and 100, got {}",
                config.ledger.scan_limit
            )));
        }
        if config.publisher.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "publisher.interval_secs must be positive".to_string(),
            ));
        }
        if config.retry.attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        if config.publisher.enabled && secrets.bot_token.is_none() {
            return Err(ConfigError::ValidationError(
                "BOT_TOKEN must be set while the publisher is enabled".to_string(),
            ));
        }
        Ok(())
    }

    fn build_loaded_config(
        &self,
        file_config: FileConfig,
        secrets: Secrets,
    ) -> Result<LoadedConfig, ConfigError> {
        let api_base = Url::parse(&file_config.ledger.api_base).map_err(|e| {
            ConfigError::ValidationError(format!(
                "ledger.api_base {} is not a valid URL: {e}",
                file_config.ledger.api_base
            ))
        })?;

        let engine = EngineConfig {
            ledger: LedgerConfig {
                api_base,
                api_key: secrets.toncenter_api_key,
                custodial_address: file_config.ledger.custodial_address.trim().to_string(),
                scan_limit: file_config.ledger.scan_limit,
            },
            payout: PayoutConfig {
                wallet_scheme: file_config.payout.wallet_scheme,
                wallet_id: file_config.payout.wallet_id,
                mnemonic: secrets.wallet_mnemonic,
            },
            publisher: PublisherConfig {
                enabled: file_config.publisher.enabled,
                interval: Duration::from_secs(file_config.publisher.interval_secs),
            },
            retry: RetryConfig {
                max_attempts: file_config.retry.attempts,
                delay: Duration::from_millis(file_config.retry.delay_ms),
            },
        };

        Ok(LoadedConfig {
            listen: file_config.server.listen,
            engine,
            bot_token: secrets.bot_token,
        })
    }
}
