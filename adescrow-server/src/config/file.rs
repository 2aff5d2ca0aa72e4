//! TOML file configuration structures.
//!
//! These structs directly map to the `adescrow.toml` file format. Secrets
//! are never read from the file; they come from the environment.

use adescrow_core::ledger::TESTNET_API_BASE;
use adescrow_sdk::objects::WalletScheme;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub payout: PayoutConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Ledger section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// TonCenter v2 API root. Defaults to testnet.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Custodial wallet receiving deal payments and sending payouts.
    pub custodial_address: String,
    /// Number of recent transfers scanned per payment check (1..=100).
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
}

fn default_api_base() -> String {
    TESTNET_API_BASE.to_string()
}

fn default_scan_limit() -> u32 {
    20
}

/// Payout section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    #[serde(default = "default_wallet_scheme")]
    pub wallet_scheme: WalletScheme,
    /// Subwallet id, when it differs from the scheme default.
    #[serde(default)]
    pub wallet_id: Option<u32>,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            wallet_scheme: default_wallet_scheme(),
            wallet_id: None,
        }
    }
}

fn default_wallet_scheme() -> WalletScheme {
    WalletScheme::V4r2
}

/// Scheduled publisher section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

/// Retry section, applied to every ledger call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[ledger]
api_base = "https://toncenter.com/api/v2/"
custodial_address = "EQCustodial"
scan_limit = 50

[payout]
wallet_scheme = "v4r2"
wallet_id = 698983191

[publisher]
enabled = false
interval_secs = 30

[retry]
attempts = 5
delay_ms = 500
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.ledger.api_base, "https://toncenter.com/api/v2/");
        assert_eq!(config.ledger.scan_limit, 50);
        assert_eq!(config.payout.wallet_scheme, WalletScheme::V4r2);
        assert_eq!(config.payout.wallet_id, Some(698983191));
        assert!(!config.publisher.enabled);
        assert_eq!(config.publisher.interval_secs, 30);
        assert_eq!(config.retry.attempts, 5);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
[ledger]
custodial_address = "EQCustodial"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.ledger.api_base, TESTNET_API_BASE);
        assert_eq!(config.ledger.scan_limit, 20);
        assert_eq!(config.payout.wallet_scheme, WalletScheme::V4r2);
        assert!(config.publisher.enabled);
        assert_eq!(config.publisher.interval_secs, 60);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.delay_ms, 2000);
    }

    #[test]
    fn test_unknown_wallet_scheme_is_rejected() {
        let toml_str = r#"
[ledger]
custodial_address = "EQCustodial"

[payout]
wallet_scheme = "v9"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
