use serde::{Deserialize, Serialize};

/// TON wallet contract versions a signer may be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletScheme {
    V3r2,
    V4r2,
    V5r1,
}

impl std::fmt::Display for WalletScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletScheme::V3r2 => write!(f, "v3r2"),
            WalletScheme::V4r2 => write!(f, "v4r2"),
            WalletScheme::V5r1 => write!(f, "v5r1"),
        }
    }
}
