//! Payout signing configuration.

use adescrow_sdk::objects::WalletScheme;

#[derive(Clone)]
pub struct PayoutConfig {
    pub wallet_scheme: WalletScheme,
    /// Subwallet id; the scheme default when absent.
    pub wallet_id: Option<u32>,
    /// Mnemonic of the custodial wallet. Without it every payout fails with
    /// a configuration error.
    pub mnemonic: Option<String>,
}

impl std::fmt::Debug for PayoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayoutConfig")
            .field("wallet_scheme", &self.wallet_scheme)
            .field("wallet_id", &self.wallet_id)
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
