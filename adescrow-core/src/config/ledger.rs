//! Ledger access configuration.

use url::Url;

#[derive(Clone)]
pub struct LedgerConfig {
    /// Root of the TonCenter v2 API.
    pub api_base: Url,
    /// TonCenter API key, sent as `X-API-Key` when present.
    pub api_key: Option<String>,
    /// Platform custodial wallet: receives deal payments and sends payouts.
    pub custodial_address: String,
    /// How many recent incoming transfers a payment check scans.
    pub scan_limit: u32,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("api_base", &self.api_base.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("custodial_address", &self.custodial_address)
            .field("scan_limit", &self.scan_limit)
            .finish()
    }
}
