//! Minor-unit conversion and the wallet deep link used for manual payments.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Nanotons per TON.
pub const NANO_PER_TON: u64 = 1_000_000_000;

/// Convert a TON amount into nanotons, truncating anything below one nanoton.
///
/// Returns `None` for negative amounts or values that do not fit in `u64`.
pub fn to_nano(amount: Decimal) -> Option<u64> {
    amount
        .checked_mul(Decimal::from(NANO_PER_TON))?
        .trunc()
        .to_u64()
}

/// A `ton://transfer` deep link understood by Tonkeeper and compatible wallets.
///
/// ```text
/// ton://transfer/{custodial_address}?amount={nanotons}&text={deal_id}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLink {
    pub address: String,
    pub amount_nano: u64,
    pub text: String,
}

impl PaymentLink {
    /// Build the link for paying `amount` TON into `address` with the deal id as comment.
    ///
    /// Returns `None` if `amount` cannot be expressed in nanotons.
    pub fn for_deal(address: &str, deal_id: i64, amount: Decimal) -> Option<Self> {
        Some(Self {
            address: address.to_string(),
            amount_nano: to_nano(amount)?,
            text: deal_id.to_string(),
        })
    }
}

impl std::fmt::Display for PaymentLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ton://transfer/{}?amount={}&text={}",
            self.address,
            self.amount_nano,
            urlencoding::encode(&self.text)
        )
    }
}
