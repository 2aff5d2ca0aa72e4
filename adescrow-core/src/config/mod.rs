//! Runtime configuration of the settlement engine.
//!
//! These are the validated values the engine components are built from.
//! Loading and parsing is handled by the server crate.

mod ledger;
mod payout;
mod publisher;
mod retry;

pub use ledger::LedgerConfig;
pub use payout::PayoutConfig;
pub use publisher::PublisherConfig;
pub use retry::RetryConfig;

/// Everything the engine needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub ledger: LedgerConfig,
    pub payout: PayoutConfig,
    pub publisher: PublisherConfig,
    pub retry: RetryConfig,
}
