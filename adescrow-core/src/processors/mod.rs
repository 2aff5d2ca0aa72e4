//! Components that drive deals from outside events.
//!
//! - `PaymentVerifier`: scans the custodial wallet for a deal's payment and
//!   binds it through `lock_funds`
//! - `PayoutEngine`: signs and broadcasts the transfer releasing a deal's funds
//! - `ScheduledPublisher`: periodically publishes due deals, completes them
//!   and pays the channel owner
//! - `ChannelPublisher`: the seam the scheduled publisher posts through

pub mod channel_publisher;
pub mod payment_verifier;
pub mod payout_engine;
pub mod scheduled_publisher;

pub use channel_publisher::{
    ChannelPublisher, PublishError, PublishedPost, TelegramChannelPublisher,
};
pub use payment_verifier::{PaymentCheck, PaymentError, PaymentVerifier};
pub use payout_engine::{PayoutEngine, PayoutError, PayoutReceipt};
pub use scheduled_publisher::{
    BatchRun, DealRunError, DealRunResult, PublishOutcome, PublisherHandle, ScheduledPublisher,
};
