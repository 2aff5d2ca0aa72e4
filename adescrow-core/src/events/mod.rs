//! Deal events for observability and manual reconciliation.
//!
//! The state machine emits `StatusChanged` and `DisputeRaised`; the
//! scheduled publisher emits `PayoutSent` and `PayoutUnpaid`. Events carry
//! identifiers only, consumers re-read the deal if they need more.

pub mod channels;
pub mod types;

pub use channels::{DEFAULT_CHANNEL_BUFFER, DealEventReceiver, DealEventSender, deal_event_channel};
pub use types::{DealEvent, UnpaidReason};
