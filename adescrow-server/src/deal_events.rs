//! Logging of settlement events.
//!
//! Failures inside the scheduled publisher are not visible to any caller;
//! this is where they surface for operators.

use adescrow_core::events::{DealEvent, DealEventReceiver};

/// Drain `events` until every sender is gone.
pub async fn log_deal_events(mut events: DealEventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            DealEvent::StatusChanged { deal_id, from, to } => {
                tracing::debug!(deal_id, from = %from, to = %to, "Deal status changed");
            }
            DealEvent::DisputeRaised { deal_id, reason } => {
                tracing::warn!(deal_id, reason, "Deal flagged for review");
            }
            DealEvent::PayoutSent {
                deal_id,
                destination,
                seqno,
            } => {
                tracing::info!(
                    deal_id,
                    destination,
                    seqno,
                    "Payout broadcast accepted, not yet confirmed on-chain"
                );
            }
            DealEvent::PayoutUnpaid { deal_id, reason } => {
                tracing::warn!(
                    deal_id,
                    reason = %reason,
                    "UNPAID: deal completed without payout, reconcile manually"
                );
            }
        }
    }
    tracing::debug!("Deal event channel closed");
}
