//! Deal status and snapshot types for API responses.

use serde::{Deserialize, Serialize};

/// Lifecycle position of a deal.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `adescrow-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    Created,
    Accepted,
    DraftSubmitted,
    RevisionRequested,
    AwaitingPayment,
    Locked,
    Scheduled,
    Published,
    Completed,
    Cancelled,
    Rejected,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Created => "CREATED",
            DealStatus::Accepted => "ACCEPTED",
            DealStatus::DraftSubmitted => "DRAFT_SUBMITTED",
            DealStatus::RevisionRequested => "REVISION_REQUESTED",
            DealStatus::AwaitingPayment => "AWAITING_PAYMENT",
            DealStatus::Locked => "LOCKED",
            DealStatus::Scheduled => "SCHEDULED",
            DealStatus::Published => "PUBLISHED",
            DealStatus::Completed => "COMPLETED",
            DealStatus::Cancelled => "CANCELLED",
            DealStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a deal as returned by every state-machine operation.
///
/// Timestamps are unix seconds (UTC). `amount` is the decimal string in TON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealSnapshot {
    pub id: i64,
    pub advertiser_id: i64,
    pub channel_id: i64,
    pub status: DealStatus,
    pub amount: String,
    pub brief: String,
    pub draft: Option<String>,
    pub rejection_reason: Option<String>,
    pub scheduled_at: Option<i64>,
    pub published_at: Option<i64>,
    pub proof_link: Option<String>,
    pub escrow_wallet: Option<String>,
    pub payment_tx_hash: Option<String>,
    pub is_disputed: bool,
    pub dispute_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
