use crate::entities::DealStatus;

/// Why a completed deal's funds were not released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpaidReason {
    /// The channel owner has no registered wallet.
    NoWallet { owner_id: i64 },
    /// The payout was attempted and failed.
    PayoutFailed { error: String },
}

impl std::fmt::Display for UnpaidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnpaidReason::NoWallet { owner_id } => {
                write!(f, "owner {owner_id} has no registered wallet")
            }
            UnpaidReason::PayoutFailed { error } => write!(f, "payout failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealEvent {
    StatusChanged {
        deal_id: i64,
        from: DealStatus,
        to: DealStatus,
    },
    DisputeRaised {
        deal_id: i64,
        reason: String,
    },
    /// The payout broadcast was accepted by the ledger (not yet confirmed on-chain).
    PayoutSent {
        deal_id: i64,
        destination: String,
        seqno: u32,
    },
    /// The deal is `Completed` but the channel owner was not paid.
    PayoutUnpaid {
        deal_id: i64,
        reason: UnpaidReason,
    },
}
