use super::transitions::DealAction;
use crate::entities::DealStatus;
use crate::store::StoreError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures of the deal operations, each with a stable [`kind`](DealError::kind).
#[derive(Debug, Error)]
pub enum DealError {
    #[error("cannot {action} a deal in status {status}")]
    InvalidTransition {
        status: DealStatus,
        action: DealAction,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("payment transaction {tx_hash} is already bound to another deal")]
    DuplicatePayment { tx_hash: String },

    #[error("deal {deal_id} is already paid by {bound}")]
    PaymentAlreadyBound { deal_id: i64, bound: String },

    #[error("deal amount must be positive, got {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("deal brief must not be empty")]
    EmptyBrief,

    #[error("payment transaction reference must not be empty")]
    EmptyPaymentReference,

    #[error("deal {deal_id} was modified concurrently, reload and retry")]
    Conflict { deal_id: i64 },

    #[error("storage error: {0}")]
    Storage(#[source] sqlx::Error),
}

impl DealError {
    pub fn kind(&self) -> &'static str {
        match self {
            DealError::InvalidTransition { .. } => "invalid_transition",
            DealError::NotFound { .. } => "not_found",
            DealError::DuplicatePayment { .. } => "duplicate_payment",
            DealError::PaymentAlreadyBound { .. } => "payment_already_bound",
            DealError::InvalidAmount { .. } => "invalid_amount",
            DealError::EmptyBrief => "empty_brief",
            DealError::EmptyPaymentReference => "empty_payment_reference",
            DealError::Conflict { .. } => "conflict",
            DealError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for DealError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => DealError::Storage(e),
            StoreError::DuplicatePayment { tx_hash } => DealError::DuplicatePayment { tx_hash },
            StoreError::Conflict { deal_id } => DealError::Conflict { deal_id },
            StoreError::Missing { deal_id } => DealError::NotFound {
                entity: "deal",
                id: deal_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_names_status_and_action() {
        let e = DealError::InvalidTransition {
            status: DealStatus::Completed,
            action: DealAction::Accept,
        };
        assert_eq!(e.to_string(), "cannot accept_deal a deal in status COMPLETED");
        assert_eq!(e.kind(), "invalid_transition");
    }

    #[test]
    fn test_store_errors_keep_their_kind() {
        let dup: DealError = StoreError::DuplicatePayment {
            tx_hash: "0xabc".into(),
        }
        .into();
        assert_eq!(dup.kind(), "duplicate_payment");

        let missing: DealError = StoreError::Missing { deal_id: 7 }.into();
        assert!(matches!(missing, DealError::NotFound { entity: "deal", id: 7 }));
    }
}
