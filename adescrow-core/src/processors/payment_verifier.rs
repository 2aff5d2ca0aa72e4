//! Payment verification against the custodial wallet.
//!
//! Matching is deliberately weak: any recent incoming transfer of at least
//! the expected value is accepted, whether or not its memo names the deal.
//! Replay protection comes solely from the store's uniqueness constraint on
//! `payment_tx_hash`, so one transfer can never be bound to two deals.
//! Production deployments must tighten this to a mandatory memo match.

use crate::config::LedgerConfig;
use crate::entities::deal::DealRecord;
use crate::ledger::{IncomingTransfer, LedgerClient, LedgerError};
use crate::state_machine::{DealAction, DealError, DealStateMachine, next_status};
use crate::utils::retry::RetryPolicy;
use adescrow_sdk::objects::{PaymentLink, to_nano};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Deal(#[from] DealError),

    #[error("amount {amount} cannot be expressed in minor units")]
    InvalidAmount { amount: Decimal },
}

/// Outcome of [`PaymentVerifier::confirm_payment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCheck {
    /// A payment was found and bound; the deal after `lock_funds`.
    Confirmed(DealRecord),
    /// No qualifying transfer yet. Not an error.
    NotYetPaid,
}

#[derive(Clone)]
pub struct PaymentVerifier {
    ledger: Arc<dyn LedgerClient>,
    custodial_address: String,
    scan_limit: u32,
    retry: RetryPolicy,
}

impl PaymentVerifier {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: &LedgerConfig, retry: RetryPolicy) -> Self {
        Self {
            ledger,
            custodial_address: config.custodial_address.clone(),
            scan_limit: config.scan_limit,
            retry,
        }
    }

    /// Look for a transfer paying `expected_amount` for `deal_id`.
    ///
    /// Returns the first qualifying transaction reference, or `None` when
    /// nothing qualifies. Only the ledger query is retried.
    pub async fn find_payment(
        &self,
        deal_id: i64,
        expected_amount: Decimal,
    ) -> Result<Option<String>, PaymentError> {
        // A zero threshold would let any transfer qualify.
        let expected_nano = to_nano(expected_amount)
            .filter(|n| *n > 0)
            .ok_or(PaymentError::InvalidAmount {
                amount: expected_amount,
            })?;

        let transfers = self
            .retry
            .run("list_incoming_transfers", |_| {
                self.ledger
                    .list_incoming_transfers(&self.custodial_address, self.scan_limit)
            })
            .await?;

        let found = transfers
            .iter()
            .find(|t| transfer_qualifies(t, deal_id, expected_nano))
            .map(|t| t.tx_ref.clone());

        match &found {
            Some(tx_ref) => info!(deal_id, tx_ref, "Payment found"),
            None => debug!(
                deal_id,
                scanned = transfers.len(),
                expected_nano,
                "No qualifying payment yet"
            ),
        }
        Ok(found)
    }

    /// Check the ledger for the deal's payment and bind it with `lock_funds`.
    ///
    /// Fails with [`DealError::InvalidTransition`] before touching the ledger
    /// when the deal is not in a status that accepts funds.
    pub async fn confirm_payment(
        &self,
        machine: &DealStateMachine,
        deal_id: i64,
    ) -> Result<PaymentCheck, PaymentError> {
        let deal = machine.get_deal(deal_id).await?;
        if next_status(deal.status, DealAction::LockFunds).is_none() {
            return Err(DealError::InvalidTransition {
                status: deal.status,
                action: DealAction::LockFunds,
            }
            .into());
        }

        let Some(tx_ref) = self.find_payment(deal.id, deal.amount).await? else {
            return Ok(PaymentCheck::NotYetPaid);
        };
        let deal = machine.lock_funds(deal.id, &tx_ref).await?;
        Ok(PaymentCheck::Confirmed(deal))
    }

    /// Deep link for paying a deal from a wallet app.
    pub fn payment_link(&self, deal_id: i64, amount: Decimal) -> Result<PaymentLink, PaymentError> {
        PaymentLink::for_deal(&self.custodial_address, deal_id, amount)
            .ok_or(PaymentError::InvalidAmount { amount })
    }
}

/// Too small is always refused; otherwise a memo naming the deal or the
/// value alone is enough.
fn transfer_qualifies(transfer: &IncomingTransfer, deal_id: i64, expected_nano: u64) -> bool {
    if transfer.value < expected_nano {
        return false;
    }
    transfer.memo.contains(&deal_id.to_string()) || transfer.value >= expected_nano
}
