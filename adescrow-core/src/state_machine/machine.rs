use super::error::DealError;
use super::transitions::{DealAction, next_status};
use crate::entities::DealStatus;
use crate::entities::deal::{DealRecord, NewDeal};
use crate::events::{DealEvent, DealEventSender};
use crate::store::{DealStore, DealVersion};
use crate::utils::clock::now_utc;
use adescrow_sdk::objects::to_nano;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// Metadata recorded when a deal's post goes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub published_at: time::PrimitiveDateTime,
    pub proof_link: String,
}

/// Applies the transition table to stored deals.
///
/// Every operation reads one deal, checks the table, mutates a copy and
/// writes it back conditioned on the version it read. A failed guard leaves
/// the stored record untouched.
#[derive(Clone)]
pub struct DealStateMachine {
    store: Arc<dyn DealStore>,
    events: Option<DealEventSender>,
}

impl DealStateMachine {
    pub fn new(store: Arc<dyn DealStore>) -> Self {
        Self {
            store,
            events: None,
        }
    }

    /// Emit a [`DealEvent`] for every status change and dispute.
    pub fn with_events(mut self, events: DealEventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<dyn DealStore> {
        &self.store
    }

    pub fn events(&self) -> Option<&DealEventSender> {
        self.events.as_ref()
    }

    pub async fn create_deal_request(
        &self,
        advertiser_id: i64,
        channel_id: i64,
        brief: &str,
        amount: Decimal,
    ) -> Result<DealRecord, DealError> {
        if to_nano(amount).filter(|n| *n > 0).is_none() {
            return Err(DealError::InvalidAmount { amount });
        }
        if brief.trim().is_empty() {
            return Err(DealError::EmptyBrief);
        }

        let deal = self
            .store
            .insert(NewDeal {
                advertiser_id,
                channel_id,
                brief: brief.to_string(),
                amount,
                created_at: now_utc(),
            })
            .await?;
        info!(
            deal_id = deal.id,
            advertiser_id,
            channel_id,
            amount = %amount,
            "Deal created"
        );
        Ok(deal)
    }

    pub async fn get_deal(&self, deal_id: i64) -> Result<DealRecord, DealError> {
        self.store
            .get(deal_id)
            .await?
            .ok_or(DealError::NotFound {
                entity: "deal",
                id: deal_id,
            })
    }

    /// Owner accepts the request. The brief becomes the working draft.
    ///
    /// A deal that was paid up front (`Locked`) is scheduled for now; any
    /// other live deal moves on to payment.
    pub async fn accept_deal(&self, deal_id: i64) -> Result<DealRecord, DealError> {
        self.apply(deal_id, DealAction::Accept, |deal, now| {
            deal.draft = Some(deal.brief.clone());
            if deal.status == DealStatus::Locked {
                deal.scheduled_at = Some(now);
            }
            Ok(())
        })
        .await
    }

    pub async fn submit_draft(&self, deal_id: i64, content: &str) -> Result<DealRecord, DealError> {
        let content = content.to_string();
        self.apply(deal_id, DealAction::SubmitDraft, move |deal, _| {
            deal.draft = Some(content);
            Ok(())
        })
        .await
    }

    pub async fn approve_draft(&self, deal_id: i64) -> Result<DealRecord, DealError> {
        self.apply(deal_id, DealAction::ApproveDraft, |_, _| Ok(()))
            .await
    }

    pub async fn request_revision(
        &self,
        deal_id: i64,
        reason: &str,
    ) -> Result<DealRecord, DealError> {
        let reason = reason.to_string();
        self.apply(deal_id, DealAction::RequestRevision, move |deal, _| {
            deal.rejection_reason = Some(reason);
            Ok(())
        })
        .await
    }

    pub async fn reject_deal(&self, deal_id: i64, reason: &str) -> Result<DealRecord, DealError> {
        let reason = reason.to_string();
        self.apply(deal_id, DealAction::Reject, move |deal, _| {
            deal.rejection_reason = Some(reason);
            Ok(())
        })
        .await
    }

    /// Bind a ledger payment to the deal.
    ///
    /// Fails with [`DealError::DuplicatePayment`] when `tx_hash` is already
    /// bound to any other deal, and with [`DealError::PaymentAlreadyBound`]
    /// when this deal already carries a different payment. A bound payment
    /// is never released, so it cannot be credited twice.
    pub async fn lock_funds(&self, deal_id: i64, tx_hash: &str) -> Result<DealRecord, DealError> {
        let tx_hash = tx_hash.trim();
        if tx_hash.is_empty() {
            return Err(DealError::EmptyPaymentReference);
        }
        let tx_hash = tx_hash.to_string();
        self.apply(deal_id, DealAction::LockFunds, move |deal, now| {
            match deal.payment_tx_hash.as_deref() {
                Some(bound) if bound != tx_hash => {
                    return Err(DealError::PaymentAlreadyBound {
                        deal_id: deal.id,
                        bound: bound.to_string(),
                    });
                }
                _ => {}
            }
            if deal.status == DealStatus::AwaitingPayment {
                deal.scheduled_at = Some(now);
            }
            deal.payment_tx_hash = Some(tx_hash);
            Ok(())
        })
        .await
    }

    pub async fn schedule_post(
        &self,
        deal_id: i64,
        at: time::PrimitiveDateTime,
    ) -> Result<DealRecord, DealError> {
        self.apply(deal_id, DealAction::SchedulePost, move |deal, _| {
            deal.scheduled_at = Some(at);
            Ok(())
        })
        .await
    }

    /// Record that the post went live. Called by the scheduled publisher.
    pub async fn complete_deal(
        &self,
        deal_id: i64,
        publication: Publication,
    ) -> Result<DealRecord, DealError> {
        self.apply(deal_id, DealAction::Complete, move |deal, _| {
            deal.published_at = Some(publication.published_at);
            deal.proof_link = Some(publication.proof_link);
            Ok(())
        })
        .await
    }

    /// Flag the deal for human review. Allowed in every status and never
    /// changes it.
    pub async fn raise_dispute(&self, deal_id: i64, reason: &str) -> Result<DealRecord, DealError> {
        let current = self.get_deal(deal_id).await?;
        let mut updated = current.clone();
        updated.is_disputed = true;
        updated.dispute_reason = Some(reason.to_string());
        updated.updated_at = touched_at(&current);

        self.store
            .save_if_unchanged(DealVersion::of(&current), &updated)
            .await?;

        warn!(
            deal_id,
            status = %updated.status,
            reason,
            "Dispute raised on deal"
        );
        self.emit(DealEvent::DisputeRaised {
            deal_id,
            reason: reason.to_string(),
        });
        Ok(updated)
    }

    /// The single place a deal's status is assigned.
    async fn apply<F>(
        &self,
        deal_id: i64,
        action: DealAction,
        effect: F,
    ) -> Result<DealRecord, DealError>
    where
        F: FnOnce(&mut DealRecord, time::PrimitiveDateTime) -> Result<(), DealError>,
    {
        let current = self.get_deal(deal_id).await?;
        let Some(next) = next_status(current.status, action) else {
            debug!(deal_id, status = %current.status, action = %action, "Transition refused");
            return Err(DealError::InvalidTransition {
                status: current.status,
                action,
            });
        };

        let now = touched_at(&current);
        let mut updated = current.clone();
        // Effects observe the source status; the target is assigned afterwards.
        if let Err(e) = effect(&mut updated, now) {
            debug!(deal_id, status = %current.status, action = %action, error = %e, "Transition refused");
            return Err(e);
        }
        updated.status = next;
        updated.updated_at = now;

        self.store
            .save_if_unchanged(DealVersion::of(&current), &updated)
            .await?;

        info!(
            deal_id,
            action = %action,
            from = %current.status,
            to = %next,
            "Deal transitioned"
        );
        self.emit(DealEvent::StatusChanged {
            deal_id,
            from: current.status,
            to: next,
        });
        Ok(updated)
    }

    pub(crate) fn emit(&self, event: DealEvent) {
        let Some(tx) = &self.events else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = ?event, "Deal event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Deal event receiver dropped");
            }
        }
    }
}

/// Timestamp for a mutation of `current`, strictly later than its last one so
/// the version check always sees a change.
fn touched_at(current: &DealRecord) -> time::PrimitiveDateTime {
    let now = now_utc();
    let floor = current.updated_at + time::Duration::microseconds(1);
    now.max(floor)
}
