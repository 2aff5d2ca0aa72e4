use super::{DealStore, DealVersion, StoreError};
use crate::entities::DealStatus;
use crate::entities::deal::{DealRecord, NewDeal};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory deal store.
///
/// Applies the same uniqueness and compare-and-set rules as the Postgres
/// store, so it can stand in for it in tests and local runs.
#[derive(Default, Clone)]
pub struct InMemoryDealStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    deals: BTreeMap<i64, DealRecord>,
    last_id: i64,
}

impl InMemoryDealStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a record in place as-is, bypassing the state machine.
    ///
    /// Used to seed fixtures in a given status.
    pub async fn seed(&self, record: DealRecord) {
        let mut inner = self.inner.write().await;
        inner.last_id = inner.last_id.max(record.id);
        inner.deals.insert(record.id, record);
    }
}

#[async_trait]
impl DealStore for InMemoryDealStore {
    async fn insert(&self, deal: NewDeal) -> Result<DealRecord, StoreError> {
        let mut inner = self.inner.write().await;
        inner.last_id += 1;
        let record = DealRecord {
            id: inner.last_id,
            advertiser_id: deal.advertiser_id,
            channel_id: deal.channel_id,
            status: DealStatus::Created,
            amount: deal.amount,
            brief: deal.brief,
            draft: None,
            rejection_reason: None,
            scheduled_at: None,
            published_at: None,
            proof_link: None,
            escrow_wallet: None,
            payment_tx_hash: None,
            is_disputed: false,
            dispute_reason: None,
            created_at: deal.created_at,
            updated_at: deal.created_at,
        };
        inner.deals.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, deal_id: i64) -> Result<Option<DealRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.deals.get(&deal_id).cloned())
    }

    async fn save_if_unchanged(
        &self,
        expected: DealVersion,
        record: &DealRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let Some(current) = inner.deals.get(&record.id) else {
            return Err(StoreError::Missing { deal_id: record.id });
        };
        if DealVersion::of(current) != expected {
            return Err(StoreError::Conflict { deal_id: record.id });
        }

        if let Some(tx_hash) = &record.payment_tx_hash {
            let taken = inner
                .deals
                .values()
                .any(|d| d.id != record.id && d.payment_tx_hash.as_ref() == Some(tx_hash));
            if taken {
                return Err(StoreError::DuplicatePayment {
                    tx_hash: tx_hash.clone(),
                });
            }
        }

        inner.deals.insert(record.id, record.clone());
        Ok(())
    }

    async fn ready_to_publish(
        &self,
        now: time::PrimitiveDateTime,
    ) -> Result<Vec<DealRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut ready: Vec<DealRecord> = inner
            .deals
            .values()
            .filter(|d| d.status == DealStatus::Scheduled)
            .filter(|d| d.scheduled_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();
        ready.sort_by_key(|d| (d.scheduled_at, d.id));
        Ok(ready)
    }
}
