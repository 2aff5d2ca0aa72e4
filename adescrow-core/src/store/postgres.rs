use super::{DealStore, DealVersion, StoreError};
use crate::entities::deal::{
    DealRecord, GetDealById, GetDealsReadyToPublish, InsertDeal, NewDeal,
    PAYMENT_TX_HASH_CONSTRAINT, UpdateDealIfUnchanged,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;

/// Postgres-backed deal store.
#[derive(Clone)]
pub struct PgDealStore {
    processor: DatabaseProcessor,
}

impl PgDealStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
        }
    }
}

/// Map a write failure, surfacing the `payment_tx_hash` constraint as its own kind.
fn map_write_error(error: sqlx::Error, record: &DealRecord) -> StoreError {
    let is_duplicate_payment = match &error {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(PAYMENT_TX_HASH_CONSTRAINT)
        }
        _ => false,
    };
    if is_duplicate_payment {
        return StoreError::DuplicatePayment {
            tx_hash: record.payment_tx_hash.clone().unwrap_or_default(),
        };
    }
    StoreError::Database(error)
}

#[async_trait]
impl DealStore for PgDealStore {
    async fn insert(&self, deal: NewDeal) -> Result<DealRecord, StoreError> {
        let record = self.processor.process(InsertDeal { deal }).await?;
        Ok(record)
    }

    async fn get(&self, deal_id: i64) -> Result<Option<DealRecord>, StoreError> {
        let record = self.processor.process(GetDealById { deal_id }).await?;
        Ok(record)
    }

    async fn save_if_unchanged(
        &self,
        expected: DealVersion,
        record: &DealRecord,
    ) -> Result<(), StoreError> {
        let updated = self
            .processor
            .process(UpdateDealIfUnchanged {
                record: record.clone(),
                expected_status: expected.status,
                expected_updated_at: expected.updated_at,
            })
            .await
            .map_err(|e| map_write_error(e, record))?;

        if updated == 0 {
            return Err(StoreError::Conflict { deal_id: record.id });
        }
        Ok(())
    }

    async fn ready_to_publish(
        &self,
        now: time::PrimitiveDateTime,
    ) -> Result<Vec<DealRecord>, StoreError> {
        let deals = self.processor.process(GetDealsReadyToPublish { now }).await?;
        Ok(deals)
    }
}
