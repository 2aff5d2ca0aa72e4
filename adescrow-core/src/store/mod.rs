//! Persistence seam for deal records.
//!
//! The state machine only ever talks to a [`DealStore`]. Two implementations
//! exist: [`PgDealStore`] for production and [`InMemoryDealStore`] for tests
//! and local runs. Both enforce the same two rules:
//!
//! - `payment_tx_hash` is unique across all deals.
//! - A write only lands if the row still has the status and `updated_at`
//!   the writer observed when it read it.

mod memory;
mod postgres;

pub use memory::InMemoryDealStore;
pub use postgres::PgDealStore;

use crate::entities::DealStatus;
use crate::entities::deal::{DealRecord, NewDeal};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("payment transaction {tx_hash} is already bound to another deal")]
    DuplicatePayment { tx_hash: String },

    #[error("deal {deal_id} was modified concurrently")]
    Conflict { deal_id: i64 },

    #[error("deal {deal_id} does not exist")]
    Missing { deal_id: i64 },
}

/// The version of a record a writer read, used as the precondition of its write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DealVersion {
    pub status: DealStatus,
    pub updated_at: time::PrimitiveDateTime,
}

impl DealVersion {
    pub fn of(record: &DealRecord) -> Self {
        Self {
            status: record.status,
            updated_at: record.updated_at,
        }
    }
}

#[async_trait]
pub trait DealStore: Send + Sync {
    /// Insert a new deal and return it with its assigned id.
    async fn insert(&self, deal: NewDeal) -> Result<DealRecord, StoreError>;

    async fn get(&self, deal_id: i64) -> Result<Option<DealRecord>, StoreError>;

    /// Replace the stored record with `record` if the stored row still matches `expected`.
    async fn save_if_unchanged(
        &self,
        expected: DealVersion,
        record: &DealRecord,
    ) -> Result<(), StoreError>;

    /// Deals in `Scheduled` with `scheduled_at <= now`, oldest first.
    async fn ready_to_publish(
        &self,
        now: time::PrimitiveDateTime,
    ) -> Result<Vec<DealRecord>, StoreError>;
}
