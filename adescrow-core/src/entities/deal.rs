//! Deal records and their SQL queries.
//!
//! The `deals` table is owned by the external schema. This module expects:
//!
//! ```text
//! id BIGSERIAL PRIMARY KEY, advertiser_id BIGINT, channel_id BIGINT,
//! status deal_status, amount NUMERIC, brief TEXT, draft TEXT NULL,
//! rejection_reason TEXT NULL, scheduled_at TIMESTAMP NULL, published_at TIMESTAMP NULL,
//! proof_link TEXT NULL, escrow_wallet TEXT NULL, payment_tx_hash TEXT NULL UNIQUE,
//! is_disputed BOOLEAN, dispute_reason TEXT NULL, created_at TIMESTAMP, updated_at TIMESTAMP
//! ```

use crate::entities::DealStatus;
use crate::framework::DatabaseProcessor;
use crate::utils::clock::unix_seconds;
use adescrow_sdk::objects::DealSnapshot;
use kanau::processor::Processor;
use rust_decimal::Decimal;

/// Name of the uniqueness constraint guarding `payment_tx_hash`.
pub const PAYMENT_TX_HASH_CONSTRAINT: &str = "deals_payment_tx_hash_key";

const DEAL_COLUMNS: &str = "id, advertiser_id, channel_id, status, amount, brief, draft, \
    rejection_reason, scheduled_at, published_at, proof_link, escrow_wallet, payment_tx_hash, \
    is_disputed, dispute_reason, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DealRecord {
    pub id: i64,
    pub advertiser_id: i64,
    pub channel_id: i64,
    pub status: DealStatus,
    pub amount: Decimal,
    pub brief: String,
    pub draft: Option<String>,
    pub rejection_reason: Option<String>,
    pub scheduled_at: Option<time::PrimitiveDateTime>,
    pub published_at: Option<time::PrimitiveDateTime>,
    pub proof_link: Option<String>,
    /// Reserved for per-deal escrow wallets; never written by this crate.
    pub escrow_wallet: Option<String>,
    pub payment_tx_hash: Option<String>,
    pub is_disputed: bool,
    pub dispute_reason: Option<String>,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

impl DealRecord {
    /// Content to publish: the owner's draft, or the brief when no draft exists.
    pub fn publishable_content(&self) -> &str {
        self.draft.as_deref().unwrap_or(&self.brief)
    }

    pub fn to_snapshot(&self) -> DealSnapshot {
        DealSnapshot {
            id: self.id,
            advertiser_id: self.advertiser_id,
            channel_id: self.channel_id,
            status: self.status.into(),
            amount: self.amount.to_string(),
            brief: self.brief.clone(),
            draft: self.draft.clone(),
            rejection_reason: self.rejection_reason.clone(),
            scheduled_at: self.scheduled_at.map(unix_seconds),
            published_at: self.published_at.map(unix_seconds),
            proof_link: self.proof_link.clone(),
            escrow_wallet: self.escrow_wallet.clone(),
            payment_tx_hash: self.payment_tx_hash.clone(),
            is_disputed: self.is_disputed,
            dispute_reason: self.dispute_reason.clone(),
            created_at: unix_seconds(self.created_at),
            updated_at: unix_seconds(self.updated_at),
        }
    }
}

/// Data for inserting a new deal. The deal always starts in `Created`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeal {
    pub advertiser_id: i64,
    pub channel_id: i64,
    pub brief: String,
    pub amount: Decimal,
    pub created_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
/// Fetch a single deal by id.
pub struct GetDealById {
    pub deal_id: i64,
}

impl Processor<GetDealById> for DatabaseProcessor {
    type Output = Option<DealRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDealById")]
    async fn process(&self, query: GetDealById) -> Result<Option<DealRecord>, sqlx::Error> {
        let sql = format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = $1");
        let deal = sqlx::query_as::<_, DealRecord>(&sql)
            .bind(query.deal_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(deal)
    }
}

#[derive(Debug, Clone)]
/// Insert a deal in `Created` status and return the stored row.
pub struct InsertDeal {
    pub deal: NewDeal,
}

impl Processor<InsertDeal> for DatabaseProcessor {
    type Output = DealRecord;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertDeal")]
    async fn process(&self, insert: InsertDeal) -> Result<DealRecord, sqlx::Error> {
        let NewDeal {
            advertiser_id,
            channel_id,
            brief,
            amount,
            created_at,
        } = insert.deal;
        let sql = format!(
            "INSERT INTO deals \
             (advertiser_id, channel_id, status, amount, brief, is_disputed, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, false, $6, $6) \
             RETURNING {DEAL_COLUMNS}"
        );
        let deal = sqlx::query_as::<_, DealRecord>(&sql)
            .bind(advertiser_id)
            .bind(channel_id)
            .bind(DealStatus::Created)
            .bind(amount)
            .bind(brief)
            .bind(created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(deal)
    }
}

#[derive(Debug, Clone)]
/// Overwrite the mutable columns of a deal, but only if nobody else has
/// touched it since it was read.
///
/// The row is matched on `id`, the status observed at read time and the
/// `updated_at` observed at read time. Returns the number of rows updated,
/// which is zero when the row moved underneath the caller.
pub struct UpdateDealIfUnchanged {
    pub record: DealRecord,
    pub expected_status: DealStatus,
    pub expected_updated_at: time::PrimitiveDateTime,
}

impl Processor<UpdateDealIfUnchanged> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateDealIfUnchanged")]
    async fn process(&self, cmd: UpdateDealIfUnchanged) -> Result<u64, sqlx::Error> {
        let UpdateDealIfUnchanged {
            record,
            expected_status,
            expected_updated_at,
        } = cmd;
        let result = sqlx::query(
            r#"
            UPDATE deals
            SET status = $4,
                draft = $5,
                rejection_reason = $6,
                scheduled_at = $7,
                published_at = $8,
                proof_link = $9,
                payment_tx_hash = $10,
                is_disputed = $11,
                dispute_reason = $12,
                updated_at = $13
            WHERE id = $1 AND status = $2 AND updated_at = $3
            "#,
        )
        .bind(record.id)
        .bind(expected_status)
        .bind(expected_updated_at)
        .bind(record.status)
        .bind(record.draft)
        .bind(record.rejection_reason)
        .bind(record.scheduled_at)
        .bind(record.published_at)
        .bind(record.proof_link)
        .bind(record.payment_tx_hash)
        .bind(record.is_disputed)
        .bind(record.dispute_reason)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Deals in `Scheduled` whose `scheduled_at` is at or before `now`.
pub struct GetDealsReadyToPublish {
    pub now: time::PrimitiveDateTime,
}

impl Processor<GetDealsReadyToPublish> for DatabaseProcessor {
    type Output = Vec<DealRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDealsReadyToPublish")]
    async fn process(&self, query: GetDealsReadyToPublish) -> Result<Vec<DealRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT {DEAL_COLUMNS} FROM deals \
             WHERE status = $1 AND scheduled_at <= $2 \
             ORDER BY scheduled_at ASC, id ASC"
        );
        let deals = sqlx::query_as::<_, DealRecord>(&sql)
            .bind(DealStatus::Scheduled)
            .bind(query.now)
            .fetch_all(&self.pool)
            .await?;
        Ok(deals)
    }
}
