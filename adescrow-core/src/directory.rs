//! Read-only lookup of channels and users.
//!
//! Registration and identity resolution happen elsewhere; the engine only
//! needs a channel's chat id, username and owner, and the owner's wallet.

use crate::entities::directory::{ChannelRecord, GetChannelById, GetUserById, UserRecord};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;

#[async_trait]
pub trait Directory: Send + Sync {
    async fn channel(&self, channel_id: i64) -> Result<Option<ChannelRecord>, sqlx::Error>;

    async fn user(&self, user_id: i64) -> Result<Option<UserRecord>, sqlx::Error>;
}

/// [`Directory`] over the `channels` and `users` tables.
#[derive(Clone)]
pub struct PgDirectory {
    processor: DatabaseProcessor,
}

impl PgDirectory {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
        }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn channel(&self, channel_id: i64) -> Result<Option<ChannelRecord>, sqlx::Error> {
        self.processor.process(GetChannelById { channel_id }).await
    }

    async fn user(&self, user_id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
        self.processor.process(GetUserById { user_id }).await
    }
}
