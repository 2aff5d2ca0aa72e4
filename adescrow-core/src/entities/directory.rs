//! Read-only views of users and channels, owned by the onboarding side.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ChannelRecord {
    pub id: i64,
    /// Telegram chat id the bot posts into.
    pub external_channel_id: i64,
    pub username: Option<String>,
    pub owner_id: i64,
}

#[derive(Debug, Clone)]
pub struct GetUserById {
    pub user_id: i64,
}

impl Processor<GetUserById> for DatabaseProcessor {
    type Output = Option<UserRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserById")]
    async fn process(&self, query: GetUserById) -> Result<Option<UserRecord>, sqlx::Error> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT id, wallet_address FROM users WHERE id = $1",
        )
        .bind(query.user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Clone)]
pub struct GetChannelById {
    pub channel_id: i64,
}

impl Processor<GetChannelById> for DatabaseProcessor {
    type Output = Option<ChannelRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetChannelById")]
    async fn process(&self, query: GetChannelById) -> Result<Option<ChannelRecord>, sqlx::Error> {
        let channel = sqlx::query_as::<_, ChannelRecord>(
            "SELECT id, external_channel_id, username, owner_id FROM channels WHERE id = $1",
        )
        .bind(query.channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(channel)
    }
}
