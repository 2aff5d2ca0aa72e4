//! Posting ad content into a channel.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org/";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("channel publisher transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("channel publisher API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("unexpected channel publisher response: {0}")]
    Parse(String),
}

/// A post that went live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub post_id: i64,
    /// Public username of the channel, when it has one.
    pub channel_username: Option<String>,
}

#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn publish(
        &self,
        external_channel_id: i64,
        content: &str,
    ) -> Result<PublishedPost, PublishError>;
}

/// Publishes through the Telegram Bot API `sendMessage` method.
#[derive(Clone)]
pub struct TelegramChannelPublisher {
    bot_token: String,
    base: Url,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for TelegramChannelPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannelPublisher")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct BotResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    #[serde(default)]
    username: Option<String>,
}

impl TelegramChannelPublisher {
    pub fn new(bot_token: String, base: Url) -> Self {
        Self {
            bot_token,
            base,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn method_url(&self, method: &str) -> Result<Url, PublishError> {
        // Tokens contain a colon; the leading `./` keeps `bot<id>:` from parsing as a scheme.
        self.base
            .join(&format!("./bot{}/{method}", self.bot_token))
            .map_err(|e| PublishError::Parse(format!("invalid Bot API URL: {e}")))
    }
}

fn read_sent_message(body: BotResponse<SentMessage>) -> Result<PublishedPost, PublishError> {
    if !body.ok {
        return Err(PublishError::Api {
            code: body.error_code.unwrap_or_default(),
            description: body
                .description
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    let message = body
        .result
        .ok_or_else(|| PublishError::Parse("sendMessage returned no message".to_string()))?;
    Ok(PublishedPost {
        post_id: message.message_id,
        channel_username: message.chat.username,
    })
}

#[async_trait]
impl ChannelPublisher for TelegramChannelPublisher {
    async fn publish(
        &self,
        external_channel_id: i64,
        content: &str,
    ) -> Result<PublishedPost, PublishError> {
        let url = self.method_url("sendMessage")?;
        // The token is part of the URL; strip it from transport errors.
        let response = self
            .http_client
            .post(url)
            .json(&serde_json::json!({
                "chat_id": external_channel_id,
                "text": content,
                "parse_mode": "HTML",
            }))
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.without_url()))?;
        let body: BotResponse<SentMessage> = response
            .json()
            .await
            .map_err(|e| PublishError::Transport(e.without_url()))?;
        let post = read_sent_message(body)?;
        debug!(external_channel_id, post_id = post.post_id, "Message posted");
        Ok(post)
    }
}
