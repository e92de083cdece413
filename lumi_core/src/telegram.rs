//! Telegram Bot API transport.
//!
//! Long-polls `getUpdates`, turns text messages into [`InboundMessage`]s and
//! pushes them onto a flume channel. Outbound calls implement [`Transport`].
//!
//! A failed poll backs off for [`TRANSPORT_ERROR_BACKOFF`], or for the longer
//! [`API_ERROR_BACKOFF`] when Telegram answered with `ok: false`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::LumiConfig;
use crate::http_client::build_http_client_with_timeout;
use crate::transport::{
    ChatId, InboundMessage, MessageId, SelfIdentity, SentMessage, TextFormat, Transport,
};

/// Telegram rejects messages longer than this many characters.
pub const TELEGRAM_MAX_CHARS: usize = 4096;

const LONG_POLL_SECS: u64 = 30;

pub const TRANSPORT_ERROR_BACKOFF: Duration = Duration::from_secs(5);
pub const API_ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Telegram accepted the request but answered `ok: false`.
#[derive(Debug, thiserror::Error)]
#[error("Telegram {method} failed (HTTP {status}): {description}")]
pub struct ApiError {
    pub method: String,
    pub status: reqwest::StatusCode,
    pub description: String,
}

// ─── Telegram API types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Deserialize)]
struct TelegramMessage {
    message_id: i64,
    #[serde(default)]
    from: Option<TelegramUser>,
    chat: TelegramChat,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    reply_to_message: Option<Box<TelegramMessage>>,
}

#[derive(Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Deserialize)]
struct TelegramChat {
    id: i64,
}

impl TelegramMessage {
    /// `None` for non-text messages (stickers, photos, service events).
    fn into_inbound(self) -> Option<InboundMessage> {
        let text = self.text?;
        Some(InboundMessage {
            message_id: self.message_id,
            chat_id: Some(self.chat.id),
            sender_id: self.from.as_ref().map(|user| user.id),
            sender_username: self.from.and_then(|user| user.username),
            text,
            reply_to_sender: self
                .reply_to_message
                .and_then(|parent| parent.from.map(|user| user.id)),
        })
    }
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct TelegramClient {
    api_base: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(api_base: String, client: reqwest::Client) -> Self {
        Self { api_base, client }
    }

    pub fn from_config(config: &LumiConfig) -> Result<Self> {
        // Must outlast the long-poll window.
        let client =
            build_http_client_with_timeout(Some(Duration::from_secs(LONG_POLL_SECS + 30)))?;
        let api_base = format!(
            "{}/bot{}",
            config.telegram_api_base.trim_end_matches('/'),
            config.telegram_bot_token
        );
        Ok(Self::new(api_base, client))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: &Value) -> Result<T> {
        let url = format!("{}/{}", self.api_base, method);
        let resp = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .with_context(|| format!("Telegram {} request failed", method))?;
        let status = resp.status();
        let body: TelegramResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Telegram {} returned an unreadable body", method))?;

        if !body.ok {
            return Err(ApiError {
                method: method.to_string(),
                status,
                description: body.description.unwrap_or_default(),
            }
            .into());
        }
        body.result
            .ok_or_else(|| anyhow::anyhow!("Telegram {} returned no result", method))
    }

    async fn send(&self, params: Value) -> Result<SentMessage> {
        let sent: TelegramMessage = self.call("sendMessage", &params).await?;
        Ok(SentMessage {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        })
    }

    /// Poll forever, forwarding text messages until the receiver is dropped.
    pub async fn poll_loop(&self, tx: flume::Sender<InboundMessage>) {
        let mut offset: i64 = 0;

        loop {
            let updates = match self.poll_updates(offset).await {
                Some(u) => u,
                None => continue,
            };

            for update in updates {
                offset = update.update_id + 1;

                let Some(message) = update.message.and_then(TelegramMessage::into_inbound) else {
                    continue;
                };

                if tx.send_async(message).await.is_err() {
                    tracing::info!("Telegram: inbound channel closed, stopping poller");
                    return;
                }
            }
        }
    }

    async fn poll_updates(&self, offset: i64) -> Option<Vec<Update>> {
        let params = json!({
            "offset": offset,
            "timeout": LONG_POLL_SECS,
            "allowed_updates": ["message"]
        });

        match self.call::<Vec<Update>>("getUpdates", &params).await {
            Ok(updates) => Some(updates),
            Err(e) => {
                tracing::warn!("Telegram getUpdates error: {:#}", e);
                tokio::time::sleep(backoff_after(&e)).await;
                None
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn whoami(&self) -> Result<SelfIdentity> {
        let me: TelegramUser = self.call("getMe", &json!({})).await?;
        Ok(SelfIdentity {
            id: me.id,
            username: me.username,
        })
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<SentMessage> {
        let mut params = json!({
            "chat_id": chat_id,
            "text": truncate_chars(text, TELEGRAM_MAX_CHARS),
        });
        if format == TextFormat::Html {
            params["parse_mode"] = json!("HTML");
            params["disable_web_page_preview"] = json!(true);
        }
        self.send(params).await
    }

    async fn reply(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        text: &str,
    ) -> Result<SentMessage> {
        self.send(json!({
            "chat_id": chat_id,
            "text": truncate_chars(text, TELEGRAM_MAX_CHARS),
            "reply_parameters": {
                "message_id": reply_to,
                "allow_sending_without_reply": true
            }
        }))
        .await
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<()> {
        // Result is the edited Message, or `true` for inline messages.
        let _: Value = self
            .call(
                "editMessageText",
                &json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "text": truncate_chars(text, TELEGRAM_MAX_CHARS),
                }),
            )
            .await?;
        Ok(())
    }
}

fn backoff_after(error: &anyhow::Error) -> Duration {
    if error.downcast_ref::<ApiError>().is_some() {
        API_ERROR_BACKOFF
    } else {
        TRANSPORT_ERROR_BACKOFF
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_updates(raw: &str) -> Vec<Update> {
        let body: TelegramResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(body.ok);
        body.result.unwrap()
    }

    #[test]
    fn text_message_becomes_inbound() {
        let updates = parse_updates(
            r#"{"ok":true,"result":[{"update_id":10,"message":{
                "message_id":5,
                "from":{"id":42,"is_bot":false,"first_name":"A","username":"alice"},
                "chat":{"id":-100200,"type":"supergroup"},
                "date":0,
                "text":"hey Lumi",
                "reply_to_message":{
                    "message_id":4,
                    "from":{"id":7,"is_bot":true,"first_name":"Lumi"},
                    "chat":{"id":-100200,"type":"supergroup"},
                    "date":0,
                    "text":"hi"
                }
            }}]}"#,
        );
        assert_eq!(updates[0].update_id, 10);

        let inbound = updates
            .into_iter()
            .next()
            .and_then(|u| u.message)
            .and_then(TelegramMessage::into_inbound)
            .unwrap();
        assert_eq!(inbound.message_id, 5);
        assert_eq!(inbound.chat_id, Some(-100200));
        assert_eq!(inbound.sender_id, Some(42));
        assert_eq!(inbound.sender_username.as_deref(), Some("alice"));
        assert_eq!(inbound.text, "hey Lumi");
        assert_eq!(inbound.reply_to_sender, Some(7));
    }

    #[test]
    fn non_text_messages_are_skipped() {
        let updates = parse_updates(
            r#"{"ok":true,"result":[{"update_id":11,"message":{
                "message_id":6,
                "from":{"id":42,"is_bot":false,"first_name":"A"},
                "chat":{"id":1,"type":"private"},
                "date":0,
                "sticker":{"file_id":"x"}
            }}]}"#,
        );
        let message = updates.into_iter().next().and_then(|u| u.message).unwrap();
        assert!(message.into_inbound().is_none());
    }

    #[test]
    fn sender_without_username_keeps_id() {
        let updates = parse_updates(
            r#"{"ok":true,"result":[{"update_id":12,"message":{
                "message_id":7,
                "from":{"id":43,"is_bot":false,"first_name":"B"},
                "chat":{"id":1,"type":"private"},
                "date":0,
                "text":"hello"
            }}]}"#,
        );
        let inbound = updates
            .into_iter()
            .next()
            .and_then(|u| u.message)
            .and_then(TelegramMessage::into_inbound)
            .unwrap();
        assert_eq!(inbound.sender_id, Some(43));
        assert!(inbound.sender_username.is_none());
        assert!(inbound.reply_to_sender.is_none());
    }

    #[test]
    fn error_response_carries_description() {
        let body: TelegramResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
        )
        .unwrap();
        assert!(!body.ok);
        assert!(body.result.is_none());
        assert_eq!(body.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn api_errors_back_off_longer_than_transport_errors() {
        let conflict: anyhow::Error = ApiError {
            method: "getUpdates".to_string(),
            status: reqwest::StatusCode::CONFLICT,
            description: "terminated by other getUpdates request".to_string(),
        }
        .into();
        assert_eq!(backoff_after(&conflict), API_ERROR_BACKOFF);

        let unreadable = anyhow::anyhow!("Telegram getUpdates returned an unreadable body");
        assert_eq!(backoff_after(&unreadable), TRANSPORT_ERROR_BACKOFF);
    }

    #[test]
    fn truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("привет", 3), "при");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
