//! Messaging transport seam.
//!
//! The dispatcher only sees these types. The Telegram client in
//! [`crate::telegram`] is the production implementation; tests plug in a
//! recording fake.

use anyhow::Result;
use async_trait::async_trait;

/// Stable key for one chat or group.
pub type ChatId = i64;
/// Sender / account identifier.
pub type UserId = i64;
/// Message identifier, unique within a chat.
pub type MessageId = i64;

/// One inbound message event as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub chat_id: Option<ChatId>,
    pub sender_id: Option<UserId>,
    pub sender_username: Option<String>,
    pub text: String,
    /// Author of the message this one replies to, if it is a reply.
    pub reply_to_sender: Option<UserId>,
}

/// The account the agent runs as. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfIdentity {
    pub id: UserId,
    pub username: Option<String>,
}

/// Handle to a message the agent sent, used for later edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve the identity of the connected account.
    async fn whoami(&self) -> Result<SelfIdentity>;

    /// Send a new message into a chat.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<SentMessage>;

    /// Send a plain-text reply to a specific message.
    async fn reply(&self, chat_id: ChatId, reply_to: MessageId, text: &str)
        -> Result<SentMessage>;

    /// Replace the text of a message the agent sent earlier.
    async fn edit_message(&self, chat_id: ChatId, message_id: MessageId, text: &str)
        -> Result<()>;
}
