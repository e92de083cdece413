//! In-memory fakes for the transport and model seams.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::llm_client::ChatModel;
use crate::transport::{
    ChatId, MessageId, SelfIdentity, SentMessage, TextFormat, Transport, UserId,
};

/// Identity the fake transport reports for itself.
pub const FAKE_SELF_ID: UserId = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Send {
        chat_id: ChatId,
        text: String,
        format: TextFormat,
    },
    Reply {
        chat_id: ChatId,
        reply_to: MessageId,
        text: String,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    },
}

impl Outgoing {
    pub fn text(&self) -> &str {
        match self {
            Outgoing::Send { text, .. }
            | Outgoing::Reply { text, .. }
            | Outgoing::Edit { text, .. } => text,
        }
    }
}

/// Records every outgoing call. Message ids start at 9000.
#[derive(Default)]
pub struct RecordingTransport {
    outgoing: Mutex<Vec<Outgoing>>,
    next_id: AtomicI64,
    fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn record(&self, chat_id: ChatId, item: Outgoing) -> Result<SentMessage> {
        if self.fail {
            anyhow::bail!("network down");
        }
        self.outgoing.lock().unwrap().push(item);
        Ok(SentMessage {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 9000,
        })
    }

    pub fn take(&self) -> Vec<Outgoing> {
        std::mem::take(&mut *self.outgoing.lock().unwrap())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn whoami(&self) -> Result<SelfIdentity> {
        Ok(SelfIdentity {
            id: FAKE_SELF_ID,
            username: Some("lumi_bot".to_string()),
        })
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<SentMessage> {
        self.record(
            chat_id,
            Outgoing::Send {
                chat_id,
                text: text.to_string(),
                format,
            },
        )
    }

    async fn reply(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        text: &str,
    ) -> Result<SentMessage> {
        self.record(
            chat_id,
            Outgoing::Reply {
                chat_id,
                reply_to,
                text: text.to_string(),
            },
        )
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<()> {
        self.record(
            chat_id,
            Outgoing::Edit {
                chat_id,
                message_id,
                text: text.to_string(),
            },
        )
        .map(|_| ())
    }
}

/// Answers `model says: <user text>` and keeps every call.
#[derive(Default)]
pub struct CountingModel {
    calls: Mutex<Vec<(String, String)>>,
}

impl CountingModel {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for CountingModel {
    async fn complete(&self, user_text: &str, system_prompt: &str) -> String {
        self.calls
            .lock()
            .unwrap()
            .push((user_text.to_string(), system_prompt.to_string()));
        format!("model says: {}", user_text)
    }
}
