use std::collections::HashMap;

use crate::history::HistoryRing;
use crate::mood::MoodRegistry;
use crate::transport::{ChatId, UserId};

/// All in-process, per-chat state. Owned by the dispatcher and lost on
/// restart.
#[derive(Debug)]
pub struct SessionState {
    pub history: HistoryRing,
    pub moods: MoodRegistry,
    /// Last composed system prompt per chat, kept for `/prompt`.
    pub last_prompts: HashMap<ChatId, String>,
    /// Display names seen per sender.
    pub senders: HashMap<UserId, String>,
}

impl SessionState {
    pub fn new(history_max: usize, default_mood: &str) -> Self {
        Self {
            history: HistoryRing::new(history_max),
            moods: MoodRegistry::new(default_mood),
            last_prompts: HashMap::new(),
            senders: HashMap::new(),
        }
    }

    pub fn remember_sender(&mut self, sender_id: UserId, display_name: &str) {
        self.senders.insert(sender_id, display_name.to_string());
    }

    pub fn sender_name(&self, sender_id: UserId) -> String {
        self.senders
            .get(&sender_id)
            .cloned()
            .unwrap_or_else(|| fallback_display_name(sender_id))
    }
}

/// Name used for senders without a username.
pub fn fallback_display_name(sender_id: UserId) -> String {
    format!("user{}", sender_id)
}
