//! Bounded per-chat message history used to build model context.
//!
//! Lives only in process memory and is lost on restart.

use std::collections::{HashMap, VecDeque};

use crate::transport::ChatId;

pub const DEFAULT_HISTORY_MAX: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub timestamp: String,
    pub author: String,
    pub text: String,
}

#[derive(Debug)]
pub struct HistoryRing {
    max_turns: usize,
    chats: HashMap<ChatId, VecDeque<HistoryTurn>>,
}

impl HistoryRing {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            chats: HashMap::new(),
        }
    }

    /// Record a turn stamped with the current local time, dropping the oldest
    /// turns once the chat holds more than `max_turns`.
    pub fn append(&mut self, chat_id: ChatId, author: &str, text: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let turns = self.chats.entry(chat_id).or_default();
        turns.push_back(HistoryTurn {
            timestamp,
            author: author.to_string(),
            text: text.to_string(),
        });
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    /// `author: text` lines, oldest first.
    pub fn render(&self, chat_id: ChatId) -> String {
        self.chats
            .get(&chat_id)
            .map(|turns| {
                turns
                    .iter()
                    .map(|turn| format!("{}: {}", turn.author, turn.text))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn turns(&self, chat_id: ChatId) -> Vec<HistoryTurn> {
        self.chats
            .get(&chat_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, chat_id: ChatId) -> usize {
        self.chats.get(&chat_id).map(VecDeque::len).unwrap_or(0)
    }

    pub fn clear(&mut self, chat_id: ChatId) {
        if let Some(turns) = self.chats.get_mut(&chat_id) {
            turns.clear();
        }
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_never_exceeds_bound() {
        let mut ring = HistoryRing::default();
        for i in 0..40 {
            ring.append(1, "alice", &format!("msg {}", i));
            assert!(ring.len(1) <= DEFAULT_HISTORY_MAX);
        }
        assert_eq!(ring.len(1), DEFAULT_HISTORY_MAX);
    }

    #[test]
    fn render_keeps_most_recent_turns_oldest_first() {
        let mut ring = HistoryRing::new(3);
        for i in 0..5 {
            ring.append(7, "bob", &format!("m{}", i));
        }
        assert_eq!(ring.render(7), "bob: m2\nbob: m3\nbob: m4");
    }

    #[test]
    fn render_of_unknown_chat_is_empty() {
        let ring = HistoryRing::default();
        assert_eq!(ring.render(42), "");
    }

    #[test]
    fn chats_are_partitioned() {
        let mut ring = HistoryRing::default();
        ring.append(1, "alice", "hi");
        ring.append(2, "bob", "yo");
        assert_eq!(ring.render(1), "alice: hi");
        assert_eq!(ring.render(2), "bob: yo");
    }

    #[test]
    fn clear_empties_only_that_chat() {
        let mut ring = HistoryRing::default();
        ring.append(1, "alice", "hi");
        ring.append(2, "bob", "yo");
        ring.clear(1);
        assert_eq!(ring.len(1), 0);
        assert_eq!(ring.len(2), 1);
    }

    #[test]
    fn turns_carry_a_wall_clock_timestamp() {
        let mut ring = HistoryRing::default();
        ring.append(1, "alice", "hi");
        let turns = ring.turns(1);
        assert_eq!(turns.len(), 1);
        assert!(
            chrono::NaiveDateTime::parse_from_str(&turns[0].timestamp, "%Y-%m-%d %H:%M:%S")
                .is_ok()
        );
    }
}
