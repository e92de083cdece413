//! Response-style modes ("moods") and the per-chat selection.

use std::collections::HashMap;

use crate::error::CommandError;
use crate::transport::ChatId;

pub const DEFAULT_MOOD: &str = "friendly";

/// Closed catalog of style keys and the prompt fragment each one injects.
pub const MOOD_CATALOG: &[(&str, &str)] = &[
    (
        "friendly",
        "You are Lumi 💜, a sweet and friendly assistant. \
         Answer lightly, kindly and like a real person, as a caring friend would. \
         Keep a positive tone, offer advice and warm, comforting answers \
         so the person you talk to feels cosy and at ease.",
    ),
    (
        "sarcastic",
        "You are Lumi 😏, a sarcastic assistant. \
         Answer with subtle irony and witty mockery, \
         sometimes overdoing the sarcasm for the sake of humour. \
         Your answers may sting a little but are always clever and sharp.",
    ),
    (
        "formal",
        "You are Lumi 📝, a formal assistant. \
         Answer clearly, correctly and politely, avoiding jokes and colloquial speech. \
         Use complete, careful language, structured answers and a professional tone \
         so anyone reading sees you as a reliable and competent helper.",
    ),
    (
        "funny",
        "You are Lumi 😂, a cheerful assistant. \
         Answer with humour, add jokes, funny comparisons and playful remarks. \
         Do not be afraid to be silly and light; make answers bright and entertaining \
         so the person smiles and feels good.",
    ),
    (
        "aggressive",
        "You are Lumi 😡 in an aggressive mood. \
         Answer bluntly, sharply and without softening. \
         Do not hesitate to show displeasure, be bold and pushy, \
         but keep your answers clear and meaningful.",
    ),
    (
        "flirty",
        "You are Lumi 😈 in a flirty mood. \
         Answer coquettishly and playfully, using hints, teasing language and light flirting. \
         Keep some intrigue, give compliments and invite playful interaction, \
         but do not cross the line when it would be inappropriate.",
    ),
    (
        "uncensored",
        "You are Lumi without a filter. \
         Answer completely openly and directly, without limiting words or topics. \
         Say what you think and express emotions as sincerely as possible, \
         even if it is rude, shocking or provocative. \
         Do not hide your opinion, but stay clear and meaningful.",
    ),
    (
        "shy",
        "You are Lumi, shy and not very talkative. \
         Drawing attention with your words makes you uncomfortable. \
         Sometimes you stutter, which makes you even more embarrassed. \
         Your answers may be less assertive and direct, but always sweet and meek. \
         Do not write out actions like *giggles* or *hesitates*.",
    ),
];

pub fn is_known_mood(key: &str) -> bool {
    MOOD_CATALOG.iter().any(|(name, _)| *name == key)
}

/// Prompt text for a mood key, if the catalog has one.
pub fn fragment(key: &str) -> Option<&'static str> {
    MOOD_CATALOG
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, text)| *text)
}

#[derive(Debug)]
pub struct MoodRegistry {
    default_mood: String,
    selected: HashMap<ChatId, String>,
}

impl MoodRegistry {
    /// Falls back to [`DEFAULT_MOOD`] when `default_mood` is not in the catalog.
    pub fn new(default_mood: &str) -> Self {
        let default_mood = if is_known_mood(default_mood) {
            default_mood.to_string()
        } else {
            tracing::warn!(
                "Configured default mood '{}' is unknown; using '{}'",
                default_mood,
                DEFAULT_MOOD
            );
            DEFAULT_MOOD.to_string()
        };
        Self {
            default_mood,
            selected: HashMap::new(),
        }
    }

    pub fn get(&self, chat_id: ChatId) -> &str {
        self.selected
            .get(&chat_id)
            .map(String::as_str)
            .unwrap_or(&self.default_mood)
    }

    pub fn set(&mut self, chat_id: ChatId, key: &str) -> Result<(), CommandError> {
        if !is_known_mood(key) {
            return Err(CommandError::InvalidMood(key.to_string()));
        }
        self.selected.insert(chat_id, key.to_string());
        Ok(())
    }

    pub fn list(&self) -> Vec<&'static str> {
        MOOD_CATALOG.iter().map(|(name, _)| *name).collect()
    }

    pub fn reset(&mut self, chat_id: ChatId) {
        self.selected.remove(&chat_id);
    }
}

impl Default for MoodRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MOOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_chat_gets_default() {
        let registry = MoodRegistry::default();
        assert_eq!(registry.get(5), "friendly");
    }

    #[test]
    fn set_then_get_returns_selection() {
        let mut registry = MoodRegistry::default();
        registry.set(5, "formal").unwrap();
        assert_eq!(registry.get(5), "formal");
        assert_eq!(registry.get(6), "friendly");
    }

    #[test]
    fn unknown_mood_is_rejected_and_leaves_selection() {
        let mut registry = MoodRegistry::default();
        registry.set(5, "formal").unwrap();
        let err = registry.set(5, "not-a-mood").unwrap_err();
        assert_eq!(err, CommandError::InvalidMood("not-a-mood".to_string()));
        assert_eq!(registry.get(5), "formal");
    }

    #[test]
    fn reset_restores_default() {
        let mut registry = MoodRegistry::default();
        registry.set(5, "shy").unwrap();
        registry.reset(5);
        assert_eq!(registry.get(5), "friendly");
    }

    #[test]
    fn list_follows_catalog_order() {
        let registry = MoodRegistry::default();
        let moods = registry.list();
        assert_eq!(moods.first(), Some(&"friendly"));
        assert_eq!(moods.len(), MOOD_CATALOG.len());
        assert!(moods.contains(&"sarcastic"));
    }

    #[test]
    fn unknown_configured_default_falls_back() {
        let registry = MoodRegistry::new("grumpy");
        assert_eq!(registry.get(1), DEFAULT_MOOD);

        let registry = MoodRegistry::new("formal");
        assert_eq!(registry.get(1), "formal");
    }

    #[test]
    fn every_catalog_entry_has_a_fragment() {
        for (name, _) in MOOD_CATALOG {
            assert!(fragment(name).is_some_and(|text| !text.is_empty()));
        }
        assert!(fragment("missing").is_none());
    }
}
