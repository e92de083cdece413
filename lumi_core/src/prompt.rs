//! System prompt assembly.

pub const NO_MEMORY: &str = "— no saved memory —";
pub const MEMORY_READ_ERROR: &str = "— memory read error —";

/// Inputs for one system prompt.
#[derive(Debug, Clone)]
pub struct PromptParts<'a> {
    pub agent_name: &'a str,
    pub sender_name: &'a str,
    pub mood_fragment: &'a str,
    pub history: &'a str,
    pub memory: &'a str,
}

/// Identity preamble, mood, history and memory, always in that order.
pub fn compose_system_prompt(parts: &PromptParts<'_>) -> String {
    format!(
        "\nYou are {agent}, a female assistant. Answer briefly and stick to the facts.\n\
         \n\
         IMPORTANT: {sender} is talking to you right now. Answer ONLY them.\n\
         Do NOT confuse {sender} with other members of the chat!\n\
         If you are called by any name other than {agent}, flatly deny it.\n\
         \n\
         {mood}\n\
         \n\
         Chat history (shows who wrote what):\n\
         {history}\n\
         \n\
         Saved memory:\n\
         {memory}\n",
        agent = parts.agent_name,
        sender = parts.sender_name,
        mood = parts.mood_fragment,
        history = parts.history,
        memory = parts.memory,
    )
}

/// Notes as `- note` lines, or the no-memory sentinel.
pub fn render_memory(notes: &[String]) -> String {
    if notes.is_empty() {
        return NO_MEMORY.to_string();
    }
    notes
        .iter()
        .map(|note| format!("- {}", note))
        .collect::<Vec<_>>()
        .join("\n")
}
