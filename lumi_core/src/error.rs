use thiserror::Error;

/// Command failures that are answered with a reply instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Requested mood key is not in the catalog.
    #[error("unknown mood: {0}")]
    InvalidMood(String),
    /// Forget index does not point at an existing note.
    #[error("no note at position {position} (have {len})")]
    OutOfRange { position: usize, len: usize },
    /// Sender is not on the owner allowlist.
    #[error("command is restricted to the owner")]
    PermissionDenied,
    /// `/prompt` before any prompt was composed for the chat.
    #[error("system prompt not generated yet")]
    PromptNotGenerated,
}
