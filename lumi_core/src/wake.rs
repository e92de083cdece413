//! Wake-word detection and stripping.

use anyhow::{Context, Result};
use regex_lite::Regex;

/// Case-insensitive matcher over the agent's name spellings.
#[derive(Debug, Clone)]
pub struct WakeWords {
    pattern: Regex,
}

impl WakeWords {
    pub fn new<S: AsRef<str>>(words: &[S]) -> Result<Self> {
        let alternatives: Vec<String> = words
            .iter()
            .map(|word| word.as_ref().trim())
            .filter(|word| !word.is_empty())
            .map(case_folded_pattern)
            .collect();
        if alternatives.is_empty() {
            anyhow::bail!("at least one wake word is required");
        }
        let pattern = Regex::new(&alternatives.join("|"))
            .context("Failed to build wake word pattern")?;
        Ok(Self { pattern })
    }

    pub fn is_addressed(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Remove every wake-word occurrence and trim the rest.
    pub fn strip(&self, text: &str) -> String {
        self.pattern.replace_all(text, "").trim().to_string()
    }
}

// regex-lite only folds ASCII case, so each letter becomes an explicit class
// of its lower and upper forms.
fn case_folded_pattern(word: &str) -> String {
    word.chars()
        .map(|c| {
            let lower: String = c.to_lowercase().collect();
            let upper: String = c.to_uppercase().collect();
            if lower == upper {
                regex_lite::escape(&lower)
            } else {
                format!(
                    "(?:{}|{})",
                    regex_lite::escape(&lower),
                    regex_lite::escape(&upper)
                )
            }
        })
        .collect()
}
