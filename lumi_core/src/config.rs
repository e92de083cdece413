use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::history::DEFAULT_HISTORY_MAX;
use crate::mood::DEFAULT_MOOD;
use crate::transport::{ChatId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectLinks {
    #[serde(default = "default_about_link")]
    pub about: String,
    #[serde(default = "default_commands_link")]
    pub commands: String,
    #[serde(default = "default_privacy_link")]
    pub privacy: String,
    #[serde(default = "default_support_link")]
    pub support: String,
    #[serde(default = "default_github_link")]
    pub github: String,
}

fn default_about_link() -> String {
    "https://teletype.in/@skillich/Lumi_how_to".to_string()
}

fn default_commands_link() -> String {
    "https://teletype.in/@skillich/Commands".to_string()
}

fn default_privacy_link() -> String {
    "https://teletype.in/@skillich/Privacy_Policy".to_string()
}

fn default_support_link() -> String {
    "https://t.me/skillich".to_string()
}

fn default_github_link() -> String {
    "https://github.com/SkillichSE/Lumi-userbot".to_string()
}

impl Default for ProjectLinks {
    fn default() -> Self {
        Self {
            about: default_about_link(),
            commands: default_commands_link(),
            privacy: default_privacy_link(),
            support: default_support_link(),
            github: default_github_link(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LumiConfig {
    // Telegram Bot API
    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,

    // LLM configuration (OpenAI-compatible chat completions; LM Studio by default)
    #[serde(default = "default_llm_url")]
    pub llm_api_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // Agent identity
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    #[serde(default = "default_wake_words")]
    pub wake_words: Vec<String>,

    // Conversation state
    #[serde(default = "default_history_max")]
    pub history_max: usize,
    #[serde(default = "default_mood")]
    pub default_mood: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    // Access and startup
    #[serde(default)]
    pub owner_ids: Vec<UserId>,
    #[serde(default)]
    pub welcome_chats: Vec<ChatId>,
    #[serde(default)]
    pub links: ProjectLinks,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_llm_url() -> String {
    "http://localhost:1234/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "llama-3.1-8b-instruct".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_max_tokens() -> u32 {
    500
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_agent_name() -> String {
    "Lumi".to_string()
}

fn default_wake_words() -> Vec<String> {
    vec!["lumi".to_string(), "люми".to_string()]
}

fn default_history_max() -> usize {
    DEFAULT_HISTORY_MAX
}

fn default_mood() -> String {
    DEFAULT_MOOD.to_string()
}

fn default_data_dir() -> String {
    ".".to_string()
}

impl Default for LumiConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            telegram_api_base: default_telegram_api_base(),
            llm_api_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            agent_name: default_agent_name(),
            wake_words: default_wake_words(),
            history_max: default_history_max(),
            default_mood: default_mood(),
            data_dir: default_data_dir(),
            owner_ids: Vec::new(),
            welcome_chats: Vec::new(),
            links: ProjectLinks::default(),
        }
    }
}

impl LumiConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// `LUMI_CONFIG` if set, else `lumi_config.toml` next to the executable.
    pub fn config_path() -> PathBuf {
        match env::var("LUMI_CONFIG") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
            _ => Self::get_base_dir().join("lumi_config.toml"),
        }
    }

    /// Load the config file (or defaults), then apply environment overrides.
    pub fn load() -> Self {
        let path = Self::config_path();

        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::error!("Failed to parse {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::warn!("No config file at {:?}, using defaults + env vars", path);
                Self::default()
            }
        };

        config.apply_env_overrides();
        config
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config TOML")
    }

    /// Environment variables win over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.telegram_bot_token = token.trim().to_string();
            }
        }

        if let Ok(owners) = env::var("OWNER_ID") {
            match parse_id_list(&owners) {
                Ok(ids) => self.owner_ids = ids,
                Err(e) => tracing::error!("Ignoring OWNER_ID: {}", e),
            }
        }

        if let Ok(chats) = env::var("WELCOME_CHATS") {
            match parse_id_list(&chats) {
                Ok(ids) => self.welcome_chats = ids,
                Err(e) => tracing::error!("Ignoring WELCOME_CHATS: {}", e),
            }
        }

        if let Ok(url) = env::var("LLM_API_URL") {
            self.llm_api_url = url;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm_model = model;
        }

        if let Ok(key) = env::var("LLM_API_KEY") {
            self.llm_api_key = Some(key);
        }

        if let Ok(dir) = env::var("LUMI_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = dir;
            }
        }

        if let Ok(max) = env::var("LUMI_HISTORY_MAX") {
            if let Ok(max) = max.trim().parse() {
                self.history_max = max;
            }
        }

        if let Ok(mood) = env::var("LUMI_DEFAULT_MOOD") {
            if !mood.trim().is_empty() {
                self.default_mood = mood.trim().to_lowercase();
            }
        }

        if let Ok(name) = env::var("AGENT_NAME") {
            self.agent_name = name;
        }
    }

    /// Startup checks for values the agent cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.telegram_bot_token.trim().is_empty() {
            anyhow::bail!("TELEGRAM_BOT_TOKEN must be set (env or config file)");
        }
        if self.history_max == 0 {
            anyhow::bail!("history_max must be at least 1");
        }
        if self.wake_words.iter().all(|word| word.trim().is_empty()) {
            anyhow::bail!("wake_words must contain at least one word");
        }
        Ok(())
    }
}

/// Parse a comma-separated list of numeric ids, e.g. `"123, -100456"`.
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .with_context(|| format!("invalid id '{}'", part))
        })
        .collect()
}
