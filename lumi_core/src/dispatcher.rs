//! Per-message routing: commands mutate state and answer directly, addressed
//! free text goes to the model.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::chat_store::ChatStore;
use crate::commands::{self, Command, ForgetArg, MoodArg, Parsed};
use crate::config::{LumiConfig, ProjectLinks};
use crate::error::CommandError;
use crate::llm_client::ChatModel;
use crate::mood;
use crate::prompt::{compose_system_prompt, render_memory, PromptParts, MEMORY_READ_ERROR};
use crate::state::{fallback_display_name, SessionState};
use crate::transport::{
    ChatId, InboundMessage, MessageId, SelfIdentity, SentMessage, TextFormat, Transport, UserId,
};
use crate::wake::WakeWords;

/// Longest chunk sent for one `/prompt` reply.
pub const MAX_MESSAGE_CHARS: usize = 4000;

pub struct Dispatcher {
    agent_name: String,
    model_name: String,
    owner_ids: HashSet<UserId>,
    links: ProjectLinks,
    me: SelfIdentity,
    wake: WakeWords,
    store: ChatStore,
    transport: Arc<dyn Transport>,
    model: Arc<dyn ChatModel>,
    state: Mutex<SessionState>,
}

/// A message that passed [`Dispatcher::admit`] and is waiting for its answer.
pub struct Admitted {
    chat_id: ChatId,
    sender_id: UserId,
    display_name: String,
    parsed: Parsed,
    message: InboundMessage,
}

impl Admitted {
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

/// The message being handled, reduced to what the handlers need.
struct Turn<'a> {
    chat_id: ChatId,
    sender_id: UserId,
    message_id: MessageId,
    text: &'a str,
    reply_to_sender: Option<UserId>,
}

impl Dispatcher {
    pub fn new(
        config: &LumiConfig,
        me: SelfIdentity,
        transport: Arc<dyn Transport>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        Ok(Self {
            agent_name: config.agent_name.clone(),
            model_name: config.llm_model.clone(),
            owner_ids: config.owner_ids.iter().copied().collect(),
            links: config.links.clone(),
            wake: WakeWords::new(&config.wake_words)?,
            store: ChatStore::new(&config.data_dir),
            me,
            transport,
            model,
            state: Mutex::new(SessionState::new(config.history_max, &config.default_mood)),
        })
    }

    /// Handle one inbound message. Only store write failures escape; reply
    /// failures are logged by [`Self::deliver`].
    pub async fn handle(&self, message: InboundMessage) -> Result<()> {
        match self.admit(message).await {
            Some(admitted) => self.respond(admitted).await,
            None => Ok(()),
        }
    }

    /// Filter out anonymous and own messages, then record the sender and,
    /// for plain text, the history turn. Calls must be made in arrival order.
    pub async fn admit(&self, message: InboundMessage) -> Option<Admitted> {
        let (Some(chat_id), Some(sender_id)) = (message.chat_id, message.sender_id) else {
            return None;
        };
        if sender_id == self.me.id {
            return None;
        }

        let display_name = message
            .sender_username
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_display_name(sender_id));
        let parsed = commands::parse(&message.text, self.me.username.as_deref());

        {
            let mut state = self.state.lock().await;
            state.remember_sender(sender_id, &display_name);
            if parsed == Parsed::Text && !message.text.is_empty() {
                state.history.append(chat_id, &display_name, &message.text);
            }
        }

        Some(Admitted {
            chat_id,
            sender_id,
            display_name,
            parsed,
            message,
        })
    }

    /// Run the command or conversation for an admitted message.
    pub async fn respond(&self, admitted: Admitted) -> Result<()> {
        let Admitted {
            chat_id,
            sender_id,
            display_name,
            parsed,
            message,
        } = admitted;
        let turn = Turn {
            chat_id,
            sender_id,
            message_id: message.message_id,
            text: &message.text,
            reply_to_sender: message.reply_to_sender,
        };

        match parsed {
            Parsed::Command(command) => self.run_command(&turn, command).await,
            Parsed::UnknownCommand => {
                tracing::debug!("Ignoring unknown command in chat {}: {}", chat_id, turn.text);
                Ok(())
            }
            Parsed::Text => {
                self.converse(&turn, &display_name).await;
                Ok(())
            }
        }
    }

    async fn run_command(&self, turn: &Turn<'_>, command: Command) -> Result<()> {
        match command {
            Command::About => {
                let html = links_html(&self.agent_name, &self.links);
                let result = self
                    .transport
                    .send_message(turn.chat_id, &html, TextFormat::Html)
                    .await;
                self.deliver(turn.chat_id, result);
            }
            Command::CommandsLink => {
                let result = self
                    .transport
                    .send_message(turn.chat_id, &self.links.commands, TextFormat::Plain)
                    .await;
                self.deliver(turn.chat_id, result);
            }
            Command::Prompt => self.show_prompt(turn).await,
            Command::Ping => self.ping(turn).await,
            Command::Model => {
                self.reply(turn, &format!("🤖 Model: {}", self.model_name))
                    .await;
            }
            Command::Mood(arg) => self.mood(turn, arg).await,
            Command::Memorize(note) => {
                if note.is_empty() {
                    self.reply(turn, "❌ Usage: /memorize <text>").await;
                } else {
                    self.store.append_note(turn.chat_id, &note)?;
                    self.reply(turn, &format!("💾 Remembered: {}", note)).await;
                }
            }
            Command::ShowMemory => {
                let notes = self.store.notes(turn.chat_id)?;
                if notes.is_empty() {
                    self.reply(turn, "📭 Memory is empty.").await;
                } else {
                    let listing = notes
                        .iter()
                        .enumerate()
                        .map(|(i, note)| format!("{}. {}", i + 1, note))
                        .collect::<Vec<_>>()
                        .join("\n");
                    self.reply(turn, &listing).await;
                }
            }
            Command::Forget(arg) => self.forget(turn, arg).await?,
            Command::Reset => self.reset(turn).await?,
        }
        Ok(())
    }

    async fn show_prompt(&self, turn: &Turn<'_>) {
        let prompt = self.state.lock().await.last_prompts.get(&turn.chat_id).cloned();
        let Some(prompt) = prompt else {
            self.reply(turn, &error_reply(&CommandError::PromptNotGenerated))
                .await;
            return;
        };
        for chunk in chunk_chars(&prompt, MAX_MESSAGE_CHARS) {
            self.reply(turn, &chunk).await;
        }
    }

    async fn ping(&self, turn: &Turn<'_>) {
        let started = Instant::now();
        let Some(placeholder) = self.reply(turn, "🏓 Ping…").await else {
            return;
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let result = self
            .transport
            .edit_message(
                placeholder.chat_id,
                placeholder.message_id,
                &format!("🏓 Pong! {:.1} ms", elapsed_ms),
            )
            .await;
        self.deliver(turn.chat_id, result);
    }

    async fn mood(&self, turn: &Turn<'_>, arg: MoodArg) {
        let text = match arg {
            MoodArg::Show => {
                let current = self.state.lock().await.moods.get(turn.chat_id).to_string();
                format!(
                    "🎭 Current mood: `{}`\nUsage: /mood <mood>\n/mood list — list of moods",
                    current
                )
            }
            MoodArg::List => {
                let moods = self.state.lock().await.moods.list().join(", ");
                format!("🎭 Available moods:\n{}", moods)
            }
            MoodArg::Set(key) => match self.state.lock().await.moods.set(turn.chat_id, &key) {
                Ok(()) => format!("✅ Mood set: `{}`", key),
                Err(e) => error_reply(&e),
            },
            MoodArg::Usage => "❌ Usage: /mood <mood>".to_string(),
        };
        self.reply(turn, &text).await;
    }

    async fn forget(&self, turn: &Turn<'_>, arg: ForgetArg) -> Result<()> {
        match arg {
            ForgetArg::All => {
                self.store.clear_notes(turn.chat_id)?;
                self.reply(turn, "🗑 Memory fully cleared.").await;
            }
            ForgetArg::Position(position) => {
                match self.store.remove_note(turn.chat_id, position)? {
                    Ok(removed) => {
                        self.reply(turn, &format!("🗑 Removed: {}", removed)).await;
                    }
                    Err(e) => {
                        tracing::debug!("Forget in chat {} rejected: {}", turn.chat_id, e);
                        self.reply(turn, &error_reply(&e)).await;
                    }
                }
            }
            ForgetArg::Usage => {
                self.reply(turn, "❌ Usage: /forget or /forget <number>").await;
            }
        }
        Ok(())
    }

    async fn reset(&self, turn: &Turn<'_>) -> Result<()> {
        if !self.owner_ids.contains(&turn.sender_id) {
            let denied = CommandError::PermissionDenied;
            tracing::info!("/reset from {} in chat {}: {}", turn.sender_id, turn.chat_id, denied);
            self.reply(turn, &error_reply(&denied)).await;
            return Ok(());
        }

        self.store.clear_notes(turn.chat_id)?;
        {
            let mut state = self.state.lock().await;
            state.history.clear(turn.chat_id);
            state.moods.reset(turn.chat_id);
        }

        self.reply(
            turn,
            &format!(
                "♻️ {} forgot everything.\n🧠 Chat memory cleared.\n🙂 Mood reset to default.",
                self.agent_name
            ),
        )
        .await;
        Ok(())
    }

    /// Forward addressed free text to the model and reply with its answer.
    async fn converse(&self, turn: &Turn<'_>, display_name: &str) {
        let addressed =
            turn.reply_to_sender == Some(self.me.id) || self.wake.is_addressed(turn.text);
        if !addressed {
            return;
        }

        tracing::info!("FROM {} in chat {}:\n{}", display_name, turn.chat_id, turn.text);
        let user_text = self.wake.strip(turn.text);
        let system_prompt = self.compose_prompt(turn.chat_id, turn.sender_id).await;
        let answer = self.model.complete(&user_text, &system_prompt).await;

        if self.reply(turn, &answer).await.is_some() {
            tracing::info!(
                "{} ANSWERED in chat {}:\n{}",
                self.agent_name.to_uppercase(),
                turn.chat_id,
                answer
            );
        }
    }

    /// Build the system prompt for `sender_id` in `chat_id` and remember it as
    /// the chat's last prompt.
    pub async fn compose_prompt(&self, chat_id: ChatId, sender_id: UserId) -> String {
        let memory = match self.store.notes(chat_id) {
            Ok(notes) => render_memory(&notes),
            Err(e) => {
                tracing::warn!("Failed to read memory for chat {}: {:#}", chat_id, e);
                MEMORY_READ_ERROR.to_string()
            }
        };

        let mut state = self.state.lock().await;
        let sender_name = state.sender_name(sender_id);
        let mood_fragment = mood::fragment(state.moods.get(chat_id)).unwrap_or("");
        let history = state.history.render(chat_id);
        let prompt = compose_system_prompt(&PromptParts {
            agent_name: &self.agent_name,
            sender_name: &sender_name,
            mood_fragment,
            history: &history,
            memory: &memory,
        });
        state.last_prompts.insert(chat_id, prompt.clone());
        prompt
    }

    async fn reply(&self, turn: &Turn<'_>, text: &str) -> Option<SentMessage> {
        let result = self.transport.reply(turn.chat_id, turn.message_id, text).await;
        self.deliver(turn.chat_id, result)
    }

    /// Guarded delivery: a failed send is logged and dropped.
    fn deliver<T>(&self, chat_id: ChatId, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to reply to {}: {:#}", chat_id, e);
                None
            }
        }
    }
}

/// HTML block with the project links, used by `/lumi` and the welcome message.
pub fn links_html(agent_name: &str, links: &ProjectLinks) -> String {
    format!(
        "<b><a href='{}'>{} - who is she? ⬅</a></b>\n\
         <b><a href='{}'>Commands ⬅</a></b>\n\
         <b><a href='{}'>Privacy policy</a></b>\n\
         <b><a href='{}'>Tech support ⬅</a></b>\n\
         <b><a href='{}'>GitHub source ⬅</a></b>\n",
        links.about, agent_name, links.commands, links.privacy, links.support, links.github
    )
}

/// Split on character boundaries into pieces of at most `max_chars`.
pub fn chunk_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// User-facing text for a rejected command.
fn error_reply(error: &CommandError) -> String {
    match error {
        CommandError::InvalidMood(_) => "❌ No such mood. Type /mood list".to_string(),
        CommandError::OutOfRange { .. } => "❌ There is no note with that number.".to_string(),
        CommandError::PermissionDenied => {
            "❌ This command is available to the owner only.".to_string()
        }
        CommandError::PromptNotGenerated => "❌ System prompt not generated yet.".to_string(),
    }
}
