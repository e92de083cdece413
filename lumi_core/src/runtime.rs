use std::sync::Arc;

use anyhow::{Context, Result};
use flume::Receiver;
use tokio::task::JoinSet;

use crate::config::LumiConfig;
use crate::dispatcher::{links_html, Dispatcher};
use crate::llm_client::LlmClient;
use crate::telegram::TelegramClient;
use crate::transport::{InboundMessage, TextFormat, Transport};

pub struct LumiRuntime {
    pub config: LumiConfig,
    pub telegram: Arc<TelegramClient>,
    pub dispatcher: Arc<Dispatcher>,
}

impl LumiRuntime {
    /// Validate config, resolve the bot identity and wire the dispatcher.
    pub async fn bootstrap(config: LumiConfig) -> Result<Self> {
        config.validate()?;

        let telegram = Arc::new(TelegramClient::from_config(&config)?);
        let me = telegram
            .whoami()
            .await
            .context("failed to resolve bot identity (getMe)")?;
        tracing::info!(
            "Connected as {} ({})",
            me.username.as_deref().unwrap_or("<no username>"),
            me.id
        );

        let model = Arc::new(LlmClient::from_config(&config)?);
        tracing::info!("Model backend: {} at {}", model.model(), config.llm_api_url);

        let dispatcher = Arc::new(Dispatcher::new(&config, me, telegram.clone(), model)?);

        Ok(Self {
            config,
            telegram,
            dispatcher,
        })
    }

    /// Greet the welcome chats, then process inbound messages until the
    /// poller stops.
    pub async fn run(self) {
        send_welcome_messages(self.telegram.as_ref(), &self.config).await;

        let (tx, rx) = flume::unbounded();
        let poller = self.telegram.clone();
        tokio::spawn(async move {
            poller.poll_loop(tx).await;
        });

        tracing::info!("✅ {} started", self.config.agent_name);
        run_event_loop(self.dispatcher, rx).await;
    }
}

/// Admit messages one at a time in arrival order, then answer each in its own
/// task so a slow model call does not hold up the next message. When the
/// channel closes, in-flight handlers are awaited before returning.
pub async fn run_event_loop(dispatcher: Arc<Dispatcher>, rx: Receiver<InboundMessage>) {
    let mut handlers = JoinSet::new();

    while let Ok(message) = rx.recv_async().await {
        while handlers.try_join_next().is_some() {}

        let Some(admitted) = dispatcher.admit(message).await else {
            continue;
        };
        let dispatcher = dispatcher.clone();
        handlers.spawn(async move {
            let chat_id = admitted.chat_id();
            if let Err(e) = dispatcher.respond(admitted).await {
                tracing::error!("Message handler failed in chat {}: {:#}", chat_id, e);
            }
        });
    }

    while handlers.join_next().await.is_some() {}
}

/// Send the project links to every configured welcome chat.
pub async fn send_welcome_messages(transport: &dyn Transport, config: &LumiConfig) {
    for &chat_id in &config.welcome_chats {
        let text = format!(
            "Hello world\n{}",
            links_html(&config.agent_name, &config.links)
        );
        match transport
            .send_message(chat_id, &text, TextFormat::Html)
            .await
        {
            Ok(_) => tracing::info!("✅ Welcome sent to {}", chat_id),
            Err(e) => tracing::warn!("⚠️ Welcome not sent to {}: {:#}", chat_id, e),
        }
    }
}
