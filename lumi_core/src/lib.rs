pub mod chat_store;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod http_client;
pub mod llm_client;
pub mod mood;
pub mod prompt;
pub mod runtime;
pub mod state;
pub mod telegram;
pub mod transport;
pub mod wake;

#[cfg(test)]
mod testing;
