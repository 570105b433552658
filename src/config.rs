//! Layered configuration.
//!
//! Priority, lowest first: built-in defaults, an optional config file, `INLINE_CHAT_*`
//! environment variables, then command-line flags.

use clap::{Parser, ValueEnum};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::chat::ChatOptions;
use crate::session::Message;
use crate::stream::LineBuffering;

/// Prompts offered by the search dialog before the first interaction.
pub const DEFAULT_SUGGESTED_PROMPTS: [&str; 4] = [
    "What are the advantages of using Next.js?",
    "Write code to demonstrate djikstra's algorithm",
    "Help me write an essay about silicon valley",
    "What is the weather in San Francisco?",
];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Base URL of the chat server
    #[arg(long, env = "CHAT_BASE_URL")]
    pub base_url: Option<String>,

    /// Model identifier
    #[arg(long, env = "CHAT_MODEL")]
    pub model: Option<String>,

    /// Which dialog to run
    #[arg(long, value_enum)]
    pub mode: Option<DialogMode>,
}

/// Dialog the terminal front-end drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogMode {
    /// Search/ask dialog with suggestions.
    #[default]
    Search,
    /// Inline chat overlay.
    Inline,
}

impl DialogMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Inline => "inline",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub mode: DialogMode,
    pub chat: ChatConfig,
    pub dialog: DialogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub base_url: String,
    /// Endpoint of the inline chat; also receives the teardown `DELETE`.
    pub chat_endpoint: String,
    pub search_endpoint: String,
    pub model_id: String,
    pub search_model_id: String,
    pub line_buffering: LineBuffering,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DialogConfig {
    /// Placeholder of the compact search input.
    pub placeholder: String,
    pub prompt_placeholder: String,
    /// Prefill: seeds the inline chat with a user message, or the search input.
    pub initial_value: String,
    pub recent_message: String,
    pub suggested_prompts: Vec<String>,
}

impl ChatConfig {
    /// Chat options for the inline chat.
    #[must_use]
    pub fn inline_options(&self, initial_value: &str) -> ChatOptions {
        let mut options = ChatOptions::new(self.model_id.clone());
        options.include_session_id = true;
        options.line_buffering = self.line_buffering;
        if !initial_value.is_empty() {
            options.initial_messages = vec![Message::user(initial_value)];
        }
        options
    }

    /// Chat options for the search dialog. Requests carry the dialog's
    /// generated id; the search endpoint keeps no session to delete.
    #[must_use]
    pub fn search_options(&self) -> ChatOptions {
        let mut options = ChatOptions::new(self.search_model_id.clone());
        options.include_session_id = true;
        options.line_buffering = self.line_buffering;
        options
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("mode", DialogMode::default().as_str())?
            .set_default("chat.base_url", "http://127.0.0.1:3000")?
            .set_default("chat.chat_endpoint", "/api/chat")?
            .set_default("chat.search_endpoint", "/api/search-chat")?
            .set_default("chat.model_id", "gpt-3.5-turbo")?
            .set_default("chat.search_model_id", "gpt-4o-mini")?
            .set_default("chat.line_buffering", "buffered")?
            .set_default("dialog.placeholder", "Search...")?
            .set_default("dialog.prompt_placeholder", "Ask a question...")?
            .set_default("dialog.initial_value", "")?
            .set_default("dialog.recent_message", "")?
            .set_default(
                "dialog.suggested_prompts",
                DEFAULT_SUGGESTED_PROMPTS.to_vec(),
            )?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("inline-chat").required(false)),
        };

        // E.g. INLINE_CHAT_CHAT__MODEL_ID=gpt-4o
        builder = builder.add_source(
            Environment::with_prefix("INLINE_CHAT")
                .prefix_separator("_")
                .separator("__"),
        );

        if let Some(url) = cli.base_url {
            builder = builder.set_override("chat.base_url", url)?;
        }
        if let Some(model) = cli.model {
            builder = builder.set_override("chat.model_id", model.clone())?;
            builder = builder.set_override("chat.search_model_id", model)?;
        }
        if let Some(mode) = cli.mode {
            builder = builder.set_override("mode", mode.as_str())?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_options_seed_initial_value() {
        let chat = ChatConfig {
            base_url: "http://localhost".into(),
            chat_endpoint: "/api/chat".into(),
            search_endpoint: "/api/search-chat".into(),
            model_id: "m".into(),
            search_model_id: "s".into(),
            line_buffering: LineBuffering::PerChunk,
        };

        let options = chat.inline_options("Explain this");
        assert!(options.include_session_id);
        assert_eq!(options.initial_messages.len(), 1);
        assert_eq!(options.initial_messages[0].content, "Explain this");
        assert_eq!(options.line_buffering, LineBuffering::PerChunk);

        assert!(chat.inline_options("").initial_messages.is_empty());

        let search = chat.search_options();
        assert!(search.include_session_id);
        assert!(search.initial_messages.is_empty());
        assert_eq!(search.model_id, "s");
    }
}
