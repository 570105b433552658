//! Search/ask dialog and its compact launcher.

use std::sync::Arc;

use super::input::{InputField, Key, KeyPress};
use super::view::{DialogView, InitialView, TranscriptView};
use super::{DialogHost, DialogPhase, ReplyHandle, spawn_reply};
use crate::chat::{ChatBackend, ChatController, ChatOptions};
use crate::config::{DEFAULT_SUGGESTED_PROMPTS, DialogConfig};

const TITLE: &str = "Ask AI";

/// Presentation options of the search dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Prefill of the question input.
    pub initial_value: String,
    /// Offered under "Recents"; empty for none.
    pub recent_message: String,
    /// Placeholder of the question input.
    pub placeholder: String,
    /// Shown before the first submission.
    pub suggested_prompts: Vec<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            initial_value: String::new(),
            recent_message: String::new(),
            placeholder: "Ask a question...".to_string(),
            suggested_prompts: DEFAULT_SUGGESTED_PROMPTS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl From<&DialogConfig> for SearchSettings {
    fn from(config: &DialogConfig) -> Self {
        Self {
            initial_value: config.initial_value.clone(),
            recent_message: config.recent_message.clone(),
            placeholder: config.prompt_placeholder.clone(),
            suggested_prompts: config.suggested_prompts.clone(),
        }
    }
}

/// Ask dialog: suggestions first, transcript after the first question.
pub struct SearchDialog {
    open: bool,
    phase: DialogPhase,
    input: InputField,
    recent_message: String,
    suggestions: Vec<String>,
    controller: Arc<ChatController>,
    host: Arc<dyn DialogHost>,
}

impl std::fmt::Debug for SearchDialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchDialog")
            .field("open", &self.open)
            .field("phase", &self.phase)
            .field("input", &self.input)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl SearchDialog {
    /// Create a closed dialog.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        options: ChatOptions,
        settings: SearchSettings,
        host: Arc<dyn DialogHost>,
    ) -> Self {
        Self {
            open: false,
            phase: DialogPhase::Initial,
            input: InputField::new(settings.placeholder).with_value(settings.initial_value),
            recent_message: settings.recent_message,
            suggestions: settings.suggested_prompts,
            controller: Arc::new(ChatController::new(backend, options)),
            host,
        }
    }

    /// Chat state backing this dialog.
    #[must_use]
    pub fn controller(&self) -> &Arc<ChatController> {
        &self.controller
    }

    /// Whether the dialog is shown.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether anything has been submitted yet.
    #[must_use]
    pub fn phase(&self) -> DialogPhase {
        self.phase
    }

    /// Question input.
    #[must_use]
    pub fn input(&self) -> &InputField {
        &self.input
    }

    /// Suggested prompts, in display order.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// Recent question, if one was configured.
    #[must_use]
    pub fn recent_message(&self) -> Option<&str> {
        (!self.recent_message.is_empty()).then_some(self.recent_message.as_str())
    }

    /// Show the dialog.
    pub fn open(&mut self) {
        self.open = true;
    }

    /// Close button.
    pub fn close(&mut self) {
        self.open = false;
        self.host.on_close();
    }

    /// Click outside the panel.
    pub fn backdrop_click(&mut self) {
        self.close();
    }

    /// Route a key press; Enter submits the question.
    ///
    /// # Panics
    ///
    /// Outside a tokio runtime, since the reply is spawned onto it.
    pub fn handle_key(&mut self, key: KeyPress) -> Option<ReplyHandle> {
        if !self.open {
            return None;
        }
        let text = self.input.handle_key(key)?;
        Some(self.send(text))
    }

    /// Send button of the active view.
    ///
    /// # Panics
    ///
    /// Outside a tokio runtime, since the reply is spawned onto it.
    pub fn click_send(&mut self) -> Option<ReplyHandle> {
        if !self.open {
            return None;
        }
        let text = self.input.take_submission()?;
        Some(self.send(text))
    }

    /// Click the suggestion at `index`.
    ///
    /// # Panics
    ///
    /// Outside a tokio runtime, since the reply is spawned onto it.
    pub fn click_suggestion(&mut self, index: usize) -> Option<ReplyHandle> {
        let prompt = self.suggestions.get(index)?.clone();
        self.click_prompt(&prompt)
    }

    /// Click the recent question, if there is one.
    ///
    /// # Panics
    ///
    /// Outside a tokio runtime, since the reply is spawned onto it.
    pub fn click_recent(&mut self) -> Option<ReplyHandle> {
        let prompt = self.recent_message()?.to_string();
        self.click_prompt(&prompt)
    }

    /// Submit `prompt` verbatim and clear the input.
    ///
    /// # Panics
    ///
    /// Outside a tokio runtime, since the reply is spawned onto it.
    pub fn click_prompt(&mut self, prompt: &str) -> Option<ReplyHandle> {
        if !self.open {
            return None;
        }
        self.input.clear();
        Some(self.send(prompt.to_string()))
    }

    /// What to render right now.
    #[must_use]
    pub fn view(&self) -> DialogView {
        if !self.open {
            return DialogView::Hidden;
        }
        match self.phase {
            DialogPhase::Initial => DialogView::Initial(InitialView {
                title: TITLE.to_string(),
                input: self.input.value().to_string(),
                placeholder: self.input.placeholder().to_string(),
                recents: self.recent_message().map(ToString::to_string).into_iter().collect(),
                suggestions: self.suggestions.clone(),
            }),
            DialogPhase::Active => {
                DialogView::Transcript(TranscriptView::new(TITLE, &self.controller, &self.input))
            }
        }
    }

    fn send(&mut self, text: String) -> ReplyHandle {
        self.phase = DialogPhase::Active;
        spawn_reply(Arc::clone(&self.controller), text, Vec::new())
    }
}

impl Drop for SearchDialog {
    fn drop(&mut self) {
        self.controller.stop();
    }
}

/// Compact search input that asks the host to open the full dialog.
pub struct CompactSearch {
    input: InputField,
    host: Arc<dyn DialogHost>,
    typed: bool,
}

impl std::fmt::Debug for CompactSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactSearch")
            .field("input", &self.input)
            .field("typed", &self.typed)
            .finish_non_exhaustive()
    }
}

impl CompactSearch {
    #[must_use]
    pub fn new(placeholder: impl Into<String>, host: Arc<dyn DialogHost>) -> Self {
        Self {
            input: InputField::new(placeholder),
            host,
            typed: false,
        }
    }

    /// Local search input.
    #[must_use]
    pub fn input(&self) -> &InputField {
        &self.input
    }

    /// Clicking the compact input asks the host to expand.
    pub fn click(&mut self) {
        self.host.on_expand(true);
    }

    /// Edit the local value. The first keystroke also expands.
    pub fn handle_key(&mut self, key: KeyPress) {
        if !self.typed {
            self.typed = true;
            self.host.on_expand(true);
        }
        if key.key != Key::Enter {
            self.input.handle_key(key);
        }
    }
}
