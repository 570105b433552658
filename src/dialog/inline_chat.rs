//! Inline chat overlay.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use super::input::{InputField, KeyPress};
use super::view::{DialogView, TranscriptView};
use super::{DialogHost, DialogPhase, ReplyHandle, spawn_delete, spawn_reload, spawn_reply};
use crate::chat::{ChatBackend, ChatController, ChatOptions};
use crate::session::Attachment;

const TITLE: &str = "Inline chat";

/// Chat overlay bound to one remote conversation.
///
/// The session identifier is generated once per component key: reopening
/// keeps it, [`Self::set_key`] with a different key starts a new one.
/// Closing or dropping the dialog tears the session down: the stream is
/// stopped, the transcript cleared and one `DELETE` is sent for the id.
pub struct InlineChat {
    key: String,
    open: bool,
    phase: DialogPhase,
    input: InputField,
    attachments: Vec<Attachment>,
    backend: Arc<dyn ChatBackend>,
    options: ChatOptions,
    controller: Arc<ChatController>,
    host: Arc<dyn DialogHost>,
    torn_down: bool,
}

impl std::fmt::Debug for InlineChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineChat")
            .field("key", &self.key)
            .field("open", &self.open)
            .field("phase", &self.phase)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl InlineChat {
    /// Mount a closed inline chat under `key`.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        backend: Arc<dyn ChatBackend>,
        options: ChatOptions,
        host: Arc<dyn DialogHost>,
    ) -> Self {
        let controller = Arc::new(ChatController::new(
            Arc::clone(&backend),
            options.clone(),
        ));
        Self {
            key: key.into(),
            open: false,
            phase: DialogPhase::Initial,
            input: InputField::default(),
            attachments: Vec::new(),
            backend,
            options,
            controller,
            host,
            torn_down: false,
        }
    }

    /// Component key the session id is memoized on.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Identifier of the remote conversation.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.controller.session_id()
    }

    /// Chat state backing this dialog.
    #[must_use]
    pub fn controller(&self) -> &Arc<ChatController> {
        &self.controller
    }

    /// Whether the overlay is shown.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether anything has been submitted yet.
    #[must_use]
    pub fn phase(&self) -> DialogPhase {
        self.phase
    }

    /// Message input.
    #[must_use]
    pub fn input(&self) -> &InputField {
        &self.input
    }

    /// Attachments queued for the next submission.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Follow the host's `is_open` flag.
    pub fn set_open(&mut self, open: bool) {
        if open && !self.open {
            self.torn_down = false;
        }
        self.open = open;
    }

    /// Re-key the component. A new key tears down the current session and
    /// starts a fresh one.
    pub fn set_key(&mut self, key: impl Into<String>) -> Option<JoinHandle<()>> {
        let key = key.into();
        if key == self.key {
            return None;
        }
        let deletion = self.teardown();
        self.key = key;
        self.controller = Arc::new(ChatController::new(
            Arc::clone(&self.backend),
            self.options.clone(),
        ));
        self.torn_down = false;
        deletion
    }

    /// Queue an attachment for the next submission.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Route a key press; Enter submits.
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

    /// Submit the current input, as the send button does.
    ///
    /// # Panics
    ///
    /// Outside a tokio runtime, since the reply is spawned onto it.
    pub fn submit_input(&mut self) -> Option<ReplyHandle> {
        if !self.open {
            return None;
        }
        let text = self.input.take_submission()?;
        Some(self.send(text))
    }

    /// Regenerate the last assistant reply.
    ///
    /// # Panics
    ///
    /// Outside a tokio runtime, since the reply is spawned onto it.
    pub fn reload(&mut self) -> ReplyHandle {
        spawn_reload(Arc::clone(&self.controller))
    }

    /// Abort the reply being streamed.
    pub fn stop(&self) {
        self.controller.stop();
    }

    /// Click outside the panel.
    pub fn backdrop_click(&mut self) -> Option<JoinHandle<()>> {
        self.close()
    }

    /// Dismiss the dialog and tear down its session.
    ///
    /// Returns the deletion task, or `None` if the session was already torn
    /// down in this open cycle.
    pub fn close(&mut self) -> Option<JoinHandle<()>> {
        self.host.on_close();
        self.open = false;
        self.teardown()
    }

    /// What to render right now.
    #[must_use]
    pub fn view(&self) -> DialogView {
        if !self.open {
            return DialogView::Hidden;
        }
        DialogView::Transcript(TranscriptView::new(TITLE, &self.controller, &self.input))
    }

    fn send(&mut self, text: String) -> ReplyHandle {
        self.phase = DialogPhase::Active;
        let attachments = std::mem::take(&mut self.attachments);
        spawn_reply(Arc::clone(&self.controller), text, attachments)
    }

    fn teardown(&mut self) -> Option<JoinHandle<()>> {
        if self.torn_down {
            return None;
        }
        self.torn_down = true;
        self.controller.stop();
        self.controller.clear();
        debug!(
            name: "chat.session.teardown",
            session_id = %self.controller.session_id(),
            "Inline chat torn down"
        );
        spawn_delete(Arc::clone(&self.controller))
    }
}

impl Drop for InlineChat {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}
