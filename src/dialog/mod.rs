//! Dialog shells.
//!
//! Headless state machines for the two dialogs plus the compact launcher.
//! They own open/closed and initial/active state, route key presses and
//! clicks into a [`ChatController`], and expose a [`DialogView`] for the
//! presentation layer.
//!
//! # Lifecycle
//!
//! - closed → open: [`InlineChat::set_open`], [`SearchDialog::open`], or the
//!   host reacting to [`DialogHost::on_expand`] from [`CompactSearch`]
//! - initial → active: first submitted prompt; never reverts
//! - open → closed: backdrop or close button; the inline chat also tears
//!   down its remote session
//!
//! Submissions spawn the reply on the current tokio runtime and return a
//! [`ReplyHandle`] the caller may await or drop. Submitting outside a
//! runtime panics; closing and dropping do not.

mod inline_chat;
mod input;
mod search;
mod view;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chat::{ChatController, StreamOutcome};
use crate::session::Attachment;

pub use inline_chat::InlineChat;
pub use input::{InputField, Key, KeyPress};
pub use search::{CompactSearch, SearchDialog, SearchSettings};
pub use view::{
    DialogView, InitialView, MessageView, NO_RECENTS_LABEL, ScrollFollower, ScrollRequest,
    TranscriptView,
};

/// Resolves when the reply for a submission has finished streaming.
pub type ReplyHandle = JoinHandle<StreamOutcome>;

/// Whether the user has submitted anything yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DialogPhase {
    /// Nothing submitted: suggestions and recents are shown.
    #[default]
    Initial,
    /// At least one prompt submitted: the transcript is shown.
    Active,
}

/// Capabilities the containing application supplies.
pub trait DialogHost: Send + Sync {
    /// Dismiss the dialog.
    fn on_close(&self);

    /// Promote the compact input into the full dialog.
    fn on_expand(&self, expanded: bool) {
        let _ = expanded;
    }
}

fn spawn_reply(
    controller: Arc<ChatController>,
    content: String,
    attachments: Vec<Attachment>,
) -> ReplyHandle {
    tokio::spawn(async move {
        let outcome = controller.append(content, attachments).await;
        log_failure(&controller, outcome)
    })
}

fn spawn_reload(controller: Arc<ChatController>) -> ReplyHandle {
    tokio::spawn(async move {
        let outcome = controller.reload().await;
        log_failure(&controller, outcome)
    })
}

fn log_failure(controller: &ChatController, outcome: crate::Result<StreamOutcome>) -> StreamOutcome {
    outcome.unwrap_or_else(|err| {
        warn!(
            name: "chat.request.failed",
            session_id = %controller.session_id(),
            error = %err,
            "Chat request failed"
        );
        StreamOutcome::Failed
    })
}

/// Fire-and-forget deletion of the remote conversation.
///
/// Without a runtime (e.g. dropped after shutdown) the request is skipped.
fn spawn_delete(controller: Arc<ChatController>) -> Option<JoinHandle<()>> {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!(
            name: "chat.session.delete_skipped",
            session_id = %controller.session_id(),
            "No runtime; remote session not deleted"
        );
        return None;
    };

    Some(handle.spawn(async move {
        if let Err(err) = controller.delete_remote().await {
            warn!(
                name: "chat.session.delete_failed",
                session_id = %controller.session_id(),
                error = %err,
                "Failed to delete inline chat"
            );
        }
    }))
}
