//! View models handed to the presentation layer.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use super::input::InputField;
use crate::chat::ChatController;
use crate::session::{ListEvent, MessageRole};

/// Shown under "Recents" when there is no recent question.
pub const NO_RECENTS_LABEL: &str = "No recent questions";

/// What a dialog currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogView {
    /// Dialog is closed.
    Hidden,
    /// Open, nothing submitted yet.
    Initial(InitialView),
    /// Open with a transcript.
    Transcript(TranscriptView),
}

/// Input, recents and suggestions before the first submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialView {
    /// Dialog heading.
    pub title: String,
    /// Current input text.
    pub input: String,
    /// Shown while the input is empty.
    pub placeholder: String,
    /// Empty when there is nothing to offer; render [`NO_RECENTS_LABEL`].
    pub recents: Vec<String>,
    /// Clickable prompts, in display order.
    pub suggestions: Vec<String>,
}

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    /// Stable key of the message.
    pub id: String,
    /// Author of the message.
    pub role: MessageRole,
    /// Text as decoded so far.
    pub content: String,
    /// Last message while a request is in flight.
    pub streaming: bool,
}

/// Transcript with the live input underneath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptView {
    /// Dialog heading.
    pub title: String,
    /// Messages, oldest first.
    pub messages: Vec<MessageView>,
    /// Placeholder for the reply that has not started yet.
    pub thinking: bool,
    /// Current input text.
    pub input: String,
    /// Shown while the input is empty.
    pub placeholder: String,
}

impl TranscriptView {
    /// Build from the controller's current state.
    #[must_use]
    pub fn new(title: &str, controller: &ChatController, input: &InputField) -> Self {
        let loading = controller.is_loading();
        let messages = controller.messages();
        let last = messages.len().saturating_sub(1);
        let thinking = loading && messages.last().is_some_and(|m| m.role == MessageRole::User);

        Self {
            title: title.to_string(),
            messages: messages
                .into_iter()
                .enumerate()
                .map(|(i, m)| MessageView {
                    id: m.id,
                    role: m.role,
                    content: m.content,
                    streaming: loading && i == last,
                })
                .collect(),
            thinking,
            input: input.value().to_string(),
            placeholder: input.placeholder().to_string(),
        }
    }
}

/// A request to move the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollRequest {
    /// Scroll the transcript end sentinel into view.
    Bottom {
        /// Animate the scroll.
        smooth: bool,
    },
}

/// Turns transcript changes into scroll-to-bottom requests.
///
/// Any number of changes observed at once collapse into one request.
#[derive(Debug)]
pub struct ScrollFollower {
    events: broadcast::Receiver<ListEvent>,
}

impl ScrollFollower {
    /// Follow the controller's transcript from now on.
    #[must_use]
    pub fn new(controller: &ChatController) -> Self {
        Self {
            events: controller.subscribe(),
        }
    }

    /// Non-blocking check for changes since the last call.
    pub fn poll(&mut self) -> Option<ScrollRequest> {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => changed = true,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        changed.then_some(ScrollRequest::Bottom { smooth: true })
    }

    /// Wait for the next change. `None` once the transcript is gone.
    pub async fn changed(&mut self) -> Option<ScrollRequest> {
        match self.events.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {
                self.poll();
                Some(ScrollRequest::Bottom { smooth: true })
            }
            Err(RecvError::Closed) => None,
        }
    }
}
