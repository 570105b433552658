//! Message list state and the streaming reconciliation rule.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use super::message::{Attachment, Message, MessageRole};

/// Capacity of the change-notification channel. Slow subscribers lag rather
/// than block mutations.
const EVENT_CAPACITY: usize = 256;

/// Change notification published after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEvent {
    /// A message was appended at `index`.
    Appended {
        /// Position of the new message.
        index: usize,
        /// List revision after the change.
        revision: u64,
    },
    /// The message at `index` was replaced in place.
    Updated {
        /// Position of the replaced message.
        index: usize,
        /// List revision after the change.
        revision: u64,
    },
    /// The list was emptied.
    Cleared {
        /// List revision after the change.
        revision: u64,
    },
    /// The whole list was swapped or shortened.
    Replaced {
        /// New length.
        len: usize,
        /// List revision after the change.
        revision: u64,
    },
}

impl ListEvent {
    /// List revision after the change.
    #[must_use]
    pub fn revision(&self) -> u64 {
        match *self {
            Self::Appended { revision, .. }
            | Self::Updated { revision, .. }
            | Self::Cleared { revision }
            | Self::Replaced { revision, .. } => revision,
        }
    }
}

/// What [`apply_fragment`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// A new trailing assistant message was appended at this index.
    Appended(usize),
    /// The trailing assistant message at this index was replaced.
    Updated(usize),
}

/// Fold the cumulative assistant text into the list.
///
/// A trailing assistant message is replaced by a copy carrying the full
/// `running_text`; otherwise a new assistant message is appended.
pub fn apply_fragment(messages: &mut Vec<Message>, running_text: &str) -> Reconciled {
    match messages.last_mut() {
        Some(last) if last.role == MessageRole::Assistant => {
            last.content = running_text.to_string();
            Reconciled::Updated(messages.len() - 1)
        }
        _ => {
            messages.push(Message::assistant(running_text));
            Reconciled::Appended(messages.len() - 1)
        }
    }
}

/// Shared, observable message list owned by one dialog.
///
/// Clones share the same list. Every mutation runs under a single write
/// lock and is followed by a [`ListEvent`].
#[derive(Debug, Clone)]
pub struct MessageList {
    inner: Arc<ListInner>,
}

#[derive(Debug)]
struct ListInner {
    state: RwLock<ListState>,
    events: broadcast::Sender<ListEvent>,
}

#[derive(Debug, Default)]
struct ListState {
    messages: Vec<Message>,
    revision: u64,
    /// Bumped on clear and whenever a request starts or stops; stream
    /// writers tagged with an older value are stale.
    generation: u64,
}

impl Default for MessageList {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    /// Create a list seeded with `messages`.
    #[must_use]
    pub fn with_messages(messages: Vec<Message>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ListInner {
                state: RwLock::new(ListState {
                    messages,
                    ..ListState::default()
                }),
                events,
            }),
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.inner.events.subscribe()
    }

    /// Copy of the current messages.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.read().messages.clone()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().messages.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Role of the most recent message.
    #[must_use]
    pub fn last_role(&self) -> Option<MessageRole> {
        self.read().messages.last().map(|m| m.role)
    }

    /// Number of mutations applied so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Current writer generation; pass it back to [`Self::apply_fragment`].
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Append a message and return its index.
    pub fn push(&self, message: Message) -> usize {
        let mut state = self.write();
        state.messages.push(message);
        let index = state.messages.len() - 1;
        let revision = bump(&mut state);
        self.publish(ListEvent::Appended { index, revision });
        index
    }

    /// Append a user message and return a copy of it.
    pub fn push_user(&self, content: impl Into<String>, attachments: Vec<Attachment>) -> Message {
        let message = Message::user(content).with_attachments(attachments);
        self.push(message.clone());
        message
    }

    /// Apply the reconciliation rule for the latest cumulative text.
    ///
    /// Returns `None` without touching the list when `generation` predates
    /// the last [`Self::clear`] or [`Self::invalidate_writers`].
    pub fn apply_fragment(&self, generation: u64, running_text: &str) -> Option<Reconciled> {
        let mut state = self.write();
        if state.generation != generation {
            return None;
        }
        let outcome = apply_fragment(&mut state.messages, running_text);
        let revision = bump(&mut state);
        self.publish(match outcome {
            Reconciled::Appended(index) => ListEvent::Appended { index, revision },
            Reconciled::Updated(index) => ListEvent::Updated { index, revision },
        });
        Some(outcome)
    }

    /// Drop the trailing assistant message, if there is one.
    pub fn truncate_trailing_assistant(&self) -> Option<Message> {
        let mut state = self.write();
        if state.messages.last()?.role != MessageRole::Assistant {
            return None;
        }
        let removed = state.messages.pop();
        let len = state.messages.len();
        let revision = bump(&mut state);
        self.publish(ListEvent::Replaced { len, revision });
        removed
    }

    /// Replace the whole list.
    pub fn set_messages(&self, messages: Vec<Message>) {
        let mut state = self.write();
        state.messages = messages;
        let len = state.messages.len();
        let revision = bump(&mut state);
        self.publish(ListEvent::Replaced { len, revision });
    }

    /// Retire every stream writer holding an older generation and return the
    /// new one. The messages are left untouched and no event is published.
    pub fn invalidate_writers(&self) -> u64 {
        let mut state = self.write();
        state.generation += 1;
        state.generation
    }

    /// Remove every message and invalidate in-flight stream writers.
    pub fn clear(&self) {
        let mut state = self.write();
        state.messages.clear();
        state.generation += 1;
        let revision = bump(&mut state);
        self.publish(ListEvent::Cleared { revision });
    }

    fn publish(&self, event: ListEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn read(&self) -> RwLockReadGuard<'_, ListState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ListState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn bump(state: &mut ListState) -> u64 {
    state.revision += 1;
    state.revision
}
