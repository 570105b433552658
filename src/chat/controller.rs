//! Chat controller: the state object a dialog owns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::backend::{ChatBackend, ChatRequest};
use crate::error::Result;
use crate::session::{Attachment, ListEvent, Message, MessageList, MessageRole, generate_id};
use crate::stream::{LineBuffering, decode_deltas};

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The response stream ended normally.
    Completed,
    /// Reading the stream failed; partial content was kept.
    Interrupted,
    /// [`ChatController::stop`] or a newer request cut the stream short.
    Cancelled,
    /// The stream could not be opened.
    Failed,
    /// Nothing was sent.
    Skipped,
}

/// Per-dialog options for the chat mechanism.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Model identifier sent with every request.
    pub model_id: String,
    /// Whether requests carry the session identifier.
    pub include_session_id: bool,
    /// Chunk-boundary handling for the response decoder.
    pub line_buffering: LineBuffering,
    /// Transcript the dialog starts with.
    pub initial_messages: Vec<Message>,
}

impl ChatOptions {
    /// Options for `model_id` with default decoding and no session id.
    #[must_use]
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            include_session_id: false,
            line_buffering: LineBuffering::default(),
            initial_messages: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct ActiveRequest {
    seq: u64,
    token: CancellationToken,
}

/// What a request needs to stream: its sequence number, its cancellation
/// token and the list generation it may write under.
#[derive(Debug)]
struct Ticket {
    seq: u64,
    token: CancellationToken,
    generation: u64,
}

/// Injectable chat state: transcript, loading flag and the request loop.
///
/// One controller belongs to one dialog instance and carries that
/// instance's session identifier. At most one request streams at a time;
/// starting a new one stops the previous.
pub struct ChatController {
    session_id: String,
    options: ChatOptions,
    messages: MessageList,
    backend: Arc<dyn ChatBackend>,
    active: Mutex<Option<ActiveRequest>>,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for ChatController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController")
            .field("session_id", &self.session_id)
            .field("options", &self.options)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl ChatController {
    /// Create a controller with a freshly generated session identifier.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, options: ChatOptions) -> Self {
        Self::with_session_id(generate_id(), backend, options)
    }

    /// Create a controller bound to an existing session identifier.
    #[must_use]
    pub fn with_session_id(
        session_id: impl Into<String>,
        backend: Arc<dyn ChatBackend>,
        mut options: ChatOptions,
    ) -> Self {
        let initial = std::mem::take(&mut options.initial_messages);
        Self {
            session_id: session_id.into(),
            options,
            messages: MessageList::with_messages(initial),
            backend,
            active: Mutex::new(None),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Session identifier of the remote conversation.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Model identifier sent with requests.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.options.model_id
    }

    /// Current transcript.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.messages.snapshot()
    }

    /// The underlying list, for direct observation.
    #[must_use]
    pub fn message_list(&self) -> &MessageList {
        &self.messages
    }

    /// Subscribe to transcript changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.messages.subscribe()
    }

    /// Whether a request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Whether a request is in flight and no assistant text has arrived yet.
    #[must_use]
    pub fn is_thinking(&self) -> bool {
        self.is_loading() && self.messages.last_role() == Some(MessageRole::User)
    }

    /// Replace the transcript.
    pub fn set_messages(&self, messages: Vec<Message>) {
        self.messages.set_messages(messages);
    }

    /// Empty the transcript. A stream still running can no longer write to it.
    pub fn clear(&self) {
        self.messages.clear();
    }

    /// Abort the in-flight request, if any. None of its later fragments
    /// reach the list. Never fails.
    pub fn stop(&self) {
        let active = {
            let mut slot = self.lock_active();
            let active = slot.take();
            if active.is_some() {
                self.messages.invalidate_writers();
            }
            active
        };
        if let Some(active) = active {
            active.token.cancel();
            debug!(
                name: "chat.request.stopped",
                session_id = %self.session_id,
                seq = active.seq,
                "Request stopped"
            );
        }
    }

    /// Trim `input` and append it as a user message; blank input is ignored.
    pub async fn submit(&self, input: &str) -> Result<StreamOutcome> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(StreamOutcome::Skipped);
        }
        self.append(text, Vec::new()).await
    }

    /// Append a user message and stream the assistant reply into the list.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be opened. Errors while reading
    /// the stream are logged and reported as [`StreamOutcome::Interrupted`].
    pub async fn append(
        &self,
        content: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Result<StreamOutcome> {
        let ticket = self.begin();
        self.messages.push_user(content, attachments);
        self.stream_reply(ticket).await
    }

    /// Drop the trailing assistant reply and ask again.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be opened.
    pub async fn reload(&self) -> Result<StreamOutcome> {
        let ticket = self.begin();
        self.messages.truncate_trailing_assistant();
        if self.messages.last_role() != Some(MessageRole::User) {
            self.finish(ticket.seq);
            return Ok(StreamOutcome::Skipped);
        }
        self.stream_reply(ticket).await
    }

    /// Delete the remote conversation for this session.
    ///
    /// # Errors
    ///
    /// Returns whatever the backend reports.
    pub async fn delete_remote(&self) -> Result<()> {
        self.backend.delete_session(&self.session_id).await
    }

    /// Register a new request and cancel the previous one. The old list
    /// writer is retired while the active-request lock is held.
    fn begin(&self) -> Ticket {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let mut active = self.lock_active();
        let generation = self.messages.invalidate_writers();
        let previous = active.replace(ActiveRequest {
            seq,
            token: token.clone(),
        });
        drop(active);
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        Ticket {
            seq,
            token,
            generation,
        }
    }

    fn finish(&self, seq: u64) {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|a| a.seq == seq) {
            *active = None;
        }
    }

    async fn stream_reply(&self, ticket: Ticket) -> Result<StreamOutcome> {
        let Ticket {
            seq,
            token,
            generation,
        } = ticket;
        let _guard = FinishGuard {
            controller: self,
            seq,
        };
        let request = ChatRequest {
            id: self
                .options
                .include_session_id
                .then(|| self.session_id.clone()),
            model_id: self.options.model_id.clone(),
            messages: self.messages.snapshot(),
        };

        debug!(
            name: "chat.request.start",
            session_id = %self.session_id,
            model = %request.model_id,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let body = tokio::select! {
            biased;
            () = token.cancelled() => return Ok(StreamOutcome::Cancelled),
            opened = self.backend.open_stream(&request) => opened?,
        };

        let deltas = decode_deltas(body, self.options.line_buffering);
        futures::pin_mut!(deltas);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => return Ok(StreamOutcome::Cancelled),
                next = deltas.next() => match next {
                    Some(Ok(delta)) => {
                        // A stale generation means stop(), a newer request or
                        // clear() got here first.
                        if self.messages.apply_fragment(generation, &delta.response).is_none() {
                            return Ok(StreamOutcome::Cancelled);
                        }
                    }
                    Some(Err(err)) => {
                        warn!(
                            name: "chat.stream.error",
                            session_id = %self.session_id,
                            error = %err,
                            "Stream error"
                        );
                        return Ok(StreamOutcome::Interrupted);
                    }
                    None => {
                        debug!(
                            name: "chat.request.complete",
                            session_id = %self.session_id,
                            "Response stream finished"
                        );
                        return Ok(StreamOutcome::Completed);
                    }
                },
            }
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRequest>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the loading state when a request's future completes or is dropped.
struct FinishGuard<'a> {
    controller: &'a ChatController,
    seq: u64,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.controller.finish(self.seq);
    }
}
