//! The chat mechanism behind both dialogs.
//!
//! A [`ChatController`] owns a dialog's transcript and drives one request at
//! a time against a [`ChatBackend`]: it submits the transcript, decodes the
//! streamed reply and folds each delta into the message list.
//!
//! # Backends
//!
//! - [`HttpChatBackend`]: `POST`/`DELETE` against a chat endpoint
//! - any other [`ChatBackend`] implementation, e.g. a scripted one in tests

mod backend;
mod controller;
mod http;

pub use backend::{ChatBackend, ChatRequest};
pub use controller::{ChatController, ChatOptions, StreamOutcome};
pub use http::HttpChatBackend;
