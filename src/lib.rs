//! Inline chat and search dialogs for a chat-style assistant.
//!
//! Headless dialog components that stream assistant replies from a chat
//! endpoint, fold them into a transcript, and tell the presentation layer
//! when to scroll.
//!
//! # Architecture
//!
//! - **Decoder**: line decoder for the `0:"…"` text stream
//! - **Transcript**: observable message list with in-place streaming updates
//! - **Chat mechanism**: injectable controller over a backend trait
//! - **Dialogs**: inline chat, search dialog and compact launcher
//!
//! # Modules
//!
//! - [`stream`]: streamed-response decoding
//! - [`session`]: messages and the message list
//! - [`chat`]: controller and backends
//! - [`dialog`]: dialog state machines and view models
//! - [`config`]: layered configuration

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod chat;
pub mod config;
pub mod dialog;
pub mod error;
pub mod session;
pub mod stream;

pub use error::{Error, Result};
