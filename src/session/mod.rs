//! Dialog transcript state.
//!
//! This module provides the message list a dialog owns while it is mounted,
//! together with the rule that folds streamed assistant text into it.
//!
//! # Architecture
//!
//! - [`Message`]: a single user or assistant message
//! - [`MessageList`]: shared, observable list; publishes a [`ListEvent`]
//!   after every mutation
//! - [`apply_fragment`]: the reconciliation rule for cumulative text
//!
//! # Example
//!
//! ```rust
//! use inline_chat::session::{MessageList, MessageRole};
//!
//! let list = MessageList::new();
//! list.push_user("Hello", Vec::new());
//!
//! let generation = list.generation();
//! list.apply_fragment(generation, "Hi");
//! list.apply_fragment(generation, "Hi there");
//!
//! let messages = list.snapshot();
//! assert_eq!(messages.len(), 2);
//! assert_eq!(messages[1].role, MessageRole::Assistant);
//! assert_eq!(messages[1].content, "Hi there");
//! ```

mod list;
mod message;

pub use list::{ListEvent, MessageList, Reconciled, apply_fragment};
pub use message::{Attachment, Message, MessageRole, generate_id};
