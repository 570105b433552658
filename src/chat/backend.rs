//! Backend seam for the remote chat resource.

use serde::Serialize;

use crate::error::Result;
use crate::session::Message;
use crate::stream::ByteStream;

/// Body of a chat submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Session identifier of the remote conversation, when the endpoint
    /// tracks one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Model to answer with.
    pub model_id: String,
    /// Full transcript, oldest first.
    pub messages: Vec<Message>,
}

/// Remote chat resource a dialog talks to.
///
/// Implementations return the raw response body; decoding is done by the
/// caller. Tests substitute scripted implementations.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Submit the transcript and return the streamed response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or is rejected.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// Delete the remote conversation for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or is rejected.
    async fn delete_session(&self, session_id: &str) -> Result<()>;
}
