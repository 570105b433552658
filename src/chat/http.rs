//! HTTP implementation of [`ChatBackend`].

use futures::TryStreamExt;
use url::Url;

use super::backend::{ChatBackend, ChatRequest};
use crate::error::{Error, Result};
use crate::stream::ByteStream;

/// Chat backend speaking to `POST`/`DELETE {base_url}{endpoint}`.
///
/// # Example
///
/// ```rust,no_run
/// use inline_chat::chat::HttpChatBackend;
///
/// # fn example() -> inline_chat::Result<()> {
/// let backend = HttpChatBackend::new("http://localhost:3000", "/api/chat")?;
/// assert_eq!(backend.endpoint_url().as_str(), "http://localhost:3000/api/chat");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    endpoint: Url,
    http: reqwest::Client,
}

impl HttpChatBackend {
    /// Create a backend for `endpoint` relative to `base_url`.
    pub fn new(base_url: impl AsRef<str>, endpoint: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, endpoint, reqwest::Client::new())
    }

    /// Create a backend with a custom reqwest client.
    pub fn with_client(
        base_url: impl AsRef<str>,
        endpoint: impl AsRef<str>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let endpoint = Url::parse(base_url.as_ref())?.join(endpoint.as_ref())?;
        Ok(Self { endpoint, http })
    }

    /// Resolved endpoint URL.
    pub fn endpoint_url(&self) -> &Url {
        &self.endpoint
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".into());
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait::async_trait]
impl ChatBackend for HttpChatBackend {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body = response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(Error::from);
        Ok(Box::pin(body))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("id", session_id);

        let response = self.http.delete(url).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_resolution() {
        let backend = HttpChatBackend::new("http://localhost:3000", "/api/search-chat").unwrap();
        assert_eq!(
            backend.endpoint_url().as_str(),
            "http://localhost:3000/api/search-chat"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpChatBackend::new("not a url", "/api/chat"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
