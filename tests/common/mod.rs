//! Shared test doubles.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use futures::channel::mpsc;
use inline_chat::chat::{ChatBackend, ChatRequest};
use inline_chat::dialog::DialogHost;
use inline_chat::stream::ByteStream;
use inline_chat::{Error, Result};

/// How the scripted backend answers one request.
pub enum Reply {
    /// Send these chunks, then end.
    Chunks(Vec<Vec<u8>>),
    /// Send these chunks, then never end.
    ChunksThenHang(Vec<Vec<u8>>),
    /// Send these chunks, then fail the read.
    ChunksThenError(Vec<Vec<u8>>),
    /// Reject the request with this status.
    Reject(u16),
    /// Forward whatever the test pushes into the channel.
    Channel(mpsc::UnboundedReceiver<Result<Vec<u8>>>),
    /// Hand out a body built by the test.
    Stream(ByteStream),
}

/// Backend that replays scripted replies and records every call.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
    deletes: Mutex<Vec<String>>,
    fail_delete: bool,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        })
    }

    pub fn failing_delete(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fail_delete: true,
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Chunks(Vec::new()));

        let stream: ByteStream = match reply {
            Reply::Chunks(chunks) => Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))),
            Reply::ChunksThenHang(chunks) => Box::pin(
                futures::stream::iter(chunks.into_iter().map(Ok)).chain(futures::stream::pending()),
            ),
            Reply::ChunksThenError(chunks) => Box::pin(futures::stream::iter(
                chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(Error::Stream("connection reset".into())))),
            )),
            Reply::Reject(status) => {
                return Err(Error::Api {
                    status,
                    message: "rejected".into(),
                });
            }
            Reply::Channel(rx) => Box::pin(rx),
            Reply::Stream(body) => body,
        };
        Ok(stream)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(session_id.to_string());
        if self.fail_delete {
            return Err(Error::Api {
                status: 500,
                message: "delete failed".into(),
            });
        }
        Ok(())
    }
}

/// Host that counts callbacks.
#[derive(Default)]
pub struct RecordingHost {
    closes: AtomicUsize,
    expands: Mutex<Vec<bool>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn expands(&self) -> Vec<bool> {
        self.expands.lock().unwrap().clone()
    }
}

impl DialogHost for RecordingHost {
    fn on_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_expand(&self, expanded: bool) {
        self.expands.lock().unwrap().push(expanded);
    }
}

/// Encode `text` as one text-part line.
pub fn text_line(text: &str) -> Vec<u8> {
    let escaped = text.replace('"', "\\\"").replace('\n', "\\n");
    format!("0:\"{escaped}\"\n").into_bytes()
}

/// Poll `condition` until it holds, failing the test after a second.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
