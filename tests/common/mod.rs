//! Shared helpers: a scripted upstream and test configuration.

#![allow(dead_code)]

use async_trait::async_trait;
use chat_relay::api::models::{CompletionRequest, StreamChunk};
use chat_relay::api::upstream::{ChunkStream, UpstreamClient};
use chat_relay::core::{AppConfig, UpstreamError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a [`FakeUpstream`] does when opened.
#[derive(Clone)]
pub enum Script {
    /// Yield these items, then end.
    Chunks(Vec<Result<StreamChunk, String>>),
    /// Yield text chunks forever.
    Endless,
    /// Refuse to open with a provider status.
    Reject { status: u16, message: String },
}

/// Upstream double that records calls, pulled chunks and stream release.
pub struct FakeUpstream {
    script: Script,
    pub calls: AtomicUsize,
    pub pulled: Arc<AtomicUsize>,
    pub released: Arc<AtomicBool>,
    pub last_request: Mutex<Option<CompletionRequest>>,
}

impl FakeUpstream {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            pulled: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
            last_request: Mutex::new(None),
        })
    }

    pub fn texts(texts: &[&str]) -> Arc<Self> {
        let mut items: Vec<Result<StreamChunk, String>> =
            texts.iter().map(|t| Ok(StreamChunk::text(*t))).collect();
        items.push(Ok(StreamChunk::finished()));
        Self::new(Script::Chunks(items))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

/// Flags the upstream as released when the chunk stream is dropped.
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn open_stream(
        &self,
        _credential: &str,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let pulled = self.pulled.clone();
        let guard = ReleaseGuard(self.released.clone());

        match self.script.clone() {
            Script::Chunks(items) => Ok(Box::pin(async_stream::stream! {
                let _guard = guard;
                for item in items {
                    pulled.fetch_add(1, Ordering::SeqCst);
                    yield item.map_err(UpstreamError::Framing);
                }
            })),
            Script::Endless => Ok(Box::pin(async_stream::stream! {
                let _guard = guard;
                let mut n = 0u64;
                loop {
                    pulled.fetch_add(1, Ordering::SeqCst);
                    yield Ok::<_, UpstreamError>(StreamChunk::text(format!("chunk-{} ", n)));
                    n += 1;
                }
            })),
            Script::Reject { status, message } => Err(UpstreamError::Status { status, message }),
        }
    }
}

pub fn test_config(api_key: Option<&str>) -> Arc<AppConfig> {
    let mut config = AppConfig::default();
    config.upstream.api_key = api_key.map(str::to_string);
    Arc::new(config)
}

pub fn chat_body(content: &str) -> String {
    serde_json::json!({
        "messages": [{ "role": "user", "content": content }]
    })
    .to_string()
}
