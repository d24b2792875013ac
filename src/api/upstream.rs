//! Upstream completion client.
//!
//! [`UpstreamClient`] is the seam between the relay and the provider. The
//! production implementation, [`OpenAiUpstream`], talks to any
//! OpenAI-compatible `/chat/completions` endpoint and exposes the response as
//! a lazy [`ChunkStream`]. Dropping the stream drops the HTTP response, which
//! closes (or returns to the pool) the underlying connection.

use crate::api::models::{CompletionRequest, StreamChunk};
use crate::core::config::UpstreamConfig;
use crate::core::error::UpstreamError;
use crate::transformer::stream::{decode_openai_event, SseParser, MAX_EVENT_BYTES};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::{json, Value};
use std::error::Error;
use std::time::Duration;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Lazy, finite, non-restartable sequence of upstream chunks.
///
/// At most one `Err` item is produced, and it is always the last item.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, UpstreamError>>;

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Open a streaming completion.
    ///
    /// Errors returned here happen before any chunk exists and can still be
    /// reported to the client as a structured response.
    async fn open_stream(
        &self,
        credential: &str,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, UpstreamError>;
}

/// Client for OpenAI-compatible chat completion APIs.
#[derive(Clone)]
pub struct OpenAiUpstream {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAiUpstream {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl UpstreamClient for OpenAiUpstream {
    async fn open_stream(
        &self,
        credential: &str,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, UpstreamError> {
        if credential.trim().is_empty() {
            return Err(UpstreamError::MissingCredential);
        }

        let url = self.completions_url();
        let payload = build_completion_payload(request);

        let response = build_upstream_request(&self.http_client, &url, credential, &payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    url = %url,
                    model = %request.model,
                    error = %e,
                    error_source = ?e.source(),
                    is_timeout = e.is_timeout(),
                    is_connect = e.is_connect(),
                    "HTTP request failed to provider"
                );
                UpstreamError::Transport(e)
            })?;

        let status = response.status();
        tracing::debug!(
            url = %url,
            status = %status,
            model = %request.model,
            "Upstream responded"
        );

        if !status.is_success() {
            return Err(read_upstream_error(response).await);
        }

        Ok(chunk_stream(response.bytes_stream()))
    }
}

/// Create the shared HTTP client with connection pooling.
pub fn create_http_client(config: &UpstreamConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(!config.verify_ssl)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

/// Request body for a streaming chat completion.
pub fn build_completion_payload(request: &CompletionRequest) -> Value {
    json!({
        "model": request.model,
        "messages": request.messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": true
    })
}

/// Build a provider request with bearer auth.
pub fn build_upstream_request(
    http_client: &reqwest::Client,
    url: &str,
    credential: &str,
    payload: &Value,
) -> reqwest::RequestBuilder {
    http_client
        .post(url)
        .header("Authorization", format!("Bearer {}", credential))
        .header("Accept", "text/event-stream")
        .json(payload)
}

/// Decode a provider SSE byte stream into chunks.
///
/// Ends after `[DONE]`, after the first error, or when the bytes run out.
pub fn chunk_stream<S>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut parser = SseParser::new();

        loop {
            let (events, exhausted) = match bytes.next().await {
                Some(Ok(data)) => (parser.parse(&data), false),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Upstream stream interrupted");
                    yield Err(UpstreamError::Transport(e));
                    return;
                }
                None => (parser.finish().into_iter().collect(), true),
            };

            for event in events {
                let Some(data) = event.data else { continue };
                match decode_openai_event(&data) {
                    Ok(Some(chunk)) => {
                        let is_final = chunk.is_final;
                        yield Ok(chunk);
                        if is_final {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            if parser.is_overflowing() {
                tracing::warn!(
                    buffered = parser.remaining(),
                    "Upstream event exceeds size limit"
                );
                yield Err(UpstreamError::Framing(format!(
                    "stream event exceeds {} bytes",
                    MAX_EVENT_BYTES
                )));
                return;
            }

            if exhausted {
                return;
            }
        }
    })
}

fn truncate_message(message: &str) -> String {
    let mut chars = message.chars();
    let truncated: String = chars.by_ref().take(MAX_ERROR_MESSAGE_LEN).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Extract canonical error message from provider error payload.
pub fn extract_error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
        .or_else(|| {
            body.get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
        })
        .or_else(|| {
            body.get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
}

/// Turn a non-2xx provider response into an [`UpstreamError::Status`].
async fn read_upstream_error(response: reqwest::Response) -> UpstreamError {
    let status = response.status();
    let default_message = format!("HTTP {}", status);

    let message = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<Value>(&bytes)
            .ok()
            .as_ref()
            .and_then(extract_error_message)
            .or_else(|| {
                let text = String::from_utf8_lossy(&bytes);
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            })
            .unwrap_or(default_message),
        Err(e) => format!("{} (failed to read body: {})", default_message, e),
    };

    tracing::warn!(
        status = status.as_u16(),
        message = %message,
        "Upstream rejected completion request"
    );

    UpstreamError::Status {
        status: status.as_u16(),
        message: truncate_message(&message),
    }
}
