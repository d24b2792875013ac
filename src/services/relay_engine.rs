//! One client connection, one upstream stream.
//!
//! [`RelayEngine::relay`] validates a chat request, opens the upstream stream
//! and hands both ends to a [`RelaySession`] running on its own task. The
//! session pumps chunks with a write-then-advance loop over a channel of
//! depth 1, so at most one frame is ever in flight.

use crate::api::disconnect::{channel_body, FrameResult};
use crate::api::models::CompletionRequest;
use crate::api::upstream::{ChunkStream, UpstreamClient};
use crate::core::config::AppConfig;
use crate::core::error::{AppError, Result, UpstreamError, ValidationError};
use crate::core::logging::{request_id_or_new, REQUEST_ID};
use crate::core::metrics::get_metrics;
use crate::core::StreamCancelHandle;
use crate::services::message_normalizer::normalize_messages;
use crate::services::model_resolver::{ModelResolver, ResolvedModel};
use crate::transformer::ChunkFramer;
use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::Response;
use futures::StreamExt;
use serde_json::Value;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

const FRAME_CHANNEL_CAPACITY: usize = 1;

/// Lifecycle of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Validating,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl RelayState {
    pub fn can_transition_to(self, next: RelayState) -> bool {
        use RelayState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Streaming)
                | (Validating, Failed)
                | (Streaming, Completed)
                | (Streaming, Cancelled)
                | (Streaming, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RelayState::Completed | RelayState::Cancelled | RelayState::Failed
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RelayState::Idle => "idle",
            RelayState::Validating => "validating",
            RelayState::Streaming => "streaming",
            RelayState::Completed => "completed",
            RelayState::Cancelled => "cancelled",
            RelayState::Failed => "failed",
        }
    }

    fn advance(self, next: RelayState) -> RelayState {
        debug_assert!(
            self.can_transition_to(next),
            "illegal relay transition {} -> {}",
            self,
            next
        );
        tracing::trace!(from = self.as_str(), to = next.as_str(), "Relay state transition");
        next
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub state: RelayState,
    pub model: String,
    pub chunks_forwarded: u64,
    pub bytes_forwarded: u64,
}

/// A relay that passed validation and is now streaming.
pub struct ActiveRelay {
    /// Streaming 200 response; its body is fed by `session`.
    pub response: Response,
    /// Task pumping upstream chunks into the response body.
    pub session: JoinHandle<RelayOutcome>,
}

/// Validates chat requests and starts relay sessions.
pub struct RelayEngine {
    config: Arc<AppConfig>,
    resolver: ModelResolver,
    upstream: Arc<dyn UpstreamClient>,
    framer: ChunkFramer,
}

impl RelayEngine {
    pub fn new(config: Arc<AppConfig>, upstream: Arc<dyn UpstreamClient>) -> Self {
        let resolver = ModelResolver::new(&config.models);
        let framer = ChunkFramer::new(config.stream_protocol);
        Self {
            config,
            resolver,
            upstream,
            framer,
        }
    }

    /// Build the upstream request from a raw chat request body.
    ///
    /// Checks, in order: the body is JSON, `messages` is an array, and it is
    /// not empty.
    pub fn prepare(&self, body: &[u8]) -> Result<(CompletionRequest, ResolvedModel)> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::InvalidJson(e.to_string()))?;

        let messages = normalize_messages(value.get("messages"))?;
        if messages.is_empty() {
            return Err(ValidationError::EmptyMessages.into());
        }

        let resolved = self
            .resolver
            .resolve(value.get("model").and_then(Value::as_str));

        let request = CompletionRequest {
            model: resolved.model.clone(),
            messages,
            temperature: self.config.upstream.temperature,
            max_tokens: self.config.upstream.max_tokens,
        };
        Ok((request, resolved))
    }

    /// Validate `body`, open the upstream stream and start pumping.
    ///
    /// Every error returned here happens before the response exists, so the
    /// caller can still answer with a structured error body.
    pub async fn relay(&self, body: &[u8]) -> Result<ActiveRelay> {
        let state = RelayState::Idle.advance(RelayState::Validating);

        let credential = match self.config.upstream.credential() {
            Some(credential) => credential,
            None => {
                state.advance(RelayState::Failed);
                return Err(AppError::missing_credential());
            }
        };

        let (request, resolved) = match self.prepare(body) {
            Ok(prepared) => prepared,
            Err(e) => {
                state.advance(RelayState::Failed);
                return Err(e);
            }
        };

        tracing::info!(
            model = %resolved.model,
            requested_model = ?resolved.requested,
            substituted = resolved.substituted,
            messages = request.messages.len(),
            "Opening upstream stream"
        );

        let opened_at = Instant::now();
        let upstream = match self.upstream.open_stream(credential, &request).await {
            Ok(stream) => stream,
            Err(e) => {
                state.advance(RelayState::Failed);
                return Err(e.into());
            }
        };

        let request_id = request_id_or_new();

        let (sender, receiver) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let cancel = StreamCancelHandle::new();

        let session = RelaySession {
            model: request.model,
            upstream,
            client: sender,
            cancel: cancel.clone(),
            framer: self.framer,
            state,
            opened_at,
            first_chunk_at: None,
            chunks_forwarded: 0,
            bytes_forwarded: 0,
        };

        let response = self.streaming_response(Body::from_stream(channel_body(receiver, cancel)))?;
        let span = tracing::info_span!("relay", request_id = %request_id, model = %session.model);
        let session = tokio::spawn(REQUEST_ID.scope(request_id, session.pump()).instrument(span));

        Ok(ActiveRelay { response, session })
    }

    fn streaming_response(&self, body: Body) -> Result<Response> {
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, self.framer.content_type())
            .header(header::CACHE_CONTROL, "no-cache")
            .header("x-accel-buffering", "no");
        if let Some((name, value)) = self.framer.protocol_header() {
            builder = builder.header(name, value);
        }
        builder
            .body(body)
            .map_err(|e| AppError::Internal(format!("Failed to build streaming response: {}", e)))
    }
}

/// Live pairing of one upstream stream and one client body.
pub struct RelaySession {
    model: String,
    upstream: ChunkStream,
    client: mpsc::Sender<FrameResult>,
    cancel: StreamCancelHandle,
    framer: ChunkFramer,
    state: RelayState,
    opened_at: Instant,
    first_chunk_at: Option<Instant>,
    chunks_forwarded: u64,
    bytes_forwarded: u64,
}

/// Keeps the active stream gauge balanced on every exit path.
struct ActiveStreamGuard;

impl ActiveStreamGuard {
    fn enter() -> Self {
        get_metrics().active_streams.inc();
        Self
    }
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        get_metrics().active_streams.dec();
    }
}

impl RelaySession {
    /// Forward chunks until the upstream ends, the client leaves, or the
    /// upstream fails.
    pub async fn pump(mut self) -> RelayOutcome {
        let _active = ActiveStreamGuard::enter();
        self.state = self.state.advance(RelayState::Streaming);

        let terminal = self.forward_all().await;
        self.finish(terminal)
    }

    async fn forward_all(&mut self) -> RelayState {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RelayState::Cancelled,
                _ = self.client.closed() => return RelayState::Cancelled,
                next = self.upstream.next() => next,
            };

            match next {
                None => return self.complete().await,
                Some(Ok(chunk)) => {
                    // Empty chunks carry no text and produce no frame.
                    if !chunk.data.is_empty() {
                        let frame = self.framer.encode_chunk(&chunk.data);
                        if !self.write(frame).await {
                            return RelayState::Cancelled;
                        }
                        self.record_chunk();
                    }
                    if chunk.is_final {
                        return self.complete().await;
                    }
                }
                Some(Err(e)) => {
                    self.abort_client(&e).await;
                    tracing::warn!(
                        model = %self.model,
                        category = %e.category(),
                        chunks_forwarded = self.chunks_forwarded,
                        error = %e,
                        "Upstream failed mid-stream"
                    );
                    return RelayState::Failed;
                }
            }
        }
    }

    /// Write the finish trailer, if the framing has one.
    async fn complete(&mut self) -> RelayState {
        if let Some(trailer) = self.framer.finish_frame() {
            if !self.write(trailer).await {
                return RelayState::Cancelled;
            }
        }
        RelayState::Completed
    }

    /// Returns `false` once the client body is gone.
    async fn write(&mut self, frame: Bytes) -> bool {
        let len = frame.len() as u64;
        if self.client.send(Ok(frame)).await.is_err() {
            return false;
        }
        self.bytes_forwarded += len;
        true
    }

    fn record_chunk(&mut self) {
        self.chunks_forwarded += 1;
        if self.first_chunk_at.is_none() {
            let now = Instant::now();
            self.first_chunk_at = Some(now);
            get_metrics()
                .ttft
                .with_label_values(&[self.model.as_str()])
                .observe(now.duration_since(self.opened_at).as_secs_f64());
        }
    }

    /// Make the response body end with an error so the connection is
    /// terminated instead of looking like a clean end of stream.
    async fn abort_client(&mut self, error: &UpstreamError) {
        let err = io::Error::new(io::ErrorKind::Other, error.to_string());
        let _ = self.client.send(Err(err)).await;
    }

    fn finish(self, terminal: RelayState) -> RelayOutcome {
        let RelaySession {
            model,
            upstream,
            client,
            cancel,
            state,
            opened_at,
            chunks_forwarded,
            bytes_forwarded,
            ..
        } = self;

        let state = state.advance(terminal);
        cancel.mark_finished();
        drop(upstream);
        drop(client);

        let metrics = get_metrics();
        metrics.sessions_total.with_label_values(&[state.as_str()]).inc();
        metrics.chunks_forwarded.inc_by(chunks_forwarded);
        metrics.bytes_forwarded.inc_by(bytes_forwarded);

        let duration_ms = opened_at.elapsed().as_millis() as u64;
        match state {
            RelayState::Completed => tracing::info!(
                model = %model,
                chunks_forwarded,
                bytes_forwarded,
                duration_ms,
                "Relay session completed"
            ),
            RelayState::Cancelled => {
                metrics.client_disconnects_total.inc();
                tracing::info!(
                    model = %model,
                    chunks_forwarded,
                    bytes_forwarded,
                    duration_ms,
                    "Client disconnected, upstream stream released"
                );
            }
            _ => tracing::debug!(
                model = %model,
                state = %state,
                chunks_forwarded,
                duration_ms,
                "Relay session ended"
            ),
        }

        RelayOutcome {
            state,
            model,
            chunks_forwarded,
            bytes_forwarded,
        }
    }
}
