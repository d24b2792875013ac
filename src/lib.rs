//! Chat Relay - streams LLM chat completions to browser clients
//!
//! A chat request is validated, its messages are normalized to plain
//! `{role, content}` pairs, a model is chosen, and the upstream completion is
//! relayed chunk by chunk to the client as it arrives:
//!
//! - **Lenient message normalization**: flat `content`, multi-part `parts`, or content arrays
//! - **Model policy**: default model, plus a fallback for identifiers the upstream rejects
//! - **Backpressured relay**: one chunk in flight, upstream released as soon as the client leaves
//! - **Metrics & Monitoring**: Prometheus metrics for observability
//!
//! # Architecture
//!
//! - [`core`]: Core functionality (config, errors, metrics, middleware, cancellation)
//! - [`api`]: HTTP handlers, models and the upstream client
//! - [`services`]: Business logic (normalization, model resolution, relay engine)
//! - [`transformer`]: Provider SSE decoding and client frame encoding
//!
//! # Configuration
//!
//! Read once from the environment at startup:
//! - `AI_GATEWAY_API_KEY`: upstream credential (requests fail with 500 without it)
//! - `AI_MODEL`: default model (default: gpt-4)
//! - `AI_FALLBACK_MODEL`: replacement for unsupported models (default: gpt-4o-mini)
//! - `AI_GATEWAY_BASE_URL`: OpenAI-compatible base URL
//! - `STREAM_PROTOCOL`: `data` (default) or `text`
//! - `HOST` / `PORT`: bind address (default: 0.0.0.0:3001)

pub mod api;
pub mod core;
pub mod services;
pub mod transformer;

// Re-export commonly used types for convenience
pub use api::{build_router, AppState, OpenAiUpstream, UpstreamClient};
pub use core::{AppConfig, AppError, Result};
pub use services::RelayEngine;
