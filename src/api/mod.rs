//! API layer for the chat relay.
//!
//! This module contains the HTTP handlers, request/response models, the
//! upstream client and the disconnect-aware response body.

pub mod disconnect;
pub mod handlers;
pub mod models;
pub mod upstream;

// Re-export commonly used types
pub use disconnect::{channel_body, DisconnectStream};
pub use handlers::{build_router, chat_handler, health_handler, metrics_handler, AppState};
pub use models::{ChatMessage, CompletionRequest, HealthResponse, Role, StreamChunk};
pub use upstream::{create_http_client, ChunkStream, OpenAiUpstream, UpstreamClient};
