//! Business logic services for the chat relay.
//!
//! - [`message_normalizer`]: client messages → [`ChatMessage`](crate::api::models::ChatMessage)s
//! - [`model_resolver`]: requested model → model sent upstream
//! - [`relay_engine`]: request validation and the per-connection relay session

pub mod message_normalizer;
pub mod model_resolver;
pub mod relay_engine;

// Re-export commonly used types
pub use message_normalizer::normalize_messages;
pub use model_resolver::{ModelResolver, ResolvedModel};
pub use relay_engine::{ActiveRelay, RelayEngine, RelayOutcome, RelayState};
