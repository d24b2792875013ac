//! Core functionality for the chat relay.
//!
//! This module contains fundamental components used throughout the application:
//! - Configuration management
//! - Error handling
//! - Metrics collection
//! - HTTP middleware
//! - Request-scoped logging context and stream cancellation

pub mod cancel;
pub mod config;
pub mod error;
pub mod error_types;
pub mod logging;
pub mod metrics;
pub mod middleware;

// Re-export commonly used types
pub use cancel::StreamCancelHandle;
pub use config::{AppConfig, ModelPolicy, ServerConfig, StreamProtocol, UpstreamConfig};
pub use error::{AppError, Result, UpstreamError, ValidationError};
pub use logging::{current_request_id, REQUEST_ID};
pub use metrics::{get_metrics, init_metrics, Metrics};
pub use middleware::{request_id_middleware, MetricsMiddleware, RequestId};
