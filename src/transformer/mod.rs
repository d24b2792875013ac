//! Stream format conversion.
//!
//! - [`stream`]: provider SSE bytes → [`StreamChunk`](crate::api::models::StreamChunk)s
//! - [`framing`]: chunks → client frames

pub mod framing;
pub mod stream;

pub use framing::{parse_data_stream_text, ChunkFramer};
pub use stream::{decode_openai_event, SseEvent, SseParser, MAX_EVENT_BYTES};
