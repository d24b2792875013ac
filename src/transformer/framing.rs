//! Client-facing frame encoding.
//!
//! In [`StreamProtocol::Data`] mode each chunk becomes one line of the AI
//! data-stream protocol understood by the browser chat client:
//!
//! ```text
//! 0:"Hel"
//! 0:"lo!"
//! d:{"finishReason":"stop"}
//! ```
//!
//! In [`StreamProtocol::Text`] mode chunks are written verbatim.

use crate::core::config::StreamProtocol;
use bytes::Bytes;
use serde_json::json;

/// Header advertising the data-stream protocol version.
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";

const TEXT_PART_PREFIX: &str = "0:";
const FINISH_PART_PREFIX: &str = "d:";

#[derive(Debug, Clone, Copy)]
pub struct ChunkFramer {
    protocol: StreamProtocol,
}

impl ChunkFramer {
    pub fn new(protocol: StreamProtocol) -> Self {
        Self { protocol }
    }

    pub fn protocol(&self) -> StreamProtocol {
        self.protocol
    }

    /// Encode one text chunk.
    pub fn encode_chunk(&self, text: &str) -> Bytes {
        match self.protocol {
            StreamProtocol::Data => {
                // A JSON string literal never contains a raw newline.
                let literal = serde_json::Value::String(text.to_string()).to_string();
                Bytes::from(format!("{}{}\n", TEXT_PART_PREFIX, literal))
            }
            StreamProtocol::Text => Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    /// Trailer written after the last chunk of a completed stream.
    pub fn finish_frame(&self) -> Option<Bytes> {
        match self.protocol {
            StreamProtocol::Data => Some(Bytes::from(format!(
                "{}{}\n",
                FINISH_PART_PREFIX,
                json!({ "finishReason": "stop" })
            ))),
            StreamProtocol::Text => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    /// Extra response header identifying the framing, if any.
    pub fn protocol_header(&self) -> Option<(&'static str, &'static str)> {
        match self.protocol {
            StreamProtocol::Data => Some((DATA_STREAM_HEADER, DATA_STREAM_VERSION)),
            StreamProtocol::Text => None,
        }
    }
}

/// Decode a data-stream body back into its text parts.
///
/// Lines that are not text parts are ignored.
pub fn parse_data_stream_text(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix(TEXT_PART_PREFIX))
        .filter_map(|literal| serde_json::from_str::<String>(literal).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_frame() {
        let framer = ChunkFramer::new(StreamProtocol::Data);
        assert_eq!(framer.encode_chunk("Hel"), Bytes::from("0:\"Hel\"\n"));
    }

    #[test]
    fn test_data_frame_escapes_newlines_and_quotes() {
        let framer = ChunkFramer::new(StreamProtocol::Data);
        let frame = framer.encode_chunk("a\n\"b\"");
        assert_eq!(frame, Bytes::from("0:\"a\\n\\\"b\\\"\"\n"));
        assert_eq!(frame.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn test_data_finish_frame() {
        let framer = ChunkFramer::new(StreamProtocol::Data);
        assert_eq!(
            framer.finish_frame(),
            Some(Bytes::from("d:{\"finishReason\":\"stop\"}\n"))
        );
        assert_eq!(
            framer.protocol_header(),
            Some(("x-vercel-ai-data-stream", "v1"))
        );
    }

    #[test]
    fn test_text_frames_are_verbatim() {
        let framer = ChunkFramer::new(StreamProtocol::Text);
        assert_eq!(framer.encode_chunk("lo!"), Bytes::from("lo!"));
        assert!(framer.finish_frame().is_none());
        assert!(framer.protocol_header().is_none());
    }

    #[test]
    fn test_parse_data_stream_text() {
        let body = "0:\"Hel\"\n0:\"lo!\"\nd:{\"finishReason\":\"stop\"}\n";
        assert_eq!(parse_data_stream_text(body), vec!["Hel", "lo!"]);
    }
}
