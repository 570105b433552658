//! Streamed-response decoding.
//!
//! The chat endpoint answers with a line-oriented text stream. Each line that
//! carries assistant text has the shape `0:"<escaped text>"`; every other line
//! (tool parts, finish markers, metadata) is ignored by this decoder.
//!
//! # Example
//!
//! ```rust
//! use inline_chat::stream::{LineBuffering, StreamDecoder};
//!
//! let mut decoder = StreamDecoder::new(LineBuffering::Buffered);
//! let deltas = decoder.feed(b"0:\"Hi\"\n0:\" there\"\n");
//! assert_eq!(deltas.len(), 2);
//! assert_eq!(decoder.current_response(), "Hi there");
//! ```

mod decoder;

pub use decoder::{
    ByteStream, Delta, LineBuffering, StreamDecoder, TEXT_PART_PREFIX, decode_deltas, parse_line,
    unescape_fragment,
};
