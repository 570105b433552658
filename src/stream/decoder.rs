//! Line decoder for the `0:"…"` text stream.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::error::Result;

/// Prefix of a line carrying assistant text.
pub const TEXT_PART_PREFIX: &str = "0:\"";

/// Raw response body, chunked as the transport delivers it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// How chunk boundaries are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineBuffering {
    /// Each chunk is decoded and split on its own. A line that straddles two
    /// chunks is seen as two partial lines and dropped.
    PerChunk,
    /// Bytes are held until a newline arrives; the unterminated tail is
    /// flushed when the stream ends.
    #[default]
    Buffered,
}

/// One decoded text part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Text extracted from this line, unescaped.
    pub fragment: String,
    /// Everything decoded so far in this response, including `fragment`.
    pub response: String,
}

/// Undo the two escapes the stream applies to text parts.
///
/// `\n` becomes a newline, then `\"` becomes a quote. Nothing else is
/// recognized: `\t`, `\\` and `\u…` come through verbatim.
#[must_use]
pub fn unescape_fragment(raw: &str) -> String {
    raw.replace("\\n", "\n").replace("\\\"", "\"")
}

/// Extract the text fragment from a single line, if it is a text part.
#[must_use]
pub fn parse_line(line: &str) -> Option<String> {
    let body = line.strip_prefix(TEXT_PART_PREFIX)?.strip_suffix('"')?;
    Some(unescape_fragment(body))
}

/// Incremental decoder for one response.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    mode: LineBuffering,
    pending: Vec<u8>,
    response: String,
}

impl StreamDecoder {
    /// Create a decoder with an empty running response.
    #[must_use]
    pub fn new(mode: LineBuffering) -> Self {
        Self {
            mode,
            pending: Vec::new(),
            response: String::new(),
        }
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn current_response(&self) -> &str {
        &self.response
    }

    /// Feed the next chunk and return the deltas it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Delta> {
        let mut out = Vec::new();
        match self.mode {
            LineBuffering::PerChunk => {
                let text = String::from_utf8_lossy(chunk);
                for line in text.split('\n') {
                    if let Some(delta) = self.accept_line(line) {
                        out.push(delta);
                    }
                }
            }
            LineBuffering::Buffered => {
                self.pending.extend_from_slice(chunk);
                while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = self.pending.drain(..=pos).collect();
                    let text = String::from_utf8_lossy(&line[..pos]).into_owned();
                    if let Some(delta) = self.accept_line(&text) {
                        out.push(delta);
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Vec<Delta> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let tail = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&tail).into_owned();
        self.accept_line(&text).into_iter().collect()
    }

    fn accept_line(&mut self, line: &str) -> Option<Delta> {
        if line.trim().is_empty() {
            return None;
        }
        let fragment = parse_line(line)?;
        self.response.push_str(&fragment);
        Some(Delta {
            fragment,
            response: self.response.clone(),
        })
    }
}

/// Decode a byte stream into text deltas.
///
/// A transport error is forwarded as the stream's last item; deltas decoded
/// before it have already been yielded.
pub fn decode_deltas<S>(bytes: S, mode: LineBuffering) -> impl Stream<Item = Result<Delta>> + Send
where
    S: Stream<Item = Result<Vec<u8>>> + Send + 'static,
{
    async_stream::try_stream! {
        let mut decoder = StreamDecoder::new(mode);

        futures::pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for delta in decoder.feed(&chunk) {
                yield delta;
            }
        }

        for delta in decoder.finish() {
            yield delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const BODY: &str = "0:\"Hé\"\n0:\"llo,\\n\"\n2:[{\"x\":1}]\n\n0:\" \\\"wörld\\\"\"\ne:{\"finishReason\":\"stop\"}\n";

    fn decode_all(chunks: &[&[u8]], mode: LineBuffering) -> String {
        let mut decoder = StreamDecoder::new(mode);
        for chunk in chunks {
            decoder.feed(chunk);
        }
        decoder.finish();
        decoder.current_response().to_string()
    }

    #[test]
    fn test_unescape_newline_and_quote() {
        assert_eq!(unescape_fragment(r"a\nb"), "a\nb");
        assert_eq!(unescape_fragment(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(unescape_fragment("plain"), "plain");
    }

    #[test]
    fn test_unescape_leaves_other_sequences() {
        // Only two escapes are understood; the rest are passed through.
        assert_eq!(unescape_fragment(r"tab\there"), r"tab\there");
        assert_eq!(unescape_fragment(r"\u00e9"), r"\u00e9");
        // `\\n` is an escaped backslash followed by `n`, but the `\n` rule
        // still fires on its tail.
        assert_eq!(unescape_fragment(r"C:\\new"), "C:\\\new");
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("0:\"Hello\""), Some("Hello".to_string()));
        assert_eq!(parse_line("0:\"\""), Some(String::new()));
        assert_eq!(parse_line("0:\""), None);
        assert_eq!(parse_line("0:\"unterminated"), None);
        assert_eq!(parse_line("1:\"other part\""), None);
        assert_eq!(parse_line("d:{\"finishReason\":\"stop\"}"), None);
        assert_eq!(parse_line(" 0:\"indented\""), None);
    }

    #[test]
    fn test_single_read_decodes_text_parts_only() {
        let text = decode_all(&[BODY.as_bytes()], LineBuffering::Buffered);
        assert_eq!(text, "Héllo,\n \"wörld\"");
    }

    #[test]
    fn test_buffered_is_chunking_invariant() {
        let bytes = BODY.as_bytes();
        let expected = decode_all(&[bytes], LineBuffering::Buffered);

        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(
                decode_all(&[a, b], LineBuffering::Buffered),
                expected,
                "split at {split}"
            );
        }

        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_all(&singles, LineBuffering::Buffered), expected);
    }

    #[test]
    fn test_per_chunk_drops_lines_split_across_chunks() {
        let first = b"0:\"Hi\"\n0:\" the";
        let second = b"re\"\n0:\"!\"\n";

        let lossy = decode_all(&[first, second], LineBuffering::PerChunk);
        assert_eq!(lossy, "Hi!");

        let buffered = decode_all(&[first, second], LineBuffering::Buffered);
        assert_eq!(buffered, "Hi there!");
    }

    #[test]
    fn test_per_chunk_matches_buffered_on_line_aligned_chunks() {
        let chunks: [&[u8]; 2] = [b"0:\"a\"\n0:\"b\"\n", b"0:\"c\"\n"];
        assert_eq!(
            decode_all(&chunks, LineBuffering::PerChunk),
            decode_all(&chunks, LineBuffering::Buffered)
        );
    }

    #[test]
    fn test_finish_flushes_unterminated_tail() {
        let mut decoder = StreamDecoder::new(LineBuffering::Buffered);
        assert!(decoder.feed(b"0:\"tail\"").is_empty());
        let deltas = decoder.finish();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].fragment, "tail");
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_unrecognized_lines_change_nothing() {
        let mut decoder = StreamDecoder::new(LineBuffering::Buffered);
        decoder.feed(b"0:\"keep\"\n");
        let deltas = decoder.feed(b"garbage\n8:[{\"meta\":true}]\n   \n");
        assert!(deltas.is_empty());
        assert_eq!(decoder.current_response(), "keep");
    }

    #[test]
    fn test_deltas_carry_cumulative_response() {
        let mut decoder = StreamDecoder::new(LineBuffering::Buffered);
        let deltas = decoder.feed(b"0:\"Hi\"\n0:\" there\"\n");
        assert_eq!(deltas[0].response, "Hi");
        assert_eq!(deltas[1].fragment, " there");
        assert_eq!(deltas[1].response, "Hi there");
    }

    #[tokio::test]
    async fn test_decode_deltas_stops_at_transport_error() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"0:\"partial\"\n".to_vec()),
            Err(Error::Stream("connection reset".into())),
            Ok(b"0:\"never\"\n".to_vec()),
        ];
        let deltas = decode_deltas(futures::stream::iter(chunks), LineBuffering::Buffered);
        futures::pin_mut!(deltas);

        let first = deltas.next().await.unwrap().unwrap();
        assert_eq!(first.response, "partial");
        assert!(matches!(deltas.next().await, Some(Err(Error::Stream(_)))));
        assert!(deltas.next().await.is_none());
    }
}
