//! Server-Sent Events (SSE) framing.
//!
//! This module turns the raw bytes of an event-stream response into
//! [`EventSourceMessage`] frames.
//!
//! SSE format:
//! ```text
//! : comment
//! event: token
//! id: 7
//! data: {"token": "He"}
//!
//! event: finish
//! data: {"sessionId": "s-1"}
//!
//! ```
//!
//! Lines end with LF, CR or CRLF. A blank line dispatches the frame
//! collected so far; an unterminated frame at end of stream is dropped.

use bytes::{Buf, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use itertools::Itertools;
use std::collections::VecDeque;

use crate::client::StreamError;
use crate::model::EventSourceMessage;

/// Extension trait for `reqwest::Response` to enable SSE streaming.
///
/// # Example
/// ```ignore
/// use chatwire::sse::SSEResponseExt;
///
/// let response = client.get("https://api.example.com/stream").send().await?;
///
/// let mut frames = response.sse();
/// while let Some(result) = frames.next().await {
///     let frame = result?;
///     println!("{}: {}", frame.event_name(), frame.data);
/// }
/// ```
pub trait SSEResponseExt {
    /// Convert the response into a stream of parsed frames.
    fn sse(self) -> impl Stream<Item = Result<EventSourceMessage, StreamError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<EventSourceMessage, StreamError>> + Send {
        frames(self.bytes_stream())
    }
}

/// Parse a stream of byte chunks into frames.
pub fn frames<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<EventSourceMessage, StreamError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<StreamError> + Send,
{
    frames_with_parser(byte_stream, FrameParser::new())
}

/// Like [`frames`], with a configured parser.
pub fn frames_with_parser<S, B, E>(
    byte_stream: S,
    parser: FrameParser,
) -> impl Stream<Item = Result<EventSourceMessage, StreamError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<StreamError> + Send,
{
    stream::unfold(
        (Box::pin(byte_stream), parser, VecDeque::new()),
        |(mut byte_stream, mut parser, mut pending)| async move {
            loop {
                if let Some(frame) = pending.pop_front() {
                    return Some((Ok(frame), (byte_stream, parser, pending)));
                }

                let result = match byte_stream.next().await {
                    Some(Ok(chunk)) => parser.feed(chunk.as_ref()),
                    Some(Err(e)) => Err(e.into()),
                    None => return None,
                };
                match result {
                    Ok(frames) => pending.extend(frames),
                    Err(e) => return Some((Err(e), (byte_stream, parser, pending))),
                }
            }
        },
    )
}

/// Longest line the parser buffers before giving up on the stream.
pub const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

/// Incremental frame parser.
///
/// Bytes are buffered until a full line is available, so chunks may split
/// lines (and UTF-8 sequences) anywhere. A pending line longer than the
/// configured maximum is an error.
#[derive(Debug)]
pub struct FrameParser {
    buffer: BytesMut,
    /// Bytes of `buffer` already known to hold no line terminator
    scanned: usize,
    max_line_length: usize,
    skip_lf: bool,
    has_fields: bool,
    event: String,
    id: Option<String>,
    data_lines: Vec<String>,
    retry: Option<u64>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_line_length,
            skip_lf: false,
            has_fields: false,
            event: String::new(),
            id: None,
            data_lines: Vec::new(),
            retry: None,
        }
    }

    /// Feed a chunk and collect every frame it completes.
    ///
    /// Frames completed before an overlong line are returned first; the
    /// error follows on the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<EventSourceMessage>, StreamError> {
        self.check_line_length()?;
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            // CRLF split across chunks
            if self.skip_lf {
                if self.buffer.is_empty() {
                    break;
                }
                if self.buffer[0] == b'\n' {
                    self.buffer.advance(1);
                }
                self.skip_lf = false;
            }

            let Some(pos) = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r')
            else {
                self.scanned = self.buffer.len();
                break;
            };

            let line = self.buffer.split_to(self.scanned + pos);
            self.scanned = 0;
            if self.buffer[0] == b'\r' {
                self.skip_lf = true;
            }
            self.buffer.advance(1);

            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        if frames.is_empty() {
            self.check_line_length()?;
        }
        Ok(frames)
    }

    fn check_line_length(&self) -> Result<(), StreamError> {
        if self.buffer.len() > self.max_line_length {
            return Err(StreamError::retriable(format!(
                "SSE line exceeds {} bytes",
                self.max_line_length
            )));
        }
        Ok(())
    }

    fn process_line(&mut self, line: &[u8]) -> Option<EventSourceMessage> {
        if line.is_empty() {
            return self.dispatch();
        }

        let line = String::from_utf8_lossy(line);
        let (field, value) = parse_field(&line)?;

        match field {
            "event" => self.event = value.to_string(),
            "data" => self.data_lines.push(value.to_string()),
            "id" => {
                if value.contains('\0') {
                    return None;
                }
                self.id = Some(value.to_string());
            }
            "retry" => {
                if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                self.retry = value.parse().ok();
            }
            _ => return None,
        }

        self.has_fields = true;
        None
    }

    fn dispatch(&mut self) -> Option<EventSourceMessage> {
        if !std::mem::take(&mut self.has_fields) {
            return None;
        }

        Some(EventSourceMessage {
            event: std::mem::take(&mut self.event),
            id: self.id.take(),
            data: self.data_lines.drain(..).join("\n"),
            retry: self.retry.take(),
        })
    }
}

/// Split an SSE line into field name and value.
///
/// One space after the colon is stripped; a line without a colon is a field
/// with an empty value; comment lines yield `None`.
///
/// # Example
/// ```
/// use chatwire::sse::parse_field;
///
/// assert_eq!(parse_field("data: {\"k\": 1}"), Some(("data", "{\"k\": 1}")));
/// assert_eq!(parse_field("data:  two"), Some(("data", " two")));
/// assert_eq!(parse_field("data"), Some(("data", "")));
/// assert_eq!(parse_field(": keep-alive"), None);
/// ```
pub fn parse_field(line: &str) -> Option<(&str, &str)> {
    if line.starts_with(':') {
        return None;
    }

    match line.split_once(':') {
        Some((field, value)) => Some((field, value.strip_prefix(' ').unwrap_or(value))),
        None => Some((line, "")),
    }
}
