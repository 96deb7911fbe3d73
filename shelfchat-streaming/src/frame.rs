//! Frame normalization.
//!
//! Providers deliver either Server-Sent Events or newline-delimited JSON. The
//! [`FrameNormalizer`] accepts raw byte chunks in any split, detects the
//! framing once from the first meaningful data and yields parsed JSON values.

use crate::error::{StreamError, StreamResult};
use serde_json::Value;
use tracing::{debug, trace};

const MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;

const SSE_FIELD_PREFIXES: [&str; 4] = ["data:", "event:", "id:", "retry:"];

const DONE_MARKER: &str = "[DONE]";

/// A parsed frame payload.
pub type ParsedFrame = Value;

/// Wire framing of a provider stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// Blank-line separated events made of `data:` lines.
    Sse,
    /// One JSON document per line.
    LineDelimited,
}

impl FramingMode {
    /// Detect the framing from the start of a stream.
    ///
    /// Returns `None` while `head` is still a prefix of an SSE field name and
    /// the answer cannot be known yet.
    #[must_use]
    pub fn detect(head: &str) -> Option<Self> {
        let head = head.trim_start();
        if head.is_empty() {
            return None;
        }
        if head.starts_with(':') || SSE_FIELD_PREFIXES.iter().any(|p| head.starts_with(p)) {
            return Some(Self::Sse);
        }
        if head.starts_with('{') || head.starts_with('[') {
            return Some(Self::LineDelimited);
        }
        if SSE_FIELD_PREFIXES.iter().any(|p| p.starts_with(head)) {
            return None;
        }
        Some(Self::LineDelimited)
    }
}

/// Incremental parser turning raw byte chunks into JSON frames.
///
/// One normalizer serves one provider attempt. It holds the incomplete
/// fragment between calls and must not be reused for another stream.
#[derive(Debug, Default)]
pub struct FrameNormalizer {
    buffer: String,
    undecoded: Vec<u8>,
    mode: Option<FramingMode>,
    done: bool,
    frames: usize,
    dropped: usize,
}

impl FrameNormalizer {
    /// Create a normalizer with auto-detected framing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a normalizer with a fixed framing.
    #[must_use]
    pub fn with_mode(mode: FramingMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    /// Framing in use, once known.
    #[must_use]
    pub fn mode(&self) -> Option<FramingMode> {
        self.mode
    }

    /// Whether the `[DONE]` terminator has been seen.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Frames parsed so far.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Frames dropped because their payload was not valid JSON.
    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    /// Feed a raw chunk and return every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> StreamResult<Vec<ParsedFrame>> {
        if self.done {
            return Ok(Vec::new());
        }
        self.decode(chunk);

        if self.mode.is_none() {
            match FramingMode::detect(&self.buffer) {
                Some(mode) => {
                    debug!(mode = ?mode, "Detected stream framing");
                    self.mode = Some(mode);
                }
                None => return self.check_fragment().map(|()| Vec::new()),
            }
        }

        let frames = self.drain_complete();
        self.check_fragment()?;
        Ok(frames)
    }

    /// The retained incomplete fragment must stay under the limit.
    fn check_fragment(&self) -> StreamResult<()> {
        if self.buffer.len() > MAX_BUFFER_SIZE {
            return Err(StreamError::BufferOverflow {
                limit: MAX_BUFFER_SIZE,
            });
        }
        Ok(())
    }

    /// Feed a string chunk.
    pub fn feed_str(&mut self, chunk: &str) -> StreamResult<Vec<ParsedFrame>> {
        self.feed(chunk.as_bytes())
    }

    /// Flush the retained fragment as a final frame. Call once the byte
    /// stream has ended.
    pub fn finish(&mut self) -> StreamResult<Vec<ParsedFrame>> {
        if self.done {
            return Ok(Vec::new());
        }
        if !self.undecoded.is_empty() {
            let tail = std::mem::take(&mut self.undecoded);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return Ok(Vec::new());
        }

        let mode = *self
            .mode
            .get_or_insert_with(|| FramingMode::detect(&self.buffer).unwrap_or(FramingMode::LineDelimited));

        let mut frames = self.drain_complete();
        let rest = std::mem::take(&mut self.buffer);
        if !self.done {
            match mode {
                FramingMode::Sse => self.parse_event(&rest, &mut frames),
                FramingMode::LineDelimited => self.parse_line(&rest, &mut frames),
            }
        }
        Ok(frames)
    }

    fn decode(&mut self, chunk: &[u8]) {
        self.undecoded.extend_from_slice(chunk);
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.undecoded[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.undecoded.len();
                    break;
                }
                Err(err) => {
                    let valid = consumed + err.valid_up_to();
                    self.buffer
                        .push_str(std::str::from_utf8(&self.undecoded[consumed..valid]).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid + len;
                        }
                        None => {
                            consumed = valid;
                            break;
                        }
                    }
                }
            }
        }
        self.undecoded.drain(..consumed);

        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }

    fn drain_complete(&mut self) -> Vec<ParsedFrame> {
        let mut frames = Vec::new();
        let Some(mode) = self.mode else {
            return frames;
        };
        let delimiter = match mode {
            FramingMode::Sse => "\n\n",
            FramingMode::LineDelimited => "\n",
        };

        let mut consumed = 0;
        while !self.done {
            let Some(pos) = self.buffer[consumed..].find(delimiter) else {
                break;
            };
            let piece = self.buffer[consumed..consumed + pos].to_string();
            consumed += pos + delimiter.len();
            match mode {
                FramingMode::Sse => self.parse_event(&piece, &mut frames),
                FramingMode::LineDelimited => self.parse_line(&piece, &mut frames),
            }
        }

        if self.done {
            self.buffer.clear();
        } else {
            self.buffer.drain(..consumed);
        }
        frames
    }

    fn parse_event(&mut self, event: &str, frames: &mut Vec<ParsedFrame>) {
        let mut payload = String::new();
        let mut has_data = false;
        for line in event.lines() {
            if let Some(value) = line.strip_prefix("data:") {
                payload.push_str(value.strip_prefix(' ').unwrap_or(value));
                has_data = true;
            }
        }
        if has_data {
            self.parse_payload(payload.trim(), frames);
        }
    }

    fn parse_line(&mut self, line: &str, frames: &mut Vec<ParsedFrame>) {
        let line = line.trim();
        let line = line.strip_prefix("data:").map_or(line, str::trim_start);
        if line == DONE_MARKER || line.starts_with('{') || line.starts_with('[') {
            self.parse_payload(line, frames);
        }
    }

    fn parse_payload(&mut self, payload: &str, frames: &mut Vec<ParsedFrame>) {
        if payload.is_empty() {
            return;
        }
        if payload == DONE_MARKER {
            debug!(frames = self.frames, dropped = self.dropped, "Stream terminator received");
            self.done = true;
            return;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => {
                self.frames += 1;
                frames.push(value);
            }
            Err(error) => {
                self.dropped += 1;
                trace!(error = %error, len = payload.len(), "Dropping malformed frame");
            }
        }
    }
}
