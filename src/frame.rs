/// Prefix carried by every protocol line.
pub const FRAME_PREFIX: &str = "data: ";
/// Body that terminates the frame sequence for one call.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One complete protocol line extracted from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Body of a `data: ` line, prefix removed.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Incremental line splitter for newline-delimited frame streams.
///
/// Bytes are buffered until a `\n` arrives, so chunk boundaries may fall
/// anywhere, including inside a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed arbitrary bytes and drain every complete protocol line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;

        while let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let split = self.scanned + offset;
            if let Some(frame) = classify_line(&self.buffer[start..split]) {
                frames.push(frame);
            }
            start = split + 1;
            self.scanned = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        self.scanned = self.buffer.len();
        frames
    }

    /// Drain the trailing partial line at stream end.
    ///
    /// Returns a frame only when the leftover bytes form a recognised
    /// protocol line that merely lacked its terminating newline.
    pub fn flush(&mut self) -> Option<Frame> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        classify_line(&rest)
    }

    /// Split a complete payload in one shot, including an unterminated last line.
    pub fn parse_frames(input: &str) -> Vec<Frame> {
        let mut buffer = Self::default();
        let mut frames = buffer.feed(input.as_bytes());
        frames.extend(buffer.flush());
        frames
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn classify_line(raw: &[u8]) -> Option<Frame> {
    let line = String::from_utf8_lossy(raw);
    let line = line.strip_suffix('\r').unwrap_or(&line);
    if line.trim().is_empty() {
        return None;
    }

    let body = line.strip_prefix(FRAME_PREFIX)?;
    if body.trim() == DONE_SENTINEL {
        return Some(Frame::Done);
    }

    Some(Frame::Data(body.to_owned()))
}
