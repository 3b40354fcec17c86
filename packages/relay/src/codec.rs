//! Newline-delimited framing for the engine event feed.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// Default cap on a single event line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// One frame of the event feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventLine {
    /// A complete line, newline removed.
    Line(Bytes),
    /// A line longer than the cap; its bytes are discarded up to the next
    /// newline.
    Oversized,
}

/// Splits a byte stream on `\n`. A trailing partial line is kept until more
/// bytes arrive and flushed at end of stream.
#[derive(Debug)]
pub struct EventLineCodec {
    max_length: usize,
    next_index: usize,
    discarding: bool,
}

impl EventLineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

impl Default for EventLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EventLineCodec {
    type Item = EventLine;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<EventLine>, Self::Error> {
        loop {
            let read_to = self.max_length.saturating_add(1).min(buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let mut line = buf.split_to(end + 1);
                    line.truncate(end);
                    return Ok(Some(EventLine::Line(line.freeze())));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(EventLine::Oversized));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<EventLine>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            buf.clear();
            return Ok(None);
        }
        if buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(EventLine::Line(buf.split().freeze())))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    fn line(text: &str) -> Option<EventLine> {
        Some(EventLine::Line(Bytes::copy_from_slice(text.as_bytes())))
    }

    #[test]
    fn carries_partial_lines_across_reads() -> Result<(), std::io::Error> {
        let mut codec = EventLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"Type\":\"con"[..]);
        assert_eq!(codec.decode(&mut buf)?, None);

        buf.extend_from_slice(b"tainer\"}\n{\"Type\"");
        assert_eq!(codec.decode(&mut buf)?, line("{\"Type\":\"container\"}"));
        assert_eq!(codec.decode(&mut buf)?, None);

        buf.extend_from_slice(b":\"image\"}");
        assert_eq!(codec.decode_eof(&mut buf)?, line("{\"Type\":\"image\"}"));
        assert_eq!(codec.decode_eof(&mut buf)?, None);
        Ok(())
    }

    #[test]
    fn discards_oversized_lines() -> Result<(), std::io::Error> {
        let mut codec = EventLineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"0123456789abcdef"[..]);
        assert_eq!(codec.decode(&mut buf)?, Some(EventLine::Oversized));
        assert_eq!(codec.decode(&mut buf)?, None);

        buf.extend_from_slice(b"xyz\nshort\n");
        assert_eq!(codec.decode(&mut buf)?, line("short"));
        Ok(())
    }

    #[test]
    fn empty_lines_are_frames() -> Result<(), std::io::Error> {
        let mut codec = EventLineCodec::new();
        let mut buf = BytesMut::from(&b"\n\n{}\n"[..]);
        assert_eq!(codec.decode(&mut buf)?, line(""));
        assert_eq!(codec.decode(&mut buf)?, line(""));
        assert_eq!(codec.decode(&mut buf)?, line("{}"));
        Ok(())
    }
}
