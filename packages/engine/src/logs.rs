//! Decoder for the engine's log stream format.
//!
//! Without a TTY the engine multiplexes stdout and stderr into frames with an
//! 8-byte header: stream type (1 byte), three zero bytes, and a big-endian
//! u32 payload length. Containers started with a TTY send raw bytes instead;
//! the codec detects that from the first header and passes data through.

use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;
use tokio_util::codec::Decoder;

const HEADER_LEN: usize = 8;
/// Larger frame lengths are treated as lost framing.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Which stream a log chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStreamKind {
    Stdin,
    Stdout,
    Stderr,
    /// Unframed output (TTY containers or a truncated trailing frame).
    Raw,
}

impl LogStreamKind {
    fn from_header(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Raw => "raw",
        }
    }
}

/// One decoded piece of log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub stream: LogStreamKind,
    pub data: Bytes,
}

impl LogChunk {
    /// Payload as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Detecting,
    Multiplexed,
    Raw,
}

/// `tokio_util` decoder turning engine log bytes into [`LogChunk`]s.
#[derive(Debug)]
pub struct LogFrameCodec {
    mode: Mode,
}

impl LogFrameCodec {
    pub fn new() -> Self {
        Self {
            mode: Mode::Detecting,
        }
    }

    fn looks_multiplexed(header: &[u8]) -> bool {
        LogStreamKind::from_header(header[0]).is_some() && header[1..4] == [0, 0, 0]
    }

    fn take_raw(src: &mut BytesMut) -> Option<LogChunk> {
        if src.is_empty() {
            return None;
        }
        Some(LogChunk {
            stream: LogStreamKind::Raw,
            data: src.split().freeze(),
        })
    }
}

impl Default for LogFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LogFrameCodec {
    type Item = LogChunk;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LogChunk>, Self::Error> {
        if self.mode == Mode::Detecting {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }
            self.mode = if Self::looks_multiplexed(&src[..HEADER_LEN]) {
                Mode::Multiplexed
            } else {
                Mode::Raw
            };
        }

        if self.mode == Mode::Raw {
            return Ok(Self::take_raw(src));
        }

        loop {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }
            let Some(stream) = LogStreamKind::from_header(src[0]) else {
                // Lost framing; pass the rest through untouched.
                self.mode = Mode::Raw;
                return Ok(Self::take_raw(src));
            };
            let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
            if len > MAX_FRAME_LEN {
                self.mode = Mode::Raw;
                return Ok(Self::take_raw(src));
            }
            if src.len() < HEADER_LEN + len {
                src.reserve(HEADER_LEN + len - src.len());
                return Ok(None);
            }
            src.advance(HEADER_LEN);
            let data = src.split_to(len).freeze();
            if data.is_empty() {
                continue;
            }
            return Ok(Some(LogChunk { stream, data }));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<LogChunk>, Self::Error> {
        if let Some(chunk) = self.decode(src)? {
            return Ok(Some(chunk));
        }
        if self.mode == Mode::Multiplexed && src.len() >= HEADER_LEN {
            src.advance(HEADER_LEN);
        }
        Ok(Self::take_raw(src))
    }
}

/// Decode a fully buffered log body into chunks.
pub fn demux(body: &[u8]) -> Vec<LogChunk> {
    let mut codec = LogFrameCodec::new();
    let mut buf = BytesMut::from(body);
    let mut chunks = Vec::new();
    while let Ok(Some(chunk)) = codec.decode_eof(&mut buf) {
        chunks.push(chunk);
    }
    chunks
}

/// Decode a fully buffered log body into text, stream markers dropped.
pub fn demux_text(body: &[u8]) -> String {
    demux(body).iter().map(LogChunk::text).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    fn frame(stream: u8, payload: &str) -> Vec<u8> {
        let mut out = vec![stream, 0, 0, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload.as_bytes());
        out
    }

    #[test]
    fn splits_interleaved_frames() {
        let mut body = frame(1, "hello\n");
        body.extend(frame(2, "oops\n"));
        body.extend(frame(1, "bye\n"));

        let chunks = demux(&body);
        let kinds: Vec<_> = chunks.iter().map(|c| c.stream).collect();
        assert_eq!(
            kinds,
            vec![LogStreamKind::Stdout, LogStreamKind::Stderr, LogStreamKind::Stdout]
        );
        assert_eq!(demux_text(&body), "hello\noops\nbye\n");
    }

    #[test]
    fn waits_for_split_frame() -> Result<(), std::io::Error> {
        let whole = frame(1, "partial line\n");
        let mut codec = LogFrameCodec::new();
        let mut buf = BytesMut::from(&whole[..5]);
        assert_eq!(codec.decode(&mut buf)?, None);
        buf.extend_from_slice(&whole[5..12]);
        assert_eq!(codec.decode(&mut buf)?, None);
        buf.extend_from_slice(&whole[12..]);
        let chunk = codec.decode(&mut buf)?.expect("complete frame");
        assert_eq!(chunk.text(), "partial line\n");
        assert!(buf.is_empty());
        Ok(())
    }

    #[test]
    fn tty_output_passes_through() {
        let chunks = demux(b"plain tty output\r\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].stream, LogStreamKind::Raw);
        assert_eq!(chunks[0].text(), "plain tty output\r\n");
    }

    #[test]
    fn short_body_is_flushed_at_eof() {
        assert_eq!(demux_text(b"hi"), "hi");
        assert!(demux(b"").is_empty());
    }

    #[test]
    fn truncated_trailing_frame_is_flushed() {
        let mut body = frame(1, "complete\n");
        let mut cut = frame(2, "cut short");
        cut.truncate(HEADER_LEN + 3);
        body.extend(cut);
        assert_eq!(demux_text(&body), "complete\ncut");
    }

    #[test]
    fn oversized_frame_length_falls_back_to_raw() -> Result<(), std::io::Error> {
        let mut first = frame(1, "ok\n");
        first.extend_from_slice(&[1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, b'x']);
        let mut codec = LogFrameCodec::new();
        let mut buf = BytesMut::from(&first[..]);

        let chunk = codec.decode(&mut buf)?.expect("first frame");
        assert_eq!(chunk.stream, LogStreamKind::Stdout);
        let rest = codec.decode(&mut buf)?.expect("raw remainder");
        assert_eq!(rest.stream, LogStreamKind::Raw);
        assert_eq!(rest.data.len(), HEADER_LEN + 1);
        assert!(buf.is_empty());
        assert!(buf.capacity() < MAX_FRAME_LEN);
        Ok(())
    }
}
