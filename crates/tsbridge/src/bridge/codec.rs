//! Line framing for worker communication.
//!
//! Wraps AnyDelimiterCodec: one message per `\n`-terminated line, bounded
//! length, UTF-8 checked per line.
//! Works over any AsyncRead/AsyncWrite (child pipes in practice).

use std::io;
use std::string::FromUtf8Error;

use tokio_util::bytes::BytesMut;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};

/// Default upper bound for a single line in either direction (16 MiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// One received line. A line that is not UTF-8 is still a complete frame:
/// the stream stays usable and the caller decides what the bad line means.
pub type Frame = Result<String, FromUtf8Error>;

/// Codec that frames messages by line terminator.
///
/// Refuses to encode a message that would span more than one line, and
/// treats a partial line at end-of-stream as a torn message rather than a
/// complete one. A trailing `\r` is stripped from decoded lines.
pub struct LineCodec {
    inner: AnyDelimiterCodec,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                b"\n".to_vec(),
                max_length,
            ),
        }
    }

    pub fn max_length(&self) -> usize {
        self.inner.max_length()
    }
}

fn into_io(err: AnyDelimiterCodecError) -> io::Error {
    match err {
        AnyDelimiterCodecError::MaxChunkLengthExceeded => {
            io::Error::new(io::ErrorKind::InvalidData, "line exceeds maximum length")
        }
        AnyDelimiterCodecError::Io(e) => e,
    }
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(chunk) = self.inner.decode(src).map_err(into_io)? else {
            return Ok(None);
        };
        let line = chunk.strip_suffix(b"\r").unwrap_or(&chunk[..]);
        Ok(Some(String::from_utf8(line.to_vec())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                let torn = src.len();
                src.clear();
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended inside a message ({torn} bytes without line terminator)"),
                ))
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.contains(['\n', '\r']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "message contains a line terminator",
            ));
        }
        let line_len = item.len();
        tracing::trace!(line_size_bytes = line_len, "Encoding line");
        if line_len > 100_000 {
            tracing::info!(
                line_size_bytes = line_len,
                line_size_kb = line_len / 1024,
                "Large line being encoded"
            );
        }
        self.inner.encode(item, dst).map_err(into_io)
    }
}
