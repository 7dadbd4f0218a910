//! Decoder for the runtime's multiplexed stream framing
//!
//! Each frame is an 8 byte header followed by the payload:
//!
//! ```text
//! [tag: u8][0u8; 3][len: u32 big-endian][payload; len]
//! ```
//!
//! The tag is 0 for stdin, 1 for stdout and 2 for stderr. An unknown tag or
//! a length above [`MAX_FRAME_LEN`] means the stream is not in this format.

use crate::error::ForwarderError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::debug;

/// Size of a frame header in bytes
pub const HEADER_LEN: usize = 8;

/// Largest payload accepted in one frame
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn tag(self) -> u8 {
        match self {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(StreamKind::Stdin),
            1 => Some(StreamKind::Stdout),
            2 => Some(StreamKind::Stderr),
            _ => None,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdin => write!(f, "stdin"),
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: StreamKind,
    pub payload: Bytes,
}

/// Encode a payload as a single frame
pub fn encode_frame(kind: StreamKind, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(kind.tag());
    buf.put_slice(&[0, 0, 0]);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MuxCodec;

impl MuxCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for MuxCodec {
    type Item = Frame;
    type Error = ForwarderError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ForwarderError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let kind = StreamKind::from_tag(src[0])
            .ok_or_else(|| ForwarderError::FrameError(format!("unknown stream tag {}", src[0])))?;
        let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(ForwarderError::FrameError(format!(
                "frame length {} exceeds {}",
                len, MAX_FRAME_LEN
            )));
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();

        Ok(Some(Frame { kind, payload }))
    }

    // A stream that stops mid-frame has simply ended
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ForwarderError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !src.is_empty() {
                    debug!("Discarding {} bytes of truncated frame", src.len());
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}
