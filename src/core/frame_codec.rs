//! Stream framing for sentinel frames.
//!
//! Splits a byte stream into complete [`Frame`]s for use with
//! `tokio_util::codec::{FramedRead, FramedWrite}`. A frame is yielded only
//! once all of its bytes are buffered; the full buffer is then validated by
//! the frame parser and sliced without copying.

use crate::config::MAX_FRAME_SIZE;
use crate::core::frame::{frame_length, Frame, FrameLength};
use crate::error::{FrameError, ProtocolError, Result};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_frame_size {
            return Err(FrameError::OversizedFrame {
                size,
                limit: self.max_frame_size,
            }
            .into());
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // Sizes are checked as soon as they are known so a hostile header
        // cannot make `src` grow past the limit
        let len = match frame_length(src)? {
            FrameLength::Unknown => return Ok(None),
            FrameLength::AtLeast(min) => {
                self.check_size(min)?;
                return Ok(None);
            }
            FrameLength::Exact(len) => {
                self.check_size(len)?;
                len
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let raw = src.split_to(len).freeze();
        trace!(len, "Decoded sentinel frame");
        Ok(Some(Frame::from_shared(raw)?))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        self.check_size(item.encoded_len())?;
        item.encode_into(dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(content: &'static [u8]) -> Frame {
        Frame::new(1, &b"token"[..], content)
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let bytes = frame(b"hello").to_bytes().unwrap();
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();

        for (i, byte) in bytes.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            let decoded = codec.decode(&mut buf).unwrap();
            if i + 1 < bytes.len() {
                assert!(decoded.is_none(), "frame yielded early at byte {i}");
            } else {
                assert_eq!(decoded, Some(frame(b"hello")));
            }
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(frame(b"one"), &mut buf).unwrap();
        codec.encode(frame(b"two"), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(frame(b"one")));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(frame(b"two")));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_rejects_oversized_header() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0, 1, 0x1E]);
        buf.extend_from_slice(&1024u32.to_be_bytes());
        buf.extend_from_slice(&[0x1E]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::Frame(FrameError::OversizedFrame { limit: 64, .. }))
        ));
    }

    #[test]
    fn test_decode_surfaces_bad_separator() {
        let mut bytes = frame(b"hello").to_bytes().unwrap();
        bytes[4] = 0x00;
        let mut buf = BytesMut::from(&bytes[..]);
        assert!(matches!(
            FrameCodec::default().decode(&mut buf),
            Err(ProtocolError::Frame(FrameError::InvalidSeparator { offset: 4, .. }))
        ));
    }

    #[test]
    fn test_encode_rejects_oversized() {
        let mut codec = FrameCodec::new(16);
        let mut buf = BytesMut::new();
        assert!(codec.encode(frame(b"too long for the limit"), &mut buf).is_err());
        assert!(buf.is_empty());
    }
}
