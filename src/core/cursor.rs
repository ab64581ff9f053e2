//! Bounds-checked read cursor over a borrowed byte buffer.
//!
//! Every access is range-checked against the buffer length; a request that
//! would run past the end yields [`FrameError::TruncatedFrame`] instead of
//! panicking.

use crate::error::FrameError;

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Offset of the next unread byte
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], FrameError> {
        let truncated = FrameError::TruncatedFrame {
            offset: self.pos,
            needed: n,
        };
        let end = self.pos.checked_add(n).ok_or(truncated.clone())?;
        let slice = self.buf.get(self.pos..end).ok_or(truncated)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, FrameError> {
        match self.take(1)? {
            [b] => Ok(*b),
            _ => Err(FrameError::TruncatedFrame {
                offset: self.pos,
                needed: 1,
            }),
        }
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self) -> Result<u32, FrameError> {
        let offset = self.pos;
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| FrameError::TruncatedFrame { offset, needed: 4 })?;
        Ok(u32::from_be_bytes(bytes))
    }
}
