//! # Sentinel Frames
//!
//! One complete client message: protocol version, an auth section and a
//! content section, delimited by the record-separator byte `0x1E`.
//!
//! ## Wire Format
//! ```text
//! [Version(4, BE)] [SEP]
//! [AuthSize(4, BE)] [SEP]
//! [Auth(AuthSize)] [SEP]
//! [ContentSize(4, BE)] [SEP]
//! [Content(ContentSize)]
//! [SEP SEP SEP]
//! ```
//! Nothing may follow the terminator.
//!
//! ## Security
//! Parsing goes through a bounds-checked [`Cursor`]; declared sizes are never
//! trusted for allocation or indexing. The version is surfaced but not
//! validated.

use crate::core::cursor::Cursor;
use crate::error::FrameError;
use bytes::{BufMut, Bytes, BytesMut};
use std::ops::Range;

/// Separator byte between frame sections
pub const SEPARATOR: u8 = 0x1E;

/// Number of separator bytes closing a frame
pub const TERMINATOR_LEN: usize = 3;

/// Bytes a frame occupies besides its auth and content sections
pub const FRAME_OVERHEAD: usize = 4 + 1 + 4 + 1 + 1 + 4 + 1 + TERMINATOR_LEN;

/// Parsed sentinel frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: u32,
    pub auth: Bytes,
    pub content: Bytes,
}

/// Section boundaries inside a validated buffer
struct Layout {
    version: u32,
    auth: Range<usize>,
    content: Range<usize>,
}

fn expect_separator(cursor: &mut Cursor<'_>) -> Result<(), FrameError> {
    let offset = cursor.position();
    match cursor.read_u8()? {
        SEPARATOR => Ok(()),
        found => Err(FrameError::InvalidSeparator { offset, found }),
    }
}

fn read_section(cursor: &mut Cursor<'_>, len: usize) -> Result<Range<usize>, FrameError> {
    let start = cursor.position();
    cursor.take(len)?;
    Ok(start..cursor.position())
}

fn parse_layout(buf: &[u8]) -> Result<Layout, FrameError> {
    let mut cursor = Cursor::new(buf);

    let version = cursor.read_u32()?;
    expect_separator(&mut cursor)?;

    let auth_size = cursor.read_u32()? as usize;
    expect_separator(&mut cursor)?;
    let auth = read_section(&mut cursor, auth_size)?;
    expect_separator(&mut cursor)?;

    let content_size = cursor.read_u32()? as usize;
    expect_separator(&mut cursor)?;
    let content = read_section(&mut cursor, content_size)?;

    for _ in 0..TERMINATOR_LEN {
        let offset = cursor.position();
        if cursor.read_u8()? != SEPARATOR {
            return Err(FrameError::InvalidTerminator { offset });
        }
    }

    if cursor.remaining() > 0 {
        return Err(FrameError::InvalidTerminator {
            offset: cursor.position(),
        });
    }

    Ok(Layout {
        version,
        auth,
        content,
    })
}

impl Frame {
    pub fn new(version: u32, auth: impl Into<Bytes>, content: impl Into<Bytes>) -> Self {
        Self {
            version,
            auth: auth.into(),
            content: content.into(),
        }
    }

    /// Parse a complete frame, copying the auth and content sections.
    ///
    /// # Errors
    /// - `TruncatedFrame` when the buffer ends before a section does
    /// - `InvalidSeparator` when a section is not followed by `0x1E`
    /// - `InvalidTerminator` for a bad terminator or trailing bytes
    pub fn from_bytes(buf: &[u8]) -> Result<Self, FrameError> {
        let layout = parse_layout(buf)?;
        Ok(Self {
            version: layout.version,
            auth: Bytes::copy_from_slice(&buf[layout.auth]),
            content: Bytes::copy_from_slice(&buf[layout.content]),
        })
    }

    /// Parse a complete frame without copying; sections share `buf`'s storage.
    pub fn from_shared(buf: Bytes) -> Result<Self, FrameError> {
        let layout = parse_layout(&buf)?;
        Ok(Self {
            version: layout.version,
            auth: buf.slice(layout.auth),
            content: buf.slice(layout.content),
        })
    }

    /// Total encoded size of this frame
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.auth.len() + self.content.len()
    }

    /// Append the wire form of this frame to `dst`.
    ///
    /// Fails with `OversizedFrame` when a section does not fit a u32 length.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        let section_len = |section: &Bytes| {
            u32::try_from(section.len()).map_err(|_| FrameError::OversizedFrame {
                size: section.len(),
                limit: u32::MAX as usize,
            })
        };
        let auth_size = section_len(&self.auth)?;
        let content_size = section_len(&self.content)?;

        dst.reserve(self.encoded_len());
        dst.put_u32(self.version);
        dst.put_u8(SEPARATOR);
        dst.put_u32(auth_size);
        dst.put_u8(SEPARATOR);
        dst.put_slice(&self.auth);
        dst.put_u8(SEPARATOR);
        dst.put_u32(content_size);
        dst.put_u8(SEPARATOR);
        dst.put_slice(&self.content);
        dst.put_bytes(SEPARATOR, TERMINATOR_LEN);
        Ok(())
    }

    /// Serialize the frame to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.to_vec())
    }
}

/// What the buffered prefix of a frame says about its total length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLength {
    /// The auth size field is not buffered yet
    Unknown,
    /// Auth size known, content size not yet; the frame is at least this long
    AtLeast(usize),
    /// Both size fields known
    Exact(usize),
}

/// Total length of the frame starting at `buf[0]`, read from its size fields.
///
/// Separators are not checked here; [`Frame::from_bytes`] validates the full
/// frame once it is buffered.
pub fn frame_length(buf: &[u8]) -> Result<FrameLength, FrameError> {
    const AUTH_SIZE_AT: usize = 4 + 1;
    const AUTH_AT: usize = AUTH_SIZE_AT + 4 + 1;

    let read_size = |at: usize| -> Option<usize> {
        let bytes: [u8; 4] = buf.get(at..at.checked_add(4)?)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes) as usize)
    };
    let overflow = |size: usize| FrameError::OversizedFrame {
        size,
        limit: usize::MAX,
    };

    let Some(auth_size) = read_size(AUTH_SIZE_AT) else {
        return Ok(FrameLength::Unknown);
    };
    let at_least = FRAME_OVERHEAD
        .checked_add(auth_size)
        .ok_or_else(|| overflow(auth_size))?;

    let content_size_at = AUTH_AT
        .checked_add(auth_size)
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| overflow(auth_size))?;
    let Some(content_size) = read_size(content_size_at) else {
        return Ok(FrameLength::AtLeast(at_least));
    };

    at_least
        .checked_add(content_size)
        .map(FrameLength::Exact)
        .ok_or_else(|| overflow(content_size))
}
