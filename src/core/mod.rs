//! # Core Protocol Components
//!
//! Byte-level building blocks: layout schemas, the generic record codec and
//! sentinel-delimited frames.
//!
//! ## Components
//! - **Schema**: compiles `position:N,bytecount:N|Field` annotations into an
//!   ordered field layout
//! - **Codec**: decodes/encodes records against a schema, resolving
//!   dynamically sized fields from earlier siblings
//! - **Frame**: the authenticated sentinel frame and its bounds-checked parser
//! - **FrameCodec**: Tokio codec for splitting byte streams into frames
//!
//! ## Wire Format
//! ```text
//! [Version(4)] 1E [AuthSize(4)] 1E [Auth(N)] 1E [ContentSize(4)] 1E [Content(M)] 1E 1E 1E
//! ```
//!
//! ## Security
//! - Maximum frame size: 16MB by default (prevents memory exhaustion)
//! - Every slice access is range-checked; declared sizes never drive allocation

pub mod codec;
pub mod cursor;
pub mod frame;
pub mod frame_codec;
pub mod schema;
