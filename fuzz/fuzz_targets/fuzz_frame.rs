#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use maestro_protocol::core::frame::{frame_length, Frame};
use maestro_protocol::core::frame_codec::FrameCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Frame parsing must never panic, whatever the size fields claim
    let _ = Frame::from_bytes(data);
    let _ = frame_length(data);

    let mut codec = FrameCodec::new(64 * 1024);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
