#![no_main]

use libfuzzer_sys::fuzz_target;
use maestro_protocol::core::codec::decode_record;
use maestro_protocol::protocol::envelope::{EnvelopeHeader, ProtobufParser};
use maestro_protocol::protocol::parser::Parser;

fuzz_target!(|data: &[u8]| {
    // Dynamic sizes come straight from the input
    if let Ok(header) = decode_record::<EnvelopeHeader, _>(&mut &data[..]) {
        let _ = ProtobufParser::default().parse(&header.data);
    }
});
