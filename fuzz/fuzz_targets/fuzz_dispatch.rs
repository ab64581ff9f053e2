#![no_main]

use libfuzzer_sys::fuzz_target;
use maestro_protocol::protocol::auth::{SigningAlgorithm, TokenAuthenticator};
use maestro_protocol::protocol::dispatcher::Dispatcher;
use maestro_protocol::protocol::parser::JsonParser;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let auth = TokenAuthenticator::new(SigningAlgorithm::HS256, &b"fuzz-secret"[..]);
    let dispatcher = Dispatcher::new(Arc::new(auth), Arc::new(JsonParser));
    let _ = dispatcher.parse_incoming(data);
});
