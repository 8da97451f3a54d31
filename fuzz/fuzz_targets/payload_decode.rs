//! Payload parsers must reject garbage without panicking.

#![no_main]

use bulwark_proto::{MasterConfig, RouteUpdate};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = MasterConfig::from_payload(text);
        let _ = RouteUpdate::from_payload(text);
    }
});
