//! Arbitrary bytes must never panic the frame decoder, and anything it
//! accepts must re-encode to the same frame.

#![no_main]

use bulwark_proto::Packet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = Packet::decode(data) {
        let encoded = packet.encode().expect("decoded packet re-encodes");
        let again = Packet::decode(&encoded).expect("re-encoded frame decodes");
        assert_eq!(packet, again);
    }
});
