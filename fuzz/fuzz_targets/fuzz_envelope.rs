#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Exercise the raw serde path (includes serde_json's own UTF-8
    // validation and error handling for invalid sequences).
    let _ = serde_json::from_slice::<reach_client::protocol::ServerEnvelope>(data);

    // The codec path adds the single-key check and unrecognized-tag
    // routing; it must never panic, whatever the frame contains.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = reach_client::codec::decode(s);
    }
});
