#![no_main]

use libfuzzer_sys::fuzz_target;
use sqlsentinel_log_pipeline::{BatchDecoder, InboundEvent};

// Small cap so oversized gzip bombs hit PayloadTooLarge quickly.
const MAX_DECODED: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    let decoder = BatchDecoder::new(MAX_DECODED);

    if let Ok(event) = InboundEvent::from_json(data) {
        let _ = decoder.decode_event(&event);
    }
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = decoder.decode(text);
    }
});
