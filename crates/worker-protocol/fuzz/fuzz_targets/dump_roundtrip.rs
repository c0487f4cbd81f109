#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use worker_protocol::decode::{decode_dump_response, decode_trace_notification};
use worker_protocol::encode::{encode_dump_response, encode_trace_notification};

fuzz_target!(|data: &[u8]| {
    let body = Bytes::copy_from_slice(data);

    if let Ok(dump) = decode_dump_response(Some(body.clone())) {
        if let Ok(encoded) = encode_dump_response(&dump) {
            let again = decode_dump_response(Some(encoded)).expect("re-decode dump");
            assert_eq!(dump, again);
        }
    }

    if let Ok(trace) = decode_trace_notification(Some(body)) {
        if let Ok(encoded) = encode_trace_notification(&trace) {
            let again = decode_trace_notification(Some(encoded)).expect("re-decode trace");
            assert_eq!(trace, again);
        }
    }
});
