#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use worker_protocol::decode::{
    decode_dump_response, decode_layers_change_notification, decode_rtp_notification,
    decode_score_notification, decode_set_preferred_layers_response,
    decode_set_priority_response, decode_stats_response, decode_trace_notification,
};

fuzz_target!(|data: &[u8]| {
    // First byte picks the decoder, the rest is the payload.
    let Some((selector, payload)) = data.split_first() else {
        return;
    };
    let body = Some(Bytes::copy_from_slice(payload));

    // Decoders must return Err on malformed input, never panic.
    match selector % 8 {
        0 => drop(decode_dump_response(body)),
        1 => drop(decode_stats_response(body)),
        2 => drop(decode_score_notification(body)),
        3 => drop(decode_layers_change_notification(body)),
        4 => drop(decode_trace_notification(body)),
        5 => drop(decode_rtp_notification(body)),
        6 => drop(decode_set_preferred_layers_response(body)),
        _ => drop(decode_set_priority_response(body)),
    }
});
