#![no_main]

use cluster_envelope::Envelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz envelope deserialization - test for panics and runaway allocation
    if let Ok(envelope) = Envelope::<Vec<u8>>::from_wire_bytes(data) {
        assert!(envelope.encoded_len() <= data.len());
    }
});
