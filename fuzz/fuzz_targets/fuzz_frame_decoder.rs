#![no_main]

use bytes::BytesMut;
use cluster_envelope::EnvelopeCodec;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut codec = EnvelopeCodec::<Vec<u8>>::new();
    let mut buf = BytesMut::from(data);
    // Drain every complete frame; stop at the first error or partial frame
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
