#![allow(clippy::unwrap_used)]

use bytes::BytesMut;
use cluster_envelope::config::PoolConfig;
use cluster_envelope::core::envelope::Envelope;
use cluster_envelope::core::pool::CodecPool;

#[test]
fn stress_envelope_write_read_large_series() {
    // Heavy burst of envelopes through one pool; codecs must keep being reused
    let pool = CodecPool::new(&PoolConfig::default()).unwrap();
    let mut buf = BytesMut::new();

    for size in [0usize, 1, 64, 512, 4096, 65536] {
        for _ in 0..2_000 {
            let envelope = Envelope::new_with_payload(&pool, &vec![0u8; size]).unwrap();
            envelope.write_wire(&mut buf).unwrap();

            let received: Envelope<Vec<u8>> = Envelope::read_wire(&mut buf.split().freeze()).unwrap();
            assert_eq!(received.get_payload(&pool).unwrap().len(), size);
        }
    }

    let snap = pool.metrics();
    assert_eq!(snap.created, 1);
    assert_eq!(snap.encodes, 12_000);
    assert_eq!(snap.decodes, 12_000);
}
