//! Codec Pool Metrics
//!
//! Counters for pool reuse and codec traffic. Each [`CodecPool`](crate::core::pool::CodecPool)
//! owns one [`PoolMetrics`]; there is no global instance.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for one codec pool
#[derive(Debug)]
pub struct PoolMetrics {
    /// Total borrow calls that produced a codec
    pub borrows: AtomicU64,
    /// Codecs built by the factory
    pub created: AtomicU64,
    /// Borrows served from the idle list
    pub reused: AtomicU64,
    /// Codecs handed back by callers
    pub released: AtomicU64,
    /// Released codecs dropped because the idle list was full
    pub discarded: AtomicU64,
    /// Idle codecs dropped by the idle timeout or an explicit clear
    pub evicted: AtomicU64,
    /// Factory failures
    pub construction_failures: AtomicU64,
    /// Successful encodes through the pool
    pub encodes: AtomicU64,
    /// Successful decodes through the pool
    pub decodes: AtomicU64,
    /// Failed encodes
    pub encode_failures: AtomicU64,
    /// Failed decodes
    pub decode_failures: AtomicU64,
    /// Total bytes produced by encodes
    pub bytes_encoded: AtomicU64,
    /// Total bytes consumed by decodes
    pub bytes_decoded: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl PoolMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            borrows: AtomicU64::new(0),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            released: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            construction_failures: AtomicU64::new(0),
            encodes: AtomicU64::new(0),
            decodes: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            bytes_encoded: AtomicU64::new(0),
            bytes_decoded: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a borrow; `reused` tells whether it came from the idle list
    pub fn codec_borrowed(&self, reused: bool) {
        self.borrows.fetch_add(1, Ordering::Relaxed);
        if reused {
            self.reused.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a factory construction
    pub fn codec_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a factory failure
    pub fn construction_failed(&self) {
        self.construction_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a codec handed back to the pool
    pub fn codec_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a released codec dropped due to the idle cap
    pub fn codec_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record idle codecs dropped by eviction
    pub fn codecs_evicted(&self, count: u64) {
        self.evicted.fetch_add(count, Ordering::Relaxed);
    }

    /// Record an encode result
    pub fn encode_finished(&self, bytes: Option<usize>) {
        match bytes {
            Some(n) => {
                self.encodes.fetch_add(1, Ordering::Relaxed);
                self.bytes_encoded.fetch_add(n as u64, Ordering::Relaxed);
            }
            None => {
                self.encode_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a decode result
    pub fn decode_finished(&self, bytes: usize, ok: bool) {
        if ok {
            self.decodes.fetch_add(1, Ordering::Relaxed);
            self.bytes_decoded.fetch_add(bytes as u64, Ordering::Relaxed);
        } else {
            self.decode_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            borrows: self.borrows.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            construction_failures: self.construction_failures.load(Ordering::Relaxed),
            encodes: self.encodes.load(Ordering::Relaxed),
            decodes: self.decodes.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            borrows = snapshot.borrows,
            created = snapshot.created,
            reused = snapshot.reused,
            released = snapshot.released,
            discarded = snapshot.discarded,
            evicted = snapshot.evicted,
            construction_failures = snapshot.construction_failures,
            encodes = snapshot.encodes,
            decodes = snapshot.decodes,
            encode_failures = snapshot.encode_failures,
            decode_failures = snapshot.decode_failures,
            bytes_encoded = snapshot.bytes_encoded,
            bytes_decoded = snapshot.bytes_decoded,
            uptime_seconds = snapshot.uptime_seconds,
            "Codec pool metrics snapshot"
        );
    }
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pool metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetricsSnapshot {
    pub borrows: u64,
    pub created: u64,
    pub reused: u64,
    pub released: u64,
    pub discarded: u64,
    pub evicted: u64,
    pub construction_failures: u64,
    pub encodes: u64,
    pub decodes: u64,
    pub encode_failures: u64,
    pub decode_failures: u64,
    pub bytes_encoded: u64,
    pub bytes_decoded: u64,
    pub uptime_seconds: u64,
}

impl PoolMetricsSnapshot {
    /// Fraction of borrows served without constructing a codec
    pub fn reuse_ratio(&self) -> f64 {
        if self.borrows == 0 {
            0.0
        } else {
            self.reused as f64 / self.borrows as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = PoolMetrics::new();
        metrics.codec_created();
        metrics.codec_borrowed(false);
        metrics.codec_borrowed(true);
        metrics.codec_borrowed(true);
        metrics.encode_finished(Some(10));
        metrics.encode_finished(None);
        metrics.decode_finished(10, true);
        metrics.decode_finished(4, false);

        let snap = metrics.snapshot();
        assert_eq!(snap.borrows, 3);
        assert_eq!(snap.reused, 2);
        assert_eq!(snap.created, 1);
        assert_eq!(snap.encodes, 1);
        assert_eq!(snap.encode_failures, 1);
        assert_eq!(snap.bytes_encoded, 10);
        assert_eq!(snap.decodes, 1);
        assert_eq!(snap.decode_failures, 1);
        assert_eq!(snap.bytes_decoded, 10);
    }

    #[test]
    fn test_reuse_ratio() {
        assert_eq!(PoolMetricsSnapshot::default().reuse_ratio(), 0.0);

        let snap = PoolMetricsSnapshot {
            borrows: 4,
            reused: 3,
            ..Default::default()
        };
        assert!((snap.reuse_ratio() - 0.75).abs() < f64::EPSILON);
    }
}
