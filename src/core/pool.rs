//! # Codec Pool
//!
//! Soft cache of reusable [`Codec`] instances. Envelopes borrow a codec for
//! every serialize/deserialize call instead of building one per message.
//!
//! ## Contract
//! - `borrow()` never blocks: it pops an idle codec or builds a new one
//! - A borrowed codec is owned by exactly one [`PooledCodec`] guard; the guard
//!   returns it on drop, so every exit path releases it exactly once
//! - Correctness never depends on the idle list holding anything
//!
//! ## Eviction
//! - The idle list is capped at `max_idle`; extra codecs are dropped on release
//! - Codecs idle longer than `idle_timeout` are dropped on release or by
//!   [`CodecPool::evict_idle`]
//! - [`CodecPool::clear`] drops every idle codec (memory-pressure hook)
//!
//! ## Usage
//! ```rust
//! use cluster_envelope::config::PoolConfig;
//! use cluster_envelope::core::pool::CodecPool;
//!
//! let pool = CodecPool::new(&PoolConfig::default()).unwrap();
//! let bytes = pool.encode(&42u32).unwrap();
//! let back: u32 = pool.decode(&bytes).unwrap();
//! assert_eq!(back, 42);
//! // Codec automatically returned to pool after each call
//! assert_eq!(pool.available(), 1);
//! ```

use crate::config::PoolConfig;
use crate::core::serialization::{Codec, FormatCodec};
use crate::error::{constants, EnvelopeError, Result};
use crate::utils::metrics::{PoolMetrics, PoolMetricsSnapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace, warn};

type CodecFactory<C> = dyn Fn() -> Result<C> + Send + Sync + 'static;

/// An idle codec and the moment it was handed back
struct IdleCodec<C> {
    codec: C,
    returned_at: Instant,
}

struct PoolInner<C> {
    idle: Mutex<Vec<IdleCodec<C>>>,
    factory: Box<CodecFactory<C>>,
    max_idle: usize,
    idle_timeout: Duration,
    metrics: PoolMetrics,
}

impl<C: Codec> PoolInner<C> {
    fn create(&self) -> Result<C> {
        match (self.factory)() {
            Ok(codec) => {
                self.metrics.codec_created();
                trace!(format = %codec.format(), "Constructed new codec");
                Ok(codec)
            }
            Err(e) => {
                self.metrics.construction_failed();
                warn!(error = %e, "Codec construction failed");
                Err(match e {
                    EnvelopeError::CodecConstruction(_) => e,
                    other => EnvelopeError::CodecConstruction(format!(
                        "{}: {other}",
                        constants::ERR_FACTORY_FAILED
                    )),
                })
            }
        }
    }

    fn give_back(&self, codec: C) {
        self.metrics.codec_released();
        let now = Instant::now();

        if let Ok(mut idle) = self.idle.lock() {
            let before = idle.len();
            idle.retain(|entry| now.duration_since(entry.returned_at) < self.idle_timeout);
            let expired = before - idle.len();
            if expired > 0 {
                self.metrics.codecs_evicted(expired as u64);
                debug!(expired, "Dropped stale idle codecs");
            }

            if idle.len() < self.max_idle {
                idle.push(IdleCodec {
                    codec,
                    returned_at: now,
                });
                return;
            }
        }
        // Idle list full (or poisoned): let the codec be deallocated
        self.metrics.codec_discarded();
    }
}

/// A borrowed codec that returns itself to the pool when dropped
pub struct PooledCodec<C: Codec = FormatCodec> {
    codec: Option<C>,
    pool: Arc<PoolInner<C>>,
}

impl<C: Codec> PooledCodec<C> {
    /// Return the codec to the pool now.
    ///
    /// Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }

    /// Detach the codec from the pool; it will not be returned.
    pub fn detach(mut self) -> Option<C> {
        self.codec.take()
    }
}

impl<C: Codec> Drop for PooledCodec<C> {
    fn drop(&mut self) {
        if let Some(codec) = self.codec.take() {
            self.pool.give_back(codec);
        }
    }
}

impl<C: Codec> Deref for PooledCodec<C> {
    type Target = C;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &C {
        // Only `detach` and `drop` take the codec, and both consume the guard
        self.codec.as_ref().expect("pooled codec present until release")
    }
}

impl<C: Codec> DerefMut for PooledCodec<C> {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut C {
        self.codec.as_mut().expect("pooled codec present until release")
    }
}

/// Thread-safe pool of reusable codecs.
///
/// Cloning is cheap and every clone shares the same idle list, so one pool can
/// be created at startup and handed to every component that serializes.
pub struct CodecPool<C: Codec = FormatCodec> {
    inner: Arc<PoolInner<C>>,
}

impl CodecPool<FormatCodec> {
    /// Create a pool of [`FormatCodec`]s using the configured format
    pub fn new(config: &PoolConfig) -> Result<Self> {
        let format = config.format;
        Self::with_factory(config, move || Ok(FormatCodec::new(format)))
    }
}

impl<C: Codec + 'static> CodecPool<C> {
    /// Create a pool whose codecs are built by `factory`.
    ///
    /// `config.prewarm` codecs are constructed eagerly; a factory failure
    /// during prewarm fails the whole call.
    #[instrument(skip(config, factory), fields(max_idle = config.max_idle, prewarm = config.prewarm))]
    pub fn with_factory<F>(config: &PoolConfig, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        let inner = Arc::new(PoolInner {
            idle: Mutex::new(Vec::with_capacity(config.prewarm.min(config.max_idle))),
            factory: Box::new(factory),
            max_idle: config.max_idle,
            idle_timeout: config.idle_timeout,
            metrics: PoolMetrics::new(),
        });

        let prewarm = config.prewarm.min(config.max_idle);
        if prewarm > 0 {
            let mut codecs = Vec::with_capacity(prewarm);
            for _ in 0..prewarm {
                codecs.push(inner.create()?);
            }
            let now = Instant::now();
            if let Ok(mut idle) = inner.idle.lock() {
                idle.extend(codecs.into_iter().map(|codec| IdleCodec {
                    codec,
                    returned_at: now,
                }));
            }
        }

        debug!(format = ?config.format, "Codec pool created");
        Ok(Self { inner })
    }
}

impl<C: Codec> CodecPool<C> {
    /// Borrow a codec from the pool (or construct a new one if the pool is empty)
    ///
    /// # Errors
    /// Returns `EnvelopeError::CodecConstruction` if a new codec was needed and
    /// the factory failed. The pool is left unchanged in that case.
    pub fn borrow(&self) -> Result<PooledCodec<C>> {
        let reused = match self.inner.idle.lock() {
            Ok(mut idle) => idle.pop().map(|entry| entry.codec),
            Err(_) => {
                warn!("{}", constants::ERR_POOL_LOCK);
                None
            }
        };

        let codec = match reused {
            Some(codec) => {
                self.inner.metrics.codec_borrowed(true);
                codec
            }
            None => {
                let codec = self.inner.create()?;
                self.inner.metrics.codec_borrowed(false);
                codec
            }
        };

        Ok(PooledCodec {
            codec: Some(codec),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Return a borrowed codec to the pool.
    ///
    /// Dropping the guard does the same; this exists for call sites that want
    /// the release to be explicit.
    pub fn release(&self, codec: PooledCodec<C>) {
        codec.release();
    }

    /// Run `f` with a borrowed codec, releasing it on every exit path
    pub fn with_codec<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut C) -> Result<R>,
    {
        let mut codec = self.borrow()?;
        f(&mut *codec)
    }

    /// Serialize `value` with a pooled codec.
    ///
    /// A borrow failure is counted as a construction failure only, not as a
    /// failed encode.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let mut codec = self.borrow()?;
        let result = codec.encode(value);
        self.inner
            .metrics
            .encode_finished(result.as_ref().ok().map(Vec::len));
        result
    }

    /// Deserialize a `T` from `bytes` with a pooled codec
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let mut codec = self.borrow()?;
        let result = codec.decode(bytes);
        self.inner
            .metrics
            .decode_finished(bytes.len(), result.is_ok());
        result
    }

    /// Get the current number of idle codecs in the pool
    pub fn available(&self) -> usize {
        self.inner.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Drop idle codecs that have been unused for longer than the idle timeout.
    ///
    /// Returns the number of codecs dropped.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let timeout = self.inner.idle_timeout;
        let evicted = match self.inner.idle.lock() {
            Ok(mut idle) => {
                let before = idle.len();
                idle.retain(|entry| now.duration_since(entry.returned_at) < timeout);
                before - idle.len()
            }
            Err(_) => 0,
        };

        if evicted > 0 {
            self.inner.metrics.codecs_evicted(evicted as u64);
            debug!(evicted, "Evicted idle codecs");
        }
        evicted
    }

    /// Drop every idle codec. Subsequent borrows construct fresh ones.
    pub fn clear(&self) -> usize {
        let cleared = match self.inner.idle.lock() {
            Ok(mut idle) => {
                let n = idle.len();
                idle.clear();
                n
            }
            Err(_) => 0,
        };

        if cleared > 0 {
            self.inner.metrics.codecs_evicted(cleared as u64);
            debug!(cleared, "Cleared idle codec pool");
        }
        cleared
    }

    /// Get the pool's metrics snapshot
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Log the pool's metrics
    pub fn log_metrics(&self) {
        self.inner.metrics.log_metrics();
    }
}

impl<C: Codec> Clone for CodecPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec> fmt::Debug for CodecPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecPool")
            .field("available", &self.available())
            .field("max_idle", &self.inner.max_idle)
            .field("idle_timeout", &self.inner.idle_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::serialization::SerializationFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(max_idle: usize) -> PoolConfig {
        PoolConfig {
            max_idle,
            ..PoolConfig::default()
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_codec_pool_basic() {
        let pool = CodecPool::new(&config(10)).unwrap();
        assert_eq!(pool.available(), 0);

        let codec = pool.borrow().unwrap();
        assert_eq!(codec.format(), SerializationFormat::Bincode);
        assert_eq!(pool.available(), 0);

        drop(codec);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_codec_pool_reuse() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = CodecPool::with_factory(&config(4), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(FormatCodec::default())
        })
        .unwrap();

        for i in 0..100u32 {
            let bytes = pool.encode(&i).unwrap();
            let back: u32 = pool.decode(&bytes).unwrap();
            assert_eq!(back, i);
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        let snap = pool.metrics();
        assert_eq!(snap.borrows, 200);
        assert_eq!(snap.reused, 199);
        assert_eq!(snap.released, 200);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_codec_pool_empty_constructs_new() {
        let pool = CodecPool::new(&config(1)).unwrap();
        let _a = pool.borrow().unwrap();
        let _b = pool.borrow().unwrap(); // Should construct new

        assert_eq!(pool.available(), 0);
        assert_eq!(pool.metrics().created, 2);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_idle_cap_discards_extra() {
        let pool = CodecPool::new(&config(2)).unwrap();
        let held: Vec<_> = (0..5).map(|_| pool.borrow().unwrap()).collect();
        drop(held);

        assert_eq!(pool.available(), 2);
        assert_eq!(pool.metrics().discarded, 3);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_explicit_release() {
        let pool = CodecPool::new(&config(2)).unwrap();
        let codec = pool.borrow().unwrap();
        pool.release(codec);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.metrics().released, 1);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_detach_does_not_return() {
        let pool = CodecPool::new(&config(2)).unwrap();
        let codec = pool.borrow().unwrap().detach();
        assert!(codec.is_some());
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.metrics().released, 0);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_prewarm() {
        let cfg = PoolConfig {
            prewarm: 3,
            ..config(8)
        };
        let pool = CodecPool::new(&cfg).unwrap();
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.metrics().created, 3);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_factory_failure_propagates() {
        let pool = CodecPool::<FormatCodec>::with_factory(&config(2), || {
            Err(EnvelopeError::Io(std::io::Error::other("no memory")))
        })
        .unwrap();

        let result = pool.borrow();
        assert!(matches!(result, Err(EnvelopeError::CodecConstruction(_))));
        assert_eq!(pool.available(), 0);
        let snap = pool.metrics();
        assert_eq!(snap.construction_failures, 1);
        assert_eq!(snap.borrows, 0);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_with_codec_releases_on_both_paths() {
        let pool = CodecPool::new(&config(4)).unwrap();

        let format = pool.with_codec(|codec| Ok(codec.format())).unwrap();
        assert_eq!(format, SerializationFormat::Bincode);
        assert_eq!(pool.available(), 1);

        let failed: Result<()> =
            pool.with_codec(|_| Err(EnvelopeError::Serialization("rejected".into())));
        assert!(failed.is_err());
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.metrics().released, 2);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_factory_failure_not_counted_as_codec_failure() {
        let pool = CodecPool::<FormatCodec>::with_factory(&config(2), || {
            Err(EnvelopeError::CodecConstruction("exhausted".into()))
        })
        .expect("pool without prewarm");

        assert!(matches!(
            pool.encode(&7u32),
            Err(EnvelopeError::CodecConstruction(_))
        ));
        assert!(matches!(
            pool.decode::<u32>(&[0, 0, 0, 7]),
            Err(EnvelopeError::CodecConstruction(_))
        ));

        let snap = pool.metrics();
        assert_eq!(snap.construction_failures, 2);
        assert_eq!(snap.encode_failures, 0);
        assert_eq!(snap.decode_failures, 0);
        assert_eq!(snap.encodes, 0);
        assert_eq!(snap.decodes, 0);
    }

    #[test]
    fn test_prewarm_factory_failure_fails_construction() {
        let cfg = PoolConfig {
            prewarm: 2,
            ..config(4)
        };
        let result = CodecPool::<FormatCodec>::with_factory(&cfg, || {
            Err(EnvelopeError::CodecConstruction("boom".into()))
        });
        assert!(matches!(result, Err(EnvelopeError::CodecConstruction(_))));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_codec_released_on_error_path() {
        let pool = CodecPool::new(&config(4)).unwrap();
        let result: Result<u64> = pool.decode(&[0xFF]);
        assert!(result.is_err());
        assert_eq!(pool.available(), 1);

        let snap = pool.metrics();
        assert_eq!(snap.decode_failures, 1);
        assert_eq!(snap.released, 1);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_idle_timeout_eviction() {
        let cfg = PoolConfig {
            idle_timeout: Duration::from_millis(10),
            ..config(4)
        };
        let pool = CodecPool::new(&cfg).unwrap();
        drop(pool.borrow().unwrap());
        assert_eq!(pool.available(), 1);

        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(pool.evict_idle(), 1);
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.metrics().evicted, 1);

        // Pool recreates on demand
        assert!(pool.borrow().is_ok());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_clear_and_clone_share_state() {
        let pool = CodecPool::new(&config(4)).unwrap();
        let other = pool.clone();
        drop(other.borrow().unwrap());
        assert_eq!(pool.available(), 1);

        assert_eq!(pool.clear(), 1);
        assert_eq!(other.available(), 0);
    }
}
