//! Identity-keyed Dedup Index
//!
//! TTL-bounded map from content identity to a stored value, for components that
//! keep one copy of each distinct artifact (for example, a model cache that
//! stores each trained model's wire bytes once).
//!
//! Lookups are keyed by fast hash and confirmed by verify hash, so a fast-hash
//! collision is reported as a miss instead of returning the wrong artifact.
//! Identities that are not established are refused outright.

use crate::core::identity::ContentIdentity;
use crate::error::{constants, EnvelopeError, Result};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
struct IndexEntry<V> {
    verify_hash: String,
    value: V,
    added_at: Instant,
}

/// TTL-based dedup index with FIFO eviction at capacity
#[derive(Debug)]
pub struct DedupIndex<V> {
    entries: HashMap<i64, IndexEntry<V>>,
    /// Insertion order for O(1) eviction of the oldest entry
    insertion_order: VecDeque<i64>,
    ttl: Duration,
    max_entries: usize,
}

impl<V> DedupIndex<V> {
    /// Create an index with default settings
    ///
    /// Default TTL: 1 hour
    /// Default max entries: 10,000
    pub fn new() -> Self {
        Self::with_settings(Duration::from_secs(3600), 10_000)
    }

    /// Create an index with custom settings
    ///
    /// A `max_entries` of 0 means the index is unbounded; entries then leave
    /// only by TTL expiry, `remove` or `clear`.
    pub fn with_settings(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            ttl,
            max_entries,
        }
    }

    /// Store `value` under `identity`.
    ///
    /// Returns `Ok(false)` if a matching identity is already present (the
    /// existing value is kept), `Ok(true)` if the value was stored.
    ///
    /// # Errors
    /// `IdentityDerivation` if the identity is not established, or if another
    /// artifact with the same fast hash but a different verify hash is stored.
    #[instrument(skip(self, identity, value), fields(fast_hash = identity.fast_hash()))]
    pub fn insert(&mut self, identity: &ContentIdentity, value: V) -> Result<bool> {
        let key = identity.cache_key().ok_or_else(|| {
            EnvelopeError::IdentityDerivation(constants::ERR_IDENTITY_NOT_ESTABLISHED.to_string())
        })?;

        self.cleanup_expired();

        if let Some(existing) = self.entries.get(&key) {
            if existing.verify_hash == identity.verify_hash() {
                debug!("Artifact already indexed");
                return Ok(false);
            }
            warn!("Fast hash collision with a different artifact");
            return Err(EnvelopeError::IdentityDerivation(format!(
                "fast hash {key} already bound to a different artifact"
            )));
        }

        if self.max_entries > 0 && self.entries.len() >= self.max_entries {
            let to_remove = self.entries.len() - self.max_entries + 1;
            self.remove_oldest_entries(to_remove);
        }

        self.entries.insert(
            key,
            IndexEntry {
                verify_hash: identity.verify_hash().to_string(),
                value,
                added_at: Instant::now(),
            },
        );
        self.insertion_order.push_back(key);
        Ok(true)
    }

    /// Look up the value stored for `identity`.
    ///
    /// Only returns a value when both hashes match an unexpired entry.
    pub fn lookup(&self, identity: &ContentIdentity) -> Option<&V> {
        let key = identity.cache_key()?;
        let entry = self.entries.get(&key)?;

        if entry.added_at.elapsed() >= self.ttl {
            return None;
        }
        if entry.verify_hash != identity.verify_hash() {
            warn!(fast_hash = key, "Fast hash matched but verify hash differs");
            return None;
        }
        Some(&entry.value)
    }

    /// Whether a matching artifact is indexed
    pub fn contains(&self, identity: &ContentIdentity) -> bool {
        self.lookup(identity).is_some()
    }

    /// Remove and return the value for `identity` if both hashes match an
    /// unexpired entry. An expired entry is dropped and reported as a miss.
    pub fn remove(&mut self, identity: &ContentIdentity) -> Option<V> {
        let key = identity.cache_key()?;
        let entry = self.entries.get(&key)?;
        let expired = entry.added_at.elapsed() >= self.ttl;
        if !expired && entry.verify_hash != identity.verify_hash() {
            return None;
        }

        self.insertion_order.retain(|k| *k != key);
        let removed = self.entries.remove(&key)?;
        (!expired).then_some(removed.value)
    }

    /// Remove expired entries from the index
    fn cleanup_expired(&mut self) {
        let initial_count = self.entries.len();
        let ttl = self.ttl;

        self.entries.retain(|_, entry| entry.added_at.elapsed() < ttl);

        let entries = &self.entries;
        self.insertion_order.retain(|key| entries.contains_key(key));

        let removed = initial_count - self.entries.len();
        if removed > 0 {
            debug!("Cleaned up {} expired dedup index entries", removed);
        }
    }

    #[inline]
    fn remove_oldest_entries(&mut self, count: usize) {
        for _ in 0..count {
            if let Some(key) = self.insertion_order.pop_front() {
                self.entries.remove(&key);
            }
        }

        debug!("Removed {} oldest dedup index entries due to size limit", count);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get current index statistics
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
            ttl_seconds: self.ttl.as_secs(),
        }
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
        debug!("Dedup index cleared");
    }
}

impl<V> Default for DedupIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the dedup index
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Current number of entries
    pub entries: usize,
    /// Maximum allowed entries
    pub max_entries: usize,
    /// TTL in seconds
    pub ttl_seconds: u64,
}
