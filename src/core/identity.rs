//! # Content Identity
//!
//! Stable identity for serialized artifacts, so nodes can deduplicate and
//! compare large objects (trained models, snapshots) without shipping them.
//!
//! An identity is a pair:
//! - **fast hash**: XXH3-64 over the serialized bytes, used as the lookup key
//! - **verify hash**: hex SHA-256 over the artifact's readable form followed by
//!   the decimal fast hash, used to confirm a fast-hash match is not a collision
//!
//! A fast hash of `-1` ([`INVALID_FAST_HASH`]) means "identity not established"
//! and must never be used as a key. Derivation is explicit: owners call
//! [`ContentIdentity::refresh`] (or [`IdentifiedArtifact::refresh_identity`])
//! before publishing, and again after any mutation.

use crate::core::pool::CodecPool;
use crate::core::serialization::Codec;
use crate::error::{constants, EnvelopeError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, warn};

/// Fast hash sentinel meaning "identity invalid, do not trust"
pub const INVALID_FAST_HASH: i64 = -1;

/// Artifacts that can expose their serialized bytes and a readable projection
pub trait ContentAddressable {
    /// Serialized byte form the fast hash is computed over
    fn content_bytes(&self) -> Result<Vec<u8>>;

    /// Human-readable projection mixed into the verification hash
    fn readable_form(&self) -> String;
}

/// Fast hash of a byte span.
///
/// Never returns [`INVALID_FAST_HASH`]: a genuine XXH3 result of -1 is
/// remapped to -2.
pub fn fast_hash(bytes: &[u8]) -> i64 {
    let hash = twox_hash::xxh3::hash64(bytes) as i64;
    if hash == INVALID_FAST_HASH {
        INVALID_FAST_HASH - 1
    } else {
        hash
    }
}

/// Verification hash: hex SHA-256 of `readable || decimal(fast_hash)`
pub fn verify_hash(readable: &str, fast_hash: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(readable.as_bytes());
    hasher.update(fast_hash.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Identity pair derived from an artifact's serialized form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentIdentity {
    fast_hash: i64,
    verify_hash: String,
}

impl ContentIdentity {
    /// An identity that has never been derived
    pub fn unset() -> Self {
        Self {
            fast_hash: INVALID_FAST_HASH,
            verify_hash: String::new(),
        }
    }

    /// Derive an identity from serialized bytes and a readable projection.
    ///
    /// Pure: identical inputs always give identical identities.
    pub fn derive(serialized: &[u8], readable: &str) -> Self {
        let fast = fast_hash(serialized);
        Self {
            fast_hash: fast,
            verify_hash: verify_hash(readable, fast),
        }
    }

    /// Recompute this identity from `artifact`.
    ///
    /// On failure the fast hash becomes [`INVALID_FAST_HASH`], the verify hash
    /// keeps its previous value, and the error is returned.
    pub fn refresh<A: ContentAddressable + ?Sized>(&mut self, artifact: &A) -> Result<()> {
        match artifact.content_bytes() {
            Ok(bytes) => {
                *self = Self::derive(&bytes, &artifact.readable_form());
                debug!(fast_hash = self.fast_hash, len = bytes.len(), "Content identity derived");
                Ok(())
            }
            Err(e) => {
                self.invalidate();
                warn!(error = %e, "Content identity derivation failed");
                Err(match e {
                    EnvelopeError::IdentityDerivation(_) => e,
                    other => EnvelopeError::IdentityDerivation(other.to_string()),
                })
            }
        }
    }

    /// Mark the identity as not established, keeping the verify hash
    pub fn invalidate(&mut self) {
        self.fast_hash = INVALID_FAST_HASH;
    }

    pub fn fast_hash(&self) -> i64 {
        self.fast_hash
    }

    pub fn verify_hash(&self) -> &str {
        &self.verify_hash
    }

    /// Whether the fast hash may be used as a key
    pub fn is_established(&self) -> bool {
        self.fast_hash != INVALID_FAST_HASH
    }

    /// Fast hash as a cache key, or `None` while the identity is invalid
    pub fn cache_key(&self) -> Option<i64> {
        self.is_established().then_some(self.fast_hash)
    }

    /// Like [`cache_key`](Self::cache_key) but as an error for `?` chains
    pub fn require_key(&self) -> Result<i64> {
        self.cache_key().ok_or_else(|| {
            EnvelopeError::IdentityDerivation(constants::ERR_IDENTITY_NOT_ESTABLISHED.to_string())
        })
    }

    /// Two identities match when both are established and both hashes agree
    pub fn matches(&self, other: &ContentIdentity) -> bool {
        self.is_established()
            && other.is_established()
            && self.fast_hash == other.fast_hash
            && self.verify_hash == other.verify_hash
    }
}

impl Default for ContentIdentity {
    fn default() -> Self {
        Self::unset()
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_established() {
            write!(f, "{:016x}:{}", self.fast_hash, self.verify_hash)
        } else {
            f.write_str("<unestablished>")
        }
    }
}

/// An artifact paired with its content identity.
///
/// Bytes come from a pooled codec and the readable form from `Display`.
/// Mutable access invalidates the identity until it is refreshed.
#[derive(Debug, Clone)]
pub struct IdentifiedArtifact<A> {
    artifact: A,
    identity: ContentIdentity,
}

impl<A: Serialize + fmt::Display> IdentifiedArtifact<A> {
    /// Wrap an artifact; the identity starts unset
    pub fn new(artifact: A) -> Self {
        Self {
            artifact,
            identity: ContentIdentity::unset(),
        }
    }

    /// Derive the identity from the artifact's pooled encoding
    pub fn refresh_identity<C: Codec>(&mut self, pool: &CodecPool<C>) -> Result<&ContentIdentity> {
        let source = PooledSource {
            artifact: &self.artifact,
            pool,
        };
        self.identity.refresh(&source)?;
        Ok(&self.identity)
    }

    pub fn artifact(&self) -> &A {
        &self.artifact
    }

    /// Mutable access; the identity is invalidated and must be refreshed
    pub fn artifact_mut(&mut self) -> &mut A {
        self.identity.invalidate();
        &mut self.artifact
    }

    pub fn identity(&self) -> &ContentIdentity {
        &self.identity
    }

    pub fn into_inner(self) -> A {
        self.artifact
    }
}

struct PooledSource<'a, A, C: Codec> {
    artifact: &'a A,
    pool: &'a CodecPool<C>,
}

impl<A: Serialize + fmt::Display, C: Codec> ContentAddressable for PooledSource<'_, A, C> {
    fn content_bytes(&self) -> Result<Vec<u8>> {
        self.pool.encode(self.artifact)
    }

    fn readable_form(&self) -> String {
        self.artifact.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blob {
        bytes: Option<Vec<u8>>,
        label: &'static str,
    }

    impl ContentAddressable for Blob {
        fn content_bytes(&self) -> Result<Vec<u8>> {
            self.bytes
                .clone()
                .ok_or_else(|| EnvelopeError::Serialization("not serializable".into()))
        }

        fn readable_form(&self) -> String {
            self.label.to_string()
        }
    }

    #[test]
    fn test_derive_is_stable() {
        let a = ContentIdentity::derive(b"model-weights", "model v1");
        let b = ContentIdentity::derive(b"model-weights", "model v1");
        assert_eq!(a, b);
        assert!(a.is_established());
        assert_eq!(a.verify_hash().len(), 64);
    }

    #[test]
    fn test_one_byte_changes_fast_hash() {
        let a = ContentIdentity::derive(b"model-weights", "model");
        let b = ContentIdentity::derive(b"model-weighta", "model");
        assert_ne!(a.fast_hash(), b.fast_hash());
        assert_ne!(a.verify_hash(), b.verify_hash());
    }

    #[test]
    fn test_verify_hash_mixes_fast_hash() {
        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"label42");
            hex::encode(hasher.finalize())
        };
        assert_eq!(verify_hash("label", 42), expected);
    }

    #[test]
    fn test_unset_is_not_a_key() {
        let identity = ContentIdentity::unset();
        assert_eq!(identity.fast_hash(), INVALID_FAST_HASH);
        assert_eq!(identity.cache_key(), None);
        assert!(identity.require_key().is_err());
        assert!(!identity.matches(&ContentIdentity::unset()));
        assert_eq!(identity.to_string(), "<unestablished>");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_refresh_failure_sets_sentinel_keeps_verify_hash() {
        let mut identity = ContentIdentity::unset();
        let good = Blob {
            bytes: Some(vec![1, 2, 3]),
            label: "blob",
        };
        assert!(identity.refresh(&good).is_ok());
        let previous_verify = identity.verify_hash().to_string();

        let bad = Blob {
            bytes: None,
            label: "broken",
        };
        let err = identity.refresh(&bad).unwrap_err();
        assert!(matches!(err, EnvelopeError::IdentityDerivation(_)));
        assert_eq!(identity.fast_hash(), INVALID_FAST_HASH);
        assert_eq!(identity.verify_hash(), previous_verify);
        assert_eq!(identity.cache_key(), None);
    }

    #[test]
    fn test_matches_requires_both_hashes() {
        let a = ContentIdentity::derive(b"same", "left");
        let b = ContentIdentity::derive(b"same", "right");
        assert_eq!(a.fast_hash(), b.fast_hash());
        assert!(!a.matches(&b));
        assert!(a.matches(&a.clone()));
    }
}
