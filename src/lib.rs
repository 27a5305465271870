//! # Cluster Envelope
//!
//! Generic message envelope for distributed systems, with pooled codec reuse
//! and content-addressed identity for serialized artifacts.
//!
//! ## Overview
//! - [`Envelope<T>`](core::envelope::Envelope) carries a correlation id, a
//!   generation timestamp, a free-form header and the serialized form of a `T`
//! - [`CodecPool`](core::pool::CodecPool) lends reusable codecs so envelopes
//!   never build a serializer per message
//! - [`ContentIdentity`](core::identity::ContentIdentity) derives a fast hash
//!   and a verification hash from an artifact's serialized bytes
//!
//! Transport, retries and node addressing are left to the caller; the
//! [`EnvelopeCodec`](core::frame::EnvelopeCodec) plugs envelopes into any
//! tokio-util framed stream.
//!
//! ## Quick Start
//! ```rust
//! use cluster_envelope::{CodecPool, Envelope, EnvelopeConfig};
//!
//! let config = EnvelopeConfig::default();
//! let pool = CodecPool::new(&config.pool).unwrap();
//!
//! let outgoing = Envelope::new_with_payload(&pool, &vec![1u32, 2, 3]).unwrap();
//! let wire = outgoing.to_wire_bytes().unwrap();
//!
//! let incoming: Envelope<Vec<u32>> = Envelope::from_wire_bytes(&wire).unwrap();
//! assert_eq!(incoming.correlation_id(), outgoing.correlation_id());
//! assert_eq!(incoming.get_payload(&pool).unwrap(), vec![1, 2, 3]);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod utils;

pub use crate::config::EnvelopeConfig;
pub use crate::core::envelope::Envelope;
pub use crate::core::frame::EnvelopeCodec;
pub use crate::core::identity::{ContentAddressable, ContentIdentity, IdentifiedArtifact};
pub use crate::core::pool::{CodecPool, PooledCodec};
pub use crate::core::serialization::{Codec, FormatCodec, SerializationFormat};
pub use crate::error::{EnvelopeError, Result};
