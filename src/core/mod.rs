//! # Core Components
//!
//! Envelope, codec pool, serialization and content identity.
//!
//! ## Components
//! - **Serialization**: the `Codec` capability and the stock serde-backed codec
//! - **Pool**: thread-safe soft cache of reusable codecs
//! - **Envelope**: typed message container with a fixed binary wire layout
//! - **Frame**: tokio codec that frames envelopes over byte streams
//! - **Identity**: fast + verification hashes for serialized artifacts
//!
//! ## Wire Format
//! ```text
//! [CorrelationId(8)] [Timestamp(8)] [HeaderLen(4)] [Header(N)] [PayloadLen(4)] [Payload(M)]
//! ```
//!
//! ## Limits
//! - Maximum payload size: 16MB by default (`WireConfig`)
//! - Maximum header size: 64KB by default
//! - Length validation before allocation

pub mod envelope;
pub mod frame;
pub mod identity;
pub mod pool;
pub mod serialization;
