//! # Error Types
//!
//! Error handling for envelopes, the codec pool, and content identity.
//!
//! Every fallible operation in the crate returns [`Result`], which carries an
//! [`EnvelopeError`]. Nothing is retried internally; callers decide whether a
//! failure is worth another attempt.
//!
//! ## Error Categories
//! - **Codec errors**: construction, serialization and deserialization failures
//! - **Wire errors**: truncated input, bad lengths, oversized fields, invalid UTF-8
//! - **Identity errors**: an artifact could not be hashed
//! - **Configuration errors**: unreadable or invalid settings
//!
//! ## Example Usage
//! ```rust
//! use cluster_envelope::error::{EnvelopeError, Result};
//! use tracing::{error, info};
//!
//! fn header_len(raw: &[u8]) -> Result<usize> {
//!     let text = std::str::from_utf8(raw)
//!         .map_err(|e| EnvelopeError::InvalidHeader(e.to_string()))?;
//!     Ok(text.len())
//! }
//!
//! match header_len(b"greeting") {
//!     Ok(len) => info!(len, "Header decoded"),
//!     Err(e) => error!(error = %e, "Header rejected"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Pool errors
    pub const ERR_POOL_LOCK: &str = "Failed to acquire codec pool lock";
    pub const ERR_FACTORY_FAILED: &str = "Codec factory failed";

    /// Envelope errors
    pub const ERR_EMPTY_ENVELOPE: &str = "Envelope carries no payload";
    pub const ERR_PAYLOAD_TOO_LARGE: &str = "Payload exceeds i32 length prefix";

    /// Identity errors
    pub const ERR_IDENTITY_NOT_ESTABLISHED: &str = "Content identity not established";

    /// Clock errors
    pub const ERR_SYSTEM_TIME: &str = "System time error: time went backwards";
}

/// Primary error type for all envelope, pool and identity operations
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The pool factory could not build a codec
    #[error("Codec construction failed: {0}")]
    CodecConstruction(String),

    /// A value could not be encoded by the borrowed codec
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Payload bytes did not decode to the requested type
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// Hashing or byte extraction for a content identity failed
    #[error("Identity derivation failed: {0}")]
    IdentityDerivation(String),

    #[error("Truncated envelope: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Payload too large: {0} bytes")]
    OversizedPayload(usize),

    #[error("Header too large: {0} bytes")]
    OversizedHeader(usize),

    #[error("Invalid payload length: {0}")]
    InvalidLength(i32),

    #[error("Invalid header text: {0}")]
    InvalidHeader(String),

    #[error("Envelope carries no payload")]
    MissingPayload,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using EnvelopeError
pub type Result<T> = std::result::Result<T, EnvelopeError>;
