//! # Serialization Formats
//!
//! The codec capability the pool hands out. A [`Codec`] turns any serde value
//! into bytes and back; [`FormatCodec`] is the stock implementation and supports
//! bincode (default), JSON (debugging/interop) and MessagePack (compact encoding).
//!
//! ## Features
//! - **Stateful codecs**: each instance owns a scratch buffer that keeps its
//!   capacity between calls, which is what makes pooling worthwhile
//! - **Multiple formats**: selected once per pool through [`SerializationFormat`]
//! - **Config friendly**: formats parse from and serialize to lowercase names
//!
//! ## Performance Characteristics
//! - **Bincode**: ~100-200ns (fastest, binary)
//! - **MessagePack**: ~150-300ns (compact, binary)
//! - **JSON**: ~500-1000ns (human-readable, text)
//!
//! ## Usage
//! ```rust
//! use cluster_envelope::core::serialization::{Codec, FormatCodec, SerializationFormat};
//!
//! let mut codec = FormatCodec::new(SerializationFormat::Bincode);
//! let bytes = codec.encode("hello").unwrap();
//! let back: String = codec.decode(&bytes).unwrap();
//! assert_eq!(back, "hello");
//! ```

use crate::error::{EnvelopeError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Initial capacity of a fresh codec scratch buffer
const DEFAULT_SCRATCH_CAPACITY: usize = 1024;

/// Scratch buffers that grew past this are shrunk back after use
const MAX_RETAINED_SCRATCH: usize = 64 * 1024;

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    #[serde(rename = "msgpack")]
    MessagePack,
}

impl SerializationFormat {
    /// Get the format identifier byte
    pub fn format_byte(self) -> u8 {
        match self {
            SerializationFormat::Bincode => 0x01,
            SerializationFormat::Json => 0x02,
            SerializationFormat::MessagePack => 0x03,
        }
    }

    /// Detect format from identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SerializationFormat::Bincode),
            0x02 => Some(SerializationFormat::Json),
            0x03 => Some(SerializationFormat::MessagePack),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SerializationFormat {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bincode" => Ok(SerializationFormat::Bincode),
            "json" => Ok(SerializationFormat::Json),
            "msgpack" | "messagepack" => Ok(SerializationFormat::MessagePack),
            other => Err(EnvelopeError::ConfigError(format!(
                "Unknown serialization format: '{other}'"
            ))),
        }
    }
}

/// A reusable serializer/deserializer instance.
///
/// Implementations may keep internal state between calls; the pool guarantees
/// that a codec is only ever driven by one caller at a time, hence `&mut self`.
pub trait Codec: Send {
    /// Format this codec writes
    fn format(&self) -> SerializationFormat;

    /// Serialize `value` into a freshly owned byte buffer
    fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value of type `T` from `bytes`
    fn decode<T: DeserializeOwned>(&mut self, bytes: &[u8]) -> Result<T>;
}

/// Default pooled codec backed by serde
#[derive(Debug)]
pub struct FormatCodec {
    format: SerializationFormat,
    scratch: Vec<u8>,
}

impl FormatCodec {
    /// Create a codec for the given format
    pub fn new(format: SerializationFormat) -> Self {
        Self {
            format,
            scratch: Vec::with_capacity(DEFAULT_SCRATCH_CAPACITY),
        }
    }

    /// Current capacity of the scratch buffer
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    fn write_scratch<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        match self.format {
            SerializationFormat::Bincode => bincode::serialize_into(&mut self.scratch, value)
                .map_err(|e| EnvelopeError::Serialization(e.to_string())),
            SerializationFormat::Json => serde_json::to_writer(&mut self.scratch, value)
                .map_err(|e| EnvelopeError::Serialization(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::encode::write(&mut self.scratch, value)
                .map_err(|e| EnvelopeError::Serialization(e.to_string())),
        }
    }
}

impl Default for FormatCodec {
    fn default() -> Self {
        Self::new(SerializationFormat::default())
    }
}

impl Codec for FormatCodec {
    fn format(&self) -> SerializationFormat {
        self.format
    }

    fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<Vec<u8>> {
        self.scratch.clear();
        let written = self.write_scratch(value);
        let out = written.map(|()| self.scratch.to_vec());

        // Keep the capacity for the next caller, but not an outlier
        self.scratch.clear();
        if self.scratch.capacity() > MAX_RETAINED_SCRATCH {
            self.scratch.shrink_to(DEFAULT_SCRATCH_CAPACITY);
        }
        out
    }

    fn decode<T: DeserializeOwned>(&mut self, bytes: &[u8]) -> Result<T> {
        match self.format {
            SerializationFormat::Bincode => bincode::deserialize(bytes)
                .map_err(|e| EnvelopeError::Deserialization(e.to_string())),
            SerializationFormat::Json => serde_json::from_slice(bytes)
                .map_err(|e| EnvelopeError::Deserialization(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::from_slice(bytes)
                .map_err(|e| EnvelopeError::Deserialization(e.to_string())),
        }
    }
}
