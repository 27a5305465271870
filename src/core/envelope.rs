//! # Binary Envelope
//!
//! Generic message container carrying routing metadata and a serialized payload.
//!
//! The typed value is serialized as soon as it enters the envelope and only the
//! bytes are kept. [`Envelope::get_payload`] decodes those bytes again on every
//! call; nothing is cached, so callers that need the value several times should
//! hold on to the decoded copy themselves.
//!
//! ## Wire Format
//! All integers are big-endian.
//! ```text
//! [CorrelationId(i64)] [Timestamp(i64)] [HeaderLen(u32)] [Header(UTF-8)] [PayloadLen(i32)] [Payload(N)]
//! ```
//! A payload length of `-1` means "no payload". The wire carries no type tag:
//! the receiver must know which `T` to decode, and a mismatch only surfaces as
//! a deserialization error from [`Envelope::get_payload`].
//!
//! ## Usage
//! ```rust
//! use cluster_envelope::config::PoolConfig;
//! use cluster_envelope::core::envelope::Envelope;
//! use cluster_envelope::core::pool::CodecPool;
//!
//! let pool = CodecPool::new(&PoolConfig::default()).unwrap();
//! let envelope = Envelope::new_with_payload(&pool, &"hello".to_string())
//!     .unwrap()
//!     .with_header("greeting");
//!
//! let wire = envelope.to_wire_bytes().unwrap();
//! let received: Envelope<String> = Envelope::from_wire_bytes(&wire).unwrap();
//! assert_eq!(received.header(), "greeting");
//! assert_eq!(received.get_payload(&pool).unwrap(), "hello");
//! ```

use crate::config::WireConfig;
use crate::core::pool::CodecPool;
use crate::core::serialization::Codec;
use crate::error::{constants, EnvelopeError, Result};
use crate::utils::time::{current_millis, generate_correlation_id, UNSET_TIMESTAMP};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use tracing::trace;

/// Correlation id of an envelope that was never assigned one
pub const UNSET_CORRELATION_ID: i64 = 0;

/// Payload length marker for "no payload"
const ABSENT_PAYLOAD_LEN: i32 = -1;

/// correlation id + timestamp + header length + payload length
pub const FIXED_WIRE_LEN: usize = 8 + 8 + 4 + 4;

/// Message envelope around a serialized value of type `T`
pub struct Envelope<T> {
    correlation_id: i64,
    generation_timestamp: i64,
    header: String,
    payload: Option<Bytes>,
    _payload_type: PhantomData<fn() -> T>,
}

impl<T> Envelope<T> {
    /// Create an envelope with every field at its default: timestamp -1,
    /// correlation id 0, empty header, no payload.
    pub fn new_empty() -> Self {
        Self {
            correlation_id: UNSET_CORRELATION_ID,
            generation_timestamp: UNSET_TIMESTAMP,
            header: String::new(),
            payload: None,
            _payload_type: PhantomData,
        }
    }

    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    pub fn set_correlation_id(&mut self, correlation_id: i64) {
        self.correlation_id = correlation_id;
    }

    /// Milliseconds since the Unix epoch, or -1 if never stamped
    pub fn generation_timestamp(&self) -> i64 {
        self.generation_timestamp
    }

    pub fn set_generation_timestamp(&mut self, timestamp: i64) {
        self.generation_timestamp = timestamp;
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn set_header(&mut self, header: impl Into<String>) {
        self.header = header.into();
    }

    /// Builder-style header setter
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Builder-style correlation id setter
    pub fn with_correlation_id(mut self, correlation_id: i64) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Raw serialized payload, if any
    pub fn payload_bytes(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Replace the serialized payload without going through a codec.
    ///
    /// The bytes are not checked against `T`.
    pub fn set_payload_bytes(&mut self, bytes: impl Into<Bytes>) {
        self.payload = Some(bytes.into());
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Number of bytes `write_wire` will produce
    pub fn encoded_len(&self) -> usize {
        FIXED_WIRE_LEN + self.header.len() + self.payload.as_ref().map_or(0, Bytes::len)
    }

    /// Decode the payload as some other type `U`.
    ///
    /// A failed [`get_payload`](Self::get_payload) leaves the bytes intact, so
    /// the caller can retry with a different expectation here.
    pub fn get_payload_as<U, C>(&self, pool: &CodecPool<C>) -> Result<U>
    where
        U: DeserializeOwned,
        C: Codec,
    {
        let bytes = self.payload.as_ref().ok_or(EnvelopeError::MissingPayload)?;
        pool.decode(bytes)
    }

    /// Write the envelope using the default wire limits
    pub fn write_wire<B: BufMut>(&self, dst: &mut B) -> Result<()> {
        self.write_wire_with(dst, &WireConfig::default())
    }

    /// Write the envelope in wire order: correlation id, timestamp, header, payload.
    ///
    /// Limits and the space left in `dst` are checked before anything is
    /// written, so `dst` is untouched on error.
    ///
    /// # Errors
    /// - `OversizedHeader` / `OversizedPayload` if a limit is exceeded
    /// - `Truncated` if `dst` cannot hold the whole envelope
    pub fn write_wire_with<B: BufMut>(&self, dst: &mut B, config: &WireConfig) -> Result<()> {
        if self.header.len() > config.max_header_len || self.header.len() > u32::MAX as usize {
            return Err(EnvelopeError::OversizedHeader(self.header.len()));
        }

        let payload_len = match &self.payload {
            Some(bytes) => {
                if bytes.len() > config.max_payload_size {
                    return Err(EnvelopeError::OversizedPayload(bytes.len()));
                }
                i32::try_from(bytes.len()).map_err(|_| {
                    EnvelopeError::Serialization(constants::ERR_PAYLOAD_TOO_LARGE.to_string())
                })?
            }
            None => ABSENT_PAYLOAD_LEN,
        };

        let needed = self.encoded_len();
        if dst.remaining_mut() < needed {
            return Err(EnvelopeError::Truncated {
                needed,
                available: dst.remaining_mut(),
            });
        }

        dst.put_i64(self.correlation_id);
        dst.put_i64(self.generation_timestamp);
        dst.put_u32(self.header.len() as u32);
        dst.put_slice(self.header.as_bytes());
        dst.put_i32(payload_len);
        if let Some(bytes) = &self.payload {
            dst.put_slice(bytes);
        }
        Ok(())
    }

    /// Serialize the envelope to a standalone byte buffer
    pub fn to_wire_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_wire(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Read an envelope using the default wire limits
    pub fn read_wire<B: Buf>(src: &mut B) -> Result<Self> {
        Self::read_wire_with(src, &WireConfig::default())
    }

    /// Read the four wire fields into a new envelope
    pub fn read_wire_with<B: Buf>(src: &mut B, config: &WireConfig) -> Result<Self> {
        let mut envelope = Self::new_empty();
        envelope.read_wire_into_with(src, config)?;
        Ok(envelope)
    }

    /// Overwrite this envelope with one read from `src` (default limits)
    pub fn read_wire_into<B: Buf>(&mut self, src: &mut B) -> Result<()> {
        self.read_wire_into_with(src, &WireConfig::default())
    }

    /// Overwrite this envelope with one read from `src`.
    ///
    /// On error the envelope keeps its previous contents; `src` may have been
    /// partially consumed.
    pub fn read_wire_into_with<B: Buf>(&mut self, src: &mut B, config: &WireConfig) -> Result<()> {
        ensure_remaining(src, 16)?;
        let correlation_id = src.get_i64();
        let generation_timestamp = src.get_i64();

        ensure_remaining(src, 4)?;
        let header_len = src.get_u32() as usize;
        if header_len > config.max_header_len {
            return Err(EnvelopeError::OversizedHeader(header_len));
        }
        ensure_remaining(src, header_len)?;
        let raw_header = src.copy_to_bytes(header_len);
        let header = std::str::from_utf8(&raw_header)
            .map_err(|e| EnvelopeError::InvalidHeader(e.to_string()))?
            .to_owned();

        ensure_remaining(src, 4)?;
        let payload = match src.get_i32() {
            ABSENT_PAYLOAD_LEN => None,
            len if len < 0 => return Err(EnvelopeError::InvalidLength(len)),
            len => {
                let len = len as usize;
                if len > config.max_payload_size {
                    return Err(EnvelopeError::OversizedPayload(len));
                }
                ensure_remaining(src, len)?;
                Some(src.copy_to_bytes(len))
            }
        };

        trace!(
            correlation_id,
            header_len,
            payload_len = payload.as_ref().map_or(0, Bytes::len),
            "Envelope read from wire"
        );

        self.correlation_id = correlation_id;
        self.generation_timestamp = generation_timestamp;
        self.header = header;
        self.payload = payload;
        Ok(())
    }

    /// Parse an envelope from a complete byte slice
    pub fn from_wire_bytes(mut bytes: &[u8]) -> Result<Self> {
        Self::read_wire(&mut bytes)
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serialize `value` with a pooled codec, stamp the current time and a
    /// random correlation id.
    ///
    /// # Errors
    /// Returns the codec's `Serialization` error (or `CodecConstruction` if
    /// no codec could be borrowed); no envelope is produced in that case.
    pub fn new_with_payload<C: Codec>(pool: &CodecPool<C>, value: &T) -> Result<Self> {
        let bytes = pool.encode(value)?;
        Ok(Self {
            correlation_id: generate_correlation_id(),
            generation_timestamp: current_millis()?,
            header: String::new(),
            payload: Some(Bytes::from(bytes)),
            _payload_type: PhantomData,
        })
    }

    /// Re-serialize the payload. Metadata is left as is, and on error the
    /// previous payload bytes are kept.
    pub fn set_payload<C: Codec>(&mut self, pool: &CodecPool<C>, value: &T) -> Result<()> {
        let bytes = pool.encode(value)?;
        self.payload = Some(Bytes::from(bytes));
        Ok(())
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decode the payload with a pooled codec. Every call decodes afresh.
    ///
    /// # Errors
    /// - `MissingPayload` if the envelope carries no bytes
    /// - `Deserialization` if the bytes are not a `T`; the bytes stay intact
    pub fn get_payload<C: Codec>(&self, pool: &CodecPool<C>) -> Result<T> {
        self.get_payload_as(pool)
    }
}

fn ensure_remaining<B: Buf>(src: &B, needed: usize) -> Result<()> {
    let available = src.remaining();
    if available < needed {
        return Err(EnvelopeError::Truncated { needed, available });
    }
    Ok(())
}

/// Length of the complete envelope at the front of `buf`, or `None` if more
/// bytes are needed to tell (or to finish it).
///
/// Applies the same limits as [`Envelope::read_wire_with`] so a hostile length
/// prefix is rejected before anything is buffered for it.
pub fn frame_len(buf: &[u8], config: &WireConfig) -> Result<Option<usize>> {
    let header_len_at = 16;
    if buf.len() < header_len_at + 4 {
        return Ok(None);
    }
    let mut cursor = &buf[header_len_at..];
    let header_len = cursor.get_u32() as usize;
    if header_len > config.max_header_len {
        return Err(EnvelopeError::OversizedHeader(header_len));
    }

    let payload_len_at = header_len_at + 4 + header_len;
    if buf.len() < payload_len_at + 4 {
        return Ok(None);
    }
    let mut cursor = &buf[payload_len_at..];
    let payload_len = match cursor.get_i32() {
        ABSENT_PAYLOAD_LEN => 0,
        len if len < 0 => return Err(EnvelopeError::InvalidLength(len)),
        len => {
            let len = len as usize;
            if len > config.max_payload_size {
                return Err(EnvelopeError::OversizedPayload(len));
            }
            len
        }
    };

    let total = payload_len_at + 4 + payload_len;
    Ok((buf.len() >= total).then_some(total))
}

impl<T> Default for Envelope<T> {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl<T> Clone for Envelope<T> {
    fn clone(&self) -> Self {
        Self {
            correlation_id: self.correlation_id,
            generation_timestamp: self.generation_timestamp,
            header: self.header.clone(),
            payload: self.payload.clone(),
            _payload_type: PhantomData,
        }
    }
}

impl<T> PartialEq for Envelope<T> {
    fn eq(&self, other: &Self) -> bool {
        self.correlation_id == other.correlation_id
            && self.generation_timestamp == other.generation_timestamp
            && self.header == other.header
            && self.payload == other.payload
    }
}

impl<T> Eq for Envelope<T> {}

impl<T> fmt::Debug for Envelope<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("payload_type", &std::any::type_name::<T>())
            .field("correlation_id", &self.correlation_id)
            .field("generation_timestamp", &self.generation_timestamp)
            .field("header", &self.header)
            .field("payload_len", &self.payload.as_ref().map(Bytes::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::core::pool::CodecPool;

    #[allow(clippy::unwrap_used)]
    fn pool() -> CodecPool {
        CodecPool::new(&PoolConfig::default()).unwrap()
    }

    #[test]
    fn test_new_empty_defaults() {
        let envelope: Envelope<String> = Envelope::new_empty();
        assert_eq!(envelope.correlation_id(), 0);
        assert_eq!(envelope.generation_timestamp(), -1);
        assert_eq!(envelope.header(), "");
        assert!(!envelope.has_payload());
        assert_eq!(envelope.encoded_len(), FIXED_WIRE_LEN);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_new_with_payload_stamps_metadata() {
        let pool = pool();
        let before = current_millis().unwrap();
        let envelope = Envelope::new_with_payload(&pool, &12345u64).unwrap();

        assert!(envelope.generation_timestamp() >= before);
        assert_ne!(envelope.correlation_id(), 0);
        assert!(envelope.payload_bytes().is_some_and(|b| !b.is_empty()));
        assert_eq!(envelope.get_payload(&pool).unwrap(), 12345);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_set_payload_keeps_metadata() {
        let pool = pool();
        let mut envelope = Envelope::new_with_payload(&pool, &"first".to_string())
            .unwrap()
            .with_header("h");
        let id = envelope.correlation_id();
        let ts = envelope.generation_timestamp();

        envelope.set_payload(&pool, &"second".to_string()).unwrap();
        assert_eq!(envelope.correlation_id(), id);
        assert_eq!(envelope.generation_timestamp(), ts);
        assert_eq!(envelope.header(), "h");
        assert_eq!(envelope.get_payload(&pool).unwrap(), "second");
    }

    #[test]
    fn test_get_payload_on_empty_envelope() {
        let pool = pool();
        let envelope: Envelope<u32> = Envelope::new_empty();
        assert!(matches!(
            envelope.get_payload(&pool),
            Err(EnvelopeError::MissingPayload)
        ));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_wire_layout_is_big_endian() {
        let mut envelope: Envelope<()> = Envelope::new_empty().with_header("ab");
        envelope.set_correlation_id(0x0102_0304_0506_0708);
        envelope.set_generation_timestamp(1);
        envelope.set_payload_bytes(vec![0xAA, 0xBB]);

        let wire = envelope.to_wire_bytes().unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&0x0102_0304_0506_0708i64.to_be_bytes());
        expected.extend_from_slice(&1i64.to_be_bytes());
        expected.extend_from_slice(&[0, 0, 0, 2]);
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&[0, 0, 0, 2]);
        expected.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(wire.as_ref(), expected.as_slice());
        assert_eq!(wire.len(), envelope.encoded_len());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_absent_payload_roundtrip() {
        let envelope: Envelope<u8> = Envelope::new_empty().with_correlation_id(9);
        let wire = envelope.to_wire_bytes().unwrap();
        assert_eq!(&wire[wire.len() - 4..], &(-1i32).to_be_bytes());

        let back: Envelope<u8> = Envelope::from_wire_bytes(&wire).unwrap();
        assert_eq!(back, envelope);
        assert!(!back.has_payload());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_read_wire_into_reuses_shell() {
        let pool = pool();
        let sent = Envelope::new_with_payload(&pool, &7i32).unwrap();
        let wire = sent.to_wire_bytes().unwrap();

        let mut shell: Envelope<i32> = Envelope::new_empty().with_header("stale");
        shell.read_wire_into(&mut wire.clone()).unwrap();
        assert_eq!(shell, sent);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_failed_read_leaves_shell_untouched() {
        let mut shell: Envelope<i32> = Envelope::new_empty().with_header("keep");
        let mut truncated = &[0u8; 10][..];
        let err = shell.read_wire_into(&mut truncated).unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::Truncated {
                needed: 16,
                available: 10
            }
        ));
        assert_eq!(shell.header(), "keep");
    }

    #[test]
    fn test_write_rejects_oversized_header() {
        let envelope: Envelope<()> = Envelope::new_empty().with_header("x".repeat(32));
        let config = WireConfig {
            max_header_len: 16,
            ..WireConfig::default()
        };
        let mut buf = BytesMut::new();
        assert!(matches!(
            envelope.write_wire_with(&mut buf, &config),
            Err(EnvelopeError::OversizedHeader(32))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_frame_len() {
        let mut envelope: Envelope<()> = Envelope::new_empty().with_header("abc");
        envelope.set_payload_bytes(vec![1, 2, 3, 4]);
        let wire = envelope.to_wire_bytes().unwrap();
        let config = WireConfig::default();

        assert_eq!(frame_len(&wire, &config).unwrap(), Some(wire.len()));
        assert_eq!(frame_len(&wire[..19], &config).unwrap(), None);
        assert_eq!(frame_len(&wire[..wire.len() - 1], &config).unwrap(), None);
    }

    #[test]
    fn test_write_into_short_slice_is_an_error() {
        let envelope: Envelope<()> = Envelope::new_empty().with_header("greeting");
        let mut storage = [0u8; 10];

        let result = envelope.write_wire(&mut &mut storage[..]);
        match result {
            Err(EnvelopeError::Truncated { needed, available }) => {
                assert_eq!(needed, envelope.encoded_len());
                assert_eq!(available, 10);
            }
            other => panic!("Unexpected result: {other:?}"),
        }
        assert_eq!(storage, [0u8; 10]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_write_into_exact_slice() {
        let mut envelope: Envelope<()> = Envelope::new_empty().with_header("hdr");
        envelope.set_payload_bytes(vec![1, 2, 3]);
        let mut storage = vec![0u8; envelope.encoded_len()];

        envelope.write_wire(&mut &mut storage[..]).unwrap();
        assert_eq!(storage, envelope.to_wire_bytes().unwrap().to_vec());
    }

    #[test]
    fn test_debug_shows_type_not_bytes() {
        let envelope: Envelope<String> = Envelope::new_empty().with_header("dbg");
        let rendered = format!("{envelope:?}");
        assert!(rendered.contains("alloc::string::String"));
        assert!(rendered.contains("dbg"));
    }
}
