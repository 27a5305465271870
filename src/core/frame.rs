//! # Envelope Stream Framing
//!
//! Tokio codec that cuts a byte stream into envelopes. The envelope layout is
//! self-delimiting, so no extra length prefix is added: a frame is exactly the
//! bytes `Envelope::write_wire` produces.
//!
//! The decoder only yields once a whole envelope is buffered and leaves partial
//! input untouched. Length prefixes are checked against [`WireConfig`] before
//! any space is reserved for them.

use crate::config::WireConfig;
use crate::core::envelope::{frame_len, Envelope, FIXED_WIRE_LEN};
use crate::error::EnvelopeError;
use bytes::BytesMut;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Frames `Envelope<T>` values over an async byte stream
#[derive(Debug)]
pub struct EnvelopeCodec<T> {
    config: WireConfig,
    _payload_type: PhantomData<fn() -> T>,
}

impl<T> EnvelopeCodec<T> {
    /// Create a codec with default wire limits
    pub fn new() -> Self {
        Self::with_config(WireConfig::default())
    }

    /// Create a codec with explicit wire limits
    pub fn with_config(config: WireConfig) -> Self {
        Self {
            config,
            _payload_type: PhantomData,
        }
    }
}

impl<T> Default for EnvelopeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Decoder for EnvelopeCodec<T> {
    type Item = Envelope<T>;
    type Error = EnvelopeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let total = match frame_len(&src[..], &self.config) {
            Ok(Some(total)) => total,
            Ok(None) => {
                src.reserve(FIXED_WIRE_LEN.saturating_sub(src.len()));
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, buffered = src.len(), "Rejected envelope frame");
                return Err(e);
            }
        };

        let mut frame = src.split_to(total).freeze();
        Envelope::read_wire_with(&mut frame, &self.config).map(Some)
    }
}

impl<T> Encoder<Envelope<T>> for EnvelopeCodec<T> {
    type Error = EnvelopeError;

    fn encode(&mut self, item: Envelope<T>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.encoded_len());
        item.write_wire_with(dst, &self.config)
    }
}

impl<T> Encoder<&Envelope<T>> for EnvelopeCodec<T> {
    type Error = EnvelopeError;

    fn encode(&mut self, item: &Envelope<T>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.encoded_len());
        item.write_wire_with(dst, &self.config)
    }
}
