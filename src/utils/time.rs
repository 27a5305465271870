//! Clock and id helpers used when stamping envelopes.

use crate::error::{constants, EnvelopeError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamp value meaning "never stamped"
pub const UNSET_TIMESTAMP: i64 = -1;

/// Get the current wall-clock time in milliseconds since the Unix epoch
///
/// # Errors
/// Returns `EnvelopeError::Io` if the system time is earlier than UNIX_EPOCH
pub fn current_millis() -> Result<i64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .map_err(|_| {
            EnvelopeError::Io(std::io::Error::other(constants::ERR_SYSTEM_TIME))
        })
}

/// Generate a random 64-bit correlation id.
///
/// Zero is reserved for "no correlation" so it is never returned.
pub fn generate_correlation_id() -> i64 {
    loop {
        let id: i64 = rand::random();
        if id != 0 {
            return id;
        }
    }
}
