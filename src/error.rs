//! # Frame Decode Error Taxonomy
//!
//! This module defines the error kinds produced while decoding and encoding
//! synchrophasor frames. Every failure is reported synchronously to the caller
//! and is fatal to the decode attempt in progress: corrupted or truncated
//! input is a data-integrity fact, not a transient condition, so no error is
//! retried internally and none is ever swallowed. Retry policy (for example
//! re-requesting a frame) belongs to the transport layer.

use thiserror::Error;

/// Errors that can occur while decoding or constructing a frame.
///
/// # Variants
///
/// * `InsufficientData`: the buffer is shorter than a statically required
///   minimum. No partial result is returned.
/// * `LengthMismatch`: the header-declared length and the byte count actually
///   consumed disagree while `trust_header_length` is disabled.
/// * `ChecksumMismatch`: the trailing check value does not match the value
///   recomputed over the frame's bytes. Carries both values; never
///   auto-corrected.
/// * `InvalidFieldValue`: a specialization rejected an out-of-domain
///   assignment (for example a non-zero offset on a digital definition).
///   Raised at the point of assignment, not deferred.
/// * `InvalidFrameType`: the SYNC field carries an unknown or unexpected
///   frame type.
/// * `UnknownVersion`: the SYNC field carries an unrecognized version.
/// * `InvalidFormat`: a field's encoded value does not conform to the
///   protocol layout.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("insufficient data: required {required} bytes, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("length mismatch: header declared {declared} bytes, decode consumed {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("checksum mismatch: expected {expected:#06X}, computed {actual:#06X}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("invalid value for {field}: {reason}")]
    InvalidFieldValue { field: &'static str, reason: String },

    #[error("invalid frame type: {message}")]
    InvalidFrameType { message: String },

    #[error("unknown version: {message}")]
    UnknownVersion { message: String },

    #[error("invalid format: {message}")]
    InvalidFormat { message: String },
}

impl ParseError {
    /// Builds an `InsufficientData` error from a requested byte count and the
    /// bytes actually remaining.
    pub fn insufficient(required: usize, available: usize) -> Self {
        ParseError::InsufficientData {
            required,
            available,
        }
    }

    /// Builds an `InvalidFieldValue` error for a named field.
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        ParseError::InvalidFieldValue {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParseError::ChecksumMismatch {
            expected: 0xABCD,
            actual: 0x1234,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch: expected 0xABCD, computed 0x1234"
        );

        let err = ParseError::insufficient(14, 3);
        assert_eq!(
            err.to_string(),
            "insufficient data: required 14 bytes, 3 available"
        );
    }
}
