//! # Checksum Validation
//!
//! A checksum algorithm is a pure function over a byte span yielding a
//! fixed-width check value. The concrete algorithm (a CRC variant, an
//! additive sum, an XOR fold) is protocol-supplied; the framework owns only
//! the decision of when to validate and the uniform failure mode: a mismatch
//! always raises `ParseError::ChecksumMismatch` carrying the expected and
//! actual values, regardless of which protocol or frame kind triggered it.

use crate::error::ParseError;

/// A pure, reentrant checksum over a byte span.
///
/// `width` is the number of trailing bytes the check value occupies on the
/// wire; `compute` yields the value zero-extended into a `u32` so algorithms
/// up to 32 bits wide share one contract.
pub trait ChecksumAlgorithm: Send + Sync {
    /// Trailing check value width in bytes (at most 4).
    fn width(&self) -> usize;

    fn compute(&self, span: &[u8]) -> u32;
}

/// CRC-CCITT as specified in IEEE C37.118.2-2011 Appendix B: 0xFFFF seed,
/// 0x1021 polynomial, no final XOR.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrcCcitt;

impl ChecksumAlgorithm for CrcCcitt {
    fn width(&self) -> usize {
        2
    }

    fn compute(&self, span: &[u8]) -> u32 {
        let mut crc: u16 = 0xFFFF;
        for &byte in span {
            crc ^= (byte as u16) << 8;
            for _ in 0..8 {
                if crc & 0x8000 != 0 {
                    crc = (crc << 1) ^ 0x1021;
                } else {
                    crc <<= 1;
                }
            }
        }
        crc as u32
    }
}

/// A 16-bit modular additive sum, as used by simpler vendor protocols.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdditiveSum16;

impl ChecksumAlgorithm for AdditiveSum16 {
    fn width(&self) -> usize {
        2
    }

    fn compute(&self, span: &[u8]) -> u32 {
        span.iter()
            .fold(0u16, |sum, &byte| sum.wrapping_add(byte as u16)) as u32
    }
}

/// Recomputes the check value over `frame[..len - width]` and compares it to
/// the trailing bytes, interpreted big-endian.
///
/// Fails with `InsufficientData` when the span cannot even hold the check
/// value, and with `ChecksumMismatch` (carrying expected and actual values)
/// when validation fails. A mismatch is never auto-corrected.
pub fn validate_trailing(
    algorithm: &dyn ChecksumAlgorithm,
    frame: &[u8],
) -> Result<(), ParseError> {
    let width = algorithm.width();
    if frame.len() < width {
        return Err(ParseError::insufficient(width, frame.len()));
    }

    let body = &frame[..frame.len() - width];
    let actual = algorithm.compute(body);
    let expected = frame[frame.len() - width..]
        .iter()
        .fold(0u32, |value, &byte| (value << 8) | byte as u32);

    if expected != actual {
        return Err(ParseError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// Computes the check value over `body` and appends its big-endian image.
pub fn append_trailing(algorithm: &dyn ChecksumAlgorithm, body: &mut Vec<u8>) {
    let value = algorithm.compute(body);
    let width = algorithm.width();
    for shift in (0..width).rev() {
        body.push((value >> (shift * 8)) as u8);
    }
}
