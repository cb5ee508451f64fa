//! # Frames
//!
//! Frame-level vocabulary shared by every protocol: the closed set of frame
//! kinds, the fractional-second time tag, the `Frame` capability, and the
//! generic body-decode drivers. The drivers own the two rules every protocol
//! frame obeys regardless of layout: cells are decoded by expected count
//! (never by scanning to the end of the buffer), and the parsed length is
//! reconciled against the header's declared length under the
//! `trust_header_length` policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::error::ParseError;

use super::state::FrameParsingState;
use super::Channel;

/// The fundamental kind of a frame, fixed at construction and never
/// reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    Configuration,
    Data,
    Header,
    Command,
    /// A frame whose kind could not be established from its header.
    Undetermined,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Configuration => write!(f, "configuration"),
            FrameKind::Data => write!(f, "data"),
            FrameKind::Header => write!(f, "header"),
            FrameKind::Command => write!(f, "command"),
            FrameKind::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// A second-of-century timestamp with sub-second resolution.
///
/// The fractional field counts in units of `1 / time_base` seconds, where
/// the time base is established by the governing configuration frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTag {
    pub seconds: u32,
    pub fraction: u32,
}

impl TimeTag {
    pub fn new(seconds: u32, fraction: u32) -> Self {
        TimeTag { seconds, fraction }
    }

    /// The timestamp in fractional Unix seconds under `time_base` counts per
    /// second. A zero time base yields the whole seconds alone.
    pub fn as_seconds(&self, time_base: u32) -> f64 {
        if time_base == 0 {
            return self.seconds as f64;
        }
        self.seconds as f64 + self.fraction as f64 / time_base as f64
    }
}

/// The capability shared by all complete frames, atop the base channel
/// contract: a fixed kind, the source (or target) device id code, and the
/// frame's time tag.
pub trait Frame: Channel {
    fn kind(&self) -> FrameKind;

    fn id_code(&self) -> u16;

    fn time_tag(&self) -> TimeTag;

    /// Serializes the complete frame, trailing check value included. The
    /// produced length always equals `decoded_length`.
    fn encode(&self) -> Vec<u8>;
}

/// Decodes exactly `state.cell_count` cells starting at `start_index`,
/// threading the running offset through the protocol's cell factory.
///
/// The loop is bounded by the expected count alone; trailing bytes after the
/// last cell (padding, reserved regions, the check value) are left for the
/// caller to account for.
pub fn decode_cells<H, C>(
    header: &H,
    state: &FrameParsingState<H, C>,
    buffer: &[u8],
    start_index: usize,
) -> Result<(Vec<C>, usize), ParseError> {
    let mut cells = Vec::with_capacity(state.cell_count);
    let mut offset = start_index;
    for cell_index in 0..state.cell_count {
        let (cell, parsed) = (state.cell_factory)(header, cell_index, buffer, offset)?;
        trace!(cell_index, parsed, "decoded frame cell");
        offset += parsed;
        cells.push(cell);
    }
    Ok((cells, offset - start_index))
}

/// Reconciles the byte count actually consumed against the header's declared
/// frame length.
///
/// Under `trust_header_length` the declared length wins unconditionally,
/// tolerating protocols that pad or reserve trailing bytes. Otherwise any
/// disagreement is a hard `LengthMismatch`.
pub fn reconcile_length(
    declared: usize,
    actual: usize,
    trust_header_length: bool,
) -> Result<usize, ParseError> {
    if trust_header_length {
        return Ok(declared);
    }
    if actual != declared {
        return Err(ParseError::LengthMismatch { declared, actual });
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::state::CellFactory;
    use std::sync::Arc;

    #[test]
    fn test_decode_cells_is_bounded_by_count() {
        // Each cell consumes two bytes and records its own index.
        let factory: CellFactory<(), (usize, u16)> = Arc::new(|_, index, buffer, start| {
            if buffer.len() < start + 2 {
                return Err(ParseError::insufficient(2, buffer.len() - start));
            }
            let word = u16::from_be_bytes([buffer[start], buffer[start + 1]]);
            Ok(((index, word), 2))
        });
        let state = FrameParsingState::new(factory).with_cell_count(2);

        // Six bytes available, but only the first four belong to cells.
        let buffer = [0x00, 0x01, 0x00, 0x02, 0xDE, 0xAD];
        let (cells, parsed) = decode_cells(&(), &state, &buffer, 0).unwrap();

        assert_eq!(parsed, 4);
        assert_eq!(cells, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_decode_cells_propagates_factory_failure() {
        let factory: CellFactory<(), ()> =
            Arc::new(|_, _, _, _| Err(ParseError::insufficient(8, 3)));
        let state = FrameParsingState::new(factory).with_cell_count(1);
        let result = decode_cells(&(), &state, &[0u8; 4], 0);
        assert!(matches!(result, Err(ParseError::InsufficientData { .. })));
    }

    #[test]
    fn test_reconcile_length_policy_matrix() {
        // Agreement passes under both policies.
        assert_eq!(reconcile_length(64, 64, true).unwrap(), 64);
        assert_eq!(reconcile_length(64, 64, false).unwrap(), 64);

        // Disagreement: trusted headers win, untrusted headers fail hard.
        assert_eq!(reconcile_length(64, 60, true).unwrap(), 64);
        let err = reconcile_length(64, 60, false).unwrap_err();
        assert!(matches!(
            err,
            ParseError::LengthMismatch { declared: 64, actual: 60 }
        ));
    }

    #[test]
    fn test_time_tag_fractional_seconds() {
        let tag = TimeTag::new(1_700_000_000, 500_000);
        assert!((tag.as_seconds(1_000_000) - 1_700_000_000.5).abs() < 1e-6);
        assert_eq!(tag.as_seconds(0), 1_700_000_000.0);
    }
}
