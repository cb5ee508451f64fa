//! # Parsing State
//!
//! Per-object bookkeeping carried alongside (not inside the serialized form
//! of) each decoded entity. A parsing state records how many bytes the
//! decoder consumed for its entity, and at cell and frame level additionally
//! holds the expected child counts, the factory functions used to construct
//! children, and the decode policy flags. States are exclusively owned by
//! their entity, replaced wholesale on reassignment, and never structurally
//! validated by the framework.

use std::fmt;
use std::sync::Arc;

use crate::error::ParseError;

use super::definition::{ChannelKind, Definition};
use super::value::Value;

/// Common contract of every parsing state: the cumulative byte count written
/// by the decoder and read by callers to determine the next field offset.
pub trait ParsingState {
    fn parsed_binary_length(&self) -> usize;

    fn set_parsed_binary_length(&mut self, length: usize);
}

/// The minimal parsing state attached to definitions and values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseParsingState {
    parsed_binary_length: usize,
}

impl BaseParsingState {
    pub fn new(parsed_binary_length: usize) -> Self {
        BaseParsingState {
            parsed_binary_length,
        }
    }
}

impl ParsingState for BaseParsingState {
    fn parsed_binary_length(&self) -> usize {
        self.parsed_binary_length
    }

    fn set_parsed_binary_length(&mut self, length: usize) {
        self.parsed_binary_length = length;
    }
}

/// Creates one cell of a frame: `(header, cell_index, buffer, start_index)`
/// to `(cell, bytes_parsed)`. Supplied once per protocol.
pub type CellFactory<H, C> =
    Arc<dyn Fn(&H, usize, &[u8], usize) -> Result<(C, usize), ParseError> + Send + Sync>;

/// Creates one channel definition inside a configuration cell:
/// `(parent_cell, kind, channel_index, buffer, start_index)` to
/// `(definition, bytes_parsed)`.
pub type DefinitionFactory<C> = Arc<
    dyn Fn(&C, ChannelKind, u16, &[u8], usize) -> Result<(Definition, usize), ParseError>
        + Send
        + Sync,
>;

/// Creates one measurement value inside a data cell:
/// `(parent_cell, definition, buffer, start_index)` to
/// `(value, bytes_parsed)`. The definition reference is non-owning and must
/// outlive the produced value's interpretation.
pub type ValueFactory<C> =
    Arc<dyn Fn(&C, &Definition, &[u8], usize) -> Result<(Value, usize), ParseError> + Send + Sync>;

/// Cell-level parsing state: the expected sub-element counts plus the
/// factories used to construct definitions or values, depending on the
/// owning frame kind.
#[derive(Clone)]
pub struct CellParsingState<C> {
    base: BaseParsingState,
    pub phasor_count: usize,
    pub analog_count: usize,
    pub digital_count: usize,
    pub definition_factory: Option<DefinitionFactory<C>>,
    pub value_factory: Option<ValueFactory<C>>,
}

impl<C> CellParsingState<C> {
    pub fn new(phasor_count: usize, analog_count: usize, digital_count: usize) -> Self {
        CellParsingState {
            base: BaseParsingState::default(),
            phasor_count,
            analog_count,
            digital_count,
            definition_factory: None,
            value_factory: None,
        }
    }

    pub fn with_definition_factory(mut self, factory: DefinitionFactory<C>) -> Self {
        self.definition_factory = Some(factory);
        self
    }

    pub fn with_value_factory(mut self, factory: ValueFactory<C>) -> Self {
        self.value_factory = Some(factory);
        self
    }
}

impl<C> ParsingState for CellParsingState<C> {
    fn parsed_binary_length(&self) -> usize {
        self.base.parsed_binary_length()
    }

    fn set_parsed_binary_length(&mut self, length: usize) {
        self.base.set_parsed_binary_length(length);
    }
}

impl<C> fmt::Debug for CellParsingState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellParsingState")
            .field("parsed_binary_length", &self.base.parsed_binary_length())
            .field("phasor_count", &self.phasor_count)
            .field("analog_count", &self.analog_count)
            .field("digital_count", &self.digital_count)
            .field("definition_factory", &self.definition_factory.is_some())
            .field("value_factory", &self.value_factory.is_some())
            .finish()
    }
}

/// Frame-level parsing state: the expected cell count, the factory used to
/// construct cells, and the two decode policy flags.
///
/// `trust_header_length` prefers the protocol header's declared byte count
/// over the count actually consumed when they disagree, protecting against
/// protocols that pad or reserve bytes. `validate_checksum` governs whether
/// the trailing check value is enforced.
#[derive(Clone)]
pub struct FrameParsingState<H, C> {
    base: BaseParsingState,
    pub cell_count: usize,
    pub cell_factory: CellFactory<H, C>,
    pub trust_header_length: bool,
    pub validate_checksum: bool,
}

impl<H, C> FrameParsingState<H, C> {
    pub fn new(cell_factory: CellFactory<H, C>) -> Self {
        FrameParsingState {
            base: BaseParsingState::default(),
            cell_count: 0,
            cell_factory,
            trust_header_length: true,
            validate_checksum: true,
        }
    }

    pub fn with_cell_count(mut self, cell_count: usize) -> Self {
        self.cell_count = cell_count;
        self
    }

    pub fn trust_header_length(mut self, trust: bool) -> Self {
        self.trust_header_length = trust;
        self
    }

    pub fn validate_checksum(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }
}

impl<H, C> ParsingState for FrameParsingState<H, C> {
    fn parsed_binary_length(&self) -> usize {
        self.base.parsed_binary_length()
    }

    fn set_parsed_binary_length(&mut self, length: usize) {
        self.base.set_parsed_binary_length(length);
    }
}

impl<H, C> fmt::Debug for FrameParsingState<H, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameParsingState")
            .field("parsed_binary_length", &self.base.parsed_binary_length())
            .field("cell_count", &self.cell_count)
            .field("trust_header_length", &self.trust_header_length)
            .field("validate_checksum", &self.validate_checksum)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_state_tracks_length() {
        let mut state = BaseParsingState::default();
        assert_eq!(state.parsed_binary_length(), 0);
        state.set_parsed_binary_length(454);
        assert_eq!(state.parsed_binary_length(), 454);
    }

    #[test]
    fn test_frame_state_policy_defaults() {
        let factory: CellFactory<(), ()> = Arc::new(|_, _, _, start| Ok(((), start)));
        let state = FrameParsingState::new(factory);
        assert!(state.trust_header_length);
        assert!(state.validate_checksum);
        assert_eq!(state.cell_count, 0);

        let state = state.trust_header_length(false).with_cell_count(3);
        assert!(!state.trust_header_length);
        assert_eq!(state.cell_count, 3);
    }
}
