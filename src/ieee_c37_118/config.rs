//! # IEEE C37.118 Configuration Frames
//!
//! This module provides parsing and construction of IEEE C37.118
//! configuration frames (CFG-1, CFG-2, CFG-3), which establish the channel
//! layout, data formats, and conversion factors that data frames are later
//! decoded against, as defined in IEEE C37.118-2005, IEEE C37.118.2-2011,
//! and IEEE C37.118.2-2024.
//!
//! ## Key Components
//!
//! - `FormatFlags`: The FORMAT word governing integer/float and
//!   rectangular/polar layouts.
//! - `ConfigurationCell`: A single PMU's configuration, holding its channel
//!   definition collections (phasor, analog, digital) plus the frequency
//!   definition.
//! - `ConfigurationFrame`: A complete configuration frame with TIME_BASE,
//!   per-PMU cells, and DATA_RATE.
//!
//! ## Usage
//!
//! Configuration cells decode their definition collections through the
//! definition factory, so protocol extensions can substitute their own
//! definition parsing without touching the frame walk. The default factory
//! implements the standard CHNAM/FNOM layouts.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::channel::checksum::{append_trailing, validate_trailing, CrcCcitt};
use crate::channel::collection::ChannelCollection;
use crate::channel::cursor::ByteCursor;
use crate::channel::definition::{
    AnalogDefinition, ChannelKind, CoordinateFormat, DataFormat, Definition, DigitalDefinition,
    FrequencyDefinition, NominalFrequency, PhasorDefinition, PhasorKind, DIGITAL_BIT_COUNT,
    MAX_LABEL_LENGTH,
};
use crate::channel::frame::{decode_cells, reconcile_length, Frame, FrameKind, TimeTag};
use crate::channel::state::{
    CellFactory, CellParsingState, DefinitionFactory, FrameParsingState, ParsingState,
};
use crate::channel::{Attributes, Channel, StatefulChannel, Tag};
use crate::error::ParseError;

use super::common::{
    create_sync, FrameType, PrefixFrame, Version, CHECKSUM_LENGTH, PREFIX_LENGTH,
};
use super::units::{
    decode_nominal_frequency, encode_nominal_frequency, AnalogUnits, DataRate, DigitalUnits,
    PhasorUnits, UNIT_LENGTH,
};

/// Wire length of the fixed leading fields of one PMU configuration block:
/// STN (16) + IDCODE (2) + FORMAT (2) + PHNMR (2) + ANNMR (2) + DGNMR (2).
const CELL_FIXED_LENGTH: usize = 26;

/// Wire length of the trailing FNOM and CFGCNT words of one PMU block.
const CELL_TRAILING_LENGTH: usize = 4;

/// The FORMAT word of a PMU configuration, governing how the PMU's data
/// cells are laid out.
///
/// # Fields
///
/// * `polar_phasors`: Bit 0, phasors in polar (magnitude/angle) rather than
///   rectangular coordinates.
/// * `float_phasors`: Bit 1, phasors as floating point rather than 16-bit
///   integers.
/// * `float_analogs`: Bit 2, analogs as floating point.
/// * `float_frequency`: Bit 3, FREQ/DFREQ as floating point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatFlags {
    pub polar_phasors: bool,
    pub float_phasors: bool,
    pub float_analogs: bool,
    pub float_frequency: bool,
}

impl FormatFlags {
    pub fn from_raw(raw: u16) -> Self {
        FormatFlags {
            polar_phasors: raw & 0x0001 != 0,
            float_phasors: raw & 0x0002 != 0,
            float_analogs: raw & 0x0004 != 0,
            float_frequency: raw & 0x0008 != 0,
        }
    }

    pub fn to_raw(&self) -> u16 {
        (self.polar_phasors as u16)
            | (self.float_phasors as u16) << 1
            | (self.float_analogs as u16) << 2
            | (self.float_frequency as u16) << 3
    }

    pub fn coordinate_format(&self) -> CoordinateFormat {
        if self.polar_phasors {
            CoordinateFormat::Polar
        } else {
            CoordinateFormat::Rectangular
        }
    }

    pub fn phasor_format(&self) -> DataFormat {
        if self.float_phasors {
            DataFormat::FloatingPoint
        } else {
            DataFormat::FixedInteger
        }
    }

    pub fn analog_format(&self) -> DataFormat {
        if self.float_analogs {
            DataFormat::FloatingPoint
        } else {
            DataFormat::FixedInteger
        }
    }

    pub fn frequency_format(&self) -> DataFormat {
        if self.float_frequency {
            DataFormat::FloatingPoint
        } else {
            DataFormat::FixedInteger
        }
    }

    /// Wire length of one phasor value under this format.
    pub fn phasor_length(&self) -> usize {
        if self.float_phasors {
            8
        } else {
            4
        }
    }

    /// Wire length of one analog value under this format.
    pub fn analog_length(&self) -> usize {
        if self.float_analogs {
            4
        } else {
            2
        }
    }

    /// Wire length of the FREQ field (DFREQ is the same) under this format.
    pub fn frequency_length(&self) -> usize {
        if self.float_frequency {
            4
        } else {
            2
        }
    }
}

/// Pads a channel label to its fixed 16-byte wire image.
pub(crate) fn pad_label(label: &str) -> [u8; MAX_LABEL_LENGTH] {
    let mut bytes = [b' '; MAX_LABEL_LENGTH];
    let source = label.as_bytes();
    let length = source.len().min(MAX_LABEL_LENGTH);
    bytes[..length].copy_from_slice(&source[..length]);
    bytes
}

fn unpad_label(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Represents a single PMU's configuration within a configuration frame.
///
/// # Fields
///
/// * `station_name`: Station name, at most 16 bytes.
/// * `idcode`: PMU identification code.
/// * `format`: The FORMAT word flags.
/// * `phasor_definitions` / `analog_definitions` / `digital_definitions`:
///   The channel definition collections, in wire order.
/// * `frequency_definition`: The FREQ/DFREQ channel definition (FNOM).
/// * `cfgcnt`: Configuration change count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationCell {
    pub station_name: String,
    pub idcode: u16,
    pub format: FormatFlags,
    pub phasor_definitions: ChannelCollection<Definition>,
    pub analog_definitions: ChannelCollection<Definition>,
    pub digital_definitions: ChannelCollection<Definition>,
    pub frequency_definition: FrequencyDefinition,
    pub cfgcnt: u16,
    #[serde(skip)]
    state: Option<CellParsingState<ConfigurationCell>>,
    #[serde(skip)]
    tag: Option<Tag>,
}

impl ConfigurationCell {
    pub fn new(station_name: impl Into<String>, idcode: u16) -> Result<Self, ParseError> {
        let station_name = station_name.into();
        crate::channel::check_label("station name", &station_name, MAX_LABEL_LENGTH)?;
        Ok(ConfigurationCell {
            station_name,
            idcode,
            format: FormatFlags::default(),
            phasor_definitions: ChannelCollection::new(),
            analog_definitions: ChannelCollection::new(),
            digital_definitions: ChannelCollection::new(),
            frequency_definition: FrequencyDefinition::new(0, NominalFrequency::Hz60),
            cfgcnt: 0,
            state: None,
            tag: None,
        })
    }

    pub fn phasor_count(&self) -> usize {
        self.phasor_definitions.len()
    }

    pub fn analog_count(&self) -> usize {
        self.analog_definitions.len()
    }

    pub fn digital_count(&self) -> usize {
        self.digital_definitions.len()
    }

    /// Looks up a definition by its cell-wide channel index: phasors first,
    /// then analogs, then digitals, with the frequency definition last.
    pub fn definition_at(&self, index: usize) -> Option<&Definition> {
        let phasors = self.phasor_count();
        let analogs = self.analog_count();
        let digitals = self.digital_count();
        if index < phasors {
            self.phasor_definitions.get(index)
        } else if index < phasors + analogs {
            self.analog_definitions.get(index - phasors)
        } else if index < phasors + analogs + digitals {
            self.digital_definitions.get(index - phasors - analogs)
        } else {
            None
        }
    }

    /// Pairs a current phasor with its voltage-reference phasor in the same
    /// cell. Both arguments are positions into `phasor_definitions`; the
    /// reference is recorded as the voltage channel's definition index.
    pub fn link_voltage_reference(
        &mut self,
        current: usize,
        voltage: usize,
    ) -> Result<(), ParseError> {
        let reference = match self.phasor_definitions.get(voltage) {
            Some(Definition::Phasor(phasor)) if phasor.kind == PhasorKind::Voltage => {
                phasor.core().index()
            }
            _ => {
                return Err(ParseError::invalid_field(
                    "voltage reference",
                    format!("position {} is not a voltage phasor", voltage),
                ))
            }
        };
        match self.phasor_definitions.get_mut(current) {
            Some(Definition::Phasor(phasor)) if phasor.kind == PhasorKind::Current => {
                phasor.voltage_reference = Some(reference);
                Ok(())
            }
            _ => Err(ParseError::invalid_field(
                "voltage reference",
                format!("position {} is not a current phasor", current),
            )),
        }
    }

    /// Index of the frequency channel in the cell-wide index space.
    pub fn frequency_index(&self) -> u16 {
        (self.phasor_count() + self.analog_count() + self.digital_count()) as u16
    }

    /// Channel names qualified as `station_idcode_label`, in wire order.
    pub fn channel_names(&self) -> Vec<String> {
        self.phasor_definitions
            .iter()
            .chain(self.analog_definitions.iter())
            .chain(self.digital_definitions.iter())
            .map(|definition| {
                format!("{}_{}_{}", self.station_name, self.idcode, definition.label())
            })
            .collect()
    }

    /// Wire length of this PMU block inside a configuration frame.
    fn configuration_length(&self) -> usize {
        let names = MAX_LABEL_LENGTH
            * (self.phasor_count() + self.analog_count() + DIGITAL_BIT_COUNT * self.digital_count());
        let units =
            UNIT_LENGTH * (self.phasor_count() + self.analog_count() + self.digital_count());
        CELL_FIXED_LENGTH + names + units + CELL_TRAILING_LENGTH
    }

    /// Wire length of this PMU's block inside a data frame: STAT, phasors,
    /// FREQ/DFREQ, analogs, digital words.
    pub fn data_length(&self) -> usize {
        2 + self.format.phasor_length() * self.phasor_count()
            + 2 * self.format.frequency_length()
            + self.format.analog_length() * self.analog_count()
            + 2 * self.digital_count()
    }

    /// Decodes one PMU configuration block from `buffer[start_index..]`,
    /// constructing channel definitions through `factory`.
    pub fn decode(
        buffer: &[u8],
        start_index: usize,
        factory: &DefinitionFactory<ConfigurationCell>,
    ) -> Result<(Self, usize), ParseError> {
        let window = buffer.len().saturating_sub(start_index);
        let mut cursor = ByteCursor::new(buffer, start_index, window)?;
        cursor.require(CELL_FIXED_LENGTH)?;

        let station_name = unpad_label(cursor.bytes(MAX_LABEL_LENGTH)?);
        let idcode = cursor.u16_be()?;
        let format = FormatFlags::from_raw(cursor.u16_be()?);
        let phnmr = cursor.u16_be()? as usize;
        let annmr = cursor.u16_be()? as usize;
        let dgnmr = cursor.u16_be()? as usize;

        let mut cell = ConfigurationCell::new(station_name, idcode)?;
        cell.format = format;
        cell.phasor_definitions =
            ChannelCollection::with_fixed_length(phnmr.saturating_sub(1), MAX_LABEL_LENGTH + UNIT_LENGTH);
        cell.analog_definitions =
            ChannelCollection::with_fixed_length(annmr.saturating_sub(1), MAX_LABEL_LENGTH + UNIT_LENGTH);
        cell.digital_definitions = ChannelCollection::with_fixed_length(
            dgnmr.saturating_sub(1),
            DIGITAL_BIT_COUNT * MAX_LABEL_LENGTH + UNIT_LENGTH,
        );

        // Channel name section, in phasor / analog / digital order. The
        // factory owns the name layout; the driver owns the walk.
        for channel in 0..phnmr {
            let (definition, parsed) =
                factory(&cell, ChannelKind::Phasor, channel as u16, buffer, cursor.position())?;
            cursor.skip(parsed)?;
            cell.phasor_definitions.try_push(definition)?;
        }
        for channel in 0..annmr {
            let index = (phnmr + channel) as u16;
            let (definition, parsed) =
                factory(&cell, ChannelKind::Analog, index, buffer, cursor.position())?;
            cursor.skip(parsed)?;
            cell.analog_definitions.try_push(definition)?;
        }
        for channel in 0..dgnmr {
            let index = (phnmr + annmr + channel) as u16;
            let (definition, parsed) =
                factory(&cell, ChannelKind::Digital, index, buffer, cursor.position())?;
            cursor.skip(parsed)?;
            cell.digital_definitions.try_push(definition)?;
        }

        // Conversion factor section: PHUNIT, ANUNIT, DIGUNIT.
        for definition in cell.phasor_definitions.iter_mut() {
            let (units, parsed) = PhasorUnits::decode(buffer, cursor.position())?;
            cursor.skip(parsed)?;
            if let Definition::Phasor(phasor) = definition {
                phasor.kind = units.kind();
                phasor.core_mut().set_scaling(units.scale_factor)?;
            }
            definition.set_parsed_length(MAX_LABEL_LENGTH + UNIT_LENGTH);
        }
        for definition in cell.analog_definitions.iter_mut() {
            let (units, parsed) = AnalogUnits::decode(buffer, cursor.position())?;
            cursor.skip(parsed)?;
            if let Definition::Analog(analog) = definition {
                analog.kind = units.kind;
                analog.user_scale = units.scale_factor;
                analog.core_mut().set_scaling(units.scale_factor.unsigned_abs())?;
            }
            definition.set_parsed_length(MAX_LABEL_LENGTH + UNIT_LENGTH);
        }
        for definition in cell.digital_definitions.iter_mut() {
            let (units, parsed) = DigitalUnits::decode(buffer, cursor.position())?;
            cursor.skip(parsed)?;
            if let Definition::Digital(digital) = definition {
                digital.normal_status_mask = units.normal_status_mask;
                digital.valid_inputs_mask = units.valid_inputs_mask;
            }
            definition.set_parsed_length(DIGITAL_BIT_COUNT * MAX_LABEL_LENGTH + UNIT_LENGTH);
        }

        // FNOM through the factory as well, then CFGCNT.
        let frequency_index = cell.frequency_index();
        let (frequency, parsed) = factory(
            &cell,
            ChannelKind::Frequency,
            frequency_index,
            buffer,
            cursor.position(),
        )?;
        cursor.skip(parsed)?;
        cell.frequency_definition = match frequency {
            Definition::Frequency(definition) => definition,
            other => {
                return Err(ParseError::invalid_field(
                    "frequency definition",
                    format!("factory produced a {} definition", other.kind()),
                ))
            }
        };
        cell.cfgcnt = cursor.u16_be()?;

        let mut state = CellParsingState::new(phnmr, annmr, dgnmr)
            .with_definition_factory(Arc::clone(factory));
        state.set_parsed_binary_length(cursor.consumed());
        cell.state = Some(state);

        Ok((cell, cursor.consumed()))
    }

    /// Serializes this PMU configuration block.
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.configuration_length());
        result.extend_from_slice(&pad_label(&self.station_name));
        result.extend_from_slice(&self.idcode.to_be_bytes());
        result.extend_from_slice(&self.format.to_raw().to_be_bytes());
        result.extend_from_slice(&(self.phasor_count() as u16).to_be_bytes());
        result.extend_from_slice(&(self.analog_count() as u16).to_be_bytes());
        result.extend_from_slice(&(self.digital_count() as u16).to_be_bytes());

        for definition in self.phasor_definitions.iter().chain(self.analog_definitions.iter()) {
            result.extend_from_slice(&pad_label(definition.label()));
        }
        for definition in &self.digital_definitions {
            if let Definition::Digital(digital) = definition {
                for bit in 0..DIGITAL_BIT_COUNT {
                    let label = digital.bit_labels.get(bit).map(String::as_str).unwrap_or("");
                    result.extend_from_slice(&pad_label(label));
                }
            }
        }

        for definition in &self.phasor_definitions {
            if let Definition::Phasor(phasor) = definition {
                let units = PhasorUnits::new(phasor.kind, phasor.core().scaling());
                result.extend_from_slice(&units.encode());
            }
        }
        for definition in &self.analog_definitions {
            if let Definition::Analog(analog) = definition {
                let units = AnalogUnits::new(analog.kind, analog.user_scale);
                result.extend_from_slice(&units.encode());
            }
        }
        for definition in &self.digital_definitions {
            if let Definition::Digital(digital) = definition {
                let units =
                    DigitalUnits::new(digital.normal_status_mask, digital.valid_inputs_mask);
                result.extend_from_slice(&units.encode());
            }
        }

        result.extend_from_slice(&encode_nominal_frequency(
            self.frequency_definition.nominal_frequency,
        ));
        result.extend_from_slice(&self.cfgcnt.to_be_bytes());
        result
    }
}

impl Channel for ConfigurationCell {
    fn decoded_length(&self) -> usize {
        self.state
            .as_ref()
            .map(|state| state.parsed_binary_length())
            .unwrap_or_else(|| self.configuration_length())
    }

    fn append_attributes(&self, attributes: &mut Attributes) {
        attributes.push("station name", &self.station_name);
        attributes.push("id code", self.idcode);
        attributes.push("phasors", self.phasor_count());
        attributes.push("analogs", self.analog_count());
        attributes.push("digitals", self.digital_count());
        attributes.push(
            "nominal frequency",
            self.frequency_definition.nominal_frequency,
        );
        attributes.push("configuration count", self.cfgcnt);
    }

    fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    fn set_tag(&mut self, tag: Option<Tag>) {
        self.tag = tag;
    }
}

impl StatefulChannel for ConfigurationCell {
    type State = CellParsingState<ConfigurationCell>;

    fn parsing_state(&self) -> Option<&Self::State> {
        self.state.as_ref()
    }

    fn replace_parsing_state(&mut self, state: Self::State) -> Option<Self::State> {
        self.state.replace(state)
    }
}

/// The default definition factory: standard CHNAM and FNOM layouts.
///
/// Phasor and analog definitions consume one 16-byte name each; digital
/// definitions consume sixteen names; the frequency definition consumes the
/// FNOM word. Conversion factors are applied by the cell decode after the
/// name section.
pub fn default_definition_factory() -> DefinitionFactory<ConfigurationCell> {
    Arc::new(|cell, kind, index, buffer, start_index| {
        match kind {
            ChannelKind::Phasor => {
                let window = buffer.len().saturating_sub(start_index);
                let mut cursor = ByteCursor::new(buffer, start_index, window.min(MAX_LABEL_LENGTH))?;
                let label = unpad_label(cursor.bytes(MAX_LABEL_LENGTH)?);
                let mut definition = PhasorDefinition::new(label, index)?;
                definition.coordinate_format = cell.format.coordinate_format();
                definition.core_mut().set_format(cell.format.phasor_format());
                Ok((Definition::Phasor(definition), cursor.consumed()))
            }
            ChannelKind::Analog => {
                let window = buffer.len().saturating_sub(start_index);
                let mut cursor = ByteCursor::new(buffer, start_index, window.min(MAX_LABEL_LENGTH))?;
                let label = unpad_label(cursor.bytes(MAX_LABEL_LENGTH)?);
                let mut definition = AnalogDefinition::new(label, index)?;
                definition.core_mut().set_format(cell.format.analog_format());
                Ok((Definition::Analog(definition), cursor.consumed()))
            }
            ChannelKind::Digital => {
                let block = DIGITAL_BIT_COUNT * MAX_LABEL_LENGTH;
                let window = buffer.len().saturating_sub(start_index);
                let mut cursor = ByteCursor::new(buffer, start_index, window.min(block))?;
                let mut bit_labels = Vec::with_capacity(DIGITAL_BIT_COUNT);
                for _ in 0..DIGITAL_BIT_COUNT {
                    bit_labels.push(unpad_label(cursor.bytes(MAX_LABEL_LENGTH)?));
                }
                let word = index - (cell.phasor_count() + cell.analog_count()) as u16;
                let mut definition = DigitalDefinition::new(format!("DG{}", word + 1), index)?;
                definition.bit_labels = bit_labels;
                Ok((Definition::Digital(definition), cursor.consumed()))
            }
            ChannelKind::Frequency => {
                let (nominal, parsed) = decode_nominal_frequency(buffer, start_index)?;
                let mut definition = FrequencyDefinition::new(index, nominal);
                definition
                    .core_mut()
                    .set_format(cell.format.frequency_format());
                Ok((Definition::Frequency(definition), parsed))
            }
        }
    })
}

/// The default cell factory for configuration frames, delegating to
/// [`ConfigurationCell::decode`] with the default definition factory.
pub fn default_configuration_cell_factory() -> CellFactory<PrefixFrame, ConfigurationCell> {
    let definition_factory = default_definition_factory();
    Arc::new(move |_prefix, _cell_index, buffer, start_index| {
        ConfigurationCell::decode(buffer, start_index, &definition_factory)
    })
}

/// Represents an IEEE C37.118 configuration frame (CFG-1, CFG-2, or CFG-3).
///
/// # Fields
///
/// * `prefix`: Common frame prefix.
/// * `time_base`: FRACSEC resolution, in counts per second.
/// * `cells`: Per-PMU configuration cells.
/// * `data_rate`: The DATA_RATE word.
/// * `chk`: CRC-CCITT check value as read from the wire.
/// * `cfg_type`: 1, 2, or 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationFrame {
    pub prefix: PrefixFrame,
    pub time_base: u32,
    pub cells: ChannelCollection<ConfigurationCell>,
    pub data_rate: DataRate,
    pub chk: u16,
    pub cfg_type: u8,
    #[serde(skip)]
    state: Option<FrameParsingState<PrefixFrame, ConfigurationCell>>,
    #[serde(skip)]
    tag: Option<Tag>,
}

impl ConfigurationFrame {
    /// Creates an empty configuration frame with the given identity.
    pub fn new(version: Version, cfg_type: u8, idcode: u16, time_base: u32) -> Self {
        let frame_type = match cfg_type {
            1 => FrameType::Config1,
            3 => FrameType::Config3,
            _ => FrameType::Config2,
        };
        ConfigurationFrame {
            prefix: PrefixFrame::new(version, frame_type, idcode),
            time_base,
            cells: ChannelCollection::new(),
            data_rate: DataRate::default(),
            chk: 0,
            cfg_type,
            state: None,
            tag: None,
        }
    }

    /// Decodes a configuration frame from `buffer[start_index..]` under the
    /// given parsing state.
    ///
    /// # Returns
    ///
    /// * `Ok((ConfigurationFrame, length))`: The frame and its reconciled
    ///   binary length.
    /// * `Err(ParseError)`: On a short buffer, wrong frame type, checksum
    ///   mismatch, or (with an untrusted header) a length disagreement.
    pub fn decode(
        buffer: &[u8],
        start_index: usize,
        state: FrameParsingState<PrefixFrame, ConfigurationCell>,
    ) -> Result<(Self, usize), ParseError> {
        let (prefix, _) = PrefixFrame::decode(buffer, start_index)?;
        let cfg_type = match prefix.frame_type()? {
            FrameType::Config1 => 1,
            FrameType::Config2 => 2,
            FrameType::Config3 => 3,
            other => {
                return Err(ParseError::InvalidFrameType {
                    message: format!("expected a configuration frame, got {}", other),
                })
            }
        };

        let declared = prefix.framesize as usize;
        let span = frame_span(buffer, start_index, declared)?;
        if state.validate_checksum {
            validate_trailing(&CrcCcitt, span)?;
        }
        debug!(
            idcode = prefix.idcode,
            framesize = declared,
            cfg_type,
            "decoding configuration frame"
        );

        let body_end = start_index + declared - CHECKSUM_LENGTH;
        let mut cursor = ByteCursor::new(buffer, start_index + PREFIX_LENGTH, declared - PREFIX_LENGTH)?;
        cursor.truncate(body_end)?;

        let time_base = cursor.u32_be()?;
        let num_pmu = cursor.u16_be()? as usize;
        let state = state.with_cell_count(num_pmu);

        // Cells never read past the body; the checksum tail is masked off.
        let body = &buffer[..body_end];
        let (cells_vec, cells_length) = decode_cells(&prefix, &state, body, cursor.position())?;
        cursor.skip(cells_length)?;

        let data_rate = DataRate {
            value: cursor.i16_be()?,
        };
        let chk = u16::from_be_bytes([buffer[body_end], buffer[body_end + 1]]);

        let actual = PREFIX_LENGTH + cursor.consumed() + CHECKSUM_LENGTH;
        let length = reconcile_length(declared, actual, state.trust_header_length)?;

        let mut cells = ChannelCollection::with_bound(num_pmu.saturating_sub(1));
        for cell in cells_vec {
            cells.try_push(cell)?;
        }

        let mut state = state;
        state.set_parsed_binary_length(length);

        Ok((
            ConfigurationFrame {
                prefix,
                time_base,
                cells,
                data_rate,
                chk,
                cfg_type,
                state: Some(state),
                tag: None,
            },
            length,
        ))
    }

    /// Total wire length of a data frame produced under this configuration.
    pub fn data_frame_length(&self) -> usize {
        PREFIX_LENGTH
            + self
                .cells
                .iter()
                .map(ConfigurationCell::data_length)
                .sum::<usize>()
            + CHECKSUM_LENGTH
    }

    fn computed_length(&self) -> usize {
        PREFIX_LENGTH
            + 4
            + 2
            + self
                .cells
                .iter()
                .map(ConfigurationCell::configuration_length)
                .sum::<usize>()
            + 2
            + CHECKSUM_LENGTH
    }
}

impl Channel for ConfigurationFrame {
    fn decoded_length(&self) -> usize {
        self.state
            .as_ref()
            .map(|state| state.parsed_binary_length())
            .unwrap_or_else(|| self.computed_length())
    }

    fn append_attributes(&self, attributes: &mut Attributes) {
        attributes.push("kind", self.kind());
        attributes.push("configuration type", self.cfg_type);
        attributes.push("id code", self.prefix.idcode);
        attributes.push("time base", self.time_base);
        attributes.push("cells", self.cells.len());
        attributes.push("data rate", self.data_rate.value);
        for cell in &self.cells {
            cell.append_attributes(attributes);
        }
    }

    fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    fn set_tag(&mut self, tag: Option<Tag>) {
        self.tag = tag;
    }
}

impl StatefulChannel for ConfigurationFrame {
    type State = FrameParsingState<PrefixFrame, ConfigurationCell>;

    fn parsing_state(&self) -> Option<&Self::State> {
        self.state.as_ref()
    }

    fn replace_parsing_state(&mut self, state: Self::State) -> Option<Self::State> {
        self.state.replace(state)
    }
}

impl Frame for ConfigurationFrame {
    fn kind(&self) -> FrameKind {
        FrameKind::Configuration
    }

    fn id_code(&self) -> u16 {
        self.prefix.idcode
    }

    fn time_tag(&self) -> TimeTag {
        self.prefix.time_tag()
    }

    fn encode(&self) -> Vec<u8> {
        let frame_size = self.computed_length();
        let mut prefix = self.prefix.clone();
        prefix.framesize = frame_size as u16;
        prefix.sync = create_sync(
            prefix.version,
            match self.cfg_type {
                1 => FrameType::Config1,
                3 => FrameType::Config3,
                _ => FrameType::Config2,
            },
        );

        let mut result = Vec::with_capacity(frame_size);
        result.extend_from_slice(&prefix.encode());
        result.extend_from_slice(&self.time_base.to_be_bytes());
        result.extend_from_slice(&(self.cells.len() as u16).to_be_bytes());
        for cell in &self.cells {
            result.extend_from_slice(&cell.encode());
        }
        result.extend_from_slice(&self.data_rate.encode());
        append_trailing(&CrcCcitt, &mut result);
        result
    }
}

/// Bounds-checks the declared frame window and returns it as a slice.
pub(crate) fn frame_span<'a>(
    buffer: &'a [u8],
    start_index: usize,
    declared: usize,
) -> Result<&'a [u8], ParseError> {
    if declared < PREFIX_LENGTH + CHECKSUM_LENGTH {
        return Err(ParseError::invalid_field(
            "framesize",
            format!("declared size {} is below the frame minimum", declared),
        ));
    }
    let available = buffer.len().saturating_sub(start_index);
    if available < declared {
        return Err(ParseError::insufficient(declared, available));
    }
    Ok(&buffer[start_index..start_index + declared])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cell_frame() -> ConfigurationFrame {
        let mut frame = ConfigurationFrame::new(Version::V2011, 2, 60, 1_000_000);
        frame.data_rate = DataRate::per_second(30);

        let mut cell_a = ConfigurationCell::new("STATION A", 1).unwrap();
        cell_a.format = FormatFlags {
            polar_phasors: true,
            float_phasors: true,
            float_analogs: true,
            float_frequency: true,
        };
        for (channel, label) in ["VA", "VB", "VC", "I1"].iter().enumerate() {
            let mut definition = PhasorDefinition::new(*label, channel as u16).unwrap();
            definition.coordinate_format = CoordinateFormat::Polar;
            definition.core_mut().set_format(DataFormat::FloatingPoint);
            if *label == "I1" {
                definition.kind = PhasorKind::Current;
            }
            cell_a
                .phasor_definitions
                .try_push(Definition::Phasor(definition))
                .unwrap();
        }
        let mut analog = AnalogDefinition::new("ANALOG1", 4).unwrap();
        analog.core_mut().set_format(DataFormat::FloatingPoint);
        analog.user_scale = 1;
        cell_a
            .analog_definitions
            .try_push(Definition::Analog(analog))
            .unwrap();
        let mut digital = DigitalDefinition::new("DG1", 5).unwrap();
        digital.bit_labels = (0..16).map(|bit| format!("BIT{}", bit)).collect();
        digital.valid_inputs_mask = 0xFFFF;
        cell_a
            .digital_definitions
            .try_push(Definition::Digital(digital))
            .unwrap();
        cell_a.frequency_definition = FrequencyDefinition::new(6, NominalFrequency::Hz50);
        cell_a
            .frequency_definition
            .core_mut()
            .set_format(DataFormat::FloatingPoint);
        frame.cells.try_push(cell_a).unwrap();

        let mut cell_b = ConfigurationCell::new("STATION B", 2).unwrap();
        let mut phasor = PhasorDefinition::new("VA", 0).unwrap();
        phasor.core_mut().set_scaling(915_527).unwrap();
        cell_b
            .phasor_definitions
            .try_push(Definition::Phasor(phasor))
            .unwrap();
        frame.cells.try_push(cell_b).unwrap();

        frame
    }

    #[test]
    fn test_two_cell_round_trip() {
        let frame = two_cell_frame();
        let bytes = frame.encode();
        assert_eq!(bytes.len(), frame.decoded_length());

        let state = FrameParsingState::new(default_configuration_cell_factory());
        let (decoded, length) = ConfigurationFrame::decode(&bytes, 0, state).unwrap();

        assert_eq!(length, bytes.len());
        assert_eq!(decoded.time_base, 1_000_000);
        assert_eq!(decoded.cells.len(), 2);
        assert_eq!(decoded.data_rate.value, 30);

        let cell_a = &decoded.cells[0];
        assert_eq!(cell_a.station_name, "STATION A");
        assert_eq!(cell_a.phasor_count(), 4);
        assert_eq!(cell_a.analog_count(), 1);
        assert_eq!(cell_a.digital_count(), 1);
        assert_eq!(cell_a.phasor_definitions[0].label(), "VA");
        assert_eq!(
            cell_a.frequency_definition.nominal_frequency,
            NominalFrequency::Hz50
        );
        let digital = cell_a.digital_definitions[0].as_digital().unwrap();
        assert_eq!(digital.bit_labels[3], "BIT3");
        assert_eq!(digital.valid_inputs_mask, 0xFFFF);

        let cell_b = &decoded.cells[1];
        assert_eq!(cell_b.station_name, "STATION B");
        let phasor = cell_b.phasor_definitions[0].as_phasor().unwrap();
        assert_eq!(phasor.core().scaling(), 915_527);
        assert_eq!(phasor.kind, PhasorKind::Voltage);

        // Re-encoding the decoded frame reproduces the wire image.
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn test_link_voltage_reference_pairs_current_with_voltage() {
        let mut frame = two_cell_frame();
        let cell = frame.cells.get_mut(0).unwrap();

        // I1 at position 3 references VA at position 0.
        cell.link_voltage_reference(3, 0).unwrap();
        let current = cell.phasor_definitions[3].as_phasor().unwrap();
        assert_eq!(current.voltage_reference, Some(0));

        // Linking a voltage phasor as the current side is rejected, as is
        // referencing a current phasor.
        assert!(matches!(
            cell.link_voltage_reference(0, 1),
            Err(ParseError::InvalidFieldValue { .. })
        ));
        assert!(matches!(
            cell.link_voltage_reference(3, 3),
            Err(ParseError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn test_cell_length_accounting() {
        let frame = two_cell_frame();
        let cell_a = &frame.cells[0];
        // 26 fixed + (4+1+16)*16 names + (4+1+1)*4 units + 4 trailing.
        assert_eq!(cell_a.decoded_length(), 26 + 21 * 16 + 6 * 4 + 4);
        assert_eq!(
            frame.decoded_length(),
            14 + 6 + cell_a.decoded_length() + frame.cells[1].decoded_length() + 2 + 2
        );
    }

    #[test]
    fn test_checksum_tamper_detected() {
        let frame = two_cell_frame();
        let mut bytes = frame.encode();
        bytes[20] ^= 0x01;

        let state = FrameParsingState::new(default_configuration_cell_factory());
        let result = ConfigurationFrame::decode(&bytes, 0, state);
        assert!(matches!(result, Err(ParseError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_truncated_buffer_is_insufficient() {
        let frame = two_cell_frame();
        let bytes = frame.encode();
        let state = FrameParsingState::new(default_configuration_cell_factory());
        let result = ConfigurationFrame::decode(&bytes[..bytes.len() - 10], 0, state);
        assert!(matches!(result, Err(ParseError::InsufficientData { .. })));
    }

    #[test]
    fn test_rejects_non_configuration_frame() {
        let frame = two_cell_frame();
        let mut bytes = frame.encode();
        // Rewrite the SYNC word as a data frame and fix the checksum.
        let sync = create_sync(Version::V2011, FrameType::Data).to_be_bytes();
        bytes[0] = sync[0];
        bytes[1] = sync[1];
        let body_end = bytes.len() - 2;
        let crc = crate::channel::checksum::CrcCcitt;
        use crate::channel::checksum::ChecksumAlgorithm;
        let value = crc.compute(&bytes[..body_end]) as u16;
        bytes[body_end..].copy_from_slice(&value.to_be_bytes());

        let state = FrameParsingState::new(default_configuration_cell_factory());
        let result = ConfigurationFrame::decode(&bytes, 0, state);
        assert!(matches!(result, Err(ParseError::InvalidFrameType { .. })));
    }

    #[test]
    fn test_trust_header_length_matrix() {
        let frame = two_cell_frame();
        let mut bytes = frame.encode();

        // Pad two extra bytes ahead of the checksum and redeclare the size.
        let body_end = bytes.len() - 2;
        bytes.truncate(body_end);
        bytes.extend_from_slice(&[0x00, 0x00]);
        let declared = (bytes.len() + 2) as u16;
        bytes[2..4].copy_from_slice(&declared.to_be_bytes());
        use crate::channel::checksum::ChecksumAlgorithm;
        let value = CrcCcitt.compute(&bytes) as u16;
        bytes.extend_from_slice(&value.to_be_bytes());

        // Trusting the header accepts the padded frame at its declared size.
        let state = FrameParsingState::new(default_configuration_cell_factory());
        let (decoded, length) = ConfigurationFrame::decode(&bytes, 0, state).unwrap();
        assert_eq!(length, declared as usize);
        assert_eq!(decoded.decoded_length(), declared as usize);

        // An untrusted header fails on the same bytes.
        let state =
            FrameParsingState::new(default_configuration_cell_factory()).trust_header_length(false);
        let result = ConfigurationFrame::decode(&bytes, 0, state);
        assert!(matches!(result, Err(ParseError::LengthMismatch { .. })));
    }
}
