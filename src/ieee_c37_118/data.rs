//! # IEEE C37.118 Data Frames
//!
//! Parsing and construction of IEEE C37.118 data frames, the per-interval
//! measurement payloads streamed by PMUs. A data frame cannot be decoded in
//! isolation: its layout is established by the governing configuration
//! frame, so the data cell factory is built from a `ConfigurationFrame` and
//! each cell decodes its values against the matching configuration cell
//! through the value factory.
//!
//! ## Key Components
//!
//! - `DataCell`: One PMU's measurement block (STAT, phasors, FREQ/DFREQ,
//!   analogs, digital words).
//! - `DataFrame`: A complete data frame.
//! - `data_cell_factory` / `default_value_factory`: The factory plug-ins
//!   binding data decoding to a configuration.
//!
//! ## Usage
//!
//! Integer/float and rectangular/polar layouts follow the configuration
//! cell's FORMAT word. Fixed-point phasors are converted to primary units
//! with the PHUNIT scale (10⁻⁵ units per bit); fixed-point FREQ/DFREQ use
//! the standard 10⁻³ Hz and 10⁻² Hz/s resolutions; fixed-point analogs are
//! kept raw, their scaling being user-defined.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::channel::checksum::{append_trailing, validate_trailing, CrcCcitt};
use crate::channel::collection::ChannelCollection;
use crate::channel::cursor::ByteCursor;
use crate::channel::definition::{CoordinateFormat, DataFormat, Definition};
use crate::channel::frame::{decode_cells, reconcile_length, Frame, FrameKind, TimeTag};
use crate::channel::state::{CellFactory, CellParsingState, FrameParsingState, ParsingState, ValueFactory};
use crate::channel::value::{AnalogValue, DigitalValue, FrequencyValue, PhasorValue, Value};
use crate::channel::{Attributes, Channel, StatefulChannel, Tag};
use crate::error::ParseError;

use super::common::{
    create_sync, FrameType, PrefixFrame, StatField, Version, CHECKSUM_LENGTH, PREFIX_LENGTH,
};
use super::config::{ConfigurationCell, ConfigurationFrame, FormatFlags};

/// Hz represented by one bit of a fixed-point FREQ deviation.
const FREQ_SCALE: f64 = 1e-3;

/// Hz/s represented by one bit of a fixed-point DFREQ value.
const DFREQ_SCALE: f64 = 1e-2;

/// Radians represented by one bit of a fixed-point polar angle.
const ANGLE_SCALE: f64 = 1e-4;

/// One PMU's measurement block within a data frame.
///
/// # Fields
///
/// * `idcode`: The owning PMU's id code, copied from its configuration cell.
/// * `version`: Standard version governing the STAT layout.
/// * `format`: The FORMAT word flags governing value layouts.
/// * `stat`: The decoded STAT field.
/// * `phasor_values` / `analog_values` / `digital_values`: Measurement
///   collections in wire order.
/// * `frequency_value`: The FREQ/DFREQ pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCell {
    pub idcode: u16,
    pub version: Version,
    pub format: FormatFlags,
    pub stat: StatField,
    pub phasor_values: ChannelCollection<Value>,
    pub frequency_value: FrequencyValue,
    pub analog_values: ChannelCollection<Value>,
    pub digital_values: ChannelCollection<Value>,
    #[serde(skip)]
    state: Option<CellParsingState<DataCell>>,
    #[serde(skip)]
    tag: Option<Tag>,
}

impl DataCell {
    /// An empty measurement block for the given configuration cell.
    pub fn new(configuration: &ConfigurationCell, version: Version) -> Self {
        DataCell {
            idcode: configuration.idcode,
            version,
            format: configuration.format,
            stat: StatField::default(),
            phasor_values: ChannelCollection::with_fixed_length(
                configuration.phasor_count().saturating_sub(1),
                configuration.format.phasor_length(),
            ),
            frequency_value: FrequencyValue::new(
                configuration.frequency_index(),
                configuration.format.frequency_format(),
                0.0,
                0.0,
            ),
            analog_values: ChannelCollection::with_fixed_length(
                configuration.analog_count().saturating_sub(1),
                configuration.format.analog_length(),
            ),
            digital_values: ChannelCollection::with_fixed_length(
                configuration.digital_count().saturating_sub(1),
                2,
            ),
            state: None,
            tag: None,
        }
    }

    /// Wire length of this block: STAT plus all value runs.
    fn data_length(&self) -> usize {
        2 + self.phasor_values.binary_length()
            + 2 * self.format.frequency_length()
            + self.analog_values.binary_length()
            + self.digital_values.binary_length()
    }

    /// Decodes one measurement block against its configuration cell,
    /// constructing values through `factory`.
    pub fn decode(
        configuration: &ConfigurationCell,
        version: Version,
        buffer: &[u8],
        start_index: usize,
        factory: &ValueFactory<DataCell>,
    ) -> Result<(Self, usize), ParseError> {
        let window = buffer.len().saturating_sub(start_index);
        let mut cursor = ByteCursor::new(buffer, start_index, window)?;

        let mut cell = DataCell::new(configuration, version);
        cell.stat = StatField::from_raw(cursor.u16_be()?, version);

        for definition in &configuration.phasor_definitions {
            let (value, parsed) = factory(&cell, definition, buffer, cursor.position())?;
            cursor.skip(parsed)?;
            cell.phasor_values.try_push(value)?;
        }

        let frequency_definition =
            Definition::Frequency(configuration.frequency_definition.clone());
        let (frequency, parsed) = factory(&cell, &frequency_definition, buffer, cursor.position())?;
        cursor.skip(parsed)?;
        cell.frequency_value = match frequency {
            Value::Frequency(value) => value,
            other => {
                return Err(ParseError::invalid_field(
                    "frequency value",
                    format!("factory produced a {} value", other.kind()),
                ))
            }
        };

        for definition in &configuration.analog_definitions {
            let (value, parsed) = factory(&cell, definition, buffer, cursor.position())?;
            cursor.skip(parsed)?;
            cell.analog_values.try_push(value)?;
        }
        for definition in &configuration.digital_definitions {
            let (value, parsed) = factory(&cell, definition, buffer, cursor.position())?;
            cursor.skip(parsed)?;
            cell.digital_values.try_push(value)?;
        }

        let mut state = CellParsingState::new(
            configuration.phasor_count(),
            configuration.analog_count(),
            configuration.digital_count(),
        )
        .with_value_factory(Arc::clone(factory));
        state.set_parsed_binary_length(cursor.consumed());
        cell.state = Some(state);

        Ok((cell, cursor.consumed()))
    }

    /// Serializes this measurement block.
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.data_length());
        result.extend_from_slice(&self.stat.to_raw(self.version).to_be_bytes());

        for value in &self.phasor_values {
            if let Value::Phasor(phasor) = value {
                encode_phasor(phasor, self.format, &mut result);
            }
        }

        match self.format.frequency_format() {
            DataFormat::FixedInteger => {
                let freq = (self.frequency_value.deviation_hz / FREQ_SCALE).round() as i16;
                let dfdt = (self.frequency_value.dfdt_hz_per_second / DFREQ_SCALE).round() as i16;
                result.extend_from_slice(&freq.to_be_bytes());
                result.extend_from_slice(&dfdt.to_be_bytes());
            }
            DataFormat::FloatingPoint => {
                result.extend_from_slice(&(self.frequency_value.deviation_hz as f32).to_be_bytes());
                result.extend_from_slice(
                    &(self.frequency_value.dfdt_hz_per_second as f32).to_be_bytes(),
                );
            }
        }

        for value in &self.analog_values {
            if let Value::Analog(analog) = value {
                match self.format.analog_format() {
                    DataFormat::FixedInteger => {
                        result.extend_from_slice(&(analog.value.round() as i16).to_be_bytes());
                    }
                    DataFormat::FloatingPoint => {
                        result.extend_from_slice(&(analog.value as f32).to_be_bytes());
                    }
                }
            }
        }
        for value in &self.digital_values {
            if let Value::Digital(digital) = value {
                result.extend_from_slice(&digital.word.to_be_bytes());
            }
        }
        result
    }
}

fn encode_phasor(phasor: &PhasorValue, format: FormatFlags, result: &mut Vec<u8>) {
    match (format.phasor_format(), phasor.coordinate_format) {
        (DataFormat::FixedInteger, CoordinateFormat::Rectangular) => {
            let real = (phasor.real() / phasor.scale).round() as i16;
            let imaginary = (phasor.imaginary() / phasor.scale).round() as i16;
            result.extend_from_slice(&real.to_be_bytes());
            result.extend_from_slice(&imaginary.to_be_bytes());
        }
        (DataFormat::FixedInteger, CoordinateFormat::Polar) => {
            let magnitude = (phasor.magnitude / phasor.scale).round() as u16;
            let angle = (phasor.angle_radians / ANGLE_SCALE).round() as i16;
            result.extend_from_slice(&magnitude.to_be_bytes());
            result.extend_from_slice(&angle.to_be_bytes());
        }
        (DataFormat::FloatingPoint, CoordinateFormat::Rectangular) => {
            result.extend_from_slice(&(phasor.real() as f32).to_be_bytes());
            result.extend_from_slice(&(phasor.imaginary() as f32).to_be_bytes());
        }
        (DataFormat::FloatingPoint, CoordinateFormat::Polar) => {
            result.extend_from_slice(&(phasor.magnitude as f32).to_be_bytes());
            result.extend_from_slice(&(phasor.angle_radians as f32).to_be_bytes());
        }
    }
}

impl Channel for DataCell {
    fn decoded_length(&self) -> usize {
        self.state
            .as_ref()
            .map(|state| state.parsed_binary_length())
            .unwrap_or_else(|| self.data_length())
    }

    fn append_attributes(&self, attributes: &mut Attributes) {
        attributes.push("id code", self.idcode);
        attributes.push("stat", format!("{:#06X}", self.stat.to_raw(self.version)));
        attributes.push("phasors", self.phasor_values.len());
        attributes.push("frequency deviation (Hz)", self.frequency_value.deviation_hz);
        attributes.push("analogs", self.analog_values.len());
        attributes.push("digitals", self.digital_values.len());
    }

    fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    fn set_tag(&mut self, tag: Option<Tag>) {
        self.tag = tag;
    }
}

impl StatefulChannel for DataCell {
    type State = CellParsingState<DataCell>;

    fn parsing_state(&self) -> Option<&Self::State> {
        self.state.as_ref()
    }

    fn replace_parsing_state(&mut self, state: Self::State) -> Option<Self::State> {
        self.state.replace(state)
    }
}

/// The default value factory: standard integer/float and rectangular/polar
/// layouts, with fixed-point phasors scaled to primary units through their
/// definition's conversion factor.
pub fn default_value_factory() -> ValueFactory<DataCell> {
    Arc::new(|_cell, definition, buffer, start_index| {
        let window = buffer.len().saturating_sub(start_index);
        let mut cursor = ByteCursor::new(buffer, start_index, window)?;
        let index = definition.index();

        let value = match definition {
            Definition::Phasor(phasor) => {
                let format = phasor.core().format();
                let scale = phasor.core().conversion_factor();
                let (magnitude, angle_radians) = match (format, phasor.coordinate_format) {
                    (DataFormat::FixedInteger, CoordinateFormat::Rectangular) => {
                        let real = cursor.i16_be()? as f64 * scale;
                        let imaginary = cursor.i16_be()? as f64 * scale;
                        (real.hypot(imaginary), imaginary.atan2(real))
                    }
                    (DataFormat::FixedInteger, CoordinateFormat::Polar) => {
                        let magnitude = cursor.u16_be()? as f64 * scale;
                        let angle = cursor.i16_be()? as f64 * ANGLE_SCALE;
                        (magnitude, angle)
                    }
                    (DataFormat::FloatingPoint, CoordinateFormat::Rectangular) => {
                        let real = cursor.f32_be()? as f64;
                        let imaginary = cursor.f32_be()? as f64;
                        (real.hypot(imaginary), imaginary.atan2(real))
                    }
                    (DataFormat::FloatingPoint, CoordinateFormat::Polar) => {
                        let magnitude = cursor.f32_be()? as f64;
                        let angle = cursor.f32_be()? as f64;
                        (magnitude, angle)
                    }
                };
                let mut value = PhasorValue::new(index, format, magnitude, angle_radians);
                value.coordinate_format = phasor.coordinate_format;
                value.scale = scale;
                Value::Phasor(value)
            }
            Definition::Frequency(frequency) => {
                let format = frequency.core().format();
                let (deviation, dfdt) = match format {
                    DataFormat::FixedInteger => (
                        cursor.i16_be()? as f64 * FREQ_SCALE,
                        cursor.i16_be()? as f64 * DFREQ_SCALE,
                    ),
                    DataFormat::FloatingPoint => {
                        (cursor.f32_be()? as f64, cursor.f32_be()? as f64)
                    }
                };
                Value::Frequency(FrequencyValue::new(index, format, deviation, dfdt))
            }
            Definition::Analog(analog) => {
                let format = analog.core().format();
                // Analog scaling is user-defined; the raw reading is kept.
                let reading = match format {
                    DataFormat::FixedInteger => cursor.i16_be()? as f64,
                    DataFormat::FloatingPoint => cursor.f32_be()? as f64,
                };
                Value::Analog(AnalogValue::new(index, format, reading))
            }
            Definition::Digital(_) => Value::Digital(DigitalValue::new(index, cursor.u16_be()?)),
        };

        let parsed = cursor.consumed();
        let mut value = value;
        value.set_parsed_length(parsed);
        Ok((value, parsed))
    })
}

/// Builds the data cell factory bound to a configuration frame: cell `i` of
/// a data frame decodes against configuration cell `i`.
pub fn data_cell_factory(
    configuration: Arc<ConfigurationFrame>,
) -> CellFactory<PrefixFrame, DataCell> {
    let value_factory = default_value_factory();
    Arc::new(move |prefix, cell_index, buffer, start_index| {
        let cell_configuration = configuration.cells.get(cell_index).ok_or_else(|| {
            ParseError::invalid_field(
                "cell index",
                format!(
                    "data frame cell {} has no configuration (configured cells: {})",
                    cell_index,
                    configuration.cells.len()
                ),
            )
        })?;
        DataCell::decode(
            cell_configuration,
            prefix.version,
            buffer,
            start_index,
            &value_factory,
        )
    })
}

/// The frame parsing state for data frames governed by `configuration`.
pub fn data_parsing_state(
    configuration: &Arc<ConfigurationFrame>,
) -> FrameParsingState<PrefixFrame, DataCell> {
    FrameParsingState::new(data_cell_factory(Arc::clone(configuration)))
        .with_cell_count(configuration.cells.len())
}

/// Represents an IEEE C37.118 data frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFrame {
    pub prefix: PrefixFrame,
    pub cells: ChannelCollection<DataCell>,
    pub chk: u16,
    #[serde(skip)]
    state: Option<FrameParsingState<PrefixFrame, DataCell>>,
    #[serde(skip)]
    tag: Option<Tag>,
}

impl DataFrame {
    pub fn new(version: Version, idcode: u16) -> Self {
        DataFrame {
            prefix: PrefixFrame::new(version, FrameType::Data, idcode),
            cells: ChannelCollection::new(),
            chk: 0,
            state: None,
            tag: None,
        }
    }

    /// Decodes a data frame from `buffer[start_index..]` under a parsing
    /// state built from the governing configuration (see
    /// [`data_parsing_state`]).
    pub fn decode(
        buffer: &[u8],
        start_index: usize,
        state: FrameParsingState<PrefixFrame, DataCell>,
    ) -> Result<(Self, usize), ParseError> {
        let (prefix, _) = PrefixFrame::decode(buffer, start_index)?;
        match prefix.frame_type()? {
            FrameType::Data => {}
            other => {
                return Err(ParseError::InvalidFrameType {
                    message: format!("expected a data frame, got {}", other),
                })
            }
        }

        let declared = prefix.framesize as usize;
        let span = super::config::frame_span(buffer, start_index, declared)?;
        if state.validate_checksum {
            validate_trailing(&CrcCcitt, span)?;
        }
        debug!(
            idcode = prefix.idcode,
            framesize = declared,
            cells = state.cell_count,
            "decoding data frame"
        );

        let body_end = start_index + declared - CHECKSUM_LENGTH;
        let body = &buffer[..body_end];
        let (cells_vec, cells_length) =
            decode_cells(&prefix, &state, body, start_index + PREFIX_LENGTH)?;

        let chk = u16::from_be_bytes([buffer[body_end], buffer[body_end + 1]]);
        let actual = PREFIX_LENGTH + cells_length + CHECKSUM_LENGTH;
        let length = reconcile_length(declared, actual, state.trust_header_length)?;

        let mut cells = ChannelCollection::with_bound(state.cell_count.saturating_sub(1));
        for cell in cells_vec {
            cells.try_push(cell)?;
        }

        let mut state = state;
        state.set_parsed_binary_length(length);

        Ok((
            DataFrame {
                prefix,
                cells,
                chk,
                state: Some(state),
                tag: None,
            },
            length,
        ))
    }

    fn computed_length(&self) -> usize {
        PREFIX_LENGTH
            + self.cells.iter().map(|cell| cell.data_length()).sum::<usize>()
            + CHECKSUM_LENGTH
    }
}

impl Channel for DataFrame {
    fn decoded_length(&self) -> usize {
        self.state
            .as_ref()
            .map(|state| state.parsed_binary_length())
            .unwrap_or_else(|| self.computed_length())
    }

    fn append_attributes(&self, attributes: &mut Attributes) {
        attributes.push("kind", self.kind());
        attributes.push("id code", self.prefix.idcode);
        attributes.push("cells", self.cells.len());
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

impl StatefulChannel for DataFrame {
    type State = FrameParsingState<PrefixFrame, DataCell>;

    fn parsing_state(&self) -> Option<&Self::State> {
        self.state.as_ref()
    }

    fn replace_parsing_state(&mut self, state: Self::State) -> Option<Self::State> {
        self.state.replace(state)
    }
}

impl Frame for DataFrame {
    fn kind(&self) -> FrameKind {
        FrameKind::Data
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
        prefix.sync = create_sync(prefix.version, FrameType::Data);

        let mut result = Vec::with_capacity(frame_size);
        result.extend_from_slice(&prefix.encode());
        for cell in &self.cells {
            result.extend_from_slice(&cell.encode());
        }
        append_trailing(&CrcCcitt, &mut result);
        result
    }
}
