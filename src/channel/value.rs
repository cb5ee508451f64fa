//! # Measurement Values
//!
//! Dynamic, per-data-frame measurements. Each value mirrors one definition
//! kind and references its definition by channel index into the owning
//! configuration cell rather than by borrow, so decoded frames stay
//! self-contained and freely movable. Interpretation helpers that need the
//! definition (conversion to primary units, abnormal-bit extraction) take it
//! by reference at the call site.

use serde::{Deserialize, Serialize};

use super::definition::{
    AngleFormat, ChannelKind, CoordinateFormat, DataFormat, DigitalDefinition,
    FrequencyDefinition, PhasorDefinition,
};
use super::state::BaseParsingState;
use super::{Attributes, Channel, ChannelMeta, Tag};

/// Fields shared by every value specialization: the index of the definition
/// this value was decoded against and the wire format it was carried in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueCore {
    definition_index: u16,
    format: DataFormat,
    #[serde(skip)]
    meta: ChannelMeta,
}

impl ValueCore {
    pub fn new(definition_index: u16, format: DataFormat) -> Self {
        ValueCore {
            definition_index,
            format,
            meta: ChannelMeta::default(),
        }
    }

    /// Index of the matching definition within the configuration cell.
    pub fn definition_index(&self) -> u16 {
        self.definition_index
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    fn append_attributes(&self, attributes: &mut Attributes) {
        attributes.push("definition index", self.definition_index);
        attributes.push("format", self.format);
    }
}

/// One phasor measurement, held as magnitude and angle in primary units.
///
/// Both coordinate systems decode into this shape; `real`/`imaginary`
/// project back to rectangular components on demand. The wire coordinate
/// system and the fixed-integer scale are retained so the value can be
/// re-encoded without its definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasorValue {
    core: ValueCore,
    pub magnitude: f64,
    pub angle_radians: f64,
    pub coordinate_format: CoordinateFormat,
    pub scale: f64,
}

impl PhasorValue {
    pub fn new(definition_index: u16, format: DataFormat, magnitude: f64, angle_radians: f64) -> Self {
        PhasorValue {
            core: ValueCore::new(definition_index, format),
            magnitude,
            angle_radians,
            coordinate_format: CoordinateFormat::Rectangular,
            scale: 1.0,
        }
    }

    pub fn core(&self) -> &ValueCore {
        &self.core
    }

    pub fn angle_degrees(&self) -> f64 {
        self.angle_radians.to_degrees()
    }

    /// The angle in the unit the channel's definition asks for.
    pub fn angle(&self, definition: &PhasorDefinition) -> f64 {
        match definition.angle_format {
            AngleFormat::Radians => self.angle_radians,
            AngleFormat::Degrees => self.angle_degrees(),
        }
    }

    pub fn real(&self) -> f64 {
        self.magnitude * self.angle_radians.cos()
    }

    pub fn imaginary(&self) -> f64 {
        self.magnitude * self.angle_radians.sin()
    }

    /// True when the measurement carries no signal at all.
    pub fn is_empty(&self) -> bool {
        self.magnitude == 0.0 && self.angle_radians == 0.0
    }
}

/// One analog measurement in primary units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogValue {
    core: ValueCore,
    pub value: f64,
}

impl AnalogValue {
    pub fn new(definition_index: u16, format: DataFormat, value: f64) -> Self {
        AnalogValue {
            core: ValueCore::new(definition_index, format),
            value,
        }
    }

    pub fn core(&self) -> &ValueCore {
        &self.core
    }
}

/// The frequency/df-dt measurement pair.
///
/// Frequency is held as the deviation from nominal in hertz; the absolute
/// frequency requires the definition's nominal value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyValue {
    core: ValueCore,
    pub deviation_hz: f64,
    pub dfdt_hz_per_second: f64,
}

impl FrequencyValue {
    pub fn new(
        definition_index: u16,
        format: DataFormat,
        deviation_hz: f64,
        dfdt_hz_per_second: f64,
    ) -> Self {
        FrequencyValue {
            core: ValueCore::new(definition_index, format),
            deviation_hz,
            dfdt_hz_per_second,
        }
    }

    pub fn core(&self) -> &ValueCore {
        &self.core
    }

    /// Absolute frequency in hertz, given the channel's definition.
    pub fn frequency(&self, definition: &FrequencyDefinition) -> f64 {
        definition.nominal_frequency.hertz() + self.deviation_hz
    }
}

/// One 16-bit digital status word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalValue {
    core: ValueCore,
    pub word: u16,
}

impl DigitalValue {
    pub fn new(definition_index: u16, word: u16) -> Self {
        DigitalValue {
            core: ValueCore::new(definition_index, DataFormat::FixedInteger),
            word,
        }
    }

    pub fn core(&self) -> &ValueCore {
        &self.core
    }

    pub fn bit(&self, position: u8) -> bool {
        position < 16 && self.word & (1 << position) != 0
    }

    /// Bits that are both valid inputs and differ from their normal status.
    pub fn abnormal_bits(&self, definition: &DigitalDefinition) -> u16 {
        (self.word ^ definition.normal_status_mask) & definition.valid_inputs_mask
    }
}

/// One measurement value of any kind, mirroring the definition variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Phasor(PhasorValue),
    Analog(AnalogValue),
    Frequency(FrequencyValue),
    Digital(DigitalValue),
}

impl Value {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Value::Phasor(_) => ChannelKind::Phasor,
            Value::Analog(_) => ChannelKind::Analog,
            Value::Frequency(_) => ChannelKind::Frequency,
            Value::Digital(_) => ChannelKind::Digital,
        }
    }

    pub fn core(&self) -> &ValueCore {
        match self {
            Value::Phasor(value) => value.core(),
            Value::Analog(value) => value.core(),
            Value::Frequency(value) => value.core(),
            Value::Digital(value) => value.core(),
        }
    }

    fn core_mut(&mut self) -> &mut ValueCore {
        match self {
            Value::Phasor(value) => &mut value.core,
            Value::Analog(value) => &mut value.core,
            Value::Frequency(value) => &mut value.core,
            Value::Digital(value) => &mut value.core,
        }
    }

    pub fn definition_index(&self) -> u16 {
        self.core().definition_index()
    }

    pub fn as_phasor(&self) -> Option<&PhasorValue> {
        match self {
            Value::Phasor(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_analog(&self) -> Option<&AnalogValue> {
        match self {
            Value::Analog(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_frequency(&self) -> Option<&FrequencyValue> {
        match self {
            Value::Frequency(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_digital(&self) -> Option<&DigitalValue> {
        match self {
            Value::Digital(value) => Some(value),
            _ => None,
        }
    }

    /// Records the byte count the decoder consumed for this value.
    pub fn set_parsed_length(&mut self, length: usize) {
        self.core_mut().meta.state = Some(BaseParsingState::new(length));
    }

    /// Wire length assumed when no decode has recorded one, derived from the
    /// kind and carried format.
    fn nominal_length(&self) -> usize {
        match (self.kind(), self.core().format()) {
            (ChannelKind::Phasor, DataFormat::FixedInteger) => 4,
            (ChannelKind::Phasor, DataFormat::FloatingPoint) => 8,
            (ChannelKind::Analog, DataFormat::FixedInteger) => 2,
            (ChannelKind::Analog, DataFormat::FloatingPoint) => 4,
            (ChannelKind::Frequency, DataFormat::FixedInteger) => 4,
            (ChannelKind::Frequency, DataFormat::FloatingPoint) => 8,
            (ChannelKind::Digital, _) => 2,
        }
    }
}

impl Channel for Value {
    fn decoded_length(&self) -> usize {
        self.core()
            .meta
            .state
            .map(|state| {
                use super::state::ParsingState;
                state.parsed_binary_length()
            })
            .unwrap_or_else(|| self.nominal_length())
    }

    fn append_attributes(&self, attributes: &mut Attributes) {
        self.core().append_attributes(attributes);
        match self {
            Value::Phasor(value) => {
                attributes.push("kind", "phasor");
                attributes.push("magnitude", value.magnitude);
                attributes.push("angle (radians)", value.angle_radians);
            }
            Value::Analog(value) => {
                attributes.push("kind", "analog");
                attributes.push("value", value.value);
            }
            Value::Frequency(value) => {
                attributes.push("kind", "frequency");
                attributes.push("deviation (Hz)", value.deviation_hz);
                attributes.push("df/dt (Hz/s)", value.dfdt_hz_per_second);
            }
            Value::Digital(value) => {
                attributes.push("kind", "digital");
                attributes.push("word", format!("{:#06X}", value.word));
            }
        }
    }

    fn tag(&self) -> Option<&Tag> {
        self.core().meta.tag.as_ref()
    }

    fn set_tag(&mut self, tag: Option<Tag>) {
        self.core_mut().meta.tag = tag;
    }
}
