//! # Channel Definitions
//!
//! Static, per-configuration descriptions of measurement channels. A
//! definition is decoded once as part of a configuration frame and reused by
//! every data frame that follows: it carries the label, scaling, offset, and
//! data format a value needs for interpretation. Four specializations exist
//! (phasor, analog, frequency, digital), expressed as a closed enum so the
//! decode algorithm can treat any definition uniformly.
//!
//! Digital definitions are locked to offset 0, scaling 1, and fixed-integer
//! format; any attempt to set a different offset or scaling fails with
//! `InvalidFieldValue` rather than silently clamping.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::ParseError;

use super::state::BaseParsingState;
use super::{check_label, Attributes, Channel, ChannelMeta, Tag};

/// Longest label a channel definition may carry, per the 16-byte channel
/// name fields used by IEEE C37.118 and its relatives.
pub const MAX_LABEL_LENGTH: usize = 16;

/// Largest legal integer scaling value: conversion factors are carried in
/// 24-bit words.
pub const MAX_SCALING_VALUE: u32 = 0x00FF_FFFF;

/// Wire length of one conversion-factor word.
pub const CONVERSION_FACTOR_LENGTH: usize = 4;

/// Scale applied per scaling-value bit, in 1e-5 primary units per bit
/// (IEEE C37.118-2011 Table 9).
pub const SCALE_PER_BIT: f64 = 1e-5;

/// Number of bit labels carried by one digital definition word.
pub const DIGITAL_BIT_COUNT: usize = 16;

/// The wire representation of a channel's numeric payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    FixedInteger,
    FloatingPoint,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::FixedInteger => write!(f, "fixed integer"),
            DataFormat::FloatingPoint => write!(f, "floating point"),
        }
    }
}

/// Coordinate system of a phasor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateFormat {
    Rectangular,
    Polar,
}

impl fmt::Display for CoordinateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateFormat::Rectangular => write!(f, "rectangular"),
            CoordinateFormat::Polar => write!(f, "polar"),
        }
    }
}

/// Preferred angle interpretation for a phasor channel. The wire always
/// carries radians; the definition records how callers want angles reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngleFormat {
    Radians,
    Degrees,
}

impl fmt::Display for AngleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AngleFormat::Radians => write!(f, "radians"),
            AngleFormat::Degrees => write!(f, "degrees"),
        }
    }
}

/// Electrical quantity a phasor channel measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhasorKind {
    Voltage,
    Current,
}

impl fmt::Display for PhasorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhasorKind::Voltage => write!(f, "voltage"),
            PhasorKind::Current => write!(f, "current"),
        }
    }
}

/// Sub-kind of an analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalogKind {
    SinglePointOnWave,
    Rms,
    Peak,
}

impl fmt::Display for AnalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalogKind::SinglePointOnWave => write!(f, "single point-on-wave"),
            AnalogKind::Rms => write!(f, "RMS"),
            AnalogKind::Peak => write!(f, "peak"),
        }
    }
}

/// Nominal line frequency of the measured system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NominalFrequency {
    Hz50,
    Hz60,
}

impl NominalFrequency {
    pub fn hertz(&self) -> f64 {
        match self {
            NominalFrequency::Hz50 => 50.0,
            NominalFrequency::Hz60 => 60.0,
        }
    }
}

impl Default for NominalFrequency {
    fn default() -> Self {
        NominalFrequency::Hz60
    }
}

impl fmt::Display for NominalFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NominalFrequency::Hz50 => write!(f, "50 Hz"),
            NominalFrequency::Hz60 => write!(f, "60 Hz"),
        }
    }
}

/// Discriminates the four channel kinds when a factory must be told which
/// definition to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Phasor,
    Analog,
    Digital,
    Frequency,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Phasor => write!(f, "phasor"),
            ChannelKind::Analog => write!(f, "analog"),
            ChannelKind::Digital => write!(f, "digital"),
            ChannelKind::Frequency => write!(f, "frequency"),
        }
    }
}

/// Fields shared by every definition specialization: bounded label, channel
/// index, offset, 24-bit integer scaling, and data format. The conversion
/// factor is derived as `scaling * SCALE_PER_BIT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionCore {
    label: String,
    index: u16,
    offset: f64,
    scaling: u32,
    format: DataFormat,
    #[serde(skip)]
    meta: ChannelMeta,
}

impl DefinitionCore {
    pub fn new(label: impl Into<String>, index: u16, format: DataFormat) -> Result<Self, ParseError> {
        let label = label.into();
        check_label("label", &label, MAX_LABEL_LENGTH)?;
        Ok(DefinitionCore {
            label,
            index,
            offset: 0.0,
            scaling: 1,
            format,
            meta: ChannelMeta::default(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn scaling(&self) -> u32 {
        self.scaling
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Primary units represented by one scaling-value bit.
    pub fn scale_per_bit(&self) -> f64 {
        SCALE_PER_BIT
    }

    /// Factor applied to fixed-integer values to reach primary units.
    pub fn conversion_factor(&self) -> f64 {
        self.scaling as f64 * SCALE_PER_BIT
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<(), ParseError> {
        let label = label.into();
        check_label("label", &label, MAX_LABEL_LENGTH)?;
        self.label = label;
        Ok(())
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    pub fn set_scaling(&mut self, scaling: u32) -> Result<(), ParseError> {
        if scaling > MAX_SCALING_VALUE {
            return Err(ParseError::invalid_field(
                "scaling",
                format!("{} exceeds 24-bit maximum {}", scaling, MAX_SCALING_VALUE),
            ));
        }
        self.scaling = scaling;
        Ok(())
    }

    pub fn set_format(&mut self, format: DataFormat) {
        self.format = format;
    }

    /// Derives the scaling value from a conversion factor in primary units.
    pub fn set_conversion_factor(&mut self, factor: f64) -> Result<(), ParseError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(ParseError::invalid_field(
                "conversion factor",
                format!("{} is not a legal factor", factor),
            ));
        }
        self.set_scaling((factor / SCALE_PER_BIT).round() as u32)
    }

    fn append_attributes(&self, attributes: &mut Attributes) {
        attributes.push("label", &self.label);
        attributes.push("index", self.index);
        attributes.push("offset", self.offset);
        attributes.push("scaling", self.scaling);
        attributes.push("conversion factor", self.conversion_factor());
        attributes.push("format", self.format);
    }

    fn meta(&self) -> &ChannelMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ChannelMeta {
        &mut self.meta
    }
}

/// Definition of one phasor channel: coordinate and angle formats, the
/// measured quantity, and (for current phasors) an optional non-owning index
/// of the paired voltage-reference phasor definition within the same cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasorDefinition {
    core: DefinitionCore,
    pub coordinate_format: CoordinateFormat,
    pub angle_format: AngleFormat,
    pub kind: PhasorKind,
    pub voltage_reference: Option<u16>,
}

impl PhasorDefinition {
    pub fn new(label: impl Into<String>, index: u16) -> Result<Self, ParseError> {
        Ok(PhasorDefinition {
            core: DefinitionCore::new(label, index, DataFormat::FixedInteger)?,
            coordinate_format: CoordinateFormat::Rectangular,
            angle_format: AngleFormat::Radians,
            kind: PhasorKind::Voltage,
            voltage_reference: None,
        })
    }

    pub fn core(&self) -> &DefinitionCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut DefinitionCore {
        &mut self.core
    }
}

/// Definition of one analog channel. `user_scale` carries the signed,
/// user-defined wire scale as transmitted; the core scaling holds its
/// magnitude for conversion-factor accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogDefinition {
    core: DefinitionCore,
    pub kind: AnalogKind,
    pub user_scale: i32,
}

impl AnalogDefinition {
    pub fn new(label: impl Into<String>, index: u16) -> Result<Self, ParseError> {
        Ok(AnalogDefinition {
            core: DefinitionCore::new(label, index, DataFormat::FixedInteger)?,
            kind: AnalogKind::SinglePointOnWave,
            user_scale: 1,
        })
    }

    pub fn core(&self) -> &DefinitionCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut DefinitionCore {
        &mut self.core
    }
}

/// Definition of the frequency channel: nominal line frequency plus the
/// offset and scaling applied to df/dt readings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyDefinition {
    core: DefinitionCore,
    pub nominal_frequency: NominalFrequency,
    pub dfdt_offset: f64,
    pub dfdt_scaling: u32,
}

impl FrequencyDefinition {
    pub fn new(index: u16, nominal_frequency: NominalFrequency) -> Self {
        let core = DefinitionCore {
            label: "FREQ".to_string(),
            index,
            offset: 0.0,
            scaling: 1,
            format: DataFormat::FixedInteger,
            meta: ChannelMeta::default(),
        };
        FrequencyDefinition {
            core,
            nominal_frequency,
            dfdt_offset: 0.0,
            dfdt_scaling: 100,
        }
    }

    pub fn core(&self) -> &DefinitionCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut DefinitionCore {
        &mut self.core
    }
}

/// Definition of one digital status word: sixteen bit labels plus the
/// normal-status and valid-inputs masks.
///
/// Digital channels carry raw bit flags, so the scale/offset contract is
/// fixed: offset 0, scaling 1, fixed-integer format. The setters enforce
/// this rather than clamping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalDefinition {
    core: DefinitionCore,
    pub bit_labels: Vec<String>,
    pub normal_status_mask: u16,
    pub valid_inputs_mask: u16,
}

impl DigitalDefinition {
    pub fn new(label: impl Into<String>, index: u16) -> Result<Self, ParseError> {
        Ok(DigitalDefinition {
            core: DefinitionCore::new(label, index, DataFormat::FixedInteger)?,
            bit_labels: Vec::new(),
            normal_status_mask: 0,
            valid_inputs_mask: 0,
        })
    }

    pub fn core(&self) -> &DefinitionCore {
        &self.core
    }

    /// Offset is fixed at zero for digital definitions; any other value is
    /// rejected at the point of assignment.
    pub fn set_offset(&mut self, offset: f64) -> Result<(), ParseError> {
        if offset != 0.0 {
            return Err(ParseError::invalid_field(
                "offset",
                format!("digital definitions are fixed at offset 0, got {}", offset),
            ));
        }
        self.core.set_offset(offset);
        Ok(())
    }

    /// Scaling is fixed at one for digital definitions; any other value is
    /// rejected at the point of assignment.
    pub fn set_scaling(&mut self, scaling: u32) -> Result<(), ParseError> {
        if scaling != 1 {
            return Err(ParseError::invalid_field(
                "scaling",
                format!("digital definitions are fixed at scaling 1, got {}", scaling),
            ));
        }
        self.core.set_scaling(scaling)
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<(), ParseError> {
        self.core.set_label(label)
    }
}

/// One channel definition of any kind. The closed variant set lets protocol
/// code and diagnostics treat definitions uniformly without virtual-dispatch
/// layering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Definition {
    Phasor(PhasorDefinition),
    Analog(AnalogDefinition),
    Frequency(FrequencyDefinition),
    Digital(DigitalDefinition),
}

impl Definition {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Definition::Phasor(_) => ChannelKind::Phasor,
            Definition::Analog(_) => ChannelKind::Analog,
            Definition::Frequency(_) => ChannelKind::Frequency,
            Definition::Digital(_) => ChannelKind::Digital,
        }
    }

    pub fn core(&self) -> &DefinitionCore {
        match self {
            Definition::Phasor(definition) => definition.core(),
            Definition::Analog(definition) => definition.core(),
            Definition::Frequency(definition) => definition.core(),
            Definition::Digital(definition) => definition.core(),
        }
    }

    fn core_mut(&mut self) -> &mut DefinitionCore {
        match self {
            Definition::Phasor(definition) => &mut definition.core,
            Definition::Analog(definition) => &mut definition.core,
            Definition::Frequency(definition) => &mut definition.core,
            Definition::Digital(definition) => &mut definition.core,
        }
    }

    pub fn label(&self) -> &str {
        self.core().label()
    }

    pub fn index(&self) -> u16 {
        self.core().index()
    }

    pub fn format(&self) -> DataFormat {
        self.core().format()
    }

    pub fn as_phasor(&self) -> Option<&PhasorDefinition> {
        match self {
            Definition::Phasor(definition) => Some(definition),
            _ => None,
        }
    }

    pub fn as_frequency(&self) -> Option<&FrequencyDefinition> {
        match self {
            Definition::Frequency(definition) => Some(definition),
            _ => None,
        }
    }

    pub fn as_digital(&self) -> Option<&DigitalDefinition> {
        match self {
            Definition::Digital(definition) => Some(definition),
            _ => None,
        }
    }

    /// Records the byte count the decoder consumed for this definition.
    pub fn set_parsed_length(&mut self, length: usize) {
        self.core_mut().meta_mut().state = Some(BaseParsingState::new(length));
    }

    /// Wire length assumed when no decode has recorded one: the bounded
    /// label image plus one conversion-factor word, or the full bit-label
    /// block for digital words, or the nominal-frequency word.
    fn nominal_length(&self) -> usize {
        match self {
            Definition::Phasor(_) | Definition::Analog(_) => {
                MAX_LABEL_LENGTH + CONVERSION_FACTOR_LENGTH
            }
            Definition::Digital(_) => DIGITAL_BIT_COUNT * MAX_LABEL_LENGTH + CONVERSION_FACTOR_LENGTH,
            Definition::Frequency(_) => 2,
        }
    }
}

impl Channel for Definition {
    fn decoded_length(&self) -> usize {
        self.core()
            .meta()
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
            Definition::Phasor(definition) => {
                attributes.push("kind", "phasor");
                attributes.push("coordinate format", definition.coordinate_format);
                attributes.push("angle format", definition.angle_format);
                attributes.push("phasor kind", definition.kind);
                if let Some(reference) = definition.voltage_reference {
                    attributes.push("voltage reference", reference);
                }
            }
            Definition::Analog(definition) => {
                attributes.push("kind", "analog");
                attributes.push("analog kind", definition.kind);
            }
            Definition::Frequency(definition) => {
                attributes.push("kind", "frequency");
                attributes.push("nominal frequency", definition.nominal_frequency);
            }
            Definition::Digital(definition) => {
                attributes.push("kind", "digital");
                attributes.push("normal status mask", definition.normal_status_mask);
                attributes.push("valid inputs mask", definition.valid_inputs_mask);
            }
        }
    }

    fn tag(&self) -> Option<&Tag> {
        self.core().meta().tag.as_ref()
    }

    fn set_tag(&mut self, tag: Option<Tag>) {
        self.core_mut().meta_mut().tag = tag;
    }
}

// Definitions are identified by (index, label) and ordered by index so
// configuration tooling can sort channels.
impl PartialEq for Definition {
    fn eq(&self, other: &Self) -> bool {
        self.index() == other.index() && self.label() == other.label()
    }
}

impl Eq for Definition {}

impl PartialOrd for Definition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Definition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index()
            .cmp(&other.index())
            .then_with(|| self.label().cmp(other.label()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_definition_locks_offset_and_scaling() {
        let mut definition = DigitalDefinition::new("BREAKER", 0).unwrap();

        assert!(definition.set_offset(0.0).is_ok());
        assert!(definition.set_scaling(1).is_ok());

        let offset_err = definition.set_offset(2.5).unwrap_err();
        assert!(matches!(
            offset_err,
            ParseError::InvalidFieldValue { field: "offset", .. }
        ));
        let scaling_err = definition.set_scaling(1000).unwrap_err();
        assert!(matches!(
            scaling_err,
            ParseError::InvalidFieldValue { field: "scaling", .. }
        ));

        // The rejected assignments must not have clamped anything.
        assert_eq!(definition.core().offset(), 0.0);
        assert_eq!(definition.core().scaling(), 1);
        assert_eq!(definition.core().format(), DataFormat::FixedInteger);
    }

    #[test]
    fn test_scaling_rejects_values_past_24_bits() {
        let mut core = DefinitionCore::new("VA", 0, DataFormat::FixedInteger).unwrap();
        assert!(core.set_scaling(MAX_SCALING_VALUE).is_ok());
        assert!(core.set_scaling(MAX_SCALING_VALUE + 1).is_err());
    }

    #[test]
    fn test_conversion_factor_round_trip() {
        let mut core = DefinitionCore::new("VA", 0, DataFormat::FixedInteger).unwrap();
        core.set_scaling(915_527).unwrap();
        let factor = core.conversion_factor();
        assert!((factor - 9.15527).abs() < 1e-9);

        let mut other = DefinitionCore::new("VB", 1, DataFormat::FixedInteger).unwrap();
        other.set_conversion_factor(factor).unwrap();
        assert_eq!(other.scaling(), 915_527);
    }

    #[test]
    fn test_label_bound_enforced() {
        assert!(PhasorDefinition::new("VA", 0).is_ok());
        assert!(PhasorDefinition::new("A-LABEL-THAT-IS-FAR-TOO-LONG", 0).is_err());
    }

    #[test]
    fn test_ordering_and_equality() {
        let a = Definition::Phasor(PhasorDefinition::new("VA", 0).unwrap());
        let b = Definition::Phasor(PhasorDefinition::new("VB", 1).unwrap());
        let a_again = Definition::Analog(AnalogDefinition::new("VA", 0).unwrap());

        assert!(a < b);
        // Identity is (index, label), not the variant kind.
        assert_eq!(a, a_again);

        let mut channels = vec![b.clone(), a.clone()];
        channels.sort();
        assert_eq!(channels[0].label(), "VA");
    }

    #[test]
    fn test_attributes_append_after_base() {
        let definition = Definition::Phasor(PhasorDefinition::new("VA", 3).unwrap());
        let attributes = definition.attributes();

        // Base contribution comes first, specialization fields after.
        let names: Vec<&str> = attributes.iter().map(|(n, _)| n).collect();
        assert_eq!(names[0], "label");
        assert!(names.contains(&"coordinate format"));
        assert_eq!(attributes.get("index"), Some("3"));
    }
}
