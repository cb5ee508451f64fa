//! # IEEE C37.118 Test Frame Generator
//!
//! Utilities for generating synthetic IEEE C37.118 configuration and data
//! frames for tests and benchmarks. Generated frames are random but valid:
//! they encode to well-formed wire images that decode back through the
//! standard factories.
//!
//! ## Key Components
//!
//! - `random_configuration_frame`: A configuration frame with the given PMU
//!   count, version, and format flags.
//! - `random_data_frame`: A data frame consistent with a given
//!   configuration.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::channel::definition::{
    AnalogDefinition, AnalogKind, DataFormat, Definition, DigitalDefinition, FrequencyDefinition,
    NominalFrequency, PhasorDefinition, PhasorKind,
};
use crate::channel::value::{DigitalValue, FrequencyValue, PhasorValue, Value};
use crate::error::ParseError;

use super::common::{StatField, Version};
use super::config::{ConfigurationCell, ConfigurationFrame, FormatFlags};
use super::data::DataCell;
use super::data::DataFrame;
use super::units::DataRate;

const PHASORS_PER_PMU: usize = 4;
const ANALOGS_PER_PMU: usize = 3;
const DIGITALS_PER_PMU: usize = 1;

/// Voltage PHUNIT scale used by the generator (10⁻⁵ V per bit).
const VOLTAGE_SCALE: u32 = 915_527;

/// Current PHUNIT scale used by the generator (10⁻⁵ A per bit).
const CURRENT_SCALE: u32 = 45_776;

fn now() -> (u32, u32) {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => (elapsed.as_secs() as u32, elapsed.subsec_micros()),
        Err(_) => (0, 0),
    }
}

/// Generates a configuration frame with `num_pmus` cells of four phasors
/// (three voltage, one current), three analogs, and one digital word each.
pub fn random_configuration_frame(
    num_pmus: usize,
    version: Version,
    polar: bool,
    use_float: bool,
) -> Result<ConfigurationFrame, ParseError> {
    let mut rng = rand::rng();
    let mut frame = ConfigurationFrame::new(version, 2, 60, 1_000_000);
    frame.data_rate = DataRate::per_second(30);
    let (soc, fracsec) = now();
    frame.prefix.soc = soc;
    frame.prefix.set_fracsec(fracsec)?;

    let format = FormatFlags {
        polar_phasors: polar,
        float_phasors: use_float,
        float_analogs: use_float,
        float_frequency: use_float,
    };

    for station in 0..num_pmus {
        let mut cell = ConfigurationCell::new(format!("STATION{:02}", station), station as u16 + 1)?;
        cell.format = format;
        cell.cfgcnt = rng.random_range(0..100);

        for channel in 0..PHASORS_PER_PMU {
            let mut definition = PhasorDefinition::new(format!("PH_{:02}", channel), channel as u16)?;
            definition.coordinate_format = format.coordinate_format();
            definition.core_mut().set_format(format.phasor_format());
            if channel == PHASORS_PER_PMU - 1 {
                definition.kind = PhasorKind::Current;
                definition.core_mut().set_scaling(CURRENT_SCALE)?;
            } else {
                definition.core_mut().set_scaling(VOLTAGE_SCALE)?;
            }
            cell.phasor_definitions.try_push(Definition::Phasor(definition))?;
        }

        for channel in 0..ANALOGS_PER_PMU {
            let index = (PHASORS_PER_PMU + channel) as u16;
            let mut definition = AnalogDefinition::new(format!("AN_{:02}", channel), index)?;
            definition.kind = match channel % 3 {
                0 => AnalogKind::SinglePointOnWave,
                1 => AnalogKind::Rms,
                _ => AnalogKind::Peak,
            };
            definition.core_mut().set_format(format.analog_format());
            cell.analog_definitions.try_push(Definition::Analog(definition))?;
        }

        for channel in 0..DIGITALS_PER_PMU {
            let index = (PHASORS_PER_PMU + ANALOGS_PER_PMU + channel) as u16;
            let mut definition = DigitalDefinition::new(format!("DG{}", channel + 1), index)?;
            definition.bit_labels = (0..16).map(|bit| format!("DG_{:02}", bit)).collect();
            definition.valid_inputs_mask = 0xFFFF;
            cell.digital_definitions.try_push(Definition::Digital(definition))?;
        }

        let mut frequency = FrequencyDefinition::new(cell.frequency_index(), NominalFrequency::Hz60);
        frequency.core_mut().set_format(format.frequency_format());
        cell.frequency_definition = frequency;

        frame.cells.try_push(cell)?;
    }

    Ok(frame)
}

/// Generates a data frame whose cells and value layouts match
/// `configuration`, with measurements jittered around nominal operating
/// points.
pub fn random_data_frame(configuration: &ConfigurationFrame) -> Result<DataFrame, ParseError> {
    let mut rng = rand::rng();
    let mut frame = DataFrame::new(configuration.prefix.version, configuration.prefix.idcode);
    let (soc, fracsec) = now();
    frame.prefix.soc = soc;
    frame.prefix.set_fracsec(fracsec)?;

    for cell_configuration in &configuration.cells {
        let version = configuration.prefix.version;
        let mut cell = DataCell::new(cell_configuration, version);
        cell.stat = StatField::from_raw(0x0000, version);

        for definition in &cell_configuration.phasor_definitions {
            let phasor = match definition.as_phasor() {
                Some(phasor) => phasor,
                None => continue,
            };
            let scale = phasor.core().conversion_factor();
            let format = phasor.core().format();
            // Jitter 16-bit counts so fixed-integer layouts stay exact.
            let counts = rng.random_range(9_000..11_000) as f64;
            let angle = (rng.random_range(-3_141..3_141) as f64) * 1e-3;
            let mut value = PhasorValue::new(
                phasor.core().index(),
                format,
                match format {
                    DataFormat::FixedInteger => counts * scale,
                    DataFormat::FloatingPoint => counts as f32 as f64 * scale,
                },
                angle,
            );
            value.coordinate_format = phasor.coordinate_format;
            value.scale = scale;
            cell.phasor_values.try_push(Value::Phasor(value))?;
        }

        cell.frequency_value = FrequencyValue::new(
            cell_configuration.frequency_index(),
            cell_configuration.format.frequency_format(),
            (rng.random_range(-50..50) as f64) * 1e-3,
            (rng.random_range(-10..10) as f64) * 1e-2,
        );

        for definition in &cell_configuration.analog_definitions {
            let value = crate::channel::value::AnalogValue::new(
                definition.index(),
                definition.format(),
                rng.random_range(-1_000..1_000) as f64,
            );
            cell.analog_values.try_push(Value::Analog(value))?;
        }
        for definition in &cell_configuration.digital_definitions {
            cell.digital_values
                .try_push(Value::Digital(DigitalValue::new(
                    definition.index(),
                    rng.random::<u16>(),
                )))?;
        }

        frame.cells.try_push(cell)?;
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::frame::Frame;
    use crate::channel::Channel;

    #[test]
    fn test_generated_configuration_is_well_formed() {
        let frame = random_configuration_frame(3, Version::V2011, false, false).unwrap();
        assert_eq!(frame.cells.len(), 3);
        for cell in &frame.cells {
            assert_eq!(cell.phasor_count(), PHASORS_PER_PMU);
            assert_eq!(cell.analog_count(), ANALOGS_PER_PMU);
            assert_eq!(cell.digital_count(), DIGITALS_PER_PMU);
        }
        assert_eq!(frame.encode().len(), frame.decoded_length());
    }

    #[test]
    fn test_generated_data_matches_configuration_layout() {
        let configuration = random_configuration_frame(2, Version::V2011, true, true).unwrap();
        let data = random_data_frame(&configuration).unwrap();
        assert_eq!(data.cells.len(), 2);
        assert_eq!(data.encode().len(), configuration.data_frame_length());
    }
}
