//! # IEEE C37.118 Conversion Factors
//!
//! Wire forms of the per-channel conversion factors carried by configuration
//! frames, as defined in IEEE C37.118-2005, IEEE C37.118.2-2011, and IEEE
//! C37.118.2-2024: PHUNIT, ANUNIT, DIGUNIT, FNOM, and DATA_RATE. Each type
//! decodes from and encodes to its fixed-width big-endian image and converts
//! to or from the corresponding channel definition fields.
//!
//! ## Key Components
//!
//! - `PhasorUnits`: Voltage/current flag plus a 24-bit scale in 10⁻⁵ V or A
//!   per bit (PHUNIT, Table 9 of IEEE C37.118.2-2011).
//! - `AnalogUnits`: Measurement type plus a signed 24-bit user-defined scale
//!   (ANUNIT).
//! - `DigitalUnits`: Normal-status and valid-inputs mask words (DIGUNIT).
//! - `nominal_frequency` wire helpers: the FNOM word (bit 0: 1 = 50 Hz,
//!   0 = 60 Hz).
//! - `DataRate`: Frames per second (positive) or seconds per frame
//!   (negative).

use serde::{Deserialize, Serialize};

use crate::channel::cursor::ByteCursor;
use crate::channel::definition::{AnalogKind, NominalFrequency, PhasorKind};
use crate::error::ParseError;

/// Wire length of one PHUNIT or ANUNIT word.
pub const UNIT_LENGTH: usize = 4;

/// Wire length of one DIGUNIT mask pair.
pub const DIGITAL_UNIT_LENGTH: usize = 4;

/// Defines scaling for one phasor channel (the PHUNIT word).
///
/// # Fields
///
/// * `is_current`: `true` for current phasors, `false` for voltage.
/// * `scale_factor`: Unsigned 24-bit scale in 10⁻⁵ V or A per bit, applied
///   to 16-bit integer data and ignored for floating-point data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasorUnits {
    pub is_current: bool,
    pub scale_factor: u32,
}

impl PhasorUnits {
    pub fn new(kind: PhasorKind, scale_factor: u32) -> Self {
        PhasorUnits {
            is_current: kind == PhasorKind::Current,
            scale_factor,
        }
    }

    /// Decodes a PHUNIT word from `buffer[start_index..]`.
    pub fn decode(buffer: &[u8], start_index: usize) -> Result<(Self, usize), ParseError> {
        let mut cursor = ByteCursor::new(
            buffer,
            start_index,
            buffer.len().saturating_sub(start_index).min(UNIT_LENGTH),
        )?;
        let flag = cursor.u8()?;
        let scale_factor = cursor.u24_be()?;
        Ok((
            PhasorUnits {
                is_current: flag == 1,
                scale_factor,
            },
            cursor.consumed(),
        ))
    }

    /// Serializes to the 4-byte PHUNIT image.
    pub fn encode(&self) -> [u8; UNIT_LENGTH] {
        let mut bytes = [0u8; UNIT_LENGTH];
        if self.is_current {
            bytes[0] = 1;
        }
        bytes[1..4].copy_from_slice(&self.scale_factor.to_be_bytes()[1..4]);
        bytes
    }

    pub fn kind(&self) -> PhasorKind {
        if self.is_current {
            PhasorKind::Current
        } else {
            PhasorKind::Voltage
        }
    }
}

/// Defines scaling for one analog channel (the ANUNIT word).
///
/// # Fields
///
/// * `kind`: The analog measurement type (byte 0: 0 = single point-on-wave,
///   1 = RMS, 2 = peak).
/// * `scale_factor`: Signed 24-bit user-defined scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalogUnits {
    pub kind: AnalogKind,
    pub scale_factor: i32,
}

impl AnalogUnits {
    pub fn new(kind: AnalogKind, scale_factor: i32) -> Self {
        AnalogUnits { kind, scale_factor }
    }

    /// Decodes an ANUNIT word from `buffer[start_index..]`.
    ///
    /// # Returns
    ///
    /// * `Ok((AnalogUnits, 4))`: The parsed units and bytes consumed.
    /// * `Err(ParseError::InvalidFormat)`: On a reserved measurement type.
    pub fn decode(buffer: &[u8], start_index: usize) -> Result<(Self, usize), ParseError> {
        let mut cursor = ByteCursor::new(
            buffer,
            start_index,
            buffer.len().saturating_sub(start_index).min(UNIT_LENGTH),
        )?;
        let kind = match cursor.u8()? {
            0 => AnalogKind::SinglePointOnWave,
            1 => AnalogKind::Rms,
            2 => AnalogKind::Peak,
            code => {
                return Err(ParseError::InvalidFormat {
                    message: format!("reserved analog measurement type {}", code),
                })
            }
        };
        let scale_factor = cursor.i24_be()?;
        Ok((AnalogUnits { kind, scale_factor }, cursor.consumed()))
    }

    /// Serializes to the 4-byte ANUNIT image.
    pub fn encode(&self) -> [u8; UNIT_LENGTH] {
        let mut bytes = [0u8; UNIT_LENGTH];
        bytes[0] = match self.kind {
            AnalogKind::SinglePointOnWave => 0,
            AnalogKind::Rms => 1,
            AnalogKind::Peak => 2,
        };
        bytes[1..4].copy_from_slice(&self.scale_factor.to_be_bytes()[1..4]);
        bytes
    }
}

/// Mask words for one digital status word (the DIGUNIT pair).
///
/// The first word indicates the normal status of the digital inputs: XORing
/// it with the status word yields zero in the normal state. The second word
/// marks the currently valid inputs with set bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalUnits {
    pub normal_status_mask: u16,
    pub valid_inputs_mask: u16,
}

impl DigitalUnits {
    pub fn new(normal_status_mask: u16, valid_inputs_mask: u16) -> Self {
        DigitalUnits {
            normal_status_mask,
            valid_inputs_mask,
        }
    }

    /// Decodes a DIGUNIT pair from `buffer[start_index..]`.
    pub fn decode(buffer: &[u8], start_index: usize) -> Result<(Self, usize), ParseError> {
        let mut cursor = ByteCursor::new(
            buffer,
            start_index,
            buffer
                .len()
                .saturating_sub(start_index)
                .min(DIGITAL_UNIT_LENGTH),
        )?;
        let normal_status_mask = cursor.u16_be()?;
        let valid_inputs_mask = cursor.u16_be()?;
        Ok((
            DigitalUnits {
                normal_status_mask,
                valid_inputs_mask,
            },
            cursor.consumed(),
        ))
    }

    /// Serializes to the 4-byte DIGUNIT image.
    pub fn encode(&self) -> [u8; DIGITAL_UNIT_LENGTH] {
        let mut bytes = [0u8; DIGITAL_UNIT_LENGTH];
        bytes[0..2].copy_from_slice(&self.normal_status_mask.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.valid_inputs_mask.to_be_bytes());
        bytes
    }
}

/// Decodes the FNOM word: bit 0 set means 50 Hz, clear means 60 Hz.
pub fn decode_nominal_frequency(
    buffer: &[u8],
    start_index: usize,
) -> Result<(NominalFrequency, usize), ParseError> {
    let mut cursor = ByteCursor::new(
        buffer,
        start_index,
        buffer.len().saturating_sub(start_index).min(2),
    )?;
    let word = cursor.u16_be()?;
    let nominal = if word & 0x0001 != 0 {
        NominalFrequency::Hz50
    } else {
        NominalFrequency::Hz60
    };
    Ok((nominal, cursor.consumed()))
}

/// Serializes the FNOM word.
pub fn encode_nominal_frequency(nominal: NominalFrequency) -> [u8; 2] {
    match nominal {
        NominalFrequency::Hz50 => [0x00, 0x01],
        NominalFrequency::Hz60 => [0x00, 0x00],
    }
}

/// Defines the data frame transmission rate (the DATA_RATE word).
///
/// Positive values are frames per second; negative values are seconds per
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRate {
    pub value: i16,
}

impl DataRate {
    pub fn per_second(frames: i16) -> Self {
        DataRate { value: frames }
    }

    /// Decodes the DATA_RATE word from `buffer[start_index..]`.
    pub fn decode(buffer: &[u8], start_index: usize) -> Result<(Self, usize), ParseError> {
        let mut cursor = ByteCursor::new(
            buffer,
            start_index,
            buffer.len().saturating_sub(start_index).min(2),
        )?;
        let value = cursor.i16_be()?;
        Ok((DataRate { value }, cursor.consumed()))
    }

    pub fn encode(&self) -> [u8; 2] {
        self.value.to_be_bytes()
    }

    /// The rate in frames per second, regardless of sign convention.
    pub fn frequency(&self) -> f64 {
        if self.value >= 0 {
            self.value as f64
        } else {
            1.0 / (-self.value as f64)
        }
    }
}

impl Default for DataRate {
    fn default() -> Self {
        DataRate { value: 30 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phasor_units_decode() {
        // Voltage channel, 915527 counts; current channel, 45776 counts.
        let phunit1: [u8; 4] = [0x00, 0x0D, 0xF8, 0x47];
        let phunit2: [u8; 4] = [0x01, 0x00, 0xB2, 0xD0];

        let (p1, n1) = PhasorUnits::decode(&phunit1, 0).unwrap();
        let (p2, n2) = PhasorUnits::decode(&phunit2, 0).unwrap();

        assert_eq!((n1, n2), (4, 4));
        assert_eq!(p1.kind(), PhasorKind::Voltage);
        assert_eq!(p2.kind(), PhasorKind::Current);
        assert_eq!(p1.scale_factor, 915_527);
        assert_eq!(p2.scale_factor, 45_776);

        assert_eq!(p1.encode(), phunit1);
        assert_eq!(p2.encode(), phunit2);
    }

    #[test]
    fn test_analog_units_signed_scale() {
        let anunit: [u8; 4] = [0x01, 0xFF, 0xFF, 0xFE];
        let (units, _) = AnalogUnits::decode(&anunit, 0).unwrap();
        assert_eq!(units.kind, AnalogKind::Rms);
        assert_eq!(units.scale_factor, -2);
        assert_eq!(units.encode(), anunit);

        let reserved: [u8; 4] = [0x07, 0x00, 0x00, 0x01];
        assert!(matches!(
            AnalogUnits::decode(&reserved, 0),
            Err(ParseError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_digital_units_round_trip() {
        let units = DigitalUnits::new(0x00FF, 0x0F0F);
        let bytes = units.encode();
        assert_eq!(bytes, [0x00, 0xFF, 0x0F, 0x0F]);
        let (decoded, consumed) = DigitalUnits::decode(&bytes, 0).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(decoded, units);
    }

    #[test]
    fn test_nominal_frequency_word() {
        let (fifty, _) = decode_nominal_frequency(&[0x00, 0x01], 0).unwrap();
        let (sixty, _) = decode_nominal_frequency(&[0x00, 0x00], 0).unwrap();
        assert_eq!(fifty, NominalFrequency::Hz50);
        assert_eq!(sixty, NominalFrequency::Hz60);
        assert_eq!(encode_nominal_frequency(fifty), [0x00, 0x01]);
        assert_eq!(encode_nominal_frequency(sixty), [0x00, 0x00]);
    }

    #[test]
    fn test_data_rate_sign_convention() {
        assert_eq!(DataRate::per_second(30).frequency(), 30.0);
        let (slow, _) = DataRate::decode(&(-5i16).to_be_bytes(), 0).unwrap();
        assert!((slow.frequency() - 0.2).abs() < 1e-12);
        assert_eq!(slow.encode(), (-5i16).to_be_bytes());
    }
}
