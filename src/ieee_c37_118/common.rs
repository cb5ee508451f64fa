//! # IEEE C37.118 Common Types
//!
//! This module defines the shared vocabulary of the IEEE C37.118 plug-in:
//! standard versions, SYNC-word construction and inspection, the 14-byte
//! prefix carried by every frame, and the STAT field with its
//! version-specific bit layouts. These types are compliant with IEEE
//! C37.118-2005, IEEE C37.118.2-2011, and IEEE C37.118.2-2024.
//!
//! ## Key Components
//!
//! - `Version`: Tracks the standard revision encoded in SYNC bits 3-0.
//! - `FrameType`: The frame type encoded in SYNC bits 6-4.
//! - `create_sync`: Combines the 0xAA leading byte, frame type, and version
//!   into a SYNC word.
//! - `PrefixFrame`: The mandatory 14-byte prefix (SYNC, frame size, ID code,
//!   SOC, time quality, FRACSEC).
//! - `StatField`: The per-PMU STAT word of data frames, with 2005 vs
//!   2011/2024 field placement.
//!
//! ## Usage
//!
//! Every concrete frame type in this crate starts by decoding a
//! `PrefixFrame` and dispatching on its `FrameType`. The prefix carries the
//! declared frame size used for length reconciliation and checksum
//! placement.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::channel::cursor::ByteCursor;
use crate::channel::frame::TimeTag;
use crate::error::ParseError;

/// Byte length of the prefix common to all IEEE C37.118 frames.
pub const PREFIX_LENGTH: usize = 14;

/// Byte length of the trailing CRC-CCITT check value.
pub const CHECKSUM_LENGTH: usize = 2;

/// Largest fractional-second count the 24-bit FRACSEC field can carry.
pub const MAX_FRACSEC: u32 = 0x00FF_FFFF;

/// Tracks the IEEE C37.118 standard version based on the SYNC field.
///
/// # Variants
///
/// * `V2005`: IEEE C37.118-2005 (SYNC version 0x0001).
/// * `V2011`: IEEE C37.118.2-2011 (SYNC version 0x0002).
/// * `V2024`: IEEE C37.118.2-2024 (SYNC version 0x0003).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Version {
    V2005,
    V2011,
    V2024,
}

impl Version {
    /// Extracts the `Version` from the SYNC field's version bits (3-0).
    ///
    /// # Returns
    ///
    /// * `Ok(Version)`: The corresponding version.
    /// * `Err(ParseError::UnknownVersion)`: If the version bits are
    ///   unrecognized.
    pub fn from_sync(sync: u16) -> Result<Self, ParseError> {
        match sync & 0x000F {
            0x0001 => Ok(Version::V2005),
            0x0002 => Ok(Version::V2011),
            0x0003 => Ok(Version::V2024),
            _ => Err(ParseError::UnknownVersion {
                message: format!("unsupported version bits in SYNC 0x{:04X}", sync),
            }),
        }
    }

    /// Creates a `Version` from a string identifier such as
    /// "IEEE Std C37.118.2-2011", "version2", or "v2".
    pub fn from_string(s: &str) -> Result<Self, ParseError> {
        match s {
            "IEEE Std C37.118-2005" | "version1" | "v1" => Ok(Version::V2005),
            "IEEE Std C37.118.2-2011" | "version2" | "v2" => Ok(Version::V2011),
            "IEEE Std C37.118.2-2024" | "version3" | "v3" => Ok(Version::V2024),
            _ => Err(ParseError::UnknownVersion {
                message: format!("unrecognized version identifier {:?}", s),
            }),
        }
    }

    fn sync_bits(&self) -> u16 {
        match self {
            Version::V2005 => 0x01,
            Version::V2011 => 0x02,
            Version::V2024 => 0x03,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::V2011
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V2005 => write!(f, "IEEE Std C37.118-2005"),
            Version::V2011 => write!(f, "IEEE Std C37.118.2-2011"),
            Version::V2024 => write!(f, "IEEE Std C37.118.2-2024"),
        }
    }
}

/// Represents the type of an IEEE C37.118 frame, encoded in SYNC bits 6-4.
///
/// # Variants
///
/// * `Data`: Data frame containing synchrophasor measurements.
/// * `Header`: Header frame with descriptive ASCII information.
/// * `Config1`: Configuration frame 1 (device capabilities).
/// * `Config2`: Configuration frame 2 (current configuration).
/// * `Config3`: Configuration frame 3 (extended configuration, 2024).
/// * `Command`: Command frame for control instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameType {
    Data,
    Header,
    Config1,
    Config2,
    Config3,
    Command,
}

impl FrameType {
    /// Extracts the frame type from the SYNC field.
    ///
    /// # Returns
    ///
    /// * `Ok(FrameType)`: The corresponding frame type.
    /// * `Err(ParseError::InvalidFrameType)`: If the leading byte is not
    ///   0xAA or the frame type bits are invalid.
    pub fn from_sync(sync: u16) -> Result<FrameType, ParseError> {
        if (sync >> 8) != 0xAA {
            return Err(ParseError::InvalidFrameType {
                message: format!("invalid leading byte 0x{:02X}, expected 0xAA", sync >> 8),
            });
        }
        match (sync >> 4) & 0x7 {
            0 => Ok(FrameType::Data),
            1 => Ok(FrameType::Header),
            2 => Ok(FrameType::Config1),
            3 => Ok(FrameType::Config2),
            4 => Ok(FrameType::Command),
            5 => Ok(FrameType::Config3),
            bits => Err(ParseError::InvalidFrameType {
                message: format!("invalid frame type bits {}", bits),
            }),
        }
    }

    fn sync_bits(&self) -> u16 {
        match self {
            FrameType::Data => 0,
            FrameType::Header => 1,
            FrameType::Config1 => 2,
            FrameType::Config2 => 3,
            FrameType::Command => 4,
            FrameType::Config3 => 5,
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Data => write!(f, "IEEE Std C37.118 Data Frame"),
            FrameType::Header => write!(f, "IEEE Std C37.118 Header Frame"),
            FrameType::Config1 => write!(f, "IEEE Std C37.118 Configuration Frame 1"),
            FrameType::Config2 => write!(f, "IEEE Std C37.118 Configuration Frame 2"),
            FrameType::Config3 => write!(f, "IEEE Std C37.118 Configuration Frame 3"),
            FrameType::Command => write!(f, "IEEE Std C37.118 Command Frame"),
        }
    }
}

/// Constructs a SYNC field from a version and frame type.
///
/// The SYNC word carries the 0xAA leading byte, a reserved bit 7, the frame
/// type in bits 6-4, and the version number in bits 3-0.
pub fn create_sync(version: Version, frame_type: FrameType) -> u16 {
    (0xAA_u16 << 8) | (frame_type.sync_bits() << 4) | version.sync_bits()
}

/// Represents the common prefix structure for IEEE C37.118 frames.
///
/// # Fields
///
/// * `sync`: 16-bit SYNC field (frame type and version).
/// * `framesize`: Total declared frame length in bytes, checksum included.
/// * `idcode`: Device identification code or stream identifier.
/// * `soc`: Second-of-century timestamp (Unix epoch).
/// * `leapbyte`: Time quality and leap second flags.
/// * `fracsec`: Fractional second count. The wire field is 24 bits wide, so
///   only values up to `MAX_FRACSEC` encode faithfully; assign through
///   `set_fracsec` to have the bound enforced.
/// * `version`: Derived IEEE C37.118 version (not serialized).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixFrame {
    pub sync: u16,
    pub framesize: u16,
    pub idcode: u16,
    pub soc: u32,
    pub leapbyte: u8,
    pub fracsec: u32,
    #[serde(skip)]
    pub version: Version,
}

impl PrefixFrame {
    /// Creates a prefix with the given frame type, zeroed timestamp fields,
    /// and the minimum frame size. The frame size is updated once the body
    /// length is known.
    pub fn new(version: Version, frame_type: FrameType, idcode: u16) -> Self {
        PrefixFrame {
            sync: create_sync(version, frame_type),
            framesize: PREFIX_LENGTH as u16,
            idcode,
            soc: 0,
            leapbyte: 0,
            fracsec: 0,
            version,
        }
    }

    /// Decodes a prefix from `buffer[start_index..]`.
    ///
    /// # Returns
    ///
    /// * `Ok((PrefixFrame, 14))`: The parsed prefix and the bytes consumed.
    /// * `Err(ParseError)`: On a short buffer, a bad leading byte, or an
    ///   unknown version.
    pub fn decode(buffer: &[u8], start_index: usize) -> Result<(Self, usize), ParseError> {
        let window = buffer.len().saturating_sub(start_index);
        let mut cursor = ByteCursor::new(buffer, start_index, window.min(PREFIX_LENGTH))?;
        cursor.require(PREFIX_LENGTH)?;

        let sync = cursor.u16_be()?;
        // Reject non-frames before touching the version bits.
        FrameType::from_sync(sync)?;
        let version = Version::from_sync(sync)?;

        let prefix = PrefixFrame {
            sync,
            framesize: cursor.u16_be()?,
            idcode: cursor.u16_be()?,
            soc: cursor.u32_be()?,
            leapbyte: cursor.u8()?,
            fracsec: cursor.u24_be()?,
            version,
        };
        Ok((prefix, cursor.consumed()))
    }

    /// Serializes the prefix to its 14-byte wire image.
    pub fn encode(&self) -> [u8; PREFIX_LENGTH] {
        let mut result = [0u8; PREFIX_LENGTH];
        result[0..2].copy_from_slice(&self.sync.to_be_bytes());
        result[2..4].copy_from_slice(&self.framesize.to_be_bytes());
        result[4..6].copy_from_slice(&self.idcode.to_be_bytes());
        result[6..10].copy_from_slice(&self.soc.to_be_bytes());
        result[10] = self.leapbyte;
        result[11..14].copy_from_slice(&self.fracsec.to_be_bytes()[1..4]);
        result
    }

    /// Sets the fractional second count, rejecting values that do not fit
    /// the 24-bit wire field.
    pub fn set_fracsec(&mut self, fracsec: u32) -> Result<(), ParseError> {
        if fracsec > MAX_FRACSEC {
            return Err(ParseError::invalid_field(
                "fracsec",
                format!("{} exceeds 24-bit maximum {}", fracsec, MAX_FRACSEC),
            ));
        }
        self.fracsec = fracsec;
        Ok(())
    }

    pub fn frame_type(&self) -> Result<FrameType, ParseError> {
        FrameType::from_sync(self.sync)
    }

    pub fn time_tag(&self) -> TimeTag {
        TimeTag::new(self.soc, self.fracsec)
    }
}

/// Represents the STAT field carried by each PMU block of a data frame.
///
/// The 16-bit word packs status flags whose placement differs between the
/// 2005 revision and the 2011/2024 revisions.
///
/// # Fields
///
/// * `raw`: Raw 16-bit STAT value.
/// * `data_error`: 2-bit data error code (bits 15-14).
/// * `pmu_sync`: PMU synchronization status (bit 13).
/// * `data_sorting`: Data sorting status (bit 12).
/// * `pmu_trigger`: PMU trigger status (bit 11).
/// * `config_change`: Configuration change flag (bit 10).
/// * `data_modified`: Data modified flag (bit 9, 2011/2024 only).
/// * `time_quality`: Time quality code (bits 8-6 in 2011/2024, 9-8 in 2005).
/// * `unlock_time`: Unlock time code (bits 5-4, 2011/2024 only).
/// * `trigger_reason`: 4-bit trigger reason code (bits 3-0).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatField {
    pub raw: u16,
    pub data_error: u8,
    pub pmu_sync: bool,
    pub data_sorting: bool,
    pub pmu_trigger: bool,
    pub config_change: bool,
    pub data_modified: bool,
    pub time_quality: u8,
    pub unlock_time: u8,
    pub trigger_reason: u8,
}

impl StatField {
    /// Interprets a raw STAT value under the given standard version.
    pub fn from_raw(raw: u16, version: Version) -> Self {
        let data_error = ((raw >> 14) & 0x03) as u8;
        let pmu_sync = (raw & 0x2000) != 0;
        let data_sorting = (raw & 0x1000) != 0;
        let pmu_trigger = (raw & 0x0800) != 0;
        let config_change = (raw & 0x0400) != 0;
        let trigger_reason = (raw & 0x000F) as u8;

        match version {
            Version::V2005 => StatField {
                raw,
                data_error,
                pmu_sync,
                data_sorting,
                pmu_trigger,
                config_change,
                data_modified: false,
                time_quality: ((raw >> 8) & 0x03) as u8,
                unlock_time: 0,
                trigger_reason,
            },
            Version::V2011 | Version::V2024 => StatField {
                raw,
                data_error,
                pmu_sync,
                data_sorting,
                pmu_trigger,
                config_change,
                data_modified: (raw & 0x0200) != 0,
                time_quality: ((raw >> 6) & 0x07) as u8,
                unlock_time: ((raw >> 4) & 0x03) as u8,
                trigger_reason,
            },
        }
    }

    /// Packs the flags back into a raw STAT value under the given version.
    pub fn to_raw(&self, version: Version) -> u16 {
        let mut raw = 0;
        raw |= (self.data_error as u16 & 0x03) << 14;
        raw |= (self.pmu_sync as u16) << 13;
        raw |= (self.data_sorting as u16) << 12;
        raw |= (self.pmu_trigger as u16) << 11;
        raw |= (self.config_change as u16) << 10;
        raw |= self.trigger_reason as u16 & 0x000F;

        match version {
            Version::V2005 => {
                raw |= ((self.time_quality & 0x03) as u16) << 8;
            }
            Version::V2011 | Version::V2024 => {
                raw |= (self.data_modified as u16) << 9;
                raw |= ((self.time_quality & 0x07) as u16) << 6;
                raw |= ((self.unlock_time & 0x03) as u16) << 4;
            }
        }
        raw
    }
}
